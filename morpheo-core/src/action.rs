//! Dynamic actions dispatched to the store
//!
//! Generated apps describe their actions as data (`{type, payload, meta}`),
//! so unlike a typed enum the action type is a string and the payload is
//! JSON. A payload may also carry a function (thunks, subscribers) or a list
//! of actions (batches); those variants never cross the wire.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::dispatcher::Dispatcher;
use crate::error::SubscriberError;

/// Free-form action metadata (`meta.api`, `meta.debounce`, `meta.thunk`, ...)
pub type Meta = Map<String, Value>;

/// Action type that unpacks its payload into individual actions
pub const BATCH_ACTIONS: &str = "BATCH_ACTIONS";
/// Action type emitted when a validation rule rejects an action
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Registers a [`Listener`] with the subscription middleware
pub const SUBSCRIBE: &str = "SUBSCRIBE";
/// Removes a listener registered with [`SUBSCRIBE`]
pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";

/// An action flowing through the middleware chain into the reducers
#[derive(Clone, Debug)]
pub struct StateAction {
    /// The action type, e.g. `"FETCH_USER"`
    pub kind: String,
    pub payload: Payload,
    pub meta: Meta,
}

impl StateAction {
    /// Create an action with no payload and empty meta
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Payload::None,
            meta: Meta::new(),
        }
    }

    /// Attach a JSON payload
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Payload::Value(payload.into());
        self
    }

    /// Set a meta entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Create a thunk action; the function runs instead of reaching the reducers
    pub fn thunk<F>(kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(ThunkContext) + Send + Sync + 'static,
    {
        Self {
            kind: kind.into(),
            payload: Payload::Thunk(Thunk::new(f)),
            meta: Meta::new(),
        }
    }

    /// Create a `BATCH_ACTIONS` action
    pub fn batch(actions: Vec<StateAction>) -> Self {
        Self {
            kind: BATCH_ACTIONS.to_string(),
            payload: Payload::Batch(actions),
            meta: Meta::new(),
        }
    }

    /// Create a `SUBSCRIBE` action for the given listener
    pub fn subscribe(listener: Listener) -> Self {
        Self {
            kind: SUBSCRIBE.to_string(),
            payload: Payload::Listener(listener),
            meta: Meta::new(),
        }
    }

    /// Create an `UNSUBSCRIBE` action for a listener id
    pub fn unsubscribe(listener_id: impl Into<String>) -> Self {
        Self::new(UNSUBSCRIBE).with_payload(Value::String(listener_id.into()))
    }

    /// Derive `<TYPE>_<suffix>` keeping the meta (e.g. `FETCH_USER_SUCCESS`)
    pub fn derived(&self, suffix: &str) -> Self {
        Self {
            kind: format!("{}_{}", self.kind, suffix),
            payload: Payload::None,
            meta: self.meta.clone(),
        }
    }

    /// The JSON payload, if the payload is plain data
    pub fn payload_value(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Whether this action carries a truthy `meta[key]` flag
    pub fn has_flag(&self, key: &str) -> bool {
        matches!(self.meta.get(key), Some(Value::Bool(true)))
    }

    /// Wire representation; functions serialize as `null`
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("type".into(), Value::String(self.kind.clone()));
        match &self.payload {
            Payload::None => {}
            Payload::Value(value) => {
                object.insert("payload".into(), value.clone());
            }
            Payload::Batch(actions) => {
                let items = actions.iter().map(StateAction::to_value).collect();
                object.insert("payload".into(), Value::Array(items));
            }
            Payload::Thunk(_) | Payload::Listener(_) => {
                object.insert("payload".into(), Value::Null);
            }
        }
        if !self.meta.is_empty() {
            object.insert("meta".into(), Value::Object(self.meta.clone()));
        }
        Value::Object(object)
    }

    /// Parse the wire representation; `None` unless `type` is a non-empty string
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let kind = object.get("type")?.as_str()?.trim();
        if kind.is_empty() {
            return None;
        }
        let payload = match object.get("payload") {
            None | Some(Value::Null) => Payload::None,
            Some(value) => Payload::Value(value.clone()),
        };
        let meta = object
            .get("meta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Some(Self {
            kind: kind.to_string(),
            payload,
            meta,
        })
    }
}

/// Action payload
#[derive(Clone, Default)]
pub enum Payload {
    #[default]
    None,
    Value(Value),
    Thunk(Thunk),
    Listener(Listener),
    Batch(Vec<StateAction>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::None => f.write_str("None"),
            Payload::Value(value) => write!(f, "Value({value})"),
            Payload::Thunk(_) => f.write_str("Thunk(..)"),
            Payload::Listener(listener) => write!(f, "Listener({})", listener.id),
            Payload::Batch(actions) => f.debug_tuple("Batch").field(actions).finish(),
        }
    }
}

/// What a thunk receives: a JSON snapshot of the state and a dispatcher
///
/// The dispatcher can be moved into a spawned task to dispatch later.
#[derive(Debug, Clone)]
pub struct ThunkContext {
    pub state: Value,
    pub dispatch: Dispatcher,
}

/// A deferred computation carried in an action payload
#[derive(Clone)]
pub struct Thunk(Arc<dyn Fn(ThunkContext) + Send + Sync>);

impl Thunk {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ThunkContext) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, context: ThunkContext) {
        (self.0)(context)
    }
}

type ListenerFn = dyn Fn(&StateAction) -> Result<(), SubscriberError> + Send + Sync;

/// A pub/sub subscriber notified of every action that passes the chain
#[derive(Clone)]
pub struct Listener {
    id: String,
    callback: Arc<ListenerFn>,
}

impl Listener {
    pub fn new<F>(id: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&StateAction) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn notify(&self, action: &StateAction) -> Result<(), SubscriberError> {
        (self.callback)(action)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}
