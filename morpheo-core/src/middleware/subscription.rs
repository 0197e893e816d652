//! Pub/sub over the action stream

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;
use tracing::{debug, warn};

use super::{Chain, Middleware};
use crate::action::{Listener, Payload, StateAction, SUBSCRIBE, UNSUBSCRIBE};

/// Notifies registered listeners of every action that passes the chain
///
/// `SUBSCRIBE` and `UNSUBSCRIBE` are consumed here and never reach the
/// reducers. A listener that fails (or panics) is logged and skipped; the
/// remaining listeners are still notified.
#[derive(Debug, Default)]
pub struct SubscriptionMiddleware {
    listeners: Vec<Listener>,
}

impl SubscriptionMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn broadcast(&self, action: &StateAction) {
        for listener in &self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.notify(action)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(listener = %listener.id(), error = %e, "Subscriber failed"),
                Err(_) => warn!(listener = %listener.id(), "Subscriber panicked"),
            }
        }
    }
}

impl<S> Middleware<S> for SubscriptionMiddleware {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>) {
        match action.kind.as_str() {
            SUBSCRIBE => {
                if let Payload::Listener(listener) = action.payload {
                    debug!(listener = %listener.id(), "Subscribed");
                    self.listeners.retain(|l| l.id() != listener.id());
                    self.listeners.push(listener);
                } else {
                    warn!("SUBSCRIBE without a listener payload");
                }
            }
            UNSUBSCRIBE => {
                let id = match &action.payload {
                    Payload::Value(Value::String(id)) => Some(id.clone()),
                    Payload::Listener(listener) => Some(listener.id().to_string()),
                    _ => None,
                };
                match id {
                    Some(id) => {
                        debug!(listener = %id, "Unsubscribed");
                        self.listeners.retain(|l| l.id() != id);
                    }
                    None => warn!("UNSUBSCRIBE without a listener id"),
                }
            }
            _ => {
                let observed = action.clone();
                chain.next(action);
                self.broadcast(&observed);
            }
        }
    }
}
