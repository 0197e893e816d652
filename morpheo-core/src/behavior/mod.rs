//! Reusable, stateful behaviors attached to component instances
//!
//! A behavior is one shared object per name holding state for every
//! component it is attached to, keyed by component id. The runtime feeds it
//! inbound connection data and propagates whatever it emits.

mod counter;
mod toggle;

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::capability::ConnectionPoint;
use crate::error::RegistryError;

pub use counter::CounterBehavior;
pub use toggle::ToggleBehavior;

/// A value a behavior sends out through one of its points
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub point: String,
    pub value: Value,
}

impl Emission {
    pub fn new(point: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            point: point.into(),
            value: value.into(),
        }
    }
}

pub trait Behavior: Send {
    fn name(&self) -> &str;

    /// Points this behavior adds to the components it is attached to
    fn connection_points(&self) -> Vec<ConnectionPoint>;

    /// Seed state for `component_id`; re-initializing replaces it
    fn initialize(&mut self, component_id: &str, options: &Map<String, Value>);

    /// React to inbound data; unknown points are ignored
    fn on_data_received(&mut self, component_id: &str, point: &str, data: &Value)
        -> Vec<Emission>;

    /// Current state for `component_id`, merged into the instance state
    fn state(&self, component_id: &str) -> Option<Map<String, Value>>;

    fn remove(&mut self, component_id: &str);
}

type BehaviorFactory = Box<dyn Fn() -> Box<dyn Behavior> + Send + Sync>;

/// Named behavior factories
#[derive(Default)]
pub struct BehaviorRegistry {
    factories: HashMap<String, BehaviorFactory>,
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("BehaviorRegistry")
            .field("behaviors", &names)
            .finish()
    }
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `counter` and `toggle`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            counter::NAME.to_string(),
            Box::new(|| Box::new(CounterBehavior::new()) as Box<dyn Behavior>),
        );
        registry.factories.insert(
            toggle::NAME.to_string(),
            Box::new(|| Box::new(ToggleBehavior::new()) as Box<dyn Behavior>),
        );
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Behavior> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    fn create(&self, name: &str) -> Option<Box<dyn Behavior>> {
        self.factories.get(name).map(|factory| factory())
    }
}

/// Live behaviors and what they are attached to
#[derive(Default)]
pub struct BehaviorEngine {
    registry: BehaviorRegistry,
    behaviors: HashMap<String, Box<dyn Behavior>>,
    attachments: HashMap<String, Vec<String>>,
}

impl fmt::Debug for BehaviorEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorEngine")
            .field("registry", &self.registry)
            .field("attachments", &self.attachments)
            .finish()
    }
}

impl BehaviorEngine {
    pub fn new(registry: BehaviorRegistry) -> Self {
        Self {
            registry,
            behaviors: HashMap::new(),
            attachments: HashMap::new(),
        }
    }

    /// Attach (or re-initialize) a behavior on a component
    pub fn attach(
        &mut self,
        component_id: &str,
        name: &str,
        options: &Map<String, Value>,
    ) -> Result<(), RegistryError> {
        if !self.behaviors.contains_key(name) {
            let behavior = self
                .registry
                .create(name)
                .ok_or_else(|| RegistryError::UnknownBehavior(name.to_string()))?;
            self.behaviors.insert(name.to_string(), behavior);
        }
        if let Some(behavior) = self.behaviors.get_mut(name) {
            behavior.initialize(component_id, options);
        }
        let attached = self.attachments.entry(component_id.to_string()).or_default();
        if !attached.iter().any(|n| n == name) {
            attached.push(name.to_string());
        }
        debug!(component = %component_id, behavior = %name, "Attached behavior");
        Ok(())
    }

    /// Names of the behaviors attached to a component
    pub fn attached(&self, component_id: &str) -> &[String] {
        self.attachments
            .get(component_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Connection points contributed by the attached behaviors
    pub fn connection_point(&self, component_id: &str, point: &str) -> Option<ConnectionPoint> {
        self.attached(component_id)
            .iter()
            .filter_map(|name| self.behaviors.get(name))
            .flat_map(|behavior| behavior.connection_points())
            .find(|p| p.id == point)
    }

    /// Deliver inbound data to every behavior on the component
    pub fn on_data_received(
        &mut self,
        component_id: &str,
        point: &str,
        data: &Value,
    ) -> Vec<Emission> {
        let Some(names) = self.attachments.get(component_id) else {
            return Vec::new();
        };
        let mut emissions = Vec::new();
        for name in names {
            match self.behaviors.get_mut(name) {
                Some(behavior) => {
                    emissions.extend(behavior.on_data_received(component_id, point, data))
                }
                None => warn!(behavior = %name, "Attached behavior is not instantiated"),
            }
        }
        emissions
    }

    /// Merged state of every behavior on the component
    pub fn state(&self, component_id: &str) -> Map<String, Value> {
        let mut state = Map::new();
        for name in self.attached(component_id) {
            if let Some(s) = self.behaviors.get(name).and_then(|b| b.state(component_id)) {
                state.extend(s);
            }
        }
        state
    }

    /// Drop all behavior state for a component
    pub fn detach(&mut self, component_id: &str) {
        if let Some(names) = self.attachments.remove(component_id) {
            for name in names {
                if let Some(behavior) = self.behaviors.get_mut(&name) {
                    behavior.remove(component_id);
                }
            }
        }
    }
}

/// Numeric option, accepting numeric strings
pub(crate) fn number_option(options: &Map<String, Value>, key: &str) -> Option<f64> {
    match options.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Integral values as JSON integers, others as floats
pub(crate) fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
