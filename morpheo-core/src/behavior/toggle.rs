//! Boolean on/off switch

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{Behavior, Emission};
use crate::capability::{ConnectionPoint, DataType};

pub(crate) const NAME: &str = "toggle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ToggleState {
    on: bool,
    initial: bool,
}

/// `value` option; `toggle`, `set` and `reset` in; `toggled` and `value` out
#[derive(Debug, Default)]
pub struct ToggleBehavior {
    states: HashMap<String, ToggleState>,
}

impl ToggleBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self, component_id: &str) -> Option<bool> {
        self.states.get(component_id).map(|s| s.on)
    }
}

impl Behavior for ToggleBehavior {
    fn name(&self) -> &str {
        NAME
    }

    fn connection_points(&self) -> Vec<ConnectionPoint> {
        vec![
            ConnectionPoint::input("toggle", DataType::Event).with_name("Toggle"),
            ConnectionPoint::input("set", DataType::Boolean).with_name("Set"),
            ConnectionPoint::input("reset", DataType::Event).with_name("Reset"),
            ConnectionPoint::output("toggled", DataType::Boolean).with_name("Toggled"),
            ConnectionPoint::output("value", DataType::Boolean)
                .with_name("Value")
                .with_default(false),
        ]
    }

    fn initialize(&mut self, component_id: &str, options: &Map<String, Value>) {
        let initial = options
            .get("value")
            .and_then(|v| DataType::Boolean.coerce(v))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        self.states.insert(
            component_id.to_string(),
            ToggleState {
                on: initial,
                initial,
            },
        );
    }

    fn on_data_received(
        &mut self,
        component_id: &str,
        point: &str,
        data: &Value,
    ) -> Vec<Emission> {
        let Some(state) = self.states.get_mut(component_id) else {
            return Vec::new();
        };
        state.on = match point {
            "toggle" => !state.on,
            "set" => match DataType::Boolean.coerce(data).and_then(|v| v.as_bool()) {
                Some(on) => on,
                None => return Vec::new(),
            },
            "reset" => state.initial,
            _ => return Vec::new(),
        };
        vec![
            Emission::new("toggled", state.on),
            Emission::new("value", state.on),
        ]
    }

    fn state(&self, component_id: &str) -> Option<Map<String, Value>> {
        let state = self.states.get(component_id)?;
        let mut map = Map::new();
        map.insert("on".into(), Value::Bool(state.on));
        map.insert("value".into(), Value::Bool(state.on));
        Some(map)
    }

    fn remove(&mut self, component_id: &str) {
        self.states.remove(component_id);
    }
}
