//! Numeric counter with optional bounds

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{number_option, number_value, Behavior, Emission};
use crate::capability::{ConnectionPoint, DataType};

pub(crate) const NAME: &str = "counter";

#[derive(Debug, Clone, Copy, PartialEq)]
struct CounterState {
    value: f64,
    initial: f64,
    step: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl CounterState {
    fn from_options(options: &Map<String, Value>) -> Self {
        let min = number_option(options, "min");
        let max = number_option(options, "max");
        let initial = number_option(options, "count")
            .or_else(|| number_option(options, "initialValue"))
            .unwrap_or(0.0);
        let mut state = Self {
            value: initial,
            initial,
            step: number_option(options, "step").unwrap_or(1.0),
            min,
            max,
        };
        state.value = state.clamp(initial);
        state.initial = state.value;
        state
    }

    fn clamp(&self, value: f64) -> f64 {
        let value = self.min.map_or(value, |min| value.max(min));
        self.max.map_or(value, |max| value.min(max))
    }
}

/// `count`/`initialValue`, `step`, `min`, `max` options; `null` bounds are open
///
/// Points: `increment`, `decrement`, `reset` and `setValue` in; `countChanged`
/// and `value` out. Every operation emits both outputs.
#[derive(Debug, Default)]
pub struct CounterBehavior {
    states: HashMap<String, CounterState>,
}

impl CounterBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for a component
    pub fn value(&self, component_id: &str) -> Option<f64> {
        self.states.get(component_id).map(|s| s.value)
    }
}

impl Behavior for CounterBehavior {
    fn name(&self) -> &str {
        NAME
    }

    fn connection_points(&self) -> Vec<ConnectionPoint> {
        vec![
            ConnectionPoint::input("increment", DataType::Event).with_name("Increment"),
            ConnectionPoint::input("decrement", DataType::Event).with_name("Decrement"),
            ConnectionPoint::input("reset", DataType::Event).with_name("Reset"),
            ConnectionPoint::input("setValue", DataType::Number).with_name("Set value"),
            ConnectionPoint::output("countChanged", DataType::Number).with_name("Count changed"),
            ConnectionPoint::output("value", DataType::Number)
                .with_name("Value")
                .with_default(0),
        ]
    }

    fn initialize(&mut self, component_id: &str, options: &Map<String, Value>) {
        self.states
            .insert(component_id.to_string(), CounterState::from_options(options));
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
        let next = match point {
            "increment" => state.value + state.step,
            "decrement" => state.value - state.step,
            "reset" => state.initial,
            "setValue" => match DataType::Number.coerce(data).and_then(|v| v.as_f64()) {
                Some(value) => value,
                None => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        state.value = state.clamp(next);

        let value = number_value(state.value);
        vec![
            Emission::new("countChanged", value.clone()),
            Emission::new("value", value),
        ]
    }

    fn state(&self, component_id: &str) -> Option<Map<String, Value>> {
        let state = self.states.get(component_id)?;
        let mut map = Map::new();
        map.insert("count".into(), number_value(state.value));
        map.insert("value".into(), number_value(state.value));
        Some(map)
    }

    fn remove(&mut self, component_id: &str) {
        self.states.remove(component_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter(options: Value) -> CounterBehavior {
        let mut counter = CounterBehavior::new();
        counter.initialize("c", options.as_object().unwrap());
        counter
    }

    #[test]
    fn test_increments_clamp_at_max() {
        let mut counter = counter(json!({"count": 0, "step": 1, "max": 3}));
        for _ in 0..3 {
            counter.on_data_received("c", "increment", &Value::Null);
        }
        assert_eq!(counter.value("c"), Some(3.0));

        let emissions = counter.on_data_received("c", "increment", &Value::Null);
        assert_eq!(counter.value("c"), Some(3.0));
        assert_eq!(
            emissions,
            vec![
                Emission::new("countChanged", 3),
                Emission::new("value", 3)
            ]
        );
    }

    #[test]
    fn test_reset_restores_initial_value() {
        let mut counter = counter(json!({"initialValue": 5, "step": 2, "min": 0, "max": null}));
        counter.on_data_received("c", "increment", &Value::Null);
        counter.on_data_received("c", "increment", &Value::Null);
        counter.on_data_received("c", "decrement", &Value::Null);
        assert_eq!(counter.value("c"), Some(7.0));

        counter.on_data_received("c", "reset", &Value::Null);
        assert_eq!(counter.value("c"), Some(5.0));
    }

    #[test]
    fn test_set_value_clamps_and_coerces() {
        let mut counter = counter(json!({"min": -1, "max": 10}));
        counter.on_data_received("c", "setValue", &json!("42"));
        assert_eq!(counter.value("c"), Some(10.0));

        assert!(counter
            .on_data_received("c", "setValue", &json!("many"))
            .is_empty());
        assert_eq!(counter.value("c"), Some(10.0));
    }

    #[test]
    fn test_unknown_point_is_noop() {
        let mut counter = counter(json!({"count": 1}));
        assert!(counter
            .on_data_received("c", "explode", &json!(1))
            .is_empty());
        assert!(counter
            .on_data_received("other", "increment", &Value::Null)
            .is_empty());
        assert_eq!(counter.value("c"), Some(1.0));
    }

    #[test]
    fn test_fractional_steps_stay_fractional() {
        let mut counter = counter(json!({"count": 0, "step": 0.5}));
        let emissions = counter.on_data_received("c", "increment", &Value::Null);
        assert_eq!(emissions[1].value, json!(0.5));
        assert_eq!(counter.state("c").unwrap()["count"], json!(0.5));
    }
}
