//! Declarative component methods
//!
//! Generated configs describe event effects as lists of small instructions
//! (`{"type": "setValue", "target": "email", "value": ""}`). The vocabulary
//! is closed: anything the interpreter does not know is dropped when the
//! component is normalized, with a warning.
//!
//! Operands are literals, `{"var": "name"}` (interpreter scope, dot paths
//! allowed) or `{"valueOf": "component-id"}` (the current value of another
//! component, resolved by the host).

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::action::StateAction;
use crate::storage::get_path;

/// A single effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Instruction {
    SetValue {
        target: String,
        value: Operand,
    },
    /// Read a component's value into a scope variable
    GetValue {
        target: String,
        into: String,
    },
    SetStyle {
        target: String,
        property: String,
        value: Operand,
    },
    SetProperty {
        target: String,
        property: String,
        value: Operand,
    },
    ToggleValue {
        target: String,
    },
    If {
        condition: Condition,
        #[serde(default, deserialize_with = "lenient_list")]
        then: Vec<Instruction>,
        #[serde(
            rename = "else",
            default,
            deserialize_with = "lenient_list",
            skip_serializing_if = "Vec::is_empty"
        )]
        otherwise: Vec<Instruction>,
    },
    /// Run `actions` after `delay` milliseconds
    SetTimeout {
        #[serde(default)]
        delay: u64,
        #[serde(default, deserialize_with = "lenient_list")]
        actions: Vec<Instruction>,
    },
    /// Dispatch a store action
    Dispatch {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Operand>,
    },
    /// Send a value out through one of the component's connection points
    Emit {
        connection: String,
        #[serde(default)]
        value: Operand,
    },
    Log {
        message: Operand,
    },
}

/// Value of an instruction argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Var {
        var: String,
    },
    ValueOf {
        #[serde(rename = "valueOf")]
        value_of: String,
    },
    Literal(Value),
}

impl Default for Operand {
    fn default() -> Self {
        Operand::Literal(Value::Null)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

/// Predicate used by `if`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Condition {
    Equals { left: Operand, right: Operand },
    NotEquals { left: Operand, right: Operand },
    Truthy { value: Operand },
    Falsy { value: Operand },
    GreaterThan { left: Operand, right: Operand },
    LessThan { left: Operand, right: Operand },
    And { conditions: Vec<Condition> },
    Or { conditions: Vec<Condition> },
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<Instruction>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(parse_instructions(&raw))
}

/// Parse an instruction list, dropping entries that are not instructions
///
/// A single object is treated as a one-element list.
pub fn parse_instructions(raw: &Value) -> Vec<Instruction> {
    let items = match raw {
        Value::Array(items) => items.as_slice(),
        Value::Null => return Vec::new(),
        other => std::slice::from_ref(other),
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<Instruction>(item.clone()) {
            Ok(instruction) => Some(instruction),
            Err(e) => {
                warn!(instruction = %item, error = %e, "Dropping unknown instruction");
                None
            }
        })
        .collect()
}

/// What instructions act on
///
/// Targets are component ids; `"self"` and `""` name the component whose
/// method is running.
pub trait InstructionHost {
    fn get_value(&self, target: &str) -> Option<Value>;
    fn set_value(&mut self, target: &str, value: Value);
    fn set_style(&mut self, target: &str, property: &str, value: Value);
    fn set_property(&mut self, target: &str, property: &str, value: Value);
    fn dispatch(&mut self, action: StateAction);
    fn emit(&mut self, connection: &str, value: Value);
}

/// Variables visible to a running instruction list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    vars: Map<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope with `event` bound to the triggering payload
    pub fn for_event(payload: Value) -> Self {
        let mut scope = Self::new();
        scope.set("event", payload);
        scope
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Look up `name`, following dots into objects and arrays
    pub fn get(&self, name: &str) -> Option<&Value> {
        let (head, rest) = match name.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (name, None),
        };
        let value = self.vars.get(head)?;
        match rest {
            Some(path) => get_path(value, path),
            None => Some(value),
        }
    }
}

/// Work deferred by `setTimeout`
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled {
    pub delay: Duration,
    pub actions: Vec<Instruction>,
}

/// What a run left for the host to do later
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub scheduled: Vec<Scheduled>,
}

/// Executes instruction lists against a host
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Interpreter {
    pub fn run(
        &self,
        actions: &[Instruction],
        scope: &mut Scope,
        host: &mut dyn InstructionHost,
    ) -> Outcome {
        let mut outcome = Outcome::default();
        self.run_into(actions, scope, host, &mut outcome);
        outcome
    }

    fn run_into(
        &self,
        actions: &[Instruction],
        scope: &mut Scope,
        host: &mut dyn InstructionHost,
        outcome: &mut Outcome,
    ) {
        for instruction in actions {
            match instruction {
                Instruction::SetValue { target, value } => {
                    let value = resolve(value, scope, host);
                    host.set_value(target, value);
                }
                Instruction::GetValue { target, into } => {
                    let value = host.get_value(target).unwrap_or(Value::Null);
                    scope.set(into.clone(), value);
                }
                Instruction::SetStyle {
                    target,
                    property,
                    value,
                } => {
                    let value = resolve(value, scope, host);
                    host.set_style(target, property, value);
                }
                Instruction::SetProperty {
                    target,
                    property,
                    value,
                } => {
                    let value = resolve(value, scope, host);
                    host.set_property(target, property, value);
                }
                Instruction::ToggleValue { target } => {
                    let current = host.get_value(target).unwrap_or(Value::Null);
                    host.set_value(target, Value::Bool(!truthy(&current)));
                }
                Instruction::If {
                    condition,
                    then,
                    otherwise,
                } => {
                    let branch = if evaluate(condition, scope, host) {
                        then
                    } else {
                        otherwise
                    };
                    self.run_into(branch, scope, host, outcome);
                }
                Instruction::SetTimeout { delay, actions } => {
                    outcome.scheduled.push(Scheduled {
                        delay: Duration::from_millis(*delay),
                        actions: actions.clone(),
                    });
                }
                Instruction::Dispatch { action, payload } => {
                    let mut dispatched = StateAction::new(action.clone());
                    if let Some(payload) = payload {
                        dispatched = dispatched.with_payload(resolve(payload, scope, host));
                    }
                    host.dispatch(dispatched);
                }
                Instruction::Emit { connection, value } => {
                    let value = resolve(value, scope, host);
                    host.emit(connection, value);
                }
                Instruction::Log { message } => {
                    let message = match resolve(message, scope, host) {
                        Value::String(text) => text,
                        other => other.to_string(),
                    };
                    info!(message = %message, "Component log");
                }
            }
        }
    }
}

fn resolve(operand: &Operand, scope: &Scope, host: &dyn InstructionHost) -> Value {
    match operand {
        Operand::Literal(value) => value.clone(),
        Operand::Var { var } => scope.get(var).cloned().unwrap_or(Value::Null),
        Operand::ValueOf { value_of } => host.get_value(value_of).unwrap_or(Value::Null),
    }
}

fn evaluate(condition: &Condition, scope: &Scope, host: &dyn InstructionHost) -> bool {
    let pair = |left: &Operand, right: &Operand| (resolve(left, scope, host), resolve(right, scope, host));
    match condition {
        Condition::Equals { left, right } => {
            let (l, r) = pair(left, right);
            loose_eq(&l, &r)
        }
        Condition::NotEquals { left, right } => {
            let (l, r) = pair(left, right);
            !loose_eq(&l, &r)
        }
        Condition::Truthy { value } => truthy(&resolve(value, scope, host)),
        Condition::Falsy { value } => !truthy(&resolve(value, scope, host)),
        Condition::GreaterThan { left, right } => {
            let (l, r) = pair(left, right);
            compare(&l, &r) == Some(std::cmp::Ordering::Greater)
        }
        Condition::LessThan { left, right } => {
            let (l, r) = pair(left, right);
            compare(&l, &r) == Some(std::cmp::Ordering::Less)
        }
        Condition::And { conditions } => conditions.iter().all(|c| evaluate(c, scope, host)),
        Condition::Or { conditions } => conditions.iter().any(|c| evaluate(c, scope, host)),
    }
}

/// `null`, `false`, `0` and `""` are falsy; everything else is truthy
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (left, right) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            matches!((as_number(left), as_number(right)), (Some(l), Some(r)) if l == r)
        }
        _ => false,
    }
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (as_number(left), as_number(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => match (left, right) {
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            _ => None,
        },
    }
}
