//! Capabilities, connection points and the edges between them
//!
//! A component type declares capabilities statically; each capability is a
//! group of typed, directional connection points. Edges always run from a
//! point that can act as a source (`output`/`bidirectional`) to a point that
//! can act as a target (`input`/`bidirectional`).
//!
//! Data types are advisory. A mismatch between the two endpoints is allowed
//! (a transform may reconcile them) but is flagged when no transform is
//! present. Values are coerced to the target's type on delivery when a
//! sensible conversion exists and delivered unchanged otherwise.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::error::ConnectionError;

/// Data carried by a connection point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Number,
    Boolean,
    Object,
    Array,
    /// A signal; the payload is opaque
    Event,
    #[default]
    Any,
}

impl DataType {
    /// Whether `value` already has this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            DataType::Text => value.is_string(),
            DataType::Number => value.is_number(),
            DataType::Boolean => value.is_boolean(),
            DataType::Object => value.is_object(),
            DataType::Array => value.is_array(),
            DataType::Event | DataType::Any => true,
        }
    }

    /// Whether two endpoint types can exchange values without a transform
    pub fn compatible_with(&self, other: DataType) -> bool {
        self == &other || self.is_open() || other.is_open()
    }

    fn is_open(&self) -> bool {
        matches!(self, DataType::Event | DataType::Any)
    }

    /// Convert `value` to this type; `None` when no sensible conversion exists
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        if self.matches(value) {
            return Some(value.clone());
        }
        match (self, value) {
            (DataType::Text, Value::Number(n)) => Some(Value::String(n.to_string())),
            (DataType::Text, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (DataType::Text, Value::Null) => Some(Value::String(String::new())),
            (DataType::Number, Value::String(s)) => parse_number(s.trim()).map(Value::Number),
            (DataType::Number, Value::Bool(b)) => Some(Value::from(u8::from(*b))),
            (DataType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str()
            {
                "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
                "false" | "0" | "no" | "off" | "" => Some(Value::Bool(false)),
                _ => None,
            },
            (DataType::Boolean, Value::Number(n)) => {
                Some(Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false)))
            }
            (DataType::Boolean, Value::Null) => Some(Value::Bool(false)),
            (DataType::Array, Value::Null) => Some(Value::Array(Vec::new())),
            (DataType::Object, Value::Null) => Some(Value::Object(Map::new())),
            _ => None,
        }
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Number::from(int));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Text => "text",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Object => "object",
            DataType::Array => "array",
            DataType::Event => "event",
            DataType::Any => "any",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Roles a connection point can play in an edge
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flow: u8 {
        const SOURCE = 0b01;
        const TARGET = 0b10;
    }
}

/// Which way data moves through a connection point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Input,
    Output,
    Bidirectional,
}

impl Direction {
    pub fn flow(&self) -> Flow {
        match self {
            Direction::Input => Flow::TARGET,
            Direction::Output => Flow::SOURCE,
            Direction::Bidirectional => Flow::SOURCE | Flow::TARGET,
        }
    }

    pub fn can_source(&self) -> bool {
        self.flow().contains(Flow::SOURCE)
    }

    pub fn can_target(&self) -> bool {
        self.flow().contains(Flow::TARGET)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Input => "input",
            Direction::Output => "output",
            Direction::Bidirectional => "bidirectional",
        };
        f.write_str(name)
    }
}

/// A named, typed, directional socket on a capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPoint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    pub direction: Direction,
    #[serde(default)]
    pub default_value: Value,
}

impl ConnectionPoint {
    pub fn new(id: impl Into<String>, data_type: DataType, direction: Direction) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            data_type,
            direction,
            default_value: Value::Null,
        }
    }

    pub fn input(id: impl Into<String>, data_type: DataType) -> Self {
        Self::new(id, data_type, Direction::Input)
    }

    pub fn output(id: impl Into<String>, data_type: DataType) -> Self {
        Self::new(id, data_type, Direction::Output)
    }

    pub fn bidirectional(id: impl Into<String>, data_type: DataType) -> Self {
        Self::new(id, data_type, Direction::Bidirectional)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }
}

/// A named group of connection points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCapability {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub connection_points: Vec<ConnectionPoint>,
}

impl ComponentCapability {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            connection_points: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_point(mut self, point: ConnectionPoint) -> Self {
        self.connection_points.push(point);
        self
    }

    pub fn point(&self, id: &str) -> Option<&ConnectionPoint> {
        self.connection_points.iter().find(|p| p.id == id)
    }
}

/// Identifier of an edge in the connection graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// A fresh, unique id
    pub fn generate() -> Self {
        Self(format!("conn-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pure value mapping applied once per propagated value
#[derive(Clone)]
pub struct Transform(Arc<dyn Fn(&Value) -> Value + Send + Sync>);

impl Transform {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: &Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(..)")
    }
}

/// A directed edge from a source point to a target point
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub source_component_id: String,
    pub source_connection_id: String,
    pub target_component_id: String,
    pub target_connection_id: String,
    pub transform: Option<Transform>,
}

impl Connection {
    /// Whether either endpoint belongs to `component_id`
    pub fn touches(&self, component_id: &str) -> bool {
        self.source_component_id == component_id || self.target_component_id == component_id
    }

    pub fn is_from(&self, component_id: &str, point_id: &str) -> bool {
        self.source_component_id == component_id && self.source_connection_id == point_id
    }

    pub fn is_into(&self, component_id: &str, point_id: &str) -> bool {
        self.target_component_id == component_id && self.target_connection_id == point_id
    }
}

/// Result of validating a pair of endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionCheck {
    /// The endpoints declare incompatible data types
    pub type_mismatch: bool,
}

/// Check that `source` can feed `target`
pub fn validate_endpoints(
    source: &ConnectionPoint,
    target: &ConnectionPoint,
) -> Result<ConnectionCheck, ConnectionError> {
    if !source.direction.can_source() || !target.direction.can_target() {
        return Err(ConnectionError::InvalidConnectionDirection {
            source_point: source.id.clone(),
            source_direction: source.direction,
            target_point: target.id.clone(),
            target_direction: target.direction,
        });
    }
    Ok(ConnectionCheck {
        type_mismatch: !source.data_type.compatible_with(target.data_type),
    })
}
