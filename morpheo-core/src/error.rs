//! Error taxonomy for the component system and the store

use serde_json::{json, Value};
use thiserror::Error;

use crate::capability::Direction;

/// Errors raised by the component type registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("component type already registered: {0}")]
    AlreadyRegistered(String),

    #[error("unknown component type: {0}")]
    UnknownType(String),

    #[error("unknown behavior: {0}")]
    UnknownBehavior(String),
}

/// Errors raised while wiring the connection graph
///
/// A failed connection attempt never mutates the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("no mounted component with id '{0}'")]
    UnknownComponent(String),

    #[error("component '{component}' has no connection point '{point}'")]
    UnknownConnectionPoint { component: String, point: String },

    #[error(
        "cannot connect {source_point} ({source_direction}) to {target_point} ({target_direction})"
    )]
    InvalidConnectionDirection {
        source_point: String,
        source_direction: Direction,
        target_point: String,
        target_direction: Direction,
    },
}

/// Errors raised while reading a generated app config
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("app config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by persistence backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Why an api call failed; always delivered as a `<TYPE>_FAILURE` payload
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiFailure {
    #[error("invalid api request: {0}")]
    InvalidRequest(String),

    #[error("request failed: {0}")]
    Network(String),

    #[error("request failed with status {status} {status_text}")]
    Status {
        status: u16,
        status_text: String,
        data: Value,
    },

    #[error("response body could not be decoded: {0}")]
    Decode(String),
}

impl ApiFailure {
    /// `{status, statusText, data}` for HTTP errors, `{message}` otherwise
    pub fn to_payload(&self) -> Value {
        match self {
            ApiFailure::Status {
                status,
                status_text,
                data,
            } => json!({
                "status": status,
                "statusText": status_text,
                "data": data,
            }),
            other => json!({ "message": other.to_string() }),
        }
    }
}

/// Error returned by a store subscriber; logged and isolated per subscriber
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subscriber '{subscriber}' failed: {message}")]
pub struct SubscriberError {
    pub subscriber: String,
    pub message: String,
}

impl SubscriberError {
    pub fn new(subscriber: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subscriber: subscriber.into(),
            message: message.into(),
        }
    }
}
