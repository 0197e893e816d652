//! Core runtime for Morpheo
//!
//! Morpheo turns a generated app configuration (a JSON tree of components
//! with events, methods and connections) into a live terminal interface.
//!
//! # Core Concepts
//!
//! - **Component**: canonical node of the normalized tree ([`component`])
//! - **Registry**: maps component types to metadata and renderers
//! - **Runtime**: live instances, the connection graph and attached behaviors
//! - **Instructions**: the declarative action language handlers are written in
//! - **Store**: `Arc`-snapshot state container with a middleware chain
//!
//! # Basic Example
//!
//! ```ignore
//! use morpheo_core::prelude::*;
//!
//! let config = AppConfig::from_json(&text)?;
//! let mut runtime = ComponentRuntime::new(Arc::new(registry));
//! let root = config.root();
//! runtime.mount(&root);
//!
//! terminal.draw(|frame| runtime.render(&root, frame, frame.area(), None))?;
//! ```
//!
//! # Store Example
//!
//! ```ignore
//! let mut store = Store::new(json!({"count": 0}))
//!     .with_reducer("count", |state: &Value, action: &StateAction| {
//!         (action.kind == "INC").then(|| json!({"count": state["count"].as_i64().unwrap_or(0) + 1}))
//!     })
//!     .with_middleware(ThunkMiddleware)
//!     .with_middleware(BatchMiddleware);
//!
//! store.dispatch(StateAction::batch(vec![
//!     StateAction::new("INC"),
//!     StateAction::new("INC"),
//! ]));
//! ```

pub mod action;
pub mod behavior;
pub mod capability;
pub mod component;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod instruction;
pub mod middleware;
pub mod registry;
pub mod render;
pub mod runtime;
pub mod storage;
pub mod store;
pub mod testing;
pub mod timers;

// Component model exports
pub use capability::{
    ComponentCapability, Connection, ConnectionId, ConnectionPoint, DataType, Direction, Flow,
    Transform,
};
pub use component::{normalize, normalize_all, resolve_type, Child, Component, EventHandler, Method};
pub use config::{AppConfig, AppInfo, Layout};
pub use instruction::{parse_instructions, Condition, Instruction, Interpreter, Operand, Scope};
pub use registry::{
    ComponentDefinition, ComponentInstance, ComponentMeta, ComponentRegistry, Renderer,
};
pub use render::{RenderContext, RenderView};
pub use runtime::{ComponentEvent, ComponentRuntime, Propagation, ScheduledWork};

// Behavior exports
pub use behavior::{Behavior, BehaviorEngine, BehaviorRegistry, Emission};

// Store exports
pub use action::{Listener, Payload, StateAction, Thunk, ThunkContext};
pub use dispatcher::Dispatcher;
pub use middleware::{
    combine_middleware, BatchMiddleware, Chain, ComposedMiddleware, DebounceMiddleware,
    LocalPersistenceMiddleware, LocalPersistenceOptions, LoggingMiddleware, Middleware,
    SubscriptionMiddleware, ThrottleMiddleware, ThunkMiddleware, TimingOptions,
    ValidationMiddleware, ValidationRule,
};
#[cfg(feature = "api")]
pub use middleware::{ApiConfig, ApiMiddleware, ApiRequest, ResponseType};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{create_store, PersistOptions, Reducer, Selector, Store, StoreHandle};

// Error exports
pub use error::{
    ApiFailure, ConfigError, ConnectionError, RegistryError, StorageError, SubscriberError,
};

// Re-export ratatui types for convenience
pub use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    Frame,
};

// Testing exports
pub use testing::{buffer_to_string_plain, ActionLog, RenderHarness};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AppConfig, Component, ComponentDefinition, ComponentMeta, ComponentRegistry,
        ComponentRuntime, ConnectionPoint, DataType, Direction, RenderView,
    };
    pub use crate::capability::ComponentCapability;

    pub use crate::{
        BatchMiddleware, LoggingMiddleware, Middleware, StateAction, Store, ThunkMiddleware,
    };

    pub use crate::{Color, Frame, Line, Modifier, Rect, Span, Style, Text};
}
