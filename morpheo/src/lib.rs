//! morpheo: render generated app configurations as live terminal interfaces
//!
//! A generated config is normalized into a component tree, mounted into a
//! runtime that owns instances, typed connections and behaviors, and drawn
//! with ratatui. App state lives in a middleware-driven store.
//!
//! # Example
//! ```ignore
//! use morpheo::prelude::*;
//!
//! let registry = morpheo::registry()?;
//! let config = AppConfig::from_json(&std::fs::read_to_string("app.json")?)?;
//! let root = config.root();
//!
//! let mut runtime = ComponentRuntime::new(registry);
//! runtime.mount(&root);
//! runtime.connect("plus", "click", "clicks", "increment", None)?;
//!
//! terminal.draw(|frame| runtime.render(&root, frame, frame.area(), None))?;
//! ```

use std::sync::Arc;

// Re-export everything from core
pub use morpheo_core::*;

/// Leaf component definitions
pub use morpheo_components as components;

/// A registry holding every bundled component type
pub fn registry() -> Result<Arc<ComponentRegistry>, RegistryError> {
    let mut registry = ComponentRegistry::new();
    morpheo_components::register_all(&mut registry)?;
    Ok(Arc::new(registry))
}

/// Prelude for convenient imports
pub mod prelude {
    // Component model
    pub use morpheo_core::{
        AppConfig, Component, ComponentCapability, ComponentDefinition, ComponentEvent,
        ComponentMeta, ComponentRegistry, ComponentRuntime, ConnectionId, ConnectionPoint,
        DataType, Direction, RenderView, Renderer, Transform,
    };

    // Store
    pub use morpheo_core::{
        BatchMiddleware, DebounceMiddleware, Dispatcher, LoggingMiddleware, Middleware,
        StateAction, Store, StoreHandle, ThrottleMiddleware, ThunkMiddleware,
    };

    // Errors
    pub use morpheo_core::{ConfigError, ConnectionError, RegistryError};

    // Components
    pub use morpheo_components::{register_all, Edit, TextEdit};

    // Ratatui re-exports
    pub use morpheo_core::{Color, Frame, Line, Modifier, Rect, Span, Style, Text};
}
