//! Leaf component definitions for Morpheo
//!
//! Each module contributes one or more [`ComponentDefinition`]s: metadata,
//! connection points and a ratatui renderer. Nothing here depends on another
//! definition being registered first.
//!
//! # Components
//!
//! - `container` - vertical stack, bordered when it has a `title`
//! - `text`, `p`, `heading` - static or connected text
//! - `button` - emits `click`
//! - `text-input` - bidirectional `value`, emits `submit`; see [`TextEdit`]
//! - `counter`, `toggle` - renderers over the built-in behaviors
//! - `list` - bullet list of `items`
//! - `empty-state` - the "no content" panel
//!
//! # Example
//!
//! ```ignore
//! let mut registry = ComponentRegistry::new();
//! morpheo_components::register_all(&mut registry)?;
//! let mut runtime = ComponentRuntime::new(Arc::new(registry));
//! ```

mod button;
mod container;
mod counter;
mod empty_state;
mod list;
mod text;
mod text_input;
mod toggle;

use morpheo_core::{ComponentDefinition, ComponentRegistry, RegistryError};

pub use text::wrapped_height;
pub use text_input::{Edit, TextEdit};

/// Every definition this crate provides
pub fn definitions() -> Vec<ComponentDefinition> {
    let mut definitions = vec![
        container::definition(),
        button::definition(),
        text_input::definition(),
        counter::definition(),
        toggle::definition(),
        list::definition(),
        empty_state::definition(),
    ];
    definitions.extend(text::definitions());
    definitions
}

/// Register every definition, stopping at the first type already taken
pub fn register_all(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    for definition in definitions() {
        registry.register(definition)?;
    }
    Ok(())
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{definitions, register_all, Edit, TextEdit};
}
