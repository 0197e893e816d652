//! Component type registry
//!
//! The registry is an explicit value built during startup and then shared
//! (usually behind an `Arc`) with whatever creates instances. Leaf modules
//! contribute definitions; no definition depends on another being present,
//! so registration order does not matter.
//!
//! ```ignore
//! let mut registry = ComponentRegistry::new();
//! morpheo_components::register_all(&mut registry)?;
//! let registry = Arc::new(registry);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use ratatui::{layout::Rect, Frame};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::capability::{ComponentCapability, ConnectionId, ConnectionPoint};
use crate::component::{resolve_type, EventHandler, Method};
use crate::error::RegistryError;
use crate::render::RenderView;

/// Static description of a component type
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentMeta {
    /// Canonical type name, e.g. `"text-input"`
    pub kind: String,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<ComponentCapability>,
    pub default_props: Map<String, Value>,
    /// Behaviors attached when the component does not name any
    pub behaviors: Vec<String>,
}

impl ComponentMeta {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            description: String::new(),
            capabilities: Vec::new(),
            default_props: Map::new(),
            behaviors: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capability(mut self, capability: ComponentCapability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn with_default_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_props.insert(key.into(), value.into());
        self
    }

    pub fn with_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.behaviors.push(behavior.into());
        self
    }

    /// Find a connection point across all capabilities
    pub fn connection_point(&self, id: &str) -> Option<&ConnectionPoint> {
        self.capabilities.iter().find_map(|c| c.point(id))
    }

    pub fn connection_points(&self) -> impl Iterator<Item = &ConnectionPoint> {
        self.capabilities
            .iter()
            .flat_map(|c| c.connection_points.iter())
    }
}

/// Draws a component
pub trait Renderer: Send + Sync {
    fn render(&self, view: &RenderView<'_>, frame: &mut Frame, area: Rect);

    /// Rows wanted at the given width
    #[allow(unused_variables)]
    fn height(&self, view: &RenderView<'_>, width: u16) -> u16 {
        1
    }
}

impl<F> Renderer for F
where
    F: Fn(&RenderView<'_>, &mut Frame, Rect) + Send + Sync,
{
    fn render(&self, view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
        self(view, frame, area)
    }
}

type Initializer = Arc<dyn Fn(&Map<String, Value>) -> Map<String, Value> + Send + Sync>;

fn empty_state(_: &Map<String, Value>) -> Map<String, Value> {
    Map::new()
}

/// Everything the registry knows about one component type
#[derive(Clone)]
pub struct ComponentDefinition {
    pub meta: ComponentMeta,
    initializer: Initializer,
    renderer: Arc<dyn Renderer>,
}

impl ComponentDefinition {
    /// A definition whose instances start with empty state
    pub fn new(meta: ComponentMeta, renderer: impl Renderer + 'static) -> Self {
        Self {
            meta,
            initializer: Arc::new(empty_state),
            renderer: Arc::new(renderer),
        }
    }

    /// Derive initial instance state from the merged props
    pub fn with_initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.initializer = Arc::new(initializer);
        self
    }

    pub fn kind(&self) -> &str {
        &self.meta.kind
    }

    pub fn initialize(&self, props: &Map<String, Value>) -> Map<String, Value> {
        (self.initializer)(props)
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// A live, stateful realization of a component type
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInstance {
    pub id: String,
    pub kind: String,
    /// Default props merged under the component's own props
    pub properties: Map<String, Value>,
    pub styles: Map<String, Value>,
    pub state: Map<String, Value>,
    pub events: BTreeMap<String, EventHandler>,
    pub methods: BTreeMap<String, Method>,
    /// Edges touching this instance
    pub connections: BTreeSet<ConnectionId>,
}

/// Maps component types to their definitions
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    definitions: HashMap<String, ComponentDefinition>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition; an already registered type is rejected and kept
    pub fn register(&mut self, definition: ComponentDefinition) -> Result<(), RegistryError> {
        let kind = definition.kind().to_string();
        if self.definitions.contains_key(&kind) {
            warn!(kind = %kind, "Component type already registered, keeping the first definition");
            return Err(RegistryError::AlreadyRegistered(kind));
        }
        debug!(kind = %kind, "Registered component type");
        self.definitions.insert(kind, definition);
        Ok(())
    }

    /// Register a definition, returning the one it replaced
    pub fn register_or_replace(
        &mut self,
        definition: ComponentDefinition,
    ) -> Option<ComponentDefinition> {
        let kind = definition.kind().to_string();
        let previous = self.definitions.insert(kind.clone(), definition);
        if previous.is_some() {
            warn!(kind = %kind, "Replaced component definition");
        }
        previous
    }

    /// Look up a type by canonical name or alias
    pub fn definition(&self, kind: &str) -> Option<&ComponentDefinition> {
        self.definitions
            .get(kind)
            .or_else(|| self.definitions.get(&resolve_type(kind)))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.definition(kind).is_some()
    }

    /// Registered type names, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.definitions.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Create an instance with a generated id
    pub fn create_instance(
        &self,
        kind: &str,
        raw_props: &Map<String, Value>,
    ) -> Result<ComponentInstance, RegistryError> {
        let definition = self
            .definition(kind)
            .ok_or_else(|| RegistryError::UnknownType(kind.to_string()))?;

        let mut properties = definition.meta.default_props.clone();
        properties.extend(raw_props.iter().map(|(k, v)| (k.clone(), v.clone())));
        let state = definition.initialize(&properties);

        Ok(ComponentInstance {
            id: format!("{}-{}", definition.kind(), Uuid::new_v4().simple()),
            kind: definition.kind().to_string(),
            properties,
            styles: Map::new(),
            state,
            events: BTreeMap::new(),
            methods: BTreeMap::new(),
            connections: BTreeSet::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::DataType;
    use serde_json::json;

    fn noop(_: &RenderView<'_>, _: &mut Frame, _: Rect) {}

    fn field_definition(label: &str) -> ComponentDefinition {
        ComponentDefinition::new(
            ComponentMeta::new("text-input", label)
                .with_default_prop("placeholder", "Type...")
                .with_default_prop("value", "")
                .with_capability(
                    ComponentCapability::new("value", "Value")
                        .with_point(ConnectionPoint::bidirectional("value", DataType::Text)),
                ),
            noop,
        )
        .with_initializer(|props| {
            let mut state = Map::new();
            state.insert("value".into(), props.get("value").cloned().unwrap_or_default());
            state
        })
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.register(field_definition("First")).unwrap();

        let err = registry.register(field_definition("Second")).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered("text-input".into()));
        assert_eq!(registry.definition("text-input").unwrap().meta.name, "First");

        let previous = registry.register_or_replace(field_definition("Third"));
        assert_eq!(previous.unwrap().meta.name, "First");
        assert_eq!(registry.definition("text-input").unwrap().meta.name, "Third");
    }

    #[test]
    fn test_create_instance_merges_defaults() {
        let mut registry = ComponentRegistry::new();
        registry.register(field_definition("Field")).unwrap();

        let mut props = Map::new();
        props.insert("value".into(), json!("hello"));
        let instance = registry.create_instance("input", &props).unwrap();

        assert_eq!(instance.kind, "text-input");
        assert_eq!(instance.properties["placeholder"], json!("Type..."));
        assert_eq!(instance.properties["value"], json!("hello"));
        assert_eq!(instance.state["value"], json!("hello"));
        assert!(instance.id.starts_with("text-input-"));
    }

    #[test]
    fn test_unknown_type() {
        let registry = ComponentRegistry::new();
        assert_eq!(
            registry.create_instance("chart", &Map::new()).unwrap_err(),
            RegistryError::UnknownType("chart".into())
        );
        assert!(registry.types().is_empty());
    }

    #[test]
    fn test_connection_point_lookup() {
        let definition = field_definition("Field");
        assert!(definition.meta.connection_point("value").is_some());
        assert!(definition.meta.connection_point("missing").is_none());
        assert_eq!(definition.meta.connection_points().count(), 1);
    }
}
