//! Canonical component tree and the normalizer that produces it
//!
//! Generated configs are loose: `props` and `properties` are both used, type
//! names come in many spellings, ids are often missing and children mix
//! objects with bare strings. [`normalize`] turns any JSON value into a
//! [`Component`] with a non-empty id, a resolved type and fully normalized
//! children. It never fails; unusable input becomes an empty container.
//!
//! Normalization is idempotent: `normalize(&normalize(raw).to_value())` is
//! equal to `normalize(raw)`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::instruction::{parse_instructions, Instruction};

/// Type used when the input names none
pub const DEFAULT_TYPE: &str = "container";

/// Types the normalizer knows by their canonical (lowercase) name
const CANONICAL_TYPES: &[&str] = &[
    "container",
    "text",
    "p",
    "heading",
    "button",
    "text-input",
    "counter",
    "toggle",
    "list",
    "empty-state",
];

/// Lowercased alias -> canonical type
const TYPE_ALIASES: &[(&str, &str)] = &[
    ("paragraph", "p"),
    ("textinput", "text-input"),
    ("input", "text-input"),
    ("input-text", "text-input"),
    ("text_input", "text-input"),
    ("textfield", "text-input"),
    ("text-field", "text-input"),
    ("btn", "button"),
    ("div", "container"),
    ("box", "container"),
    ("section", "container"),
    ("view", "container"),
    ("stack", "container"),
    ("label", "text"),
    ("span", "text"),
    ("h1", "heading"),
    ("h2", "heading"),
    ("h3", "heading"),
    ("title", "heading"),
    ("switch", "toggle"),
    ("checkbox", "toggle"),
    ("ul", "list"),
    ("ol", "list"),
    ("emptystate", "empty-state"),
    ("empty_state", "empty-state"),
];

/// Resolve a type name through the alias table
///
/// Matching is case-insensitive. Unknown types keep their spelling (trimmed)
/// so custom registrations still resolve; an empty name becomes
/// [`DEFAULT_TYPE`].
pub fn resolve_type(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_TYPE.to_string();
    }
    let lower = trimmed.to_lowercase();
    if let Some((_, canonical)) = TYPE_ALIASES.iter().find(|(alias, _)| *alias == lower) {
        return canonical.to_string();
    }
    if CANONICAL_TYPES.contains(&lower.as_str()) {
        return lower;
    }
    trimmed.to_string()
}

/// A node of the canonical tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub props: Map<String, Value>,
    pub styles: Map<String, Value>,
    pub events: BTreeMap<String, EventHandler>,
    pub methods: BTreeMap<String, Method>,
    pub children: Vec<Child>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// A child is either a nested component or literal text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Child {
    Text(String),
    Node(Component),
}

/// What happens when a component event fires
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventHandler {
    /// Name of a method on the same component
    Method(String),
    /// Inline instruction list
    Actions { actions: Vec<Instruction> },
    /// A store action
    Dispatch {
        dispatch: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Unrecognized descriptor, kept verbatim
    Raw(Value),
}

/// A named declarative method
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Method {
    pub actions: Vec<Instruction>,
}

impl Component {
    /// An empty component with the given id and (resolved) type
    pub fn new(id: impl Into<String>, kind: &str) -> Self {
        Self {
            id: id.into(),
            kind: resolve_type(kind),
            props: Map::new(),
            styles: Map::new(),
            events: BTreeMap::new(),
            methods: BTreeMap::new(),
            children: Vec::new(),
            region: None,
        }
    }

    /// A fresh empty container
    pub fn fallback() -> Self {
        Self::new(format!("component-{}", Uuid::new_v4()), DEFAULT_TYPE)
    }

    /// The "no content" panel shown instead of a blank screen
    pub fn empty_state(title: &str, message: &str) -> Self {
        Self::new("empty-state", "empty-state")
            .with_prop("title", title)
            .with_prop("message", message)
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Component) -> Self {
        self.children.push(Child::Node(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Child::Text(text.into()));
        self
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    /// Literal text children joined with spaces
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                Child::Text(text) => Some(text.as_str()),
                Child::Node(_) => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Nested component children, in order
    pub fn child_nodes(&self) -> impl Iterator<Item = &Component> {
        self.children.iter().filter_map(|child| match child {
            Child::Node(node) => Some(node),
            Child::Text(_) => None,
        })
    }

    /// Depth-first search for a node by id
    pub fn find(&self, id: &str) -> Option<&Component> {
        if self.id == id {
            return Some(self);
        }
        self.child_nodes().find_map(|child| child.find(id))
    }

    /// Every node in the tree, depth first, starting with `self`
    pub fn descendants(&self) -> Vec<&Component> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            let children: Vec<_> = node.child_nodes().collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Wire form, accepted again by [`normalize`]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Normalize one raw node
pub fn normalize(raw: &Value) -> Component {
    match raw {
        Value::Object(object) => normalize_object(object),
        Value::String(text) => {
            Component::new(generated_id("text"), "text").with_prop("text", text.as_str())
        }
        Value::Array(items) => {
            let mut container = Component::fallback();
            container.children = normalize_children(&Value::Array(items.clone()));
            container
        }
        _ => Component::fallback(),
    }
}

/// Normalize a list of raw nodes; `null` entries are skipped
pub fn normalize_all(raw: &Value) -> Vec<Component> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(normalize)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![normalize(other)],
    }
}

fn generated_id(kind: &str) -> String {
    format!("{}-{}", kind, Uuid::new_v4().simple())
}

fn normalize_object(object: &Map<String, Value>) -> Component {
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .map(resolve_type)
        .unwrap_or_else(|| DEFAULT_TYPE.to_string());

    let id = match object.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => generated_id(&kind),
    };

    let mut props = object_field(object, "props");
    props.extend(object_field(object, "properties"));

    let mut styles = object_field(object, "styles");
    if styles.is_empty() {
        styles = object_field(object, "style");
    }

    let events = object_field(object, "events")
        .into_iter()
        .map(|(name, handler)| (name, normalize_handler(&handler)))
        .collect();

    let methods = object_field(object, "methods")
        .into_iter()
        .map(|(name, method)| (name, normalize_method(&method)))
        .collect();

    let children = object
        .get("children")
        .map(normalize_children)
        .unwrap_or_default();

    let region = object
        .get("region")
        .and_then(Value::as_str)
        .map(str::to_string);

    Component {
        id,
        kind,
        props,
        styles,
        events,
        methods,
        children,
        region,
    }
}

fn object_field(object: &Map<String, Value>, key: &str) -> Map<String, Value> {
    object
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn normalize_children(raw: &Value) -> Vec<Child> {
    let items = match raw {
        Value::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(text) => Some(Child::Text(text.clone())),
            Value::Number(n) => Some(Child::Text(n.to_string())),
            Value::Bool(b) => Some(Child::Text(b.to_string())),
            other => Some(Child::Node(normalize(other))),
        })
        .collect()
}

fn normalize_handler(raw: &Value) -> EventHandler {
    match raw {
        Value::String(method) => EventHandler::Method(method.clone()),
        Value::Array(_) => EventHandler::Actions {
            actions: parse_instructions(raw),
        },
        Value::Object(object) => {
            if let Some(actions) = object.get("actions") {
                EventHandler::Actions {
                    actions: parse_instructions(actions),
                }
            } else if let Some(action) = object.get("dispatch").and_then(Value::as_str) {
                EventHandler::Dispatch {
                    dispatch: action.to_string(),
                    payload: object.get("payload").filter(|p| !p.is_null()).cloned(),
                }
            } else if let Some(method) = object.get("method").and_then(Value::as_str) {
                EventHandler::Method(method.to_string())
            } else {
                EventHandler::Raw(raw.clone())
            }
        }
        other => EventHandler::Raw(other.clone()),
    }
}

fn normalize_method(raw: &Value) -> Method {
    let actions = match raw {
        Value::Object(object) => object.get("actions").map(parse_instructions).unwrap_or_default(),
        other => parse_instructions(other),
    };
    Method { actions }
}
