//! Generated app configuration
//!
//! ```json
//! {
//!   "app": {"name": "Signup", "description": "..."},
//!   "layout": {"type": "single", "regions": ["main"]},
//!   "components": [ ... ],
//!   "theme": { ... },
//!   "functionality": { ... }
//! }
//! ```
//!
//! Every field is optional. Only text that is not JSON at all is an error;
//! well-formed JSON with missing or oddly typed fields parses with defaults.

use serde_json::{Map, Value};

use crate::component::{normalize_all, Component};
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub kind: String,
    pub regions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub app: AppInfo,
    pub layout: Layout,
    pub components: Vec<Component>,
    pub theme: Map<String, Value>,
    pub functionality: Map<String, Value>,
}

impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let root = value.as_object().unwrap_or(&empty);

        let app = root.get("app").and_then(Value::as_object);
        let app = AppInfo {
            name: string_field(app, "name"),
            description: string_field(app, "description"),
        };

        let layout = root.get("layout").and_then(Value::as_object);
        let layout = Layout {
            kind: string_field(layout, "type"),
            regions: layout
                .and_then(|l| l.get("regions"))
                .and_then(Value::as_array)
                .map(|regions| {
                    regions
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };

        Self {
            app,
            layout,
            components: root
                .get("components")
                .map(normalize_all)
                .unwrap_or_default(),
            theme: object_field(root, "theme"),
            functionality: object_field(root, "functionality"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The tree to render
    ///
    /// A single component is returned as-is; several are wrapped in a
    /// container; none yields the "no content" panel.
    pub fn root(&self) -> Component {
        match self.components.as_slice() {
            [] => Component::empty_state(
                "No content",
                "The generated app has no components to display.",
            ),
            [single] => single.clone(),
            many => {
                let mut root = Component::new("app-root", "container");
                if !self.app.name.is_empty() {
                    root.props
                        .insert("title".into(), Value::String(self.app.name.clone()));
                }
                for component in many {
                    root = root.with_child(component.clone());
                }
                root
            }
        }
    }

    /// Components placed in `region`, in config order
    pub fn region(&self, region: &str) -> Vec<&Component> {
        self.components
            .iter()
            .filter(|c| c.region.as_deref() == Some(region))
            .collect()
    }
}

fn string_field(object: Option<&Map<String, Value>>, key: &str) -> String {
    object
        .and_then(|o| o.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn object_field(object: &Map<String, Value>, key: &str) -> Map<String, Value> {
    object
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}
