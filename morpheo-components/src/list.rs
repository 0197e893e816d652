//! Bullet list

use morpheo_core::capability::ComponentCapability;
use morpheo_core::render::display_value;
use morpheo_core::{
    ComponentDefinition, ComponentMeta, ConnectionPoint, DataType, RenderView, Renderer,
};
use ratatui::{
    layout::Rect,
    text::Line,
    widgets::Paragraph,
    Frame,
};
use serde_json::Value;

pub(crate) fn definition() -> ComponentDefinition {
    ComponentDefinition::new(
        ComponentMeta::new("list", "List")
            .with_description("Bullet list of items")
            .with_capability(
                ComponentCapability::new("items", "Items").with_point(
                    ConnectionPoint::input("items", DataType::Array)
                        .with_name("Items")
                        .with_default(Value::Array(Vec::new())),
                ),
            ),
        List,
    )
}

struct List;

/// Item labels; objects show their `label`, `text` or `title`
fn items(view: &RenderView<'_>) -> Vec<String> {
    let Some(Value::Array(items)) = view.value("items") else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(object) => ["label", "text", "title"]
                .iter()
                .find_map(|key| object.get(*key))
                .map(display_value)
                .unwrap_or_else(|| item.to_string()),
            other => display_value(other),
        })
        .collect()
}

impl Renderer for List {
    fn render(&self, view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = items(view)
            .into_iter()
            .map(|item| Line::from(format!("• {item}")))
            .collect();
        if lines.is_empty() {
            view.render_children(frame, area);
            return;
        }
        frame.render_widget(Paragraph::new(lines).style(view.style()), area);
    }

    fn height(&self, view: &RenderView<'_>, width: u16) -> u16 {
        match items(view).len() {
            0 => view.children_height(width).max(1),
            n => n.min(usize::from(u16::MAX)) as u16,
        }
    }
}
