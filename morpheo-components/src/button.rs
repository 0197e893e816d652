//! Push button

use morpheo_core::capability::ComponentCapability;
use morpheo_core::render::display_value;
use morpheo_core::{ComponentDefinition, ComponentMeta, ConnectionPoint, DataType, RenderView};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

pub(crate) fn definition() -> ComponentDefinition {
    ComponentDefinition::new(
        ComponentMeta::new("button", "Button")
            .with_description("Emits click when pressed")
            .with_capability(
                ComponentCapability::new("press", "Press")
                    .with_point(ConnectionPoint::output("click", DataType::Event).with_name("Click"))
                    .with_point(ConnectionPoint::input("label", DataType::Text).with_name("Label")),
            ),
        render,
    )
}

fn render(view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
    let label = view
        .value("label")
        .map(|v| display_value(&v))
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| view.text());
    let label = if label.is_empty() { "Button".to_string() } else { label };

    let style = if view.prop("disabled").and_then(|v| v.as_bool()) == Some(true) {
        Style::default().fg(Color::DarkGray)
    } else {
        view.style()
    };
    frame.render_widget(Paragraph::new(format!("[ {label} ]")).style(style), area);
}
