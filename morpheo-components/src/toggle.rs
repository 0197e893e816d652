//! On/off switch over the `toggle` behavior

use morpheo_core::instruction::truthy;
use morpheo_core::{ComponentDefinition, ComponentMeta, RenderView};
use ratatui::{layout::Rect, widgets::Paragraph, Frame};

pub(crate) fn definition() -> ComponentDefinition {
    ComponentDefinition::new(
        ComponentMeta::new("toggle", "Toggle")
            .with_description("Boolean switch")
            .with_default_prop("value", false)
            .with_behavior("toggle"),
        render,
    )
}

fn render(view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
    let on = view.value("value").is_some_and(|v| truthy(&v));
    let mark = if on { "[x]" } else { "[ ]" };
    let label = view.text();
    frame.render_widget(
        Paragraph::new(format!("{mark} {label}").trim_end().to_string()).style(view.style()),
        area,
    );
}
