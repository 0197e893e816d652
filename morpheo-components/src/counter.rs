//! Counter display over the `counter` behavior

use morpheo_core::render::display_value;
use morpheo_core::{ComponentDefinition, ComponentMeta, RenderView};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

pub(crate) fn definition() -> ComponentDefinition {
    ComponentDefinition::new(
        ComponentMeta::new("counter", "Counter")
            .with_description("Bounded numeric counter")
            .with_default_prop("count", 0)
            .with_default_prop("step", 1)
            .with_behavior("counter"),
        render,
    )
}

fn render(view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
    let value = view
        .value("value")
        .or_else(|| view.prop("count").cloned())
        .map(|v| display_value(&v))
        .unwrap_or_else(|| "0".to_string());

    let mut spans = Vec::new();
    if let Some(label) = view.prop_str("label") {
        spans.push(Span::raw(format!("{label}: ")));
    }
    spans.push(Span::styled(value, view.style()));
    spans.push(Span::styled("  [-] [+]", Style::default().fg(Color::DarkGray)));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use morpheo_core::testing::RenderHarness;
    use morpheo_core::{Component, ComponentRegistry, ComponentRuntime};
    use serde_json::Value;
    use std::sync::Arc;

    #[test]
    fn test_renders_behavior_value() {
        let mut registry = ComponentRegistry::new();
        registry.register(definition()).unwrap();
        let counter = Component::new("clicks", "counter")
            .with_prop("label", "Clicks")
            .with_prop("count", 2);

        let mut runtime = ComponentRuntime::new(Arc::new(registry));
        runtime.mount(&counter);
        runtime.receive("clicks", "increment", Value::Null).unwrap();
        runtime.pump();

        let mut harness = RenderHarness::new(24, 1);
        let output = harness.render_to_string_plain(|frame| {
            runtime.render(&counter, frame, frame.area(), None);
        });
        assert_eq!(output, "Clicks: 3  [-] [+]");
    }
}
