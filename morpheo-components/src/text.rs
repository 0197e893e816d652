//! Text, paragraph and heading

use morpheo_core::capability::ComponentCapability;
use morpheo_core::render::display_value;
use morpheo_core::{
    ComponentDefinition, ComponentMeta, ConnectionPoint, DataType, RenderView, Renderer,
};
use ratatui::{
    layout::Rect,
    style::Modifier,
    widgets::{Paragraph, Wrap},
    Frame,
};

pub(crate) fn definitions() -> Vec<ComponentDefinition> {
    vec![
        definition("text", "Text", Variant::Plain),
        definition("p", "Paragraph", Variant::Paragraph),
        definition("heading", "Heading", Variant::Heading),
    ]
}

fn definition(kind: &str, name: &str, variant: Variant) -> ComponentDefinition {
    ComponentDefinition::new(
        ComponentMeta::new(kind, name).with_capability(
            ComponentCapability::new("content", "Content")
                .with_point(ConnectionPoint::input("text", DataType::Text).with_name("Text")),
        ),
        TextRenderer { variant },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Plain,
    Paragraph,
    Heading,
}

struct TextRenderer {
    variant: Variant,
}

/// Connected `text` value if non-empty, else the component's own text
fn content(view: &RenderView<'_>) -> String {
    view.value("text")
        .map(|v| display_value(&v))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| view.text())
}

impl Renderer for TextRenderer {
    fn render(&self, view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
        let mut style = view.style();
        if self.variant == Variant::Heading {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        let mut paragraph = Paragraph::new(content(view)).style(style);
        if self.variant == Variant::Paragraph {
            paragraph = paragraph.wrap(Wrap { trim: true });
        }
        frame.render_widget(paragraph, area);
    }

    fn height(&self, view: &RenderView<'_>, width: u16) -> u16 {
        let text = content(view);
        match self.variant {
            Variant::Paragraph => wrapped_height(&text, width),
            _ => text.lines().count().max(1).min(u16::MAX as usize) as u16,
        }
    }
}

/// Rows `text` takes when wrapped at `width` columns (at least one)
pub fn wrapped_height(text: &str, width: u16) -> u16 {
    if width == 0 {
        return 1;
    }
    let width = usize::from(width);
    let rows: usize = text
        .lines()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum();
    rows.clamp(1, usize::from(u16::MAX)) as u16
}
