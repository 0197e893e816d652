//! "No content" panel

use morpheo_core::render::render_empty_state;
use morpheo_core::{ComponentDefinition, ComponentMeta, RenderView, Renderer};
use ratatui::{layout::Rect, Frame};

pub(crate) fn definition() -> ComponentDefinition {
    ComponentDefinition::new(
        ComponentMeta::new("empty-state", "Empty state")
            .with_default_prop("title", "No content")
            .with_default_prop("message", "Nothing to display."),
        EmptyState,
    )
}

struct EmptyState;

impl Renderer for EmptyState {
    fn render(&self, view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
        render_empty_state(
            frame,
            area,
            view.prop_str("title").unwrap_or("No content"),
            view.prop_str("message").unwrap_or_default(),
        );
    }

    fn height(&self, _view: &RenderView<'_>, _width: u16) -> u16 {
        5
    }
}
