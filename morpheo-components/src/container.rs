//! Vertical stack of children

use morpheo_core::{ComponentDefinition, ComponentMeta, RenderView, Renderer};
use ratatui::{
    layout::Rect,
    widgets::{Block, Borders},
    Frame,
};

pub(crate) fn definition() -> ComponentDefinition {
    ComponentDefinition::new(
        ComponentMeta::new("container", "Container")
            .with_description("Stacks its children top to bottom"),
        Container,
    )
}

struct Container;

impl Container {
    fn block(view: &RenderView<'_>) -> Option<Block<'static>> {
        let title = view.prop_str("title")?;
        Some(
            Block::default()
                .borders(Borders::ALL)
                .border_style(view.style())
                .title(format!(" {title} ")),
        )
    }
}

impl Renderer for Container {
    fn render(&self, view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
        let inner = match Self::block(view) {
            Some(block) => {
                let inner = block.inner(area);
                frame.render_widget(block, area);
                inner
            }
            None => area,
        };
        view.render_children(frame, inner);
    }

    fn height(&self, view: &RenderView<'_>, width: u16) -> u16 {
        let border = if view.prop_str("title").is_some() { 2 } else { 0 };
        view.children_height(width.saturating_sub(border))
            .saturating_add(border)
    }
}

#[cfg(test)]
mod tests {
    use morpheo_core::testing::RenderHarness;
    use morpheo_core::{Component, ComponentRegistry, RenderContext};

    fn registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        crate::register_all(&mut registry).unwrap();
        registry
    }

    #[test]
    fn test_titled_container_draws_border() {
        let registry = registry();
        let tree = Component::new("root", "container")
            .with_prop("title", "Signup")
            .with_child(Component::new("a", "text").with_prop("text", "first"))
            .with_child(Component::new("b", "text").with_prop("text", "second"));

        let context = RenderContext::new(&registry);
        assert_eq!(context.height(&tree, 20), 4);

        let mut harness = RenderHarness::new(20, 4);
        let output = harness.render_to_string_plain(|frame| {
            context.render(&tree, frame, frame.area());
        });
        let lines: Vec<_> = output.lines().collect();
        assert!(lines[0].contains("Signup"));
        assert!(lines[1].contains("first"));
        assert!(lines[2].contains("second"));
    }

    #[test]
    fn test_plain_container_has_no_border() {
        let registry = registry();
        let tree = Component::new("root", "div").with_text("hello");

        let mut harness = RenderHarness::new(10, 1);
        let output = harness.render_to_string_plain(|frame| {
            RenderContext::new(&registry).render(&tree, frame, frame.area());
        });
        assert_eq!(output, "hello");
    }
}
