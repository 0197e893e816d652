//! Rendering a component tree through the registry
//!
//! The runtime hands each renderer a [`RenderView`]: the canonical node, its
//! live instance (if mounted) and access to the rest of the tree so
//! containers can lay out their children.

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use serde_json::Value;

use crate::component::{Child, Component};
use crate::registry::{ComponentInstance, ComponentRegistry};
use crate::runtime::ComponentRuntime;

/// Shared state for one render pass
pub struct RenderContext<'a> {
    pub registry: &'a ComponentRegistry,
    pub runtime: Option<&'a ComponentRuntime>,
    /// Id of the focused component, if any
    pub focused: Option<&'a str>,
}

impl<'a> RenderContext<'a> {
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self {
            registry,
            runtime: None,
            focused: None,
        }
    }

    pub fn with_runtime(mut self, runtime: &'a ComponentRuntime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_focus(mut self, focused: Option<&'a str>) -> Self {
        self.focused = focused;
        self
    }

    fn view<'v>(&'v self, component: &'v Component) -> RenderView<'v> {
        RenderView {
            component,
            instance: self.runtime.and_then(|r| r.instance(&component.id)),
            focused: self.focused == Some(component.id.as_str()),
            context: self,
        }
    }

    /// Render `component` into `area`
    pub fn render(&self, component: &Component, frame: &mut Frame, area: Rect) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        match self.registry.definition(&component.kind) {
            Some(definition) => definition
                .renderer()
                .render(&self.view(component), frame, area),
            None => render_unknown(component, frame, area),
        }
    }

    /// Rows `component` wants at `width`
    pub fn height(&self, component: &Component, width: u16) -> u16 {
        match self.registry.definition(&component.kind) {
            Some(definition) => definition.renderer().height(&self.view(component), width),
            None => 1,
        }
    }
}

/// What a renderer sees
pub struct RenderView<'a> {
    pub component: &'a Component,
    pub instance: Option<&'a ComponentInstance>,
    pub focused: bool,
    context: &'a RenderContext<'a>,
}

impl<'a> RenderView<'a> {
    /// Instance property (defaults merged) or the raw prop
    pub fn prop(&self, key: &str) -> Option<&'a Value> {
        self.instance
            .and_then(|i| i.properties.get(key))
            .or_else(|| self.component.props.get(key))
    }

    pub fn prop_str(&self, key: &str) -> Option<&'a str> {
        self.prop(key).and_then(Value::as_str)
    }

    pub fn state(&self, key: &str) -> Option<&'a Value> {
        self.instance.and_then(|i| i.state.get(key))
    }

    /// Live value of a connection point, as the runtime resolves it
    pub fn value(&self, point: &str) -> Option<Value> {
        self.context
            .runtime
            .and_then(|r| r.connection_value(&self.component.id, point))
            .or_else(|| self.state(point).cloned())
            .or_else(|| self.prop(point).cloned())
    }

    /// Display text: `text`/`content`/`label` prop, else literal children
    pub fn text(&self) -> String {
        ["text", "content", "label"]
            .iter()
            .find_map(|key| self.prop(key).map(display_value))
            .unwrap_or_else(|| self.component.text_content())
    }

    /// Style from `styles.color`, `styles.bold` and focus
    pub fn style(&self) -> Style {
        let styles = self
            .instance
            .map(|i| &i.styles)
            .unwrap_or(&self.component.styles);
        let mut style = Style::default();
        if let Some(color) = styles.get("color").and_then(Value::as_str).and_then(parse_color) {
            style = style.fg(color);
        }
        if styles.get("bold").and_then(Value::as_bool).unwrap_or(false)
            || styles.get("fontWeight").and_then(Value::as_str) == Some("bold")
        {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.focused {
            style = style.add_modifier(Modifier::REVERSED);
        }
        style
    }

    pub fn context(&self) -> &'a RenderContext<'a> {
        self.context
    }

    /// Stack the children vertically inside `area`
    pub fn render_children(&self, frame: &mut Frame, area: Rect) {
        let mut y = area.y;
        let bottom = area.y.saturating_add(area.height);
        for child in &self.component.children {
            if y >= bottom {
                break;
            }
            let wanted = match child {
                Child::Text(_) => 1,
                Child::Node(node) => self.context.height(node, area.width),
            };
            let height = wanted.min(bottom - y);
            let slot = Rect::new(area.x, y, area.width, height);
            match child {
                Child::Text(text) => {
                    frame.render_widget(Paragraph::new(text.as_str()), slot);
                }
                Child::Node(node) => self.context.render(node, frame, slot),
            }
            y = y.saturating_add(height);
        }
    }

    /// Total rows the children want
    pub fn children_height(&self, width: u16) -> u16 {
        self.component
            .children
            .iter()
            .map(|child| match child {
                Child::Text(_) => 1,
                Child::Node(node) => self.context.height(node, width),
            })
            .fold(0_u16, u16::saturating_add)
    }
}

/// Strings as-is, everything else as JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Named terminal colors (`"red"`, `"dark-gray"`) and `#rrggbb`
pub fn parse_color(name: &str) -> Option<Color> {
    let name = name.trim().to_lowercase();
    if let Some(hex) = name.strip_prefix('#') {
        if hex.len() == 6 && hex.is_ascii() {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            return Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?));
        }
        return None;
    }
    let color = match name.replace(['-', '_', ' '], "").as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" | "purple" => Color::Magenta,
        "cyan" => Color::Cyan,
        "gray" | "grey" => Color::Gray,
        "darkgray" | "darkgrey" => Color::DarkGray,
        "white" => Color::White,
        _ => return None,
    };
    Some(color)
}

fn render_unknown(component: &Component, frame: &mut Frame, area: Rect) {
    let line = Line::styled(
        format!("[unknown component: {}]", component.kind),
        Style::default().fg(Color::DarkGray),
    );
    frame.render_widget(Paragraph::new(line), area);
}

/// Bordered "no content" panel
pub fn render_empty_state(frame: &mut Frame, area: Rect, title: &str, message: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" {title} "));
    let paragraph = Paragraph::new(message.to_string())
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ComponentDefinition, ComponentMeta};
    use crate::testing::RenderHarness;

    fn text(view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
        frame.render_widget(Paragraph::new(view.text()).style(view.style()), area);
    }

    fn column(view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
        view.render_children(frame, area);
    }

    fn registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry
            .register(ComponentDefinition::new(ComponentMeta::new("text", "Text"), text))
            .unwrap();
        registry
            .register(ComponentDefinition::new(
                ComponentMeta::new("container", "Container"),
                column,
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_children_stack_vertically() {
        let registry = registry();
        let tree = Component::new("root", "container")
            .with_child(Component::new("a", "text").with_prop("text", "first"))
            .with_text("literal")
            .with_child(Component::new("b", "chart"));

        let mut harness = RenderHarness::new(30, 4);
        let output = harness.render_to_string_plain(|frame| {
            RenderContext::new(&registry).render(&tree, frame, frame.area());
        });

        let lines: Vec<_> = output.lines().collect();
        assert!(lines[0].starts_with("first"));
        assert!(lines[1].starts_with("literal"));
        assert!(lines[2].contains("[unknown component: chart]"));
    }

    #[test]
    fn test_empty_state_panel() {
        let mut harness = RenderHarness::new(40, 5);
        let output = harness.render_to_string_plain(|frame| {
            render_empty_state(frame, frame.area(), "No content", "Nothing here");
        });
        assert!(output.contains("No content"));
        assert!(output.contains("Nothing here"));
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("Dark-Gray"), Some(Color::DarkGray));
        assert_eq!(parse_color("#ff0080"), Some(Color::Rgb(255, 0, 128)));
        assert_eq!(parse_color("chartreuse"), None);
    }
}
