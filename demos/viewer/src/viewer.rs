//! Focus and key handling over a mounted component tree

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use morpheo::components::{Edit, TextEdit};
use morpheo::{AppConfig, Child, Component, ComponentRegistry, ComponentRuntime};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Points that make a component worth focusing
const INTERACTIVE_POINTS: [&str; 4] = ["click", "submit", "increment", "toggle"];

/// An edge declared in the config's `connections` array
#[derive(Debug, Clone, Deserialize)]
pub struct Edge {
    pub from: String,
    pub source: String,
    pub to: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Quit,
    Changed,
    Ignored,
}

pub struct Viewer {
    root: Component,
    runtime: ComponentRuntime,
    focusable: Vec<String>,
    focus: usize,
    editor: TextEdit,
    status: String,
}

impl Viewer {
    /// Mount `config` and wire the edges listed under `connections`
    pub fn new(registry: Arc<ComponentRegistry>, config: &AppConfig, raw: &Value) -> Self {
        let root = config.root();
        let mut runtime = ComponentRuntime::new(registry);
        runtime.mount(&root);

        let edges: Vec<Edge> = raw
            .get("connections")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring malformed connections");
                None
            })
            .unwrap_or_default();
        for edge in edges {
            if let Err(e) = runtime.connect(&edge.from, &edge.source, &edge.to, &edge.target, None) {
                warn!(from = %edge.from, to = %edge.to, error = %e, "Skipping connection");
            }
        }

        let mut focusable = Vec::new();
        collect_focusable(&runtime, &root, &mut focusable);

        Self {
            root,
            runtime,
            focusable,
            focus: 0,
            editor: TextEdit::new(),
            status: String::new(),
        }
    }

    /// A viewer showing `message` instead of an app
    pub fn failed(registry: Arc<ComponentRegistry>, message: &str) -> Self {
        let root = Component::empty_state("Could not load app", message);
        Self {
            runtime: ComponentRuntime::new(registry),
            root,
            focusable: Vec::new(),
            focus: 0,
            editor: TextEdit::new(),
            status: String::new(),
        }
    }

    pub fn runtime(&self) -> &ComponentRuntime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut ComponentRuntime {
        &mut self.runtime
    }

    pub fn focused(&self) -> Option<&str> {
        self.focusable.get(self.focus).map(String::as_str)
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    fn move_focus(&mut self, forward: bool) {
        if self.focusable.is_empty() {
            return;
        }
        let len = self.focusable.len();
        self.focus = if forward {
            (self.focus + 1) % len
        } else {
            (self.focus + len - 1) % len
        };
        self.editor = TextEdit::new();
    }

    fn has_point(&self, id: &str, point: &str) -> bool {
        self.runtime.connection_point(id, point).is_some()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return KeyOutcome::Quit;
        }
        match key.code {
            KeyCode::Tab => {
                self.move_focus(true);
                return KeyOutcome::Changed;
            }
            KeyCode::BackTab => {
                self.move_focus(false);
                return KeyOutcome::Changed;
            }
            _ => {}
        }

        let Some(id) = self.focused().map(str::to_string) else {
            return match key.code {
                KeyCode::Char('q') => KeyOutcome::Quit,
                _ => KeyOutcome::Ignored,
            };
        };

        if self.is_text_input(&id) {
            return self.edit(&id, &key);
        }

        let result = match key.code {
            KeyCode::Char('q') => return KeyOutcome::Quit,
            KeyCode::Enter | KeyCode::Char(' ') if self.has_point(&id, "click") => {
                self.runtime.trigger(&id, "click", Value::Null).map(|_| ())
            }
            KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('+') | KeyCode::Up
                if self.has_point(&id, "increment") =>
            {
                self.receive(&id, "increment")
            }
            KeyCode::Char('-') | KeyCode::Down if self.has_point(&id, "decrement") => {
                self.receive(&id, "decrement")
            }
            KeyCode::Char('0') if self.has_point(&id, "reset") => self.receive(&id, "reset"),
            KeyCode::Enter | KeyCode::Char(' ') if self.has_point(&id, "toggle") => {
                self.receive(&id, "toggle")
            }
            _ => return KeyOutcome::Ignored,
        };
        if let Err(e) = result {
            warn!(component = %id, error = %e, "Key handling failed");
        }
        KeyOutcome::Changed
    }

    fn is_text_input(&self, id: &str) -> bool {
        self.runtime
            .instance(id)
            .is_some_and(|instance| instance.kind == "text-input")
    }

    fn receive(&mut self, id: &str, point: &str) -> Result<(), morpheo::ConnectionError> {
        self.runtime.receive(id, point, Value::Null)?;
        let steps = self.runtime.pump();
        debug!(component = %id, point = %point, steps, "Delivered input");
        Ok(())
    }

    fn edit(&mut self, id: &str, key: &KeyEvent) -> KeyOutcome {
        let value = match self.runtime.connection_value(id, "value") {
            Some(Value::String(value)) => value,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let result = match self.editor.handle_key(key, &value) {
            Some(Edit::Change(next)) => self
                .runtime
                .send_event(id, "change", "value", json!(next))
                .map(|_| self.runtime.pump())
                .map(|_| ()),
            Some(Edit::Submit(text)) => self.runtime.trigger(id, "submit", json!(text)).map(|_| ()),
            None => return KeyOutcome::Ignored,
        };
        if let Err(e) = result {
            warn!(component = %id, error = %e, "Edit failed");
        }
        KeyOutcome::Changed
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let [body, help] = Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(area);
        self.runtime.render(&self.root, frame, body, self.focused());

        let mut text = String::from("Tab: focus  Enter: activate  +/-: count  Esc: quit");
        if !self.status.is_empty() {
            text.push_str("  | ");
            text.push_str(&self.status);
        }
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
            help,
        );
    }
}

fn collect_focusable(runtime: &ComponentRuntime, component: &Component, out: &mut Vec<String>) {
    if runtime.is_mounted(&component.id)
        && INTERACTIVE_POINTS
            .iter()
            .any(|point| runtime.connection_point(&component.id, point).is_some())
    {
        out.push(component.id.clone());
    }
    for child in &component.children {
        if let Child::Node(node) = child {
            collect_focusable(runtime, node, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morpheo::testing::RenderHarness;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn viewer() -> Viewer {
        let raw = json!({
            "app": {"name": "Demo"},
            "components": [
                {"id": "name", "type": "input", "props": {"label": "Name"}},
                {"id": "plus", "type": "button", "props": {"label": "More"}},
                {"id": "count", "type": "counter", "props": {"label": "Count"}},
                {"id": "echo", "type": "text"}
            ],
            "connections": [
                {"from": "plus", "source": "click", "to": "count", "target": "increment"},
                {"from": "name", "source": "value", "to": "echo", "target": "text"}
            ]
        });
        let config = AppConfig::from_value(&raw);
        Viewer::new(morpheo::registry().unwrap(), &config, &raw)
    }

    #[test]
    fn test_focus_cycles_interactive_components() {
        let mut viewer = viewer();
        assert_eq!(viewer.focused(), Some("name"));
        viewer.handle_key(key(KeyCode::Tab));
        assert_eq!(viewer.focused(), Some("plus"));
        viewer.handle_key(key(KeyCode::Tab));
        assert_eq!(viewer.focused(), Some("count"));
        viewer.handle_key(key(KeyCode::Tab));
        assert_eq!(viewer.focused(), Some("name"));
        viewer.handle_key(key(KeyCode::BackTab));
        assert_eq!(viewer.focused(), Some("count"));
    }

    #[test]
    fn test_typing_flows_through_connections() {
        let mut viewer = viewer();
        for c in "hi".chars() {
            assert_eq!(viewer.handle_key(key(KeyCode::Char(c))), KeyOutcome::Changed);
        }
        // q is text while an input has focus
        viewer.handle_key(key(KeyCode::Char('q')));
        assert_eq!(
            viewer.runtime().connection_value("echo", "text"),
            Some(json!("hiq"))
        );
    }

    #[test]
    fn test_button_and_counter_keys() {
        let mut viewer = viewer();
        viewer.handle_key(key(KeyCode::Tab));
        viewer.handle_key(key(KeyCode::Enter));
        viewer.handle_key(key(KeyCode::Tab));
        viewer.handle_key(key(KeyCode::Char('+')));
        viewer.handle_key(key(KeyCode::Char('+')));
        viewer.handle_key(key(KeyCode::Char('-')));
        assert_eq!(
            viewer.runtime().connection_value("count", "value"),
            Some(json!(2))
        );
        assert_eq!(viewer.handle_key(key(KeyCode::Char('q'))), KeyOutcome::Quit);
    }

    #[test]
    fn test_failed_config_shows_message() {
        let viewer = Viewer::failed(morpheo::registry().unwrap(), "expected value at line 1");
        let mut harness = RenderHarness::new(60, 8);
        let output = harness.render_to_string_plain(|frame| viewer.render(frame, frame.area()));
        assert!(output.contains("Could not load app"));
        assert!(output.contains("expected value at line 1"));
    }
}
