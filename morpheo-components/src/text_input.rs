//! Single-line text input

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use morpheo_core::capability::ComponentCapability;
use morpheo_core::render::display_value;
use morpheo_core::{
    ComponentDefinition, ComponentMeta, ConnectionPoint, DataType, RenderView, Renderer,
};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use serde_json::{Map, Value};

pub(crate) fn definition() -> ComponentDefinition {
    ComponentDefinition::new(
        ComponentMeta::new("text-input", "Text input")
            .with_description("Editable single-line value")
            .with_default_prop("value", "")
            .with_default_prop("placeholder", "")
            .with_capability(
                ComponentCapability::new("value", "Value")
                    .with_point(
                        ConnectionPoint::bidirectional("value", DataType::Text)
                            .with_name("Value")
                            .with_default(""),
                    )
                    .with_point(ConnectionPoint::output("submit", DataType::Text).with_name("Submit")),
            ),
        TextInputRenderer,
    )
    .with_initializer(|props| {
        let mut state = Map::new();
        let value = props.get("value").cloned().unwrap_or_default();
        state.insert("value".into(), Value::String(display_value(&value)));
        state
    })
}

/// What a key press did to the value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Change(String),
    Submit(String),
}

/// Cursor-aware editing of a text-input value
///
/// The value itself lives in the runtime; this only tracks the cursor and
/// turns key presses into new values.
#[derive(Debug, Default)]
pub struct TextEdit {
    /// Cursor position (byte index)
    cursor: usize,
}

impl TextEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn clamp_cursor(&mut self, value: &str) {
        self.cursor = self.cursor.min(value.len());
        while self.cursor > 0 && !value.is_char_boundary(self.cursor) {
            self.cursor -= 1;
        }
    }

    fn move_left(&mut self, value: &str) {
        if let Some((i, _)) = value[..self.cursor].char_indices().next_back() {
            self.cursor = i;
        }
    }

    fn move_right(&mut self, value: &str) {
        if let Some(c) = value[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    fn insert(&mut self, value: &str, c: char) -> String {
        let mut next = String::with_capacity(value.len() + c.len_utf8());
        next.push_str(&value[..self.cursor]);
        next.push(c);
        next.push_str(&value[self.cursor..]);
        self.cursor += c.len_utf8();
        next
    }

    fn backspace(&mut self, value: &str) -> Option<String> {
        let (start, _) = value[..self.cursor].char_indices().next_back()?;
        let next = format!("{}{}", &value[..start], &value[self.cursor..]);
        self.cursor = start;
        Some(next)
    }

    fn delete(&self, value: &str) -> Option<String> {
        let c = value[self.cursor..].chars().next()?;
        Some(format!(
            "{}{}",
            &value[..self.cursor],
            &value[self.cursor + c.len_utf8()..]
        ))
    }

    /// Apply a key press to `value`
    pub fn handle_key(&mut self, key: &KeyEvent, value: &str) -> Option<Edit> {
        self.clamp_cursor(value);

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('a') => {
                    self.cursor = 0;
                    None
                }
                KeyCode::Char('e') => {
                    self.cursor = value.len();
                    None
                }
                KeyCode::Char('u') => {
                    self.cursor = 0;
                    Some(Edit::Change(String::new()))
                }
                _ => None,
            };
        }

        match key.code {
            KeyCode::Char(c) => Some(Edit::Change(self.insert(value, c))),
            KeyCode::Backspace => self.backspace(value).map(Edit::Change),
            KeyCode::Delete => self.delete(value).map(Edit::Change),
            KeyCode::Left => {
                self.move_left(value);
                None
            }
            KeyCode::Right => {
                self.move_right(value);
                None
            }
            KeyCode::Home => {
                self.cursor = 0;
                None
            }
            KeyCode::End => {
                self.cursor = value.len();
                None
            }
            KeyCode::Enter => Some(Edit::Submit(value.to_string())),
            _ => None,
        }
    }
}

struct TextInputRenderer;

impl Renderer for TextInputRenderer {
    fn render(&self, view: &RenderView<'_>, frame: &mut Frame, area: Rect) {
        let value = view.value("value").map(|v| display_value(&v)).unwrap_or_default();
        let (text, style) = if value.is_empty() {
            (
                view.prop_str("placeholder").unwrap_or_default().to_string(),
                Style::default().fg(Color::DarkGray),
            )
        } else {
            (value.clone(), Style::default())
        };

        let mut block = Block::default().borders(Borders::ALL).border_style(if view.focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        });
        if let Some(label) = view.prop_str("label") {
            block = block.title(format!(" {label} "));
        }
        frame.render_widget(Paragraph::new(text).style(style).block(block), area);

        if view.focused && area.height >= 3 {
            let cursor_x = area
                .x
                .saturating_add(1)
                .saturating_add(value.chars().count().min(u16::MAX as usize) as u16);
            if cursor_x < area.x.saturating_add(area.width).saturating_sub(1) {
                frame.set_cursor_position((cursor_x, area.y + 1));
            }
        }
    }

    fn height(&self, _view: &RenderView<'_>, _width: u16) -> u16 {
        3
    }
}
