use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};
use tui_textarea::{CursorMove, Input, Key, TextArea};

use crate::cache::QueryHistory;

/// Event emitted by TextInput widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInputEvent {
    None,
    Submit,
    Cancel,
    HistoryChanged,
}

/// Single-line text input wrapping tui-textarea, with optional history browsing
pub struct TextInput {
    textarea: TextArea<'static>,
    history_index: Option<usize>,
    /// Value being typed before history browsing started
    history_temp: Option<String>,
    text_color: Option<Color>,
    focused: bool,
}

impl TextInput {
    pub fn new() -> Self {
        let mut input = Self {
            textarea: TextArea::default(),
            history_index: None,
            history_temp: None,
            text_color: None,
            focused: false,
        };
        input.apply_style();
        input
    }

    pub fn with_text_color(mut self, color: Color) -> Self {
        self.text_color = Some(color);
        self.apply_style();
        self
    }

    fn apply_style(&mut self) {
        let mut style = Style::default();
        if let Some(color) = self.text_color {
            style = style.fg(color);
        }
        self.textarea.set_style(style);
        self.textarea.set_cursor_line_style(Style::default());
        self.textarea.set_cursor_style(if self.focused {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            style
        });
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        self.apply_style();
    }

    pub fn value(&self) -> &str {
        self.textarea
            .lines()
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Replace the content and put the cursor at the end
    pub fn set_value(&mut self, value: impl Into<String>) {
        let single_line = value.into().replace(['\n', '\r'], " ");
        self.textarea = TextArea::new(vec![single_line]);
        self.apply_style();
        self.textarea.move_cursor(CursorMove::End);
    }

    pub fn clear(&mut self) {
        self.set_value(String::new());
        self.history_index = None;
        self.history_temp = None;
    }

    pub fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    /// Older entry
    pub fn history_up(&mut self, history: &QueryHistory) {
        if history.is_empty() {
            return;
        }
        let index = match self.history_index {
            None => {
                self.history_temp = Some(self.value().to_string());
                history.len() - 1
            }
            Some(i) => i.saturating_sub(1),
        };
        self.history_index = Some(index);
        if let Some(entry) = history.get(index) {
            let entry = entry.to_string();
            self.set_value(entry);
        }
    }

    /// Newer entry, then back to what was being typed
    pub fn history_down(&mut self, history: &QueryHistory) {
        let Some(index) = self.history_index else {
            return;
        };
        if index + 1 >= history.len() {
            let temp = self.history_temp.take().unwrap_or_default();
            self.history_index = None;
            self.set_value(temp);
        } else {
            self.history_index = Some(index + 1);
            if let Some(entry) = history.get(index + 1) {
                let entry = entry.to_string();
                self.set_value(entry);
            }
        }
    }

    pub fn handle_key(&mut self, event: &KeyEvent, history: Option<&QueryHistory>) -> TextInputEvent {
        match (event.code, history) {
            (KeyCode::Enter, _) => return TextInputEvent::Submit,
            (KeyCode::Esc, _) => return TextInputEvent::Cancel,
            (KeyCode::Up, Some(history)) => {
                self.history_up(history);
                return TextInputEvent::HistoryChanged;
            }
            (KeyCode::Down, Some(history)) => {
                self.history_down(history);
                return TextInputEvent::HistoryChanged;
            }
            _ => {}
        }
        let input = key_event_to_input(event);
        if matches!(input.key, Key::Enter | Key::Null) {
            return TextInputEvent::None;
        }
        self.textarea.input(input);
        self.history_index = None;
        self.history_temp = None;
        TextInputEvent::None
    }
}

fn key_event_to_input(event: &KeyEvent) -> Input {
    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Enter => Key::Enter,
        _ => Key::Null,
    };
    Input {
        key,
        ctrl: event.modifiers.contains(KeyModifiers::CONTROL),
        alt: event.modifiers.contains(KeyModifiers::ALT),
        shift: event.modifiers.contains(KeyModifiers::SHIFT),
    }
}

impl Default for TextInput {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for &TextInput {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        self.textarea.render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_and_submit() {
        let mut input = TextInput::new();
        for c in "A > 2".chars() {
            assert_eq!(input.handle_key(&key(KeyCode::Char(c)), None), TextInputEvent::None);
        }
        assert_eq!(input.value(), "A > 2");
        assert_eq!(input.handle_key(&key(KeyCode::Enter), None), TextInputEvent::Submit);
    }

    #[test]
    fn history_browsing_restores_draft() {
        let mut history = QueryHistory::in_memory(10);
        history.push("A > 1");
        history.push("B < 2");
        let mut input = TextInput::new();
        input.set_value("draft");
        input.handle_key(&key(KeyCode::Up), Some(&history));
        assert_eq!(input.value(), "B < 2");
        input.handle_key(&key(KeyCode::Up), Some(&history));
        assert_eq!(input.value(), "A > 1");
        input.handle_key(&key(KeyCode::Down), Some(&history));
        input.handle_key(&key(KeyCode::Down), Some(&history));
        assert_eq!(input.value(), "draft");
    }

    #[test]
    fn clear_empties() {
        let mut input = TextInput::new();
        input.set_value("hello");
        input.clear();
        assert!(input.is_empty());
    }
}
