use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
  /// Text changed (emitted on each keystroke)
  Changed(String),
  /// Enter pressed; the prompt closed with this text
  Submitted(String),
  /// Escape pressed; the prompt closed
  Cancelled,
}

/// One-line overlay prompt, used for the global search and column filters
#[derive(Debug, Clone)]
pub struct Prompt {
  input: TextInput,
  active: bool,
  prefix: &'static str,
  title: String,
  hint: Option<String>,
}

impl Prompt {
  pub fn new(prefix: &'static str) -> Self {
    Self {
      input: TextInput::new(),
      active: false,
      prefix,
      title: String::new(),
      hint: None,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open the prompt pre-filled with `initial`.
  pub fn activate(&mut self, title: impl Into<String>, initial: &str, hint: Option<String>) {
    self.active = true;
    self.title = title.into();
    self.hint = hint;
    self.input.set_value(initial);
  }

  /// Only call while active; inactive prompts never consume keys.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(value) => {
        self.active = false;
        KeyResult::Event(PromptEvent::Submitted(value))
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(PromptEvent::Cancelled)
      }
      InputResult::Consumed => {
        KeyResult::Event(PromptEvent::Changed(self.input.value().to_string()))
      }
      // Swallow everything else so normal-mode bindings don't fire mid-edit
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let height = if self.hint.is_some() { 4 } else { 3 };
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height).intersection(area);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let (before, after) = split_at_char(self.input.value(), self.input.cursor_position());
    let mut lines = vec![Line::from(vec![
      Span::styled(self.prefix, Style::default().fg(Color::Yellow)),
      Span::raw(before),
      Span::styled("_", Style::default().fg(Color::Yellow)),
      Span::raw(after),
    ])];
    if let Some(hint) = &self.hint {
      lines.push(Line::styled(hint.as_str(), Style::default().fg(Color::DarkGray)));
    }
    frame.render_widget(Paragraph::new(lines), inner);
  }
}

fn split_at_char(s: &str, chars: usize) -> (&str, &str) {
  let at = s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len());
  s.split_at(at)
}
