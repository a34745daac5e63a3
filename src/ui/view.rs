use crate::commands::Action;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
  None,
  Quit,
}

/// Views own their input modes and return actions for the App to run.
///
/// Views that load data asynchronously poll it in `tick()`.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Label shown in the footer breadcrumb
  fn breadcrumb_label(&self) -> String;

  /// Data origin shown in the header
  fn origin(&self) -> Option<&str> {
    None
  }

  /// One-line status shown under the content
  fn status(&self) -> Line<'_> {
    Line::default()
  }

  /// Called on each tick to allow views to poll async queries
  fn tick(&mut self) {}

  /// Whether a text prompt inside the view is capturing keys
  fn is_capturing_input(&self) -> bool {
    false
  }

  /// Run a prompt command
  fn on_command(&mut self, action: Action) -> ViewAction {
    match action {
      Action::Quit => ViewAction::Quit,
      _ => ViewAction::None,
    }
  }

  /// Surface a message from the App (e.g. an unknown command)
  fn notify(&mut self, _message: String) {}

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
