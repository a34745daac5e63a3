pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::ui::components::CommandInput;
use crate::ui::view::View;
use ratatui::prelude::*;

/// Main draw function
pub fn draw(frame: &mut Frame, view: &mut dyn View, command: &CommandInput) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let title = view.breadcrumb_label();
  renderfns::draw_header(
    frame,
    chunks[0],
    &title,
    view.origin().unwrap_or(""),
    &view.shortcuts(),
  );

  view.render(frame, chunks[1]);
  command.render_overlay(frame, chunks[1]);

  renderfns::draw_footer(frame, chunks[2], &[title], view.status());
}
