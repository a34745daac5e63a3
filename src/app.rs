use crate::commands::Action;
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{View, ViewAction};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::time::Duration;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Main application state
pub struct App {
  view: Box<dyn View>,
  command_input: CommandInput,
  should_quit: bool,
}

impl App {
  pub fn new(view: Box<dyn View>) -> Self {
    Self {
      view,
      command_input: CommandInput::new(),
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);
    info!("Event loop started");

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self.view.as_mut(), &self.command_input))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.view.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }

    info!("Event loop finished");
    Ok(())
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // Prompts inside the view own ':' while they are open
    if self.command_input.is_active() || !self.view.is_capturing_input() {
      match self.command_input.handle_key(key) {
        KeyResult::NotHandled => {}
        KeyResult::Handled | KeyResult::Event(CommandEvent::Cancelled) => return,
        KeyResult::Event(CommandEvent::Submitted(Some(command), _)) => {
          debug!(command = command.name, "Running command");
          let action = match command.action {
            Action::Quit => ViewAction::Quit,
            action => self.view.on_command(action),
          };
          self.apply(action);
          return;
        }
        KeyResult::Event(CommandEvent::Submitted(None, typed)) => {
          if !typed.is_empty() {
            self.view.notify(format!("Unknown command: {}", typed));
          }
          return;
        }
      }
    }

    let action = self.view.handle_key(key);
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Quit => self.should_quit = true,
    }
  }
}
