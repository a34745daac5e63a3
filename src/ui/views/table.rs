use crate::commands::Action;
use crate::source::TableSource;
use crate::ui::components::{KeyResult, Prompt, PromptEvent};
use crate::ui::renderfns::{cell_alignment, sort_indicator, truncate, type_color};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tabview::config::{Record, TableConfig};
use tabview::{DownloadSink, FileSink, TableView};
use tracing::info;

const MAX_COLUMN_WIDTH: usize = 40;
const PAGE_SIZE_STEP: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Notice {
  Info(String),
  Error(String),
}

/// Browses one configured table: every view-controller transition is a key
pub struct TableScreen {
  name: String,
  title: String,
  origin: String,
  table: TableView<Record>,
  /// Makes the next loader call bypass the cache
  force_next: Arc<AtomicBool>,
  sink: FileSink,
  rows: TableState,
  /// Index into all columns, hidden ones included
  focus: usize,
  search: Prompt,
  filter: Prompt,
  filter_column: Option<String>,
  notice: Option<Notice>,
}

impl TableScreen {
  pub fn new(
    config: &TableConfig,
    title: Option<String>,
    page_size: usize,
    source: TableSource,
    export_dir: PathBuf,
  ) -> Self {
    let force_next = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&force_next);

    let mut table = TableView::new(config.columns())
      .with_page_size(page_size)
      .with_loader(move || {
        let source = source.clone();
        let force = flag.swap(false, Ordering::SeqCst);
        async move { source.load(force).await.map_err(|e| e.to_string()) }
      });

    if let Some(pointer) = config.key_pointer() {
      table = table.with_key(move |record: &Record| {
        match record.pointer(&pointer) {
          Some(serde_json::Value::String(s)) => s.clone(),
          Some(other) => other.to_string(),
          None => String::new(),
        }
      });
    }

    table.request_reload();

    Self {
      name: config.name.clone(),
      title: title.unwrap_or_else(|| config.name.clone()),
      origin: config.origin(),
      table,
      force_next,
      sink: FileSink::new(export_dir),
      rows: TableState::default().with_selected(Some(0)),
      focus: 0,
      search: Prompt::new("/"),
      filter: Prompt::new("="),
      filter_column: None,
      notice: None,
    }
  }

  fn focused_id(&self) -> Option<String> {
    self.table.columns().get(self.focus).map(|c| c.id.clone())
  }

  fn page_len(&self) -> usize {
    self
      .table
      .page_state()
      .bounds(self.table.total_filtered_count())
      .len()
  }

  /// Keep the row cursor on the current page.
  fn clamp_selection(&mut self) {
    let len = self.page_len();
    let selected = self.rows.selected().unwrap_or(0);
    self
      .rows
      .select(Some(selected.min(len.saturating_sub(1))));
  }

  fn move_row(&mut self, delta: isize) {
    let len = self.page_len();
    if len == 0 {
      return;
    }
    let selected = self.rows.selected().unwrap_or(0) as isize;
    self
      .rows
      .select(Some((selected + delta).clamp(0, len as isize - 1) as usize));
  }

  fn move_focus(&mut self, delta: isize) {
    let count = self.table.columns().len();
    if count == 0 {
      return;
    }
    self.focus = (self.focus as isize + delta).clamp(0, count as isize - 1) as usize;
  }

  fn open_filter(&mut self) {
    let Some(column) = self.table.columns().get(self.focus) else {
      return;
    };
    if !column.filterable {
      self.notice = Some(Notice::Info(format!("{} is not filterable", column.label)));
      return;
    }

    let current = self
      .table
      .filter_state()
      .column(&column.id)
      .map(|f| f.to_string())
      .unwrap_or_default();
    let hint = column
      .is_range()
      .then(|| "min..max, min.. or ..max".to_string());
    let title = format!("Filter: {}", column.label);
    self.filter_column = Some(column.id.clone());
    self.filter.activate(title, &current, hint);
  }

  fn sort_focused(&mut self) {
    let Some(column) = self.table.columns().get(self.focus) else {
      return;
    };
    if !column.sortable {
      self.notice = Some(Notice::Info(format!("{} is not sortable", column.label)));
      return;
    }
    let id = column.id.clone();
    self.table.toggle_sort(&id);
  }

  fn toggle_focused_visibility(&mut self) {
    if let Some(id) = self.focused_id() {
      self.table.toggle_column_visibility(&id);
    }
  }

  fn change_page_size(&mut self, grow: bool) {
    let size = self.table.page_state().page_size;
    let size = if grow {
      size + PAGE_SIZE_STEP
    } else {
      size.saturating_sub(PAGE_SIZE_STEP).max(1)
    };
    self.table.set_page_size(size);
    self.clamp_selection();
  }

  fn reload(&mut self) {
    self.force_next.store(true, Ordering::SeqCst);
    if let Some(seq) = self.table.request_reload() {
      info!(table = %self.name, seq, "Forced reload requested");
    }
    self.notice = Some(Notice::Info("Reloading...".to_string()));
  }

  fn export(&mut self) {
    let export = self.table.export(&self.name, Local::now());
    self.notice = Some(match self.sink.save(&export.file_name, &export.bytes) {
      Ok(path) => Notice::Info(format!(
        "Exported {} rows to {}",
        export.row_count,
        path.display()
      )),
      Err(e) => Notice::Error(e.to_string()),
    });
  }

  fn clear_filters(&mut self) {
    self.table.clear_filters();
    self.clamp_selection();
    self.notice = Some(Notice::Info("Filters cleared".to_string()));
  }

  fn handle_prompts(&mut self, key: KeyEvent) -> bool {
    match self.search.handle_key(key) {
      KeyResult::NotHandled => {}
      KeyResult::Handled => return true,
      KeyResult::Event(PromptEvent::Changed(query) | PromptEvent::Submitted(query)) => {
        self.table.set_global_filter(query);
        self.clamp_selection();
        return true;
      }
      KeyResult::Event(PromptEvent::Cancelled) => {
        self.table.set_global_filter("");
        self.clamp_selection();
        return true;
      }
    }

    match self.filter.handle_key(key) {
      KeyResult::NotHandled => false,
      KeyResult::Event(PromptEvent::Submitted(text)) => {
        if let Some(id) = self.filter_column.take() {
          self.table.set_column_filter_text(&id, text.trim());
          self.clamp_selection();
        }
        true
      }
      KeyResult::Event(PromptEvent::Cancelled) => {
        self.filter_column = None;
        true
      }
      KeyResult::Handled | KeyResult::Event(PromptEvent::Changed(_)) => true,
    }
  }

  fn render_rows(&mut self, frame: &mut Frame, area: Rect) {
    let result = self.table.result();

    let title = if self.table.is_loading() {
      format!(" {} (loading...) ", self.title)
    } else if result.total_filtered_count == self.table.rows().len() {
      format!(" {} ({}) ", self.title, result.total_filtered_count)
    } else {
      format!(
        " {} ({} of {}) ",
        self.title,
        result.total_filtered_count,
        self.table.rows().len()
      )
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if result.visible_rows.is_empty() || result.visible_columns.is_empty() {
      let content = if self.table.is_loading() {
        "Loading...".to_string()
      } else if let (Some(e), true) = (self.table.last_error(), self.table.rows().is_empty()) {
        format!("Failed to load: {}. Press 'r' to retry.", e)
      } else if result.visible_columns.is_empty() {
        "All columns are hidden. Press 'v' to show the focused column.".to_string()
      } else if !self.table.filter_state().is_empty() {
        "No rows match the current filters.".to_string()
      } else {
        "No rows.".to_string()
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let focused = self.table.columns().get(self.focus).map(|c| c.id.as_str());
    let sort = self.table.sort_state();
    let filters = self.table.filter_state();

    let widths: Vec<usize> = result
      .visible_columns
      .iter()
      .map(|column| {
        let header = column.label.chars().count() + 3;
        let cells = result
          .visible_rows
          .iter()
          .map(|row| column.display(row).chars().count())
          .max()
          .unwrap_or(0);
        header.max(cells).min(MAX_COLUMN_WIDTH)
      })
      .collect();

    let header = Row::new(result.visible_columns.iter().map(|column| {
      let marker = if filters.column(&column.id).is_some() { "*" } else { "" };
      let text = format!(
        "{}{}{}",
        column.label,
        marker,
        sort_indicator(sort.direction_for(&column.id))
      );
      let mut style = Style::default().fg(Color::Yellow).bold();
      if focused == Some(column.id.as_str()) {
        style = style.reversed();
      }
      Cell::from(Line::from(text).alignment(cell_alignment(column.semantic_type))).style(style)
    }));

    let rows = result.visible_rows.iter().map(|row| {
      Row::new(result.visible_columns.iter().zip(&widths).map(|(column, width)| {
        let text = truncate(&column.display(row), *width);
        Cell::from(Line::from(text).alignment(cell_alignment(column.semantic_type)))
          .style(Style::default().fg(type_color(column.semantic_type)))
      }))
    });

    let constraints = widths.iter().map(|w| Constraint::Length(*w as u16));
    let table = Table::new(rows, constraints)
      .header(header)
      .block(block)
      .column_spacing(2)
      .row_highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.rows);
  }
}

impl View for TableScreen {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.handle_prompts(key) {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('q') => return ViewAction::Quit,
      KeyCode::Esc => self.notice = None,
      KeyCode::Char('j') | KeyCode::Down => self.move_row(1),
      KeyCode::Char('k') | KeyCode::Up => self.move_row(-1),
      KeyCode::Char('h') | KeyCode::Left => self.move_focus(-1),
      KeyCode::Char('l') | KeyCode::Right => self.move_focus(1),
      KeyCode::Char('n') | KeyCode::PageDown => {
        self.table.next_page();
        self.rows.select(Some(0));
      }
      KeyCode::Char('p') | KeyCode::PageUp => {
        self.table.prev_page();
        self.rows.select(Some(0));
      }
      KeyCode::Home => {
        self.table.set_page(0);
        self.rows.select(Some(0));
      }
      KeyCode::End => {
        self.table.set_page(self.table.total_pages().saturating_sub(1));
        self.rows.select(Some(0));
      }
      KeyCode::Char('/') => {
        let current = self.table.filter_state().global().to_string();
        self.search.activate("Search", &current, None);
      }
      KeyCode::Char('f') => self.open_filter(),
      KeyCode::Char('s') => self.sort_focused(),
      KeyCode::Char('v') => self.toggle_focused_visibility(),
      KeyCode::Char('+') => self.change_page_size(true),
      KeyCode::Char('-') => self.change_page_size(false),
      KeyCode::Char('r') => self.reload(),
      KeyCode::Char('e') => self.export(),
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_rows(frame, area);
    self.search.render_overlay(frame, area);
    self.filter.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.title.clone()
  }

  fn origin(&self) -> Option<&str> {
    Some(&self.origin)
  }

  fn status(&self) -> Line<'_> {
    let dim = Style::default().fg(Color::DarkGray);
    let sep = || Span::styled("  │ ", dim);

    let page = self.table.page_state();
    let mut spans = vec![
      Span::raw(format!(
        "page {}/{}",
        page.page_index + 1,
        self.table.total_pages()
      )),
      sep(),
      Span::raw(format!("{} rows", self.table.total_filtered_count())),
    ];

    if let Some(count) = self.table.remote_count() {
      spans.push(Span::styled(format!(" ({} on server)", count), dim));
    }

    if let Some(column) = self.table.columns().get(self.focus) {
      spans.push(sep());
      let hidden = if self.table.is_visible(&column.id) { "" } else { " (hidden)" };
      spans.push(Span::styled(
        format!("{}{}", column.label, hidden),
        Style::default().fg(Color::Cyan),
      ));
    }

    let filters = self.table.filter_state();
    let active = filters.columns().count() + usize::from(!filters.global().is_empty());
    if active > 0 {
      spans.push(sep());
      spans.push(Span::styled(
        format!("{} filter(s)", active),
        Style::default().fg(Color::Yellow),
      ));
    }

    if let Some(error) = self.table.last_error() {
      spans.push(sep());
      spans.push(Span::styled(
        format!("error: {}", error),
        Style::default().fg(Color::Red),
      ));
    }

    match &self.notice {
      Some(Notice::Info(text)) => {
        spans.push(sep());
        spans.push(Span::styled(text.clone(), Style::default().fg(Color::Green)));
      }
      Some(Notice::Error(text)) => {
        spans.push(sep());
        spans.push(Span::styled(text.clone(), Style::default().fg(Color::Red)));
      }
      None => {}
    }

    Line::from(spans)
  }

  fn tick(&mut self) {
    if self.table.tick() {
      self.clamp_selection();
      if matches!(self.notice, Some(Notice::Info(ref text)) if text == "Reloading...") {
        self.notice = None;
      }
    }
  }

  fn is_capturing_input(&self) -> bool {
    self.search.is_active() || self.filter.is_active()
  }

  fn on_command(&mut self, action: Action) -> ViewAction {
    match action {
      Action::Export => self.export(),
      Action::Reload => self.reload(),
      Action::ClearFilters => self.clear_filters(),
      Action::Quit => return ViewAction::Quit,
    }
    ViewAction::None
  }

  fn notify(&mut self, message: String) {
    self.notice = Some(Notice::Error(message));
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("f", "filter").with_priority(30),
      ShortcutInfo::new("s", "sort").with_priority(40),
      ShortcutInfo::new("v", "hide/show").with_priority(50),
      ShortcutInfo::new("n/p", "page").with_priority(60),
      ShortcutInfo::new("r", "reload").with_priority(70),
      ShortcutInfo::new("e", "export").with_priority(80),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::Cache;
  use crossterm::event::KeyModifiers;
  use tabview::cache::{KvStore, MemoryStore, TtlCache};
  use tabview::config::Config;
  use tabview::SortDirection;

  const RECORDS: &str = r#"{"data": [
    {"id": 1, "customer": "Bravo", "total": 120.5},
    {"id": 2, "customer": "alpha", "total": 15},
    {"id": 3, "customer": "Charlie", "total": 300}
  ], "count": 3}"#;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn press(screen: &mut TableScreen, keys: &str) {
    for c in keys.chars() {
      screen.handle_key(key(KeyCode::Char(c)));
    }
  }

  async fn screen(dir: &std::path::Path) -> TableScreen {
    let data = dir.join("quotations.json");
    std::fs::write(&data, RECORDS).unwrap();
    let yaml = format!(
      r##"
tables:
  - name: quotations
    source: {{ file: '{}' }}
    columns:
      - {{ id: id, label: "#", type: number }}
      - {{ id: customer, label: Customer }}
      - {{ id: total, label: Total, type: number, range: true }}
"##,
      data.display()
    );
    let config = Config::parse(&yaml).unwrap();
    let table = config.table(None).unwrap();
    let cache: Cache = TtlCache::new(Box::new(MemoryStore::new()) as Box<dyn KvStore>);
    let source = TableSource::new(table, cache).unwrap();

    let mut screen = TableScreen::new(table, None, 2, source, dir.join("exports"));
    screen.table.settle().await;
    screen
  }

  fn customers(screen: &TableScreen) -> Vec<String> {
    let result = screen.table.result();
    result
      .visible_rows
      .iter()
      .map(|r| r["customer"].as_str().unwrap_or_default().to_string())
      .collect()
  }

  #[tokio::test]
  async fn test_initial_load() {
    let dir = tempfile::tempdir().unwrap();
    let screen = screen(dir.path()).await;
    assert_eq!(screen.table.rows().len(), 3);
    assert_eq!(screen.table.remote_count(), Some(3));
    assert_eq!(screen.table.total_pages(), 2);
    assert_eq!(screen.table.row_key(0), "1");
  }

  #[tokio::test]
  async fn test_sort_focused_column() {
    let dir = tempfile::tempdir().unwrap();
    let mut screen = screen(dir.path()).await;
    press(&mut screen, "ls");
    assert_eq!(
      screen.table.sort_state().direction_for("customer"),
      Some(SortDirection::Ascending)
    );
    assert_eq!(customers(&screen), vec!["alpha", "Bravo"]);
  }

  #[tokio::test]
  async fn test_search_filters_live_and_cancel_clears() {
    let dir = tempfile::tempdir().unwrap();
    let mut screen = screen(dir.path()).await;
    press(&mut screen, "/char");
    assert!(screen.is_capturing_input());
    assert_eq!(customers(&screen), vec!["Charlie"]);

    screen.handle_key(key(KeyCode::Esc));
    assert!(!screen.is_capturing_input());
    assert_eq!(screen.table.total_filtered_count(), 3);
  }

  #[tokio::test]
  async fn test_range_filter_on_focused_column() {
    let dir = tempfile::tempdir().unwrap();
    let mut screen = screen(dir.path()).await;
    press(&mut screen, "llf100..");
    screen.handle_key(key(KeyCode::Enter));
    assert_eq!(customers(&screen), vec!["Bravo", "Charlie"]);

    screen.on_command(Action::ClearFilters);
    assert_eq!(screen.table.total_filtered_count(), 3);
  }

  #[tokio::test]
  async fn test_paging_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut screen = screen(dir.path()).await;
    press(&mut screen, "n");
    assert_eq!(screen.table.page_state().page_index, 1);
    assert_eq!(customers(&screen), vec!["Charlie"]);
    press(&mut screen, "nn");
    assert_eq!(screen.table.page_state().page_index, 1);
    press(&mut screen, "p");
    assert_eq!(screen.table.page_state().page_index, 0);
  }

  #[tokio::test]
  async fn test_export_writes_all_filtered_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut screen = screen(dir.path()).await;
    press(&mut screen, "lve");

    let exports: Vec<_> = std::fs::read_dir(dir.path().join("exports"))
      .unwrap()
      .map(|e| e.unwrap().path())
      .collect();
    assert_eq!(exports.len(), 1);
    let csv = std::fs::read_to_string(&exports[0]).unwrap();
    assert_eq!(csv, "\"#\",\"Total\"\n1,120.5\n2,15\n3,300");
  }

  #[tokio::test]
  async fn test_forced_reload_bypasses_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut screen = screen(dir.path()).await;
    std::fs::write(dir.path().join("quotations.json"), r#"[{"id": 9}]"#).unwrap();

    screen.on_command(Action::Reload);
    screen.table.settle().await;
    assert_eq!(screen.table.rows().len(), 1);
    assert_eq!(screen.table.remote_count(), None);
  }

  #[tokio::test]
  async fn test_quit() {
    let dir = tempfile::tempdir().unwrap();
    let mut screen = screen(dir.path()).await;
    assert_eq!(screen.handle_key(key(KeyCode::Char('q'))), ViewAction::Quit);
  }
}
