//! Table view controller.
//!
//! `TableView<T>` holds the rows, the column schema and the view state
//! (filters, sort, page, column visibility). Every transition is synchronous
//! and total, and leaves the derived row order fully recomputed; there is no
//! observable intermediate state. Reloads go through a [`Query`] so
//! overlapping requests resolve last-response-wins.

use chrono::{DateTime, TimeZone};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::column::{find_column, Column};
use crate::export::{self, Export};
use crate::fetch::Fetched;
use crate::filter::{filter_indices, ColumnFilter, FilterState};
use crate::paginate::{total_pages, PageState};
use crate::query::Query;
use crate::sort::{sort_indices, SortState};

type KeyFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// The rendered page, derived from the current state.
#[derive(Debug)]
pub struct ViewResult<'a, T> {
  pub visible_rows: Vec<&'a T>,
  /// Row keys, parallel to `visible_rows`
  pub keys: Vec<String>,
  pub visible_columns: Vec<&'a Column<T>>,
  pub total_filtered_count: usize,
  pub total_pages: usize,
  pub page_index: usize,
}

pub struct TableView<T> {
  columns: Vec<Column<T>>,
  visible: Vec<bool>,
  rows: Vec<T>,
  filter: FilterState,
  sort: SortState,
  page: PageState,
  /// Filtered then sorted positions into `rows`
  processed: Vec<usize>,
  key: Option<KeyFn<T>>,
  loader: Option<Query<Fetched<T>>>,
  remote_count: Option<usize>,
  last_error: Option<String>,
}

impl<T> TableView<T> {
  pub fn new(columns: Vec<Column<T>>) -> Self {
    let visible = columns.iter().map(|c| c.visible).collect();
    Self {
      columns,
      visible,
      rows: Vec::new(),
      filter: FilterState::new(),
      sort: SortState::none(),
      page: PageState::default(),
      processed: Vec::new(),
      key: None,
      loader: None,
      remote_count: None,
      last_error: None,
    }
  }

  pub fn with_rows(mut self, rows: Vec<T>) -> Self {
    self.set_rows(rows);
    self
  }

  pub fn with_page_size(mut self, page_size: usize) -> Self {
    self.set_page_size(page_size);
    self
  }

  /// Key rows with a caller-supplied function instead of the `id` column.
  pub fn with_key<F>(mut self, key: F) -> Self
  where
    F: Fn(&T) -> String + Send + Sync + 'static,
  {
    self.key = Some(Arc::new(key));
    self
  }

  // --- State accessors ---

  pub fn columns(&self) -> &[Column<T>] {
    &self.columns
  }

  pub fn rows(&self) -> &[T] {
    &self.rows
  }

  pub fn filter_state(&self) -> &FilterState {
    &self.filter
  }

  pub fn sort_state(&self) -> &SortState {
    &self.sort
  }

  pub fn page_state(&self) -> PageState {
    self.page
  }

  pub fn is_visible(&self, column_id: &str) -> bool {
    find_column(&self.columns, column_id)
      .map(|(i, _)| self.visible[i])
      .unwrap_or(false)
  }

  /// Visible columns in display order.
  pub fn visible_columns(&self) -> Vec<&Column<T>> {
    self
      .columns
      .iter()
      .zip(&self.visible)
      .filter(|(_, visible)| **visible)
      .map(|(c, _)| c)
      .collect()
  }

  pub fn total_filtered_count(&self) -> usize {
    self.processed.len()
  }

  pub fn total_pages(&self) -> usize {
    total_pages(self.processed.len(), self.page.page_size)
  }

  /// Filtered and sorted rows, before pagination.
  pub fn processed_rows(&self) -> impl Iterator<Item = &T> + '_ {
    self.processed.iter().map(|&i| &self.rows[i])
  }

  /// Key for a row: the custom key function, else the `id` column's value,
  /// else the row's position in the data set.
  pub fn row_key(&self, position: usize) -> String {
    let row = &self.rows[position];
    if let Some(key) = &self.key {
      return key(row);
    }
    match find_column(&self.columns, "id") {
      Some((_, column)) => column.value(row).to_string(),
      None => position.to_string(),
    }
  }

  /// Compute the current page.
  pub fn result(&self) -> ViewResult<'_, T> {
    let window = self.page.slice(&self.processed);
    ViewResult {
      visible_rows: window.iter().map(|&i| &self.rows[i]).collect(),
      keys: window.iter().map(|&i| self.row_key(i)).collect(),
      visible_columns: self.visible_columns(),
      total_filtered_count: self.processed.len(),
      total_pages: self.total_pages(),
      page_index: self.page.page_index,
    }
  }

  /// Serialize every filtered row (not just the current page) over the
  /// visible columns.
  pub fn export<Tz: TimeZone>(&self, prefix: &str, at: DateTime<Tz>) -> Export
  where
    Tz::Offset: std::fmt::Display,
  {
    let export = export::export(prefix, self.processed_rows(), &self.visible_columns(), at);
    debug!(rows = export.row_count, file = %export.file_name, "Export prepared");
    export
  }

  // --- Transitions ---

  /// Replace the data set, keeping filters and sort, and pull the page
  /// index back into range.
  pub fn set_rows(&mut self, rows: Vec<T>) {
    self.rows = rows;
    self.recompute();
    self.page.clamp(self.processed.len());
  }

  /// Set a column's filter. Unknown or non-filterable columns are ignored.
  pub fn set_column_filter(&mut self, column_id: &str, filter: ColumnFilter) {
    match find_column(&self.columns, column_id) {
      Some((_, column)) if column.filterable => {}
      _ => {
        debug!(column_id, "Ignoring filter on unknown or non-filterable column");
        return;
      }
    }
    self.filter.set_column(column_id, filter);
    self.page.page_index = 0;
    self.recompute();
  }

  /// Set a column's filter from user text; range columns accept `min..max`.
  pub fn set_column_filter_text(&mut self, column_id: &str, text: &str) {
    let range = find_column(&self.columns, column_id)
      .map(|(_, c)| c.is_range())
      .unwrap_or(false);
    self.set_column_filter(column_id, ColumnFilter::parse(text, range));
  }

  pub fn set_global_filter(&mut self, text: impl Into<String>) {
    self.filter.set_global(text);
    self.page.page_index = 0;
    self.recompute();
  }

  pub fn clear_filters(&mut self) {
    self.filter.clear();
    self.page.page_index = 0;
    self.recompute();
  }

  /// Cycle the sort on a sortable column; other ids are ignored.
  pub fn toggle_sort(&mut self, column_id: &str) {
    match find_column(&self.columns, column_id) {
      Some((_, column)) if column.sortable => {}
      _ => return,
    }
    self.sort.toggle(column_id);
    self.recompute();
  }

  /// Go to a page, clamped into `[0, total_pages - 1]`.
  pub fn set_page(&mut self, index: usize) {
    self.page.page_index = index;
    self.page.clamp(self.processed.len());
  }

  pub fn next_page(&mut self) {
    self.set_page(self.page.page_index.saturating_add(1));
  }

  pub fn prev_page(&mut self) {
    self.set_page(self.page.page_index.saturating_sub(1));
  }

  /// Change the page size (minimum one) and return to the first page.
  pub fn set_page_size(&mut self, page_size: usize) {
    self.page = PageState::new(page_size);
  }

  /// Flip one column's visibility. Filter and sort state are untouched.
  pub fn toggle_column_visibility(&mut self, column_id: &str) {
    if let Some((i, _)) = find_column(&self.columns, column_id) {
      self.visible[i] = !self.visible[i];
    }
  }

  fn recompute(&mut self) {
    let mut processed = filter_indices(&self.rows, &self.columns, &self.filter);
    sort_indices(&mut processed, &self.rows, &self.columns, &self.sort);
    self.processed = processed;
  }

  // --- Reload status ---

  pub fn is_loading(&self) -> bool {
    self.loader.as_ref().map(|q| q.is_loading()).unwrap_or(false)
  }

  /// Error from the latest failed reload; the previous rows stay in place.
  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  /// Row total reported by the fetch envelope, if any.
  pub fn remote_count(&self) -> Option<usize> {
    self.remote_count
  }

  fn apply(&mut self, result: Result<Fetched<T>, String>) {
    match result {
      Ok(fetched) => {
        debug!(rows = fetched.rows.len(), "Reload applied");
        self.last_error = None;
        self.remote_count = fetched.count;
        self.set_rows(fetched.rows);
      }
      Err(e) => {
        warn!(error = %e, "Reload failed, keeping previous rows");
        self.last_error = Some(e);
      }
    }
  }
}

impl<T: Send + 'static> TableView<T> {
  /// Attach the fetch collaborator used by [`TableView::request_reload`].
  pub fn with_loader<F, Fut>(mut self, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Fetched<T>, String>> + Send + 'static,
  {
    self.loader = Some(Query::new(fetcher));
    self
  }

  /// Issue a reload. Returns the request's sequence number, or `None` when
  /// no loader is attached. View state is not touched until data arrives.
  pub fn request_reload(&mut self) -> Option<u64> {
    self.loader.as_mut().map(|q| q.refetch())
  }

  /// Apply the latest reload response if it has arrived. Returns whether
  /// anything changed.
  pub fn tick(&mut self) -> bool {
    let Some(result) = self.loader.as_mut().and_then(|q| q.poll()) else {
      return false;
    };
    self.apply(result);
    true
  }

  /// Wait for the outstanding reload (if any) and apply it.
  pub async fn settle(&mut self) -> bool {
    let Some(loader) = self.loader.as_mut() else {
      return false;
    };
    match loader.settle().await {
      Some(result) => {
        self.apply(result);
        true
      }
      None => false,
    }
  }
}

impl<T> std::fmt::Debug for TableView<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TableView")
      .field("columns", &self.columns)
      .field("visible", &self.visible)
      .field("rows", &self.rows.len())
      .field("filter", &self.filter)
      .field("sort", &self.sort)
      .field("page", &self.page)
      .field("processed", &self.processed.len())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sort::SortDirection;
  use chrono::Utc;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  #[derive(Debug, Clone, PartialEq)]
  struct Line {
    id: i64,
    name: &'static str,
    qty: i64,
  }

  fn line(id: i64, name: &'static str, qty: i64) -> Line {
    Line { id, name, qty }
  }

  fn rows() -> Vec<Line> {
    vec![line(1, "Bravo", 5), line(2, "alpha", 12), line(3, "Charlie", 5)]
  }

  fn columns() -> Vec<Column<Line>> {
    vec![
      Column::new("id", "#", |l: &Line| l.id).number().visible(false),
      Column::new("name", "name", |l: &Line| l.name),
      Column::new("qty", "qty", |l: &Line| l.qty)
        .number()
        .range_filter(),
      Column::new("memo", "memo", |l: &Line| l.name)
        .filterable(false)
        .sortable(false)
        .visible(false),
    ]
  }

  fn view() -> TableView<Line> {
    TableView::new(columns()).with_rows(rows())
  }

  fn page_ids(view: &TableView<Line>) -> Vec<i64> {
    view.result().visible_rows.iter().map(|l| l.id).collect()
  }

  fn all_ids(view: &TableView<Line>) -> Vec<i64> {
    view.processed_rows().map(|l| l.id).collect()
  }

  #[test]
  fn test_sort_by_name_ascending() {
    let mut view = view();
    view.toggle_sort("name");
    let names: Vec<&str> = view.processed_rows().map(|l| l.name).collect();
    assert_eq!(names, vec!["alpha", "Bravo", "Charlie"]);
  }

  #[test]
  fn test_sort_by_qty_keeps_ties_stable() {
    let mut view = view();
    view.toggle_sort("qty");
    assert_eq!(all_ids(&view), vec![1, 3, 2]);
  }

  #[test]
  fn test_sort_cycle_returns_to_original_order() {
    let mut view = view();
    view.toggle_sort("qty");
    view.toggle_sort("qty");
    assert_eq!(
      view.sort_state().direction_for("qty"),
      Some(SortDirection::Descending)
    );
    assert_eq!(all_ids(&view), vec![2, 1, 3]);

    view.toggle_sort("qty");
    assert_eq!(view.sort_state().column_id(), None);
    assert_eq!(all_ids(&view), vec![1, 2, 3]);
  }

  #[test]
  fn test_toggle_sort_on_unsortable_is_noop() {
    let mut view = view();
    view.toggle_sort("memo");
    view.toggle_sort("nope");
    assert_eq!(view.sort_state(), &SortState::none());
  }

  #[test]
  fn test_column_filter() {
    let mut view = view();
    view.set_column_filter_text("name", "al");
    assert_eq!(all_ids(&view), vec![2]);
    assert_eq!(view.total_filtered_count(), 1);
  }

  #[test]
  fn test_range_filter_from_text() {
    let mut view = view();
    view.set_column_filter_text("qty", "6..");
    assert_eq!(all_ids(&view), vec![2]);
  }

  #[test]
  fn test_filter_misuse_is_noop() {
    let mut view = view().with_page_size(1);
    view.set_page(2);
    view.set_column_filter_text("memo", "alpha");
    view.set_column_filter_text("missing", "x");
    assert!(view.filter_state().is_empty());
    assert_eq!(view.page_state().page_index, 2);
  }

  #[test]
  fn test_filter_resets_page() {
    let mut view = view().with_page_size(1);
    view.set_page(2);
    assert_eq!(view.page_state().page_index, 2);

    view.set_global_filter("a");
    assert_eq!(view.page_state().page_index, 0);
  }

  #[test]
  fn test_set_page_clamps() {
    let mut view = view().with_page_size(2);
    view.set_page(10);
    assert_eq!(view.page_state().page_index, 1);
    assert_eq!(page_ids(&view), vec![3]);
  }

  #[test]
  fn test_empty_result_has_one_page() {
    let mut view = view();
    view.set_global_filter("zzz");
    let result = view.result();
    assert_eq!(result.total_pages, 1);
    assert_eq!(result.total_filtered_count, 0);
    assert!(result.visible_rows.is_empty());
  }

  #[test]
  fn test_pages_cover_filtered_sorted_rows() {
    let mut view = TableView::new(columns())
      .with_rows((1..=11).map(|i| line(i, "x", i % 4)).collect())
      .with_page_size(3);
    view.toggle_sort("qty");

    let mut joined = Vec::new();
    for page in 0..view.total_pages() {
      view.set_page(page);
      joined.extend(page_ids(&view));
    }
    assert_eq!(joined, all_ids(&view));
  }

  #[test]
  fn test_new_rows_reclamp_page() {
    let mut view = view().with_page_size(1);
    view.set_page(2);
    view.set_rows(vec![line(9, "Delta", 1)]);
    assert_eq!(view.page_state().page_index, 0);
    assert_eq!(page_ids(&view), vec![9]);
  }

  #[test]
  fn test_visibility_toggle_leaves_filters() {
    let mut view = view();
    view.set_global_filter("bravo");
    view.toggle_column_visibility("name");

    assert!(!view.is_visible("name"));
    assert_eq!(all_ids(&view), vec![1]);
    let labels: Vec<&str> = view
      .visible_columns()
      .iter()
      .map(|c| c.label.as_str())
      .collect();
    assert_eq!(labels, vec!["qty"]);
  }

  #[test]
  fn test_export_covers_all_filtered_rows() {
    let view = view().with_page_size(1);
    let export = view.export("lines", Utc::now());
    let text = String::from_utf8(export.bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "\"name\",\"qty\"");
    assert_eq!(export.row_count, view.total_filtered_count());
    for line in &lines[1..] {
      assert_eq!(line.split(',').count(), view.visible_columns().len());
    }
  }

  #[test]
  fn test_export_follows_sort_and_filter() {
    let mut view = view();
    view.toggle_sort("name");
    view.set_column_filter_text("qty", "..10");
    let export = view.export("lines", Utc::now());
    let text = String::from_utf8(export.bytes).unwrap();
    assert_eq!(text, "\"name\",\"qty\"\n\"Bravo\",5\n\"Charlie\",5");
  }

  #[test]
  fn test_row_keys() {
    let view = view();
    assert_eq!(view.result().keys, vec!["1", "2", "3"]);

    let view = TableView::new(columns())
      .with_rows(rows())
      .with_key(|l: &Line| format!("L{}", l.id));
    assert_eq!(view.result().keys, vec!["L1", "L2", "L3"]);

    let view =
      TableView::new(vec![Column::new("name", "Name", |l: &Line| l.name)]).with_rows(rows());
    assert_eq!(view.result().keys, vec!["0", "1", "2"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_reload_last_response_wins() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut view = TableView::new(columns()).with_loader(move || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          tokio::time::sleep(Duration::from_millis(80)).await;
          Ok(Fetched::new(vec![line(1, "from A", 1)]))
        } else {
          tokio::time::sleep(Duration::from_millis(5)).await;
          Ok(Fetched::new(vec![line(2, "from B", 2)]))
        }
      }
    });

    view.request_reload();
    view.request_reload();
    assert!(view.is_loading());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(view.tick());
    assert_eq!(all_ids(&view), vec![2]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!view.tick());
    assert_eq!(all_ids(&view), vec![2]);
  }

  #[tokio::test]
  async fn test_failed_reload_keeps_rows() {
    let mut view = view().with_loader(|| async { Err::<Fetched<Line>, _>("boom".to_string()) });
    view.set_global_filter("a");

    view.request_reload();
    assert!(view.settle().await);

    assert_eq!(view.last_error(), Some("boom"));
    assert_eq!(view.rows().len(), 3);
    assert_eq!(view.filter_state().global(), "a");
  }

  #[tokio::test]
  async fn test_reload_keeps_view_state() {
    let mut view = view()
      .with_page_size(1)
      .with_loader(|| async {
        Ok(Fetched {
          rows: vec![line(7, "Echo", 3), line(8, "Foxtrot", 4)],
          count: Some(2),
        })
      });
    view.toggle_sort("name");
    view.set_page(2);

    view.request_reload();
    assert!(view.settle().await);

    assert_eq!(view.remote_count(), Some(2));
    assert_eq!(view.sort_state().column_id(), Some("name"));
    assert_eq!(view.page_state().page_index, 1);
    assert_eq!(page_ids(&view), vec![8]);
  }

  #[test]
  fn test_no_loader() {
    let mut view = view();
    assert_eq!(view.request_reload(), None);
    assert!(!view.tick());
    assert!(!view.is_loading());
  }

  #[test]
  fn test_status_for_rows_that_are_not_send() {
    use std::rc::Rc;

    let view = TableView::new(vec![Column::new("n", "n", |r: &Rc<i64>| **r).number()])
      .with_rows(vec![Rc::new(2), Rc::new(1)]);
    assert!(!view.is_loading());
    assert_eq!(view.last_error(), None);
    assert_eq!(view.total_filtered_count(), 2);
  }
}
