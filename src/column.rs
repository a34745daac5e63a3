//! Column descriptors: identity, label, value extraction and capabilities.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Pure function extracting a column's raw value from a row.
pub type Accessor<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// Display-only formatter for a row's cell.
pub type Renderer<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Declared semantic type of a column
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
  #[default]
  String,
  Number,
  Date,
  Boolean,
}

/// Static description of one column.
///
/// `visible` is the initial visibility; at runtime the table view keeps its
/// own visibility vector and never mutates the descriptor.
pub struct Column<T> {
  pub id: String,
  pub label: String,
  pub semantic_type: SemanticType,
  pub filterable: bool,
  pub sortable: bool,
  pub visible: bool,
  /// Two-sided min/max filtering instead of substring matching (numbers only)
  pub range: bool,
  accessor: Accessor<T>,
  render: Option<Renderer<T>>,
  export_value: Option<Accessor<T>>,
}

impl<T> Column<T> {
  /// Create a filterable, sortable, visible string column.
  pub fn new<F, V>(id: impl Into<String>, label: impl Into<String>, accessor: F) -> Self
  where
    F: Fn(&T) -> V + Send + Sync + 'static,
    V: Into<Value>,
  {
    Self {
      id: id.into(),
      label: label.into(),
      semantic_type: SemanticType::String,
      filterable: true,
      sortable: true,
      visible: true,
      range: false,
      accessor: Arc::new(move |row| accessor(row).into()),
      render: None,
      export_value: None,
    }
  }

  pub fn with_type(mut self, semantic_type: SemanticType) -> Self {
    self.semantic_type = semantic_type;
    self
  }

  pub fn number(self) -> Self {
    self.with_type(SemanticType::Number)
  }

  pub fn date(self) -> Self {
    self.with_type(SemanticType::Date)
  }

  pub fn boolean(self) -> Self {
    self.with_type(SemanticType::Boolean)
  }

  pub fn filterable(mut self, filterable: bool) -> Self {
    self.filterable = filterable;
    self
  }

  pub fn sortable(mut self, sortable: bool) -> Self {
    self.sortable = sortable;
    self
  }

  pub fn visible(mut self, visible: bool) -> Self {
    self.visible = visible;
    self
  }

  /// Mark a numeric column as min/max filterable.
  pub fn range_filter(mut self) -> Self {
    self.range = true;
    self
  }

  /// Custom display formatter. Never consulted by filtering, sorting or export.
  pub fn with_render<F>(mut self, render: F) -> Self
  where
    F: Fn(&T) -> String + Send + Sync + 'static,
  {
    self.render = Some(Arc::new(render));
    self
  }

  /// Value written to CSV exports in place of the accessor's value.
  pub fn with_export_value<F, V>(mut self, export: F) -> Self
  where
    F: Fn(&T) -> V + Send + Sync + 'static,
    V: Into<Value>,
  {
    self.export_value = Some(Arc::new(move |row| export(row).into()));
    self
  }

  /// Raw value for filtering and sorting.
  pub fn value(&self, row: &T) -> Value {
    (self.accessor)(row)
  }

  /// Text shown in the rendered table.
  pub fn display(&self, row: &T) -> String {
    match &self.render {
      Some(render) => render(row),
      None => self.value(row).to_string(),
    }
  }

  pub fn export(&self, row: &T) -> Value {
    match &self.export_value {
      Some(export) => export(row),
      None => self.value(row),
    }
  }

  pub fn is_range(&self) -> bool {
    self.range && self.semantic_type == SemanticType::Number
  }
}

impl<T> Clone for Column<T> {
  fn clone(&self) -> Self {
    Self {
      id: self.id.clone(),
      label: self.label.clone(),
      semantic_type: self.semantic_type,
      filterable: self.filterable,
      sortable: self.sortable,
      visible: self.visible,
      range: self.range,
      accessor: Arc::clone(&self.accessor),
      render: self.render.clone(),
      export_value: self.export_value.clone(),
    }
  }
}

impl<T> fmt::Debug for Column<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Column")
      .field("id", &self.id)
      .field("label", &self.label)
      .field("semantic_type", &self.semantic_type)
      .field("filterable", &self.filterable)
      .field("sortable", &self.sortable)
      .field("visible", &self.visible)
      .field("range", &self.range)
      .finish_non_exhaustive()
  }
}

/// Find a column and its position by id.
pub fn find_column<'a, T>(columns: &'a [Column<T>], id: &str) -> Option<(usize, &'a Column<T>)> {
  columns.iter().enumerate().find(|(_, c)| c.id == id)
}
