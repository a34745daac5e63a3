//! Filter engine: per-column and global predicates over column accessors.
//!
//! Filtering is a pure function of rows, schema and [`FilterState`]; it
//! preserves input order and is idempotent.

use std::collections::BTreeMap;
use std::fmt;

use crate::column::{find_column, Column};

/// Filter applied to a single column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilter {
  /// Case-insensitive substring match on the value's string form
  Text(String),
  /// Inclusive numeric bounds; an absent bound is unconstrained
  Range { min: Option<f64>, max: Option<f64> },
}

impl ColumnFilter {
  /// An empty filter places no constraint on the column.
  pub fn is_empty(&self) -> bool {
    match self {
      ColumnFilter::Text(text) => text.is_empty(),
      ColumnFilter::Range { min, max } => min.is_none() && max.is_none(),
    }
  }

  /// Parse user input for a column.
  ///
  /// Range columns accept `min..max`, `min..` or `..max`; anything without
  /// `..` (or on a non-range column) is a text filter. Unparseable bounds
  /// are dropped.
  pub fn parse(input: &str, range: bool) -> Self {
    if range {
      if let Some((min, max)) = input.split_once("..") {
        return ColumnFilter::Range {
          min: parse_bound(min),
          max: parse_bound(max),
        };
      }
    }
    ColumnFilter::Text(input.to_string())
  }
}

/// Renders back to the form [`ColumnFilter::parse`] accepts.
impl fmt::Display for ColumnFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ColumnFilter::Text(text) => f.write_str(text),
      ColumnFilter::Range { min, max } => {
        if let Some(min) = min {
          write!(f, "{}", min)?;
        }
        f.write_str("..")?;
        if let Some(max) = max {
          write!(f, "{}", max)?;
        }
        Ok(())
      }
    }
  }
}

fn parse_bound(s: &str) -> Option<f64> {
  let s = s.trim();
  if s.is_empty() {
    None
  } else {
    s.parse().ok()
  }
}

/// Per-column filters plus one global search string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
  per_column: BTreeMap<String, ColumnFilter>,
  global: String,
}

impl FilterState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn column(&self, column_id: &str) -> Option<&ColumnFilter> {
    self.per_column.get(column_id)
  }

  /// Set or clear (when empty) the filter for a column.
  pub fn set_column(&mut self, column_id: impl Into<String>, filter: ColumnFilter) {
    let column_id = column_id.into();
    if filter.is_empty() {
      self.per_column.remove(&column_id);
    } else {
      self.per_column.insert(column_id, filter);
    }
  }

  pub fn global(&self) -> &str {
    &self.global
  }

  pub fn set_global(&mut self, text: impl Into<String>) {
    self.global = text.into();
  }

  pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnFilter)> {
    self.per_column.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn is_empty(&self) -> bool {
    self.per_column.is_empty() && self.global.is_empty()
  }

  pub fn clear(&mut self) {
    self.per_column.clear();
    self.global.clear();
  }
}

/// A column predicate with its needle already lower-cased.
enum Predicate<'c, T> {
  Contains(&'c Column<T>, String),
  Between(&'c Column<T>, Option<f64>, Option<f64>),
}

impl<T> Predicate<'_, T> {
  fn test(&self, row: &T) -> bool {
    match self {
      Predicate::Contains(column, needle) => column.value(row).search_text().contains(needle),
      Predicate::Between(column, min, max) => match column.value(row).as_f64() {
        Some(n) => min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m),
        None => false,
      },
    }
  }
}

/// Compiled form of a [`FilterState`] against a schema.
///
/// Entries for unknown or non-filterable columns, and range filters on
/// columns that are not range-filterable, contribute nothing.
pub struct RowFilter<'c, T> {
  predicates: Vec<Predicate<'c, T>>,
  global: Option<String>,
  columns: &'c [Column<T>],
}

impl<'c, T> RowFilter<'c, T> {
  pub fn new(columns: &'c [Column<T>], state: &FilterState) -> Self {
    let predicates = state
      .columns()
      .filter_map(|(id, filter)| {
        let (_, column) = find_column(columns, id)?;
        if !column.filterable || filter.is_empty() {
          return None;
        }
        match filter {
          ColumnFilter::Text(text) => Some(Predicate::Contains(column, text.to_lowercase())),
          ColumnFilter::Range { min, max } if column.is_range() => {
            Some(Predicate::Between(column, *min, *max))
          }
          ColumnFilter::Range { .. } => None,
        }
      })
      .collect();

    let global = Some(state.global().to_lowercase()).filter(|g| !g.is_empty());

    Self {
      predicates,
      global,
      columns,
    }
  }

  /// True when the row passes every per-column predicate and the global search.
  pub fn matches(&self, row: &T) -> bool {
    self.predicates.iter().all(|p| p.test(row)) && self.matches_global(row)
  }

  /// Global search scans every column, filterable or not.
  fn matches_global(&self, row: &T) -> bool {
    match &self.global {
      None => true,
      Some(needle) => self
        .columns
        .iter()
        .any(|c| c.value(row).search_text().contains(needle.as_str())),
    }
  }

  pub fn is_noop(&self) -> bool {
    self.predicates.is_empty() && self.global.is_none()
  }
}

/// Filter rows, preserving their order.
pub fn filter_rows<'a, T: 'a>(
  rows: impl IntoIterator<Item = &'a T>,
  columns: &[Column<T>],
  state: &FilterState,
) -> Vec<&'a T> {
  let filter = RowFilter::new(columns, state);
  rows.into_iter().filter(|row| filter.matches(row)).collect()
}

/// Positions of the rows that pass the filter, in ascending order.
pub fn filter_indices<T>(rows: &[T], columns: &[Column<T>], state: &FilterState) -> Vec<usize> {
  let filter = RowFilter::new(columns, state);
  if filter.is_noop() {
    return (0..rows.len()).collect();
  }
  rows
    .iter()
    .enumerate()
    .filter(|(_, row)| filter.matches(row))
    .map(|(i, _)| i)
    .collect()
}
