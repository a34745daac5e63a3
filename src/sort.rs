//! Sort engine: single-column, type-aware, stable.

use std::cmp::Ordering;

use crate::column::{find_column, Column};
use crate::value::Value;

/// Sort order specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
  Ascending,
  Descending,
}

/// The active sort column and its direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
  pub column_id: String,
  pub direction: SortDirection,
}

/// At most one active sort column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
  active: Option<SortKey>,
}

impl SortState {
  pub fn none() -> Self {
    Self::default()
  }

  pub fn ascending(column_id: impl Into<String>) -> Self {
    Self::by(column_id, SortDirection::Ascending)
  }

  pub fn descending(column_id: impl Into<String>) -> Self {
    Self::by(column_id, SortDirection::Descending)
  }

  fn by(column_id: impl Into<String>, direction: SortDirection) -> Self {
    Self {
      active: Some(SortKey {
        column_id: column_id.into(),
        direction,
      }),
    }
  }

  pub fn key(&self) -> Option<&SortKey> {
    self.active.as_ref()
  }

  pub fn column_id(&self) -> Option<&str> {
    self.active.as_ref().map(|k| k.column_id.as_str())
  }

  /// Direction for a given column, if it is the active one.
  pub fn direction_for(&self, column_id: &str) -> Option<SortDirection> {
    self
      .active
      .as_ref()
      .filter(|k| k.column_id == column_id)
      .map(|k| k.direction)
  }

  /// Advance the cycle for `column_id`: none → ascending → descending → none.
  ///
  /// Selecting a different column starts over at ascending on that column.
  pub fn toggle(&mut self, column_id: &str) {
    self.active = match self.active.take() {
      Some(key) if key.column_id == column_id => match key.direction {
        SortDirection::Ascending => Some(SortKey {
          direction: SortDirection::Descending,
          ..key
        }),
        SortDirection::Descending => None,
      },
      _ => Some(SortKey {
        column_id: column_id.to_string(),
        direction: SortDirection::Ascending,
      }),
    };
  }

  pub fn clear(&mut self) {
    self.active = None;
  }
}

/// Resolve the sort column, ignoring unknown or non-sortable ids.
fn active_column<'c, T>(
  columns: &'c [Column<T>],
  state: &SortState,
) -> Option<(&'c Column<T>, SortDirection)> {
  let key = state.key()?;
  let (_, column) = find_column(columns, &key.column_id)?;
  column.sortable.then_some((column, key.direction))
}

fn directed(cmp: Ordering, direction: SortDirection) -> Ordering {
  match direction {
    SortDirection::Ascending => cmp,
    SortDirection::Descending => cmp.reverse(),
  }
}

/// Reorder `indices` (positions into `rows`) by the active sort.
pub fn sort_indices<T>(
  indices: &mut Vec<usize>,
  rows: &[T],
  columns: &[Column<T>],
  state: &SortState,
) {
  let Some((column, direction)) = active_column(columns, state) else {
    return;
  };

  // Extract keys once; the merge below indexes into this table.
  let keys: Vec<Value> = indices.iter().map(|&i| column.value(&rows[i])).collect();
  let mut order: Vec<usize> = (0..indices.len()).collect();
  stable_sort_by(&mut order, |&a, &b| directed(keys[a].compare(&keys[b]), direction));

  let sorted: Vec<usize> = order.into_iter().map(|pos| indices[pos]).collect();
  *indices = sorted;
}

/// Sort borrowed rows by the active sort, returning a new ordering.
pub fn sort_rows<'a, T>(rows: &[&'a T], columns: &[Column<T>], state: &SortState) -> Vec<&'a T> {
  let Some((column, direction)) = active_column(columns, state) else {
    return rows.to_vec();
  };

  let keys: Vec<Value> = rows.iter().map(|row| column.value(row)).collect();
  let mut order: Vec<usize> = (0..rows.len()).collect();
  stable_sort_by(&mut order, |&a, &b| directed(keys[a].compare(&keys[b]), direction));

  order.into_iter().map(|pos| rows[pos]).collect()
}

/// Bottom-up merge sort that keeps equal elements in input order.
///
/// The value comparator treats mismatched types as equal and so is not a
/// total order; `slice::sort_by` may panic on such comparators, this never does.
fn stable_sort_by<F>(items: &mut Vec<usize>, mut cmp: F)
where
  F: FnMut(&usize, &usize) -> Ordering,
{
  let len = items.len();
  if len < 2 {
    return;
  }

  let mut buf = items.clone();
  let mut width = 1;
  while width < len {
    let mut start = 0;
    while start < len {
      let mid = (start + width).min(len);
      let end = (start + 2 * width).min(len);
      merge(&items[start..mid], &items[mid..end], &mut buf[start..end], &mut cmp);
      start = end;
    }
    std::mem::swap(items, &mut buf);
    width *= 2;
  }
}

fn merge<F>(left: &[usize], right: &[usize], out: &mut [usize], cmp: &mut F)
where
  F: FnMut(&usize, &usize) -> Ordering,
{
  let (mut i, mut j) = (0, 0);
  for slot in out.iter_mut() {
    // Right side wins only when strictly smaller.
    let take_right =
      j < right.len() && (i >= left.len() || cmp(&right[j], &left[i]) == Ordering::Less);
    if take_right {
      *slot = right[j];
      j += 1;
    } else {
      *slot = left[i];
      i += 1;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, PartialEq)]
  struct Line {
    id: i64,
    name: &'static str,
    qty: i64,
  }

  fn rows() -> Vec<Line> {
    vec![
      Line {
        id: 1,
        name: "Bravo",
        qty: 5,
      },
      Line {
        id: 2,
        name: "alpha",
        qty: 12,
      },
      Line {
        id: 3,
        name: "Charlie",
        qty: 5,
      },
    ]
  }

  fn columns() -> Vec<Column<Line>> {
    vec![
      Column::new("id", "#", |l: &Line| l.id).number(),
      Column::new("name", "Name", |l: &Line| l.name),
      Column::new("qty", "Qty", |l: &Line| l.qty).number(),
      Column::new("locked", "Locked", |l: &Line| l.name).sortable(false),
    ]
  }

  fn sorted_ids(state: &SortState) -> Vec<i64> {
    let rows = rows();
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    sort_indices(&mut indices, &rows, &columns(), state);
    indices.into_iter().map(|i| rows[i].id).collect()
  }

  #[test]
  fn test_string_sort_is_case_insensitive() {
    let rows = rows();
    let refs: Vec<&Line> = rows.iter().collect();
    let sorted = sort_rows(&refs, &columns(), &SortState::ascending("name"));
    let names: Vec<&str> = sorted.iter().map(|l| l.name).collect();
    assert_eq!(names, vec!["alpha", "Bravo", "Charlie"]);
  }

  #[test]
  fn test_numeric_sort_is_stable_both_directions() {
    assert_eq!(sorted_ids(&SortState::ascending("qty")), vec![1, 3, 2]);
    assert_eq!(sorted_ids(&SortState::descending("qty")), vec![2, 1, 3]);
  }

  #[test]
  fn test_no_sort_keeps_order() {
    assert_eq!(sorted_ids(&SortState::none()), vec![1, 2, 3]);
    assert_eq!(sorted_ids(&SortState::ascending("missing")), vec![1, 2, 3]);
    assert_eq!(sorted_ids(&SortState::ascending("locked")), vec![1, 2, 3]);
  }

  #[test]
  fn test_mixed_values_do_not_panic() {
    let values = vec![
      Value::Number(3.0),
      Value::from("x"),
      Value::Null,
      Value::Number(1.0),
      Value::Bool(true),
      Value::Number(2.0),
      Value::from("a"),
    ];
    let columns = vec![Column::new("v", "V", |v: &Value| v.clone())];
    let refs: Vec<&Value> = values.iter().collect();

    let sorted = sort_rows(&refs, &columns, &SortState::ascending("v"));
    assert_eq!(sorted.len(), values.len());
    for v in &values {
      assert!(sorted.contains(&v));
    }
  }

  #[test]
  fn test_sort_never_adds_or_removes_rows() {
    let rows = rows();
    let mut indices = vec![2, 0];
    sort_indices(&mut indices, &rows, &columns(), &SortState::ascending("name"));
    assert_eq!(indices, vec![0, 2]);
  }

  #[test]
  fn test_stable_sort_large_input() {
    // 0..100 keyed by i % 7; ties must keep ascending original position
    let mut items: Vec<usize> = (0..100).collect();
    stable_sort_by(&mut items, |a, b| (a % 7).cmp(&(b % 7)));
    for pair in items.windows(2) {
      let (a, b) = (pair[0], pair[1]);
      assert!(a % 7 < b % 7 || (a % 7 == b % 7 && a < b));
    }
  }

  #[test]
  fn test_toggle_cycle() {
    let mut state = SortState::none();
    state.toggle("name");
    assert_eq!(state.direction_for("name"), Some(SortDirection::Ascending));
    state.toggle("name");
    assert_eq!(state.direction_for("name"), Some(SortDirection::Descending));
    state.toggle("name");
    assert_eq!(state.column_id(), None);
  }

  #[test]
  fn test_toggle_other_column_restarts() {
    let mut state = SortState::descending("name");
    state.toggle("qty");
    assert_eq!(state.column_id(), Some("qty"));
    assert_eq!(state.direction_for("qty"), Some(SortDirection::Ascending));
    assert_eq!(state.direction_for("name"), None);
  }
}
