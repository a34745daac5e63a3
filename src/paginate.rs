//! Page window math over an already filtered and sorted sequence.

use std::ops::Range;

pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Zero-based page index and page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
  pub page_index: usize,
  pub page_size: usize,
}

impl Default for PageState {
  fn default() -> Self {
    Self::new(DEFAULT_PAGE_SIZE)
  }
}

impl PageState {
  /// First page at the given size. A size of zero is treated as one.
  pub fn new(page_size: usize) -> Self {
    Self {
      page_index: 0,
      page_size: page_size.max(1),
    }
  }

  /// Row positions covered by this page, clamped to `count`.
  ///
  /// A page past the end yields an empty range rather than an error.
  pub fn bounds(&self, count: usize) -> Range<usize> {
    let size = self.page_size.max(1);
    let start = self.page_index.saturating_mul(size).min(count);
    let end = start.saturating_add(size).min(count);
    start..end
  }

  /// The slice of `items` visible on this page.
  pub fn slice<'s, E>(&self, items: &'s [E]) -> &'s [E] {
    &items[self.bounds(items.len())]
  }

  /// Move `page_index` back into `[0, total_pages - 1]` for `count` rows.
  pub fn clamp(&mut self, count: usize) {
    let last = total_pages(count, self.page_size) - 1;
    self.page_index = self.page_index.min(last);
  }
}

/// `ceil(count / page_size)`, never less than one: an empty result still
/// has one empty page.
pub fn total_pages(count: usize, page_size: usize) -> usize {
  count.div_ceil(page_size.max(1)).max(1)
}
