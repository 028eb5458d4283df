//! Offset pagination.

use serde::{Deserialize, Serialize};

/// Default number of rows returned when a caller does not pick a limit.
pub const DEFAULT_LIMIT: u32 = 50;

/// A window into an id-ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
  pub offset: u64,
  pub limit:  u32,
}

impl PageRequest {
  pub fn new(offset: u64, limit: u32) -> Self { Self { offset, limit } }
}

impl Default for PageRequest {
  fn default() -> Self { Self { offset: 0, limit: DEFAULT_LIMIT } }
}

/// One page of results plus the number of live rows across all pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:  Vec<T>,
  pub total:  u64,
  pub offset: u64,
  pub limit:  u32,
}

impl<T> Page<T> {
  /// Whether rows remain beyond this page.
  pub fn has_more(&self) -> bool {
    self.offset.saturating_add(self.items.len() as u64) < self.total
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn has_more_accounts_for_offset() {
    let page = Page { items: vec![1, 2], total: 5, offset: 2, limit: 2 };
    assert!(page.has_more());

    let last = Page { items: vec![5], total: 5, offset: 4, limit: 2 };
    assert!(!last.has_more());
  }
}
