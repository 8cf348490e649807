//! Ledger of in-flight mutations.
//!
//! At most one mutation may be in flight per notification id, plus a single
//! mark-all flag. A second request for a busy target is rejected rather than
//! queued.

use std::collections::HashMap;
use std::fmt;

use super::types::NotificationId;

/// What a pending mutation is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingTarget {
  Item(NotificationId),
  MarkAll,
}

impl fmt::Display for PendingTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Item(id) => write!(f, "notification {}", id),
      Self::MarkAll => write!(f, "mark-all-read"),
    }
  }
}

/// A single-item read flag change awaiting server confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRead {
  /// Flag the caller asked for (already applied optimistically)
  pub target: bool,
  /// Flag before the optimistic apply; `None` if the item wasn't cached
  pub previous: Option<bool>,
  /// Whether the optimistic apply moved the unread counter. It doesn't when
  /// the counter was already clamped at zero.
  pub counter_moved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingOps {
  items: HashMap<NotificationId, PendingRead>,
  mark_all: bool,
}

impl PendingOps {
  /// Register a single-item mutation. Fails if the id is already busy.
  pub fn begin_item(&mut self, id: NotificationId, op: PendingRead) -> Result<(), PendingTarget> {
    if self.items.contains_key(&id) {
      return Err(PendingTarget::Item(id));
    }
    self.items.insert(id, op);
    Ok(())
  }

  /// Remove a single-item mutation, returning what was recorded for it.
  pub fn finish_item(&mut self, id: NotificationId) -> Option<PendingRead> {
    self.items.remove(&id)
  }

  pub fn get(&self, id: NotificationId) -> Option<&PendingRead> {
    self.items.get(&id)
  }

  pub fn get_mut(&mut self, id: NotificationId) -> Option<&mut PendingRead> {
    self.items.get_mut(&id)
  }

  pub fn contains(&self, id: NotificationId) -> bool {
    self.items.contains_key(&id)
  }

  pub fn begin_mark_all(&mut self) -> Result<(), PendingTarget> {
    if self.mark_all {
      return Err(PendingTarget::MarkAll);
    }
    self.mark_all = true;
    Ok(())
  }

  pub fn finish_mark_all(&mut self) {
    self.mark_all = false;
  }

  pub fn is_mark_all_pending(&self) -> bool {
    self.mark_all
  }

  /// Ids with an in-flight single-item mutation, in no particular order
  pub fn item_ids(&self) -> Vec<NotificationId> {
    self.items.keys().copied().collect()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty() && !self.mark_all
  }

  pub fn clear(&mut self) {
    self.items.clear();
    self.mark_all = false;
  }
}
