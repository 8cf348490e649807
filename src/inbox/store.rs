//! In-memory inbox state and its pure transitions.
//!
//! Nothing in here fails or awaits. Validation and sequencing live in the
//! sync engine, which is the only caller that mutates an `InboxState`.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use super::pending::PendingOps;
use super::types::{FetchQuery, Notification, NotificationId, Pagination};

/// Cached view of the server-owned inbox
#[derive(Debug, Clone, Default)]
pub struct InboxState {
  /// Newest first, unique by id
  items: Vec<Notification>,
  /// Position of each id in `items`
  index: HashMap<NotificationId, usize>,
  /// Server-reported count, adjusted locally by optimistic changes
  unread_count: u32,
  pagination: Option<Pagination>,
  last_synced_at: Option<DateTime<Utc>>,
  /// Params of the last listing applied via `record_sync`
  last_query: Option<FetchQuery>,
  pending: PendingOps,
}

impl InboxState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn items(&self) -> &[Notification] {
    &self.items
  }

  pub fn get(&self, id: NotificationId) -> Option<&Notification> {
    self.index.get(&id).map(|&pos| &self.items[pos])
  }

  pub fn unread_count(&self) -> u32 {
    self.unread_count
  }

  pub fn pagination(&self) -> Option<&Pagination> {
    self.pagination.as_ref()
  }

  pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
    self.last_synced_at
  }

  pub fn last_query(&self) -> Option<FetchQuery> {
    self.last_query
  }

  pub fn pending(&self) -> &PendingOps {
    &self.pending
  }

  pub fn pending_mut(&mut self) -> &mut PendingOps {
    &mut self.pending
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Replace the cached page wholesale with a server listing.
  ///
  /// Duplicate ids keep their first occurrence; server order is preserved.
  pub fn replace_all(
    &mut self,
    items: Vec<Notification>,
    unread_count: u32,
    pagination: Pagination,
  ) {
    let mut seen = HashSet::with_capacity(items.len());
    self.items = items.into_iter().filter(|n| seen.insert(n.id)).collect();
    self.rebuild_index();
    self.unread_count = unread_count;
    self.pagination = Some(pagination);
  }

  /// Remember when and with which params the cache was last filled.
  pub fn record_sync(&mut self, query: FetchQuery, at: DateTime<Utc>) {
    self.last_query = Some(query);
    self.last_synced_at = Some(at);
  }

  /// Set the read flag on a cached item.
  ///
  /// Absent ids are ignored. The counter only moves when the flag actually
  /// changes. Returns whether it changed.
  pub fn apply_read_flag(&mut self, id: NotificationId, is_read: bool) -> bool {
    self.apply_read_flag_counted(id, is_read).is_some()
  }

  /// `apply_read_flag` that also reports whether the counter moved.
  ///
  /// `None` when the flag was left alone, `Some(false)` when the flag changed
  /// but the counter was already at zero.
  pub fn apply_read_flag_counted(&mut self, id: NotificationId, is_read: bool) -> Option<bool> {
    let &pos = self.index.get(&id)?;
    let item = &mut self.items[pos];
    if item.is_read == is_read {
      return None;
    }
    item.is_read = is_read;
    Some(self.adjust_unread(is_read))
  }

  /// Put back a flag changed by an optimistic apply. The counter is reversed
  /// only if that apply moved it. Returns whether the flag changed.
  pub fn revert_read_flag(&mut self, id: NotificationId, previous: bool, counter_moved: bool) -> bool {
    let Some(&pos) = self.index.get(&id) else {
      return false;
    };
    let item = &mut self.items[pos];
    if item.is_read == previous {
      return false;
    }
    item.is_read = previous;
    if counter_moved {
      self.adjust_unread(previous);
    }
    true
  }

  /// Mark every cached item read and zero the counter.
  pub fn mark_all_read(&mut self) {
    for item in &mut self.items {
      item.is_read = true;
    }
    self.unread_count = 0;
  }

  /// Replace the cached record for `notification.id` with the server's copy.
  ///
  /// Ignored if the id is not cached. Returns whether a record was replaced.
  pub fn upsert_one(&mut self, notification: Notification) -> bool {
    let Some(&pos) = self.index.get(&notification.id) else {
      return false;
    };
    let was_read = self.items[pos].is_read;
    let now_read = notification.is_read;
    self.items[pos] = notification;
    if was_read != now_read {
      self.adjust_unread(now_read);
    }
    true
  }

  /// Re-apply in-flight optimistic changes on top of a freshly replaced page.
  ///
  /// The server value each pending item arrived with becomes its new rollback
  /// value, so a later failure restores what the server last said.
  pub fn reapply_pending(&mut self) {
    if self.pending.is_mark_all_pending() {
      self.mark_all_read();
    }
    for id in self.pending.item_ids() {
      let Some(current) = self.get(id).map(|n| n.is_read) else {
        continue;
      };
      let Some(target) = self.pending.get(id).map(|op| op.target) else {
        continue;
      };
      let counter_moved = self.apply_read_flag_counted(id, target).unwrap_or(false);
      if let Some(op) = self.pending.get_mut(id) {
        op.previous = Some(current);
        op.counter_moved = counter_moved;
      }
    }
  }

  /// Overwrite the counter with a server-reported value.
  pub fn set_unread_count(&mut self, count: u32) {
    self.unread_count = count;
  }

  /// Drop everything, including pending bookkeeping.
  pub fn clear(&mut self) {
    *self = Self::default();
  }

  /// Returns whether the counter actually moved.
  fn adjust_unread(&mut self, became_read: bool) -> bool {
    let before = self.unread_count;
    self.unread_count = if became_read {
      before.saturating_sub(1)
    } else {
      before.saturating_add(1)
    };
    self.unread_count != before
  }

  fn rebuild_index(&mut self) {
    self.index = self
      .items
      .iter()
      .enumerate()
      .map(|(pos, n)| (n.id, pos))
      .collect();
  }
}
