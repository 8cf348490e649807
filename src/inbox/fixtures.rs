//! Builders shared by unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::types::{
  EntityKind, Notification, NotificationId, NotificationKind, NotificationPage, Pagination,
  RelatedEntity,
};

/// Fixed reference instant so time-based views are deterministic
pub fn base_time() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
}

/// A task update notification; higher ids are newer (one minute apart).
pub fn notification(id: u64, is_read: bool) -> Notification {
  Notification {
    id: NotificationId(id),
    content: format!("Notification {}", id),
    kind: NotificationKind::TaskUpdated,
    timestamp: base_time() - Duration::hours(1) + Duration::minutes(id as i64),
    is_read,
    related: Some(RelatedEntity {
      kind: EntityKind::Task,
      id: 100 + id,
      title: None,
    }),
  }
}

pub fn page_of(items: Vec<Notification>, unread_count: u32) -> NotificationPage {
  NotificationPage {
    pagination: Pagination {
      total_records: items.len() as u64,
      current_page: 1,
      total_pages: 1,
      next_page: None,
      prev_page: None,
    },
    items,
    unread_count,
  }
}
