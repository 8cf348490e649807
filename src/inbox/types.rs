use chrono::{DateTime, Utc};
use std::fmt;

/// Server-assigned notification identifier, stable across fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<u64> for NotificationId {
  fn from(id: u64) -> Self {
    Self(id)
  }
}

/// Closed set of notification categories produced by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotificationKind {
  VolunteerApplied,
  VolunteerAccepted,
  VolunteerRejected,
  TaskUpdated,
  TaskCompleted,
  TaskCancelled,
  CommentAdded,
  ReviewReceived,
  System,
}

impl NotificationKind {
  /// Parse the wire code (e.g. `TASK_UPDATED`). Unknown codes map to `System`.
  pub fn from_code(code: &str) -> Self {
    match code {
      "VOLUNTEER_APPLIED" => Self::VolunteerApplied,
      "VOLUNTEER_ACCEPTED" => Self::VolunteerAccepted,
      "VOLUNTEER_REJECTED" => Self::VolunteerRejected,
      "TASK_UPDATED" => Self::TaskUpdated,
      "TASK_COMPLETED" => Self::TaskCompleted,
      "TASK_CANCELLED" => Self::TaskCancelled,
      "COMMENT_ADDED" => Self::CommentAdded,
      "REVIEW_RECEIVED" => Self::ReviewReceived,
      _ => Self::System,
    }
  }

  /// Human-readable label used for grouping
  pub fn label(&self) -> &'static str {
    match self {
      Self::VolunteerApplied => "Volunteer Applied",
      Self::VolunteerAccepted => "Volunteer Accepted",
      Self::VolunteerRejected => "Volunteer Rejected",
      Self::TaskUpdated => "Task Updated",
      Self::TaskCompleted => "Task Completed",
      Self::TaskCancelled => "Task Cancelled",
      Self::CommentAdded => "Comment Added",
      Self::ReviewReceived => "Review Received",
      Self::System => "System",
    }
  }

  /// Relative importance, higher is more important
  pub fn priority(&self) -> u8 {
    match self {
      Self::VolunteerApplied | Self::VolunteerAccepted => 3,
      Self::TaskCompleted | Self::TaskCancelled => 3,
      Self::VolunteerRejected | Self::TaskUpdated | Self::ReviewReceived => 2,
      Self::CommentAdded | Self::System => 1,
    }
  }
}

/// Kind of entity a notification may point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
  Task,
}

/// Weak reference to the entity a notification is about. Only used to build
/// deep links; never resolved by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedEntity {
  pub kind: EntityKind,
  pub id: u64,
  pub title: Option<String>,
}

/// A single inbox entry. Everything except `is_read` is server truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub id: NotificationId,
  pub content: String,
  pub kind: NotificationKind,
  pub timestamp: DateTime<Utc>,
  pub is_read: bool,
  pub related: Option<RelatedEntity>,
}

/// Page metadata returned alongside a notification listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
  pub total_records: u64,
  pub current_page: u32,
  pub total_pages: u32,
  pub next_page: Option<u32>,
  pub prev_page: Option<u32>,
}

/// Parameters for a listing request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchQuery {
  pub unread_only: Option<bool>,
  pub page: Option<u32>,
}

impl FetchQuery {
  pub fn page(page: u32) -> Self {
    Self {
      page: Some(page),
      ..Self::default()
    }
  }

  pub fn unread() -> Self {
    Self {
      unread_only: Some(true),
      ..Self::default()
    }
  }
}

/// One listing response: the page of items plus the server's unread count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationPage {
  pub items: Vec<Notification>,
  pub unread_count: u32,
  pub pagination: Pagination,
}
