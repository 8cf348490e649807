//! Serde-deserializable types matching the notification API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on what the inbox needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inbox::{
  EntityKind, Notification, NotificationId, NotificationKind, NotificationPage, Pagination,
  RelatedEntity,
};

// ============================================================================
// Notification record
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiRelatedTask {
  pub id: u64,
  #[serde(default)]
  pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiNotification {
  pub id: u64,
  #[serde(default)]
  pub content: String,
  pub timestamp: DateTime<Utc>,
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub is_read: bool,
  #[serde(default)]
  pub related_task: Option<ApiRelatedTask>,
}

impl ApiNotification {
  pub fn into_notification(self) -> Notification {
    Notification {
      id: NotificationId(self.id),
      content: self.content,
      kind: NotificationKind::from_code(&self.kind),
      timestamp: self.timestamp,
      is_read: self.is_read,
      related: self.related_task.map(|task| RelatedEntity {
        kind: EntityKind::Task,
        id: task.id,
        title: task.title,
      }),
    }
  }
}

// ============================================================================
// Listing endpoint response
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiPagination {
  #[serde(default)]
  pub total_records: u64,
  #[serde(default)]
  pub current_page: u32,
  #[serde(default)]
  pub total_pages: u32,
  pub next_page: Option<u32>,
  pub prev_page: Option<u32>,
}

impl From<ApiPagination> for Pagination {
  fn from(p: ApiPagination) -> Self {
    Pagination {
      total_records: p.total_records,
      current_page: p.current_page,
      total_pages: p.total_pages,
      next_page: p.next_page,
      prev_page: p.prev_page,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiListData {
  #[serde(default)]
  pub notifications: Vec<ApiNotification>,
  #[serde(default)]
  pub pagination: ApiPagination,
  #[serde(default)]
  pub unread_count: u32,
}

#[derive(Debug, Deserialize)]
pub struct ApiListResponse {
  #[serde(default)]
  pub status: String,
  pub data: ApiListData,
}

impl ApiListResponse {
  pub fn into_page(self) -> NotificationPage {
    NotificationPage {
      items: self
        .data
        .notifications
        .into_iter()
        .map(ApiNotification::into_notification)
        .collect(),
      unread_count: self.data.unread_count,
      pagination: self.data.pagination.into(),
    }
  }
}

// ============================================================================
// Single notification update
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiReadFlagPayload {
  pub is_read: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApiSingleResponse {
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub message: String,
  pub data: ApiNotification,
}

// ============================================================================
// Error body (best effort)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub detail: Option<String>,
}

impl ApiErrorBody {
  pub fn message(self) -> Option<String> {
    self.message.or(self.detail)
  }
}
