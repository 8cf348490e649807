//! Transport seam between the sync engine and the notification API.
//!
//! The engine only sees the `Transport` trait. `HttpTransport` is the REST
//! implementation used by the CLI; tests use an in-memory fake.

pub mod api_types;
pub mod client;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use std::sync::Arc;

use crate::inbox::{FetchQuery, Notification, NotificationId, NotificationPage};

pub use client::HttpTransport;

/// Typed failure returned by a transport call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
  #[error("authentication required")]
  Unauthorized,

  #[error("permission denied")]
  Forbidden,

  #[error("not found")]
  NotFound,

  #[error("HTTP {status}: {message}")]
  Server { status: u16, message: String },

  #[error("network: {0}")]
  Network(String),

  #[error("decode: {0}")]
  Decode(String),

  /// The request could not be built, e.g. a bad endpoint URL
  #[error("invalid request: {0}")]
  InvalidRequest(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Request/response contract of the notification API.
#[async_trait]
pub trait Transport: Send + Sync {
  /// List one page of notifications together with the server's unread count.
  async fn list_notifications(&self, query: FetchQuery) -> TransportResult<NotificationPage>;

  /// Set the read flag on one notification and return the canonical record.
  async fn set_read_flag(&self, id: NotificationId, is_read: bool)
    -> TransportResult<Notification>;

  /// Mark every notification of the current user as read.
  async fn mark_all_read(&self) -> TransportResult<()>;

  /// Current unread count.
  async fn unread_count(&self) -> TransportResult<u32>;
}

pub type DynTransport = Arc<dyn Transport>;
