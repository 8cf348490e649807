//! Notification sync engine.
//!
//! This module keeps a locally cached, eventually consistent copy of the
//! server inbox:
//! - Full fetches replace the cached page; unread-count refreshes touch only
//!   the counter
//! - Read-flag changes apply optimistically and roll back on failure
//! - Mark-all-read reconciles by re-fetching when it fails
//! - An optional poller refreshes in the background, one request at a time

mod engine;
mod error;
mod optimistic;
mod poller;

pub use engine::SyncEngine;
pub use error::SyncError;
pub use poller::PollMode;
