//! Notification inbox model, cache state and read-only views.
//!
//! - `types`: notification records and listing shapes
//! - `store`: the cached inbox and its pure transitions
//! - `pending`: ledger of in-flight mutations
//! - `selectors`: derived views for display

pub mod pending;
pub mod selectors;
pub mod store;
pub mod types;

#[cfg(test)]
pub mod fixtures;

pub use pending::{PendingRead, PendingTarget};
pub use store::InboxState;
pub use types::{
  EntityKind, FetchQuery, Notification, NotificationId, NotificationKind, NotificationPage,
  Pagination, RelatedEntity,
};
