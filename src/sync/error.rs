use crate::inbox::PendingTarget;
use crate::transport::TransportError;

/// Classified failure of a sync engine operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
  /// Session is no longer valid; the auth layer decides what to do
  #[error("session is not authorized")]
  Unauthorized,

  /// The referenced notification no longer exists on the server
  #[error("notification not found")]
  NotFound,

  /// The notification does not belong to the current user
  #[error("not permitted to modify this notification")]
  Forbidden,

  #[error("server error: {0}")]
  ServerError(String),

  #[error("network error: {0}")]
  NetworkError(String),

  /// The client could not build the request; retrying will not help
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// Another mutation on the same target has not resolved yet
  #[error("{target} already has an operation in progress")]
  AlreadyPending { target: PendingTarget },

  /// The session was cleared while the request was in flight; its result was dropped
  #[error("session was cleared before the operation completed")]
  SessionReset,
}

impl SyncError {
  /// Worth a caller-driven retry. Nothing is retried inside the engine.
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::ServerError(_) | Self::NetworkError(_))
  }
}

impl From<TransportError> for SyncError {
  fn from(err: TransportError) -> Self {
    match err {
      TransportError::Unauthorized => Self::Unauthorized,
      TransportError::Forbidden => Self::Forbidden,
      TransportError::NotFound => Self::NotFound,
      TransportError::Server { status, message } => {
        Self::ServerError(format!("HTTP {}: {}", status, message))
      }
      TransportError::Decode(msg) => Self::ServerError(format!("malformed response: {}", msg)),
      TransportError::Network(msg) => Self::NetworkError(msg),
      TransportError::InvalidRequest(msg) => Self::InvalidRequest(msg),
    }
  }
}

pub type SyncResult<T> = Result<T, SyncError>;
