//! Error types for `lotflow-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("lot not found: {0}")]
  LotNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("invalid state: {0}")]
  InvalidState(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("malformed {collection} document {id}: {reason}")]
  Decode {
    collection: &'static str,
    id:         Uuid,
    reason:     String,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// The coarse classification callers (and HTTP mappings) act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Unauthorized,
  NotFound,
  InvalidState,
  InvalidInput,
  Internal,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Unauthorized(_) => ErrorKind::Unauthorized,
      Self::LotNotFound(_) | Self::UserNotFound(_) => ErrorKind::NotFound,
      Self::InvalidState(_) => ErrorKind::InvalidState,
      Self::InvalidInput(_) => ErrorKind::InvalidInput,
      Self::Decode { .. } | Self::Serialization(_) | Self::Store(_) => {
        ErrorKind::Internal
      }
    }
  }

  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub(crate) fn unauthorized(msg: impl Into<String>) -> Self {
    Self::Unauthorized(msg.into())
  }

  pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
    Self::InvalidState(msg.into())
  }

  pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
    Self::InvalidInput(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
