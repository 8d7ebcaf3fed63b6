//! Error type for `lotflow-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored `data` column did not hold a JSON object.
  #[error("document {collection}/{id} is not a JSON object")]
  NotAnObject { collection: String, id: Uuid },

  #[error("document not found: {collection}/{id}")]
  NotFound { collection: &'static str, id: Uuid },

  #[error("document already exists: {collection}/{id}")]
  AlreadyExists { collection: &'static str, id: Uuid },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
