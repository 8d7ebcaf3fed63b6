//! The `DocumentStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `lotflow-store-sqlite`,
//! or [`MemoryStore`](crate::memory::MemoryStore) for tests). The lifecycle
//! service and identity provider depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use serde_json::Value;
use uuid::Uuid;

/// Collection holding [`Lot`](crate::lot::Lot) documents.
pub const LOTS: &str = "lots";
/// Collection holding user records.
pub const USERS: &str = "users";

/// The top-level fields of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// A document as read back from a store: its key plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
  pub id:     Uuid,
  pub fields: Fields,
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// An equality constraint on a top-level field, used by
/// [`DocumentStore::get_all`].
///
/// A document whose field is absent never matches, even when `value` is
/// `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
  pub field: String,
  pub value: Value,
}

impl Filter {
  pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
    Self { field: field.into(), value: value.into() }
  }

  pub fn matches(&self, fields: &Fields) -> bool {
    fields.get(&self.field) == Some(&self.value)
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a document database with named collections.
///
/// Writes are last-write-wins per document; there is no version check.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch a single document. Returns `None` if not found.
  fn get(
    &self,
    collection: &'static str,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + '_;

  /// Return every document in `collection` matching all `filters`.
  /// No ordering is guaranteed.
  fn get_all(
    &self,
    collection: &'static str,
    filters: Vec<Filter>,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Persist a new document and return its id.
  ///
  /// When `id` is `None` the store generates one. Returns an error if a
  /// caller-supplied id is already taken.
  fn create(
    &self,
    collection: &'static str,
    fields: Fields,
    id: Option<Uuid>,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  /// Overwrite the given top-level fields of an existing document, leaving
  /// the others untouched. Returns an error if the document does not exist.
  fn update(
    &self,
    collection: &'static str,
    id: Uuid,
    partial: Fields,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove a document. Removing a missing document is not an error.
  fn delete(
    &self,
    collection: &'static str,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
