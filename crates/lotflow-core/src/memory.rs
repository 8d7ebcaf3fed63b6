//! [`MemoryStore`], an in-process [`DocumentStore`].
//!
//! Used by the core test-suite and handy for wiring the service without a
//! database. Nothing is persisted.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;
use uuid::Uuid;

use crate::store::{Document, DocumentStore, Fields, Filter};

#[derive(Debug, Error)]
pub enum MemoryStoreError {
  #[error("document {collection}/{id} not found")]
  NotFound { collection: &'static str, id: Uuid },

  #[error("document {collection}/{id} already exists")]
  AlreadyExists { collection: &'static str, id: Uuid },
}

type Collections = HashMap<&'static str, BTreeMap<Uuid, Fields>>;

/// Clones share the same underlying collections.
#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<Collections>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Collections> {
    // Every mutation is a single insert/remove; a poisoned map is still whole.
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl DocumentStore for MemoryStore {
  type Error = MemoryStoreError;

  async fn get(
    &self,
    collection: &'static str,
    id: Uuid,
  ) -> Result<Option<Document>, MemoryStoreError> {
    let guard = self.lock();
    Ok(
      guard
        .get(collection)
        .and_then(|docs| docs.get(&id))
        .map(|fields| Document { id, fields: fields.clone() }),
    )
  }

  async fn get_all(
    &self,
    collection: &'static str,
    filters: Vec<Filter>,
  ) -> Result<Vec<Document>, MemoryStoreError> {
    let guard = self.lock();
    let Some(docs) = guard.get(collection) else {
      return Ok(Vec::new());
    };
    Ok(
      docs
        .iter()
        .filter(|(_, fields)| filters.iter().all(|f| f.matches(fields)))
        .map(|(id, fields)| Document { id: *id, fields: fields.clone() })
        .collect(),
    )
  }

  async fn create(
    &self,
    collection: &'static str,
    fields: Fields,
    id: Option<Uuid>,
  ) -> Result<Uuid, MemoryStoreError> {
    let mut guard = self.lock();
    let docs = guard.entry(collection).or_default();
    let id = id.unwrap_or_else(Uuid::new_v4);
    if docs.contains_key(&id) {
      return Err(MemoryStoreError::AlreadyExists { collection, id });
    }
    docs.insert(id, fields);
    Ok(id)
  }

  async fn update(
    &self,
    collection: &'static str,
    id: Uuid,
    partial: Fields,
  ) -> Result<(), MemoryStoreError> {
    let mut guard = self.lock();
    let existing = guard
      .get_mut(collection)
      .and_then(|docs| docs.get_mut(&id))
      .ok_or(MemoryStoreError::NotFound { collection, id })?;
    existing.extend(partial);
    Ok(())
  }

  async fn delete(
    &self,
    collection: &'static str,
    id: Uuid,
  ) -> Result<(), MemoryStoreError> {
    let mut guard = self.lock();
    if let Some(docs) = guard.get_mut(collection) {
      docs.remove(&id);
    }
    Ok(())
  }
}
