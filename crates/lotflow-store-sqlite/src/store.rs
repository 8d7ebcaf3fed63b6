//! [`SqliteStore`]: the SQLite implementation of [`DocumentStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use lotflow_core::store::{Document, DocumentStore, Fields, Filter};

use crate::{
  Error, Result,
  encode::{RawDocument, decode_fields, encode_fields, encode_uuid, filter_sql},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A lotflow document store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn read_data(&self, collection: &'static str, id: Uuid) -> Result<Option<String>> {
    let id_str = encode_uuid(id);
    let data = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
              rusqlite::params![collection, id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(data)
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<Document>> {
    self
      .read_data(collection, id)
      .await?
      .map(|data| {
        let fields = decode_fields(collection, id, &data)?;
        Ok(Document { id, fields })
      })
      .transpose()
  }

  async fn get_all(
    &self,
    collection: &'static str,
    filters: Vec<Filter>,
  ) -> Result<Vec<Document>> {
    let mut conds = vec!["collection = ?1".to_owned()];
    let mut params = vec![collection.to_owned()];
    for filter in &filters {
      let (sql, bound) = filter_sql(filter, params.len() + 1)?;
      conds.push(format!("({sql})"));
      params.extend(bound);
    }
    let sql = format!("SELECT id, data FROM documents WHERE {}", conds.join(" AND "));

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(RawDocument { id: row.get(0)?, data: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(|raw| raw.into_document(collection)).collect()
  }

  async fn create(
    &self,
    collection: &'static str,
    fields: Fields,
    id: Option<Uuid>,
  ) -> Result<Uuid> {
    let id = id.unwrap_or_else(Uuid::new_v4);
    let id_str = encode_uuid(id);
    let data = encode_fields(&fields)?;

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
          rusqlite::params![collection, id_str, data],
        )?)
      })
      .await?;

    if inserted == 0 {
      return Err(Error::AlreadyExists { collection, id });
    }
    debug!(collection, %id, "document created");
    Ok(id)
  }

  async fn update(&self, collection: &'static str, id: Uuid, partial: Fields) -> Result<()> {
    let id_str = encode_uuid(id);

    // Read, shallow-merge, and write back within one transaction.
    let merged: Option<serde_json::Result<()>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current: Option<String> = tx
          .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection, id_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(current) = current else {
          return Ok(None);
        };

        let mut fields: Fields = match serde_json::from_str(&current) {
          Ok(fields) => fields,
          Err(e) => return Ok(Some(Err(e))),
        };
        fields.extend(partial);
        let data = match serde_json::to_string(&fields) {
          Ok(data) => data,
          Err(e) => return Ok(Some(Err(e))),
        };

        tx.execute(
          "UPDATE documents SET data = ?3 WHERE collection = ?1 AND id = ?2",
          rusqlite::params![collection, id_str, data],
        )?;
        tx.commit()?;
        Ok(Some(Ok(())))
      })
      .await?;

    match merged {
      Some(result) => Ok(result?),
      None => Err(Error::NotFound { collection, id }),
    }
  }

  async fn delete(&self, collection: &'static str, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
          rusqlite::params![collection, id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
