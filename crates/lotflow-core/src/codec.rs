//! The single encoding boundary between domain aggregates and stored
//! documents.
//!
//! Instants are stored as RFC 3339 strings and calendar dates as
//! `YYYY-MM-DD`; nested exit/deletion/history records are encoded with the
//! aggregate, so decoding is uniform at every depth. The document key is not
//! duplicated inside the stored fields.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
  Error, Result,
  lot::Lot,
  store::{Document, Fields, LOTS},
};

/// Serialize any struct into top-level document fields.
pub fn encode_fields<T: Serialize>(value: &T) -> Result<Fields> {
  match serde_json::to_value(value)? {
    Value::Object(fields) => Ok(fields),
    other => Err(Error::Serialization(serde::ser::Error::custom(format!(
      "expected an object, got {other}"
    )))),
  }
}

/// Decode a stored document, re-attaching its key under `id`.
pub fn decode_document<T: DeserializeOwned>(
  collection: &'static str,
  doc: Document,
) -> Result<T> {
  let Document { id, mut fields } = doc;
  fields.insert("id".to_owned(), Value::String(id.to_string()));
  serde_json::from_value(Value::Object(fields)).map_err(|e| Error::Decode {
    collection,
    id,
    reason: e.to_string(),
  })
}

pub fn encode_lot(lot: &Lot) -> Result<Fields> {
  let mut fields = encode_fields(lot)?;
  fields.remove("id");
  Ok(fields)
}

pub fn decode_lot(doc: Document) -> Result<Lot> { decode_document(LOTS, doc) }
