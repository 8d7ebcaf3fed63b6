//! Conversions between core document types and SQLite column values.
//!
//! UUIDs are stored as hyphenated lowercase strings and document fields as
//! compact JSON text.

use lotflow_core::store::{Document, Fields, Filter};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Fields ──────────────────────────────────────────────────────────────────

pub fn encode_fields(fields: &Fields) -> Result<String> {
  Ok(serde_json::to_string(fields)?)
}

pub fn decode_fields(collection: &str, id: Uuid, data: &str) -> Result<Fields> {
  match serde_json::from_str(data)? {
    Value::Object(fields) => Ok(fields),
    _ => Err(Error::NotAnObject { collection: collection.to_owned(), id }),
  }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// JSON path of a top-level field, quoted so any key is addressable.
fn field_path(field: &str) -> String {
  format!("$.\"{}\"", field.replace('"', "\\\""))
}

/// A filter rendered as a SQL condition plus its bound parameters.
///
/// Placeholders are numbered from `first_param`.
pub fn filter_sql(filter: &Filter, first_param: usize) -> Result<(String, Vec<String>)> {
  let path = field_path(&filter.field);
  if filter.value.is_null() {
    // `json_extract` maps JSON null to SQL NULL, which never compares equal.
    let sql = format!("json_type(data, ?{first_param}) = 'null'");
    return Ok((sql, vec![path]));
  }
  let sql = format!(
    "json_type(data, ?{a}) IS NOT NULL AND json_extract(data, ?{a}) = json_extract(?{b}, '$')",
    a = first_param,
    b = first_param + 1,
  );
  Ok((sql, vec![path, serde_json::to_string(&filter.value)?]))
}

// ─── Raw row ─────────────────────────────────────────────────────────────────

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub id:   String,
  pub data: String,
}

impl RawDocument {
  pub fn into_document(self, collection: &str) -> Result<Document> {
    let id = decode_uuid(&self.id)?;
    let fields = decode_fields(collection, id, &self.data)?;
    Ok(Document { id, fields })
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn field_path_quotes_key() {
    assert_eq!(field_path("status"), "$.\"status\"");
    assert_eq!(field_path("a\"b"), "$.\"a\\\"b\"");
  }

  #[test]
  fn null_filter_checks_json_type() {
    let (sql, params) = filter_sql(&Filter::eq("note", Value::Null), 3).unwrap();
    assert_eq!(sql, "json_type(data, ?3) = 'null'");
    assert_eq!(params, vec!["$.\"note\"".to_owned()]);
  }

  #[test]
  fn value_filter_binds_json_text() {
    let (sql, params) = filter_sql(&Filter::eq("active", true), 1).unwrap();
    assert!(sql.contains("?1") && sql.contains("?2"));
    assert_eq!(params[1], "true");

    let (_, params) = filter_sql(&Filter::eq("status", json!("approved")), 1).unwrap();
    assert_eq!(params[1], "\"approved\"");
  }

  #[test]
  fn non_object_data_is_rejected() {
    let id = Uuid::new_v4();
    let err = decode_fields("lots", id, "[1, 2]").unwrap_err();
    assert!(matches!(err, Error::NotAnObject { id: got, .. } if got == id));
  }
}
