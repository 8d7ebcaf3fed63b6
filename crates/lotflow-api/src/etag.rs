//! ETag computation for lot resources.
//!
//! ETags are SHA-256 hashes over the lot's canonical JSON encoding, so any
//! committed transition (which always appends history and bumps
//! `updated_at`) yields a new tag.

use axum::http::{HeaderMap, header};
use lotflow_core::lot::Lot;
use sha2::{Digest, Sha256};

/// Compute a quoted strong ETag for `lot`.
pub fn compute_etag(lot: &Lot) -> Result<String, serde_json::Error> {
  let bytes = serde_json::to_vec(lot)?;
  let hash = Sha256::digest(&bytes);
  Ok(format!("\"{}\"", hex::encode(hash)))
}

/// Whether an `If-None-Match` header in `headers` matches `etag`.
pub fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
  headers
    .get_all(header::IF_NONE_MATCH)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(','))
    .map(|tag| tag.trim().trim_start_matches("W/"))
    .any(|tag| tag == "*" || tag == etag)
}
