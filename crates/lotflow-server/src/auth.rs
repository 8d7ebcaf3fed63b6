//! HTTP Basic authentication against the user directory.
//!
//! The username is the account's email address. A verified request gets an
//! [`Actor`] inserted into its extensions for the API handlers to extract.

use std::sync::Arc;

use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use lotflow_api::{Actor, password::verify_password};
use lotflow_core::{
  identity::{User, UserDirectory},
  store::DocumentStore,
};
use tracing::debug;

use crate::error::Error;

/// Decode `Authorization: Basic …` into `(username, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

/// Resolve the active user whose credentials are in `headers`.
pub async fn verify_auth<S: DocumentStore>(
  headers: &HeaderMap,
  users: &UserDirectory<S>,
) -> Result<User, Error> {
  let (email, password) = basic_credentials(headers)?;

  let Some((user, hash)) = users.credentials(&email).await? else {
    debug!(%email, "unknown account");
    return Err(Error::Unauthorized);
  };
  if !user.active {
    debug!(user_id = %user.id, "inactive account");
    return Err(Error::Unauthorized);
  }
  if !verify_password(&password, &hash) {
    debug!(user_id = %user.id, "wrong password");
    return Err(Error::Unauthorized);
  }
  Ok(user)
}

/// Middleware: reject unauthenticated requests with 401, otherwise attach
/// the [`Actor`].
pub async fn require_auth<S: DocumentStore>(
  State(users): State<Arc<UserDirectory<S>>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let user = verify_auth(req.headers(), &users).await?;
  req.extensions_mut().insert(Actor(user));
  Ok(next.run(req).await)
}
