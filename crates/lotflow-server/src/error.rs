//! Error types and axum `IntoResponse` implementation for the server layer.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::notify::NotifyError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("notification failed: {0}")]
  Notify(#[from] NotifyError),

  #[error(transparent)]
  Core(#[from] lotflow_core::Error),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "error": "authentication required" })),
        )
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"lotflow\""),
        );
        res
      }
      Error::BadRequest(msg) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
      }
      Error::Notify(e) => {
        let status = match &e {
          NotifyError::Disabled => StatusCode::BAD_REQUEST,
          NotifyError::MissingUrl => StatusCode::INTERNAL_SERVER_ERROR,
          NotifyError::Http(_) | NotifyError::Status(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": e.to_string() }))).into_response()
      }
      Error::Core(e) => lotflow_api::ApiError::from(e).into_response(),
    }
  }
}
