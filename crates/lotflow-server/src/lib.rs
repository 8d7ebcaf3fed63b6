//! HTTP server for lotflow.
//!
//! Wraps the [`lotflow_api`] router with Basic authentication, request
//! tracing, and the chat notification channel.

pub mod auth;
pub mod error;
pub mod notify;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::State,
  middleware,
  routing::{get, post},
};
use lotflow_api::{Actor, AppState};
use lotflow_core::store::DocumentStore;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::info;

use notify::WebhookNotifier;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `LOTFLOW_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Post lot events to `notify_webhook_url`.
  #[serde(default)]
  pub notify_enabled:     bool,
  #[serde(default)]
  pub notify_webhook_url: Option<String>,
  /// This account can't be modified, deactivated, or deleted.
  #[serde(default)]
  pub root_admin_email:   Option<String>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server's axum [`Router`].
///
/// Everything except `/health` requires Basic authentication. The JSON API is
/// nested under `/api`.
pub fn router<S>(state: AppState<S>, notifier: Arc<WebhookNotifier>) -> Router
where
  S: DocumentStore + 'static,
{
  let users = Arc::clone(&state.users);
  let notify = Router::new()
    .route("/notify", post(send_notification))
    .with_state(notifier);

  Router::new()
    .nest("/api", lotflow_api::api_router(state).merge(notify))
    .layer(middleware::from_fn_with_state(users, auth::require_auth::<S>))
    .route("/health", get(|| async { "ok" }))
    .layer(TraceLayer::new_for_http())
}

// ─── Notify endpoint ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct NotifyBody {
  /// Absent is treated like empty.
  #[serde(default)]
  pub text: String,
}

/// `POST /api/notify`: forward a free-form message to the chat webhook.
async fn send_notification(
  State(notifier): State<Arc<WebhookNotifier>>,
  actor: Actor,
  Json(body): Json<NotifyBody>,
) -> Result<Json<Value>, Error> {
  if body.text.trim().is_empty() {
    return Err(Error::BadRequest("text is required".into()));
  }
  notifier.send(&body.text).await?;
  info!(user_id = %actor.id(), "manual notification sent");
  Ok(Json(json!({ "ok": true })))
}
