//! Outbound chat notifications.
//!
//! Lot events published by the API go through a [`ChannelSink`] to a
//! background task, which renders one message per event and posts it to a
//! Slack-compatible incoming webhook (`{"text": …}`). Failures are logged and
//! never reach the request that produced the event.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use lotflow_core::{
  event::{EventSink, LotEvent},
  history::HistoryKind,
  identity::IdentityProvider,
  lot::DeletionReason,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("notifications are disabled")]
  Disabled,

  #[error("no webhook url configured")]
  MissingUrl,

  #[error("webhook request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("webhook answered {0}")]
  Status(StatusCode),
}

// ─── Webhook ─────────────────────────────────────────────────────────────────

/// Posts text messages to the configured webhook.
///
/// Cheap to share; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
  client:  Client,
  enabled: bool,
  url:     Option<String>,
}

impl WebhookNotifier {
  pub fn new(enabled: bool, url: Option<String>) -> Result<Self, NotifyError> {
    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
    let url = url.filter(|u| !u.trim().is_empty());
    Ok(Self { client, enabled, url })
  }

  pub fn is_enabled(&self) -> bool { self.enabled }

  pub async fn send(&self, text: &str) -> Result<(), NotifyError> {
    if !self.enabled {
      return Err(NotifyError::Disabled);
    }
    let url = self.url.as_deref().ok_or(NotifyError::MissingUrl)?;

    let res = self.client.post(url).json(&json!({ "text": text })).send().await?;
    if !res.status().is_success() {
      return Err(NotifyError::Status(res.status()));
    }
    Ok(())
  }
}

// ─── Channel sink ────────────────────────────────────────────────────────────

/// [`EventSink`] feeding the notification task spawned by [`spawn_notifier`].
#[derive(Debug, Clone)]
pub struct ChannelSink(mpsc::UnboundedSender<LotEvent>);

impl EventSink for ChannelSink {
  fn publish(&self, event: LotEvent) {
    if self.0.send(event).is_err() {
      warn!("notification task has stopped; event dropped");
    }
  }
}

/// Spawn the task that turns events into webhook messages. Must be called
/// from within a tokio runtime.
pub fn spawn_notifier<I>(notifier: Arc<WebhookNotifier>, identity: Arc<I>) -> ChannelSink
where
  I: IdentityProvider + 'static,
{
  let (tx, mut rx) = mpsc::unbounded_channel::<LotEvent>();
  tokio::spawn(async move {
    while let Some(event) = rx.recv().await {
      if !notifier.is_enabled() {
        debug!(lot_id = %event.lot_id, kind = ?event.kind, "notifications disabled; skipping");
        continue;
      }
      let actor = actor_label(identity.as_ref(), event.actor).await;
      let text = render(&event, &actor);
      match notifier.send(&text).await {
        Ok(()) => debug!(lot_id = %event.lot_id, kind = ?event.kind, "notification sent"),
        Err(e) => warn!(lot_id = %event.lot_id, kind = ?event.kind, error = %e, "notification failed"),
      }
    }
  });
  ChannelSink(tx)
}

/// Display name, else email, else the raw id.
async fn actor_label<I: IdentityProvider>(identity: &I, id: Uuid) -> String {
  match identity.user(id).await {
    Ok(Some(user)) => user.label().to_owned(),
    Ok(None) => id.to_string(),
    Err(e) => {
      warn!(user_id = %id, error = %e, "cannot resolve notification actor");
      id.to_string()
    }
  }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

fn text<'a>(data: &'a serde_json::Map<String, Value>, key: &str) -> &'a str {
  data.get(key).and_then(Value::as_str).unwrap_or("N/A")
}

/// `YYYY-MM-DD` as `DD/MM/YYYY`; anything else verbatim.
fn date(data: &serde_json::Map<String, Value>, key: &str) -> String {
  let raw = text(data, key);
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .map(|d| d.format("%d/%m/%Y").to_string())
    .unwrap_or_else(|_| raw.to_owned())
}

fn deletion_reason(data: &serde_json::Map<String, Value>) -> String {
  let reason = data
    .get("reason")
    .cloned()
    .and_then(|v| serde_json::from_value::<DeletionReason>(v).ok());
  let label = match reason {
    Some(DeletionReason::LossOfManagement) => "loss of management",
    Some(DeletionReason::Sale) => "sale",
    Some(DeletionReason::Other) => "other",
    None => "N/A",
  };
  match data.get("reason_detail").and_then(Value::as_str) {
    Some(detail) => format!("{label} ({detail})"),
    None => label.to_owned(),
  }
}

/// The chat message for `event`, attributed to `actor`.
pub fn render(event: &LotEvent, actor: &str) -> String {
  let data = &event.data;
  let contract = event.contract_number.as_deref().unwrap_or("N/A");
  let lot = format!("Lot code {}, Address {}", event.lot_code, event.address);

  let (tag, details) = match event.kind {
    HistoryKind::Creation => (
      "Creation",
      format!(
        "{lot}, Effective date {}, Created by {actor}",
        date(data, "requested_effective_date")
      ),
    ),
    HistoryKind::Update => {
      let fields: Vec<&str> = data.keys().map(String::as_str).collect();
      let fields = if fields.is_empty() { "none".to_owned() } else { fields.join(", ") };
      ("Update", format!("{lot}, Changed fields {fields}, Updated by {actor}"))
    }
    HistoryKind::EntryApproved => (
      "Approval",
      format!("{lot}, Contract {}, Approved by {actor}", text(data, "contract_number")),
    ),
    HistoryKind::EntryRejected => (
      "Rejection",
      format!("{lot}, Reason {}, Rejected by {actor}", text(data, "reason")),
    ),
    HistoryKind::ExitRequested => (
      "Exit",
      format!(
        "{lot}, Contract {contract}, Date {}, Motive {}, Requested by {actor}",
        date(data, "requested_date"),
        text(data, "motive")
      ),
    ),
    HistoryKind::ExitApproved => {
      ("Exit", format!("{lot}, Contract {contract}, Approved by {actor}"))
    }
    HistoryKind::ExitRejected => (
      "Exit",
      format!(
        "{lot}, Contract {contract}, Reason {}, Rejected by {actor}",
        text(data, "reason")
      ),
    ),
    HistoryKind::DeletionRequested => (
      "Deletion",
      format!(
        "{lot}, Reason {}, Date {}, Requested by {actor}",
        deletion_reason(data),
        date(data, "requested_date")
      ),
    ),
    HistoryKind::DeletionApproved => ("Deletion", format!("{lot}, Approved by {actor}")),
    HistoryKind::DeletionRejected => (
      "Deletion",
      format!("{lot}, Reason {}, Rejected by {actor}", text(data, "reason")),
    ),
  };

  format!("🔔 [{tag}] {}\nDetails: {details}", event.kind.label())
}

#[cfg(test)]
mod tests {
  use axum::{Json, Router, extract::State, routing::post};
  use chrono::Utc;
  use lotflow_core::{
    identity::{NewUser, Role, UserDirectory},
    memory::MemoryStore,
  };
  use tokio::net::TcpListener;

  use super::*;

  fn event(kind: HistoryKind, data: Value) -> LotEvent {
    let Value::Object(data) = data else { panic!("expected an object") };
    LotEvent {
      lot_id: Uuid::nil(),
      kind,
      actor: Uuid::nil(),
      at: Utc::now(),
      lot_code: "L-42".into(),
      address: "12 rue des Lilas, 32110 Nogaro".into(),
      contract_number: None,
      data,
    }
  }

  #[test]
  fn creation_message() {
    let e = event(HistoryKind::Creation, json!({ "requested_effective_date": "2026-11-02" }));
    assert_eq!(
      render(&e, "Marie"),
      "🔔 [Creation] Lot created\nDetails: Lot code L-42, Address 12 rue des Lilas, \
       32110 Nogaro, Effective date 02/11/2026, Created by Marie"
    );
  }

  #[test]
  fn exit_message_names_contract_and_motive() {
    let mut e = event(
      HistoryKind::ExitRequested,
      json!({ "motive": "sale", "requested_date": "2026-12-01" }),
    );
    e.contract_number = Some("CT-7".into());
    let msg = render(&e, "imrep@example.com");
    assert!(msg.starts_with("🔔 [Exit] Exit requested\n"));
    assert!(msg.contains("Contract CT-7, Date 01/12/2026, Motive sale"));
    assert!(msg.ends_with("Requested by imrep@example.com"));
  }

  #[test]
  fn missing_values_render_as_na() {
    let e = event(HistoryKind::ExitApproved, json!({}));
    assert!(render(&e, "x").contains("Contract N/A"));
  }

  #[test]
  fn deletion_reason_includes_detail() {
    let e = event(
      HistoryKind::DeletionRequested,
      json!({ "reason": "other", "reason_detail": "duplicate", "requested_date": "2026-01-05" }),
    );
    assert!(render(&e, "x").contains("Reason other (duplicate), Date 05/01/2026"));
  }

  #[test]
  fn update_lists_changed_fields() {
    let e = event(HistoryKind::Update, json!({ "city": "Auch", "note": "x" }));
    assert!(render(&e, "x").contains("Changed fields city, note"));
  }

  #[tokio::test]
  async fn disabled_or_unconfigured_notifier_refuses() {
    let off = WebhookNotifier::new(false, Some("http://127.0.0.1:9".into())).unwrap();
    assert!(matches!(off.send("hi").await, Err(NotifyError::Disabled)));

    let no_url = WebhookNotifier::new(true, Some("  ".into())).unwrap();
    assert!(matches!(no_url.send("hi").await, Err(NotifyError::MissingUrl)));
  }

  /// Serve a webhook on an ephemeral port that forwards every `text` it
  /// receives to the returned channel.
  async fn webhook() -> (String, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let app = Router::new()
      .route(
        "/hook",
        post(|State(tx): State<mpsc::UnboundedSender<String>>, Json(body): Json<Value>| async move {
          let _ = tx.send(body["text"].as_str().unwrap_or_default().to_owned());
          "ok"
        }),
      )
      .with_state(tx);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}/hook"), rx)
  }

  #[tokio::test]
  async fn send_posts_text_payload() {
    let (url, mut rx) = webhook().await;
    let notifier = WebhookNotifier::new(true, Some(url)).unwrap();
    notifier.send("hello").await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), "hello");
  }

  #[tokio::test]
  async fn channel_sink_renders_with_actor_label() {
    let (url, mut rx) = webhook().await;
    let users = Arc::new(UserDirectory::new(Arc::new(MemoryStore::new())));
    let user = users
      .create_user(
        NewUser {
          email:        "allianz@example.com".into(),
          role:         Role::Approver,
          display_name: Some("Claire".into()),
        },
        "hash".into(),
      )
      .await
      .unwrap();

    let notifier = Arc::new(WebhookNotifier::new(true, Some(url)).unwrap());
    let sink = spawn_notifier(notifier, users);

    let mut e = event(HistoryKind::EntryApproved, json!({ "contract_number": "CT-1" }));
    e.actor = user.id;
    sink.publish(e);

    let text = rx.recv().await.unwrap();
    assert!(text.starts_with("🔔 [Approval] Entry approved"));
    assert!(text.ends_with("Contract CT-1, Approved by Claire"));

    let mut unknown = event(HistoryKind::DeletionApproved, json!({}));
    unknown.actor = Uuid::nil();
    sink.publish(unknown);
    assert!(rx.recv().await.unwrap().ends_with(&format!("Approved by {}", Uuid::nil())));
  }
}
