//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::{Days, Utc};
use lotflow_core::{
  event::{CollectEvents, EventSink},
  history::HistoryKind,
  identity::{NewUser, Role, User, UserDirectory},
  memory::MemoryStore,
};
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{Actor, AppState, api_router};

struct Fixture {
  router:    Router,
  events:    Arc<CollectEvents>,
  submitter: User,
  approver:  User,
}

async fn fixture() -> Fixture {
  let store = Arc::new(MemoryStore::new());
  let users = UserDirectory::new(Arc::clone(&store)).with_root_admin("root@example.com");
  let submitter = add_user(&users, "imrep@example.com", Role::Submitter).await;
  let approver = add_user(&users, "allianz@example.com", Role::Approver).await;

  let events = Arc::new(CollectEvents::default());
  let sink: Arc<dyn EventSink> = events.clone();
  let router = api_router(AppState::new(store, users, sink));
  Fixture { router, events, submitter, approver }
}

async fn add_user(users: &UserDirectory<MemoryStore>, email: &str, role: Role) -> User {
  users
    .create_user(NewUser { email: email.into(), role, display_name: None }, "hash".into())
    .await
    .unwrap()
}

struct Reply {
  status:  StatusCode,
  headers: HeaderMap,
  body:    Value,
}

impl Fixture {
  async fn send(
    &self,
    actor: Option<&User>,
    method: Method,
    uri: &str,
    body: Option<Value>,
    extra: &[(header::HeaderName, String)],
  ) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in extra {
      builder = builder.header(name, value);
    }
    let mut req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    if let Some(user) = actor {
      req.extensions_mut().insert(Actor(user.clone()));
    }

    let res = self.router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    Reply { status, headers, body }
  }

  async fn as_submitter(&self, method: Method, uri: &str, body: Option<Value>) -> Reply {
    self.send(Some(&self.submitter), method, uri, body, &[]).await
  }

  async fn as_approver(&self, method: Method, uri: &str, body: Option<Value>) -> Reply {
    self.send(Some(&self.approver), method, uri, body, &[]).await
  }

  async fn create_lot(&self, lot_code: &str) -> String {
    let reply = self.as_submitter(Method::POST, "/lots", Some(lot_body(lot_code))).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["id"].as_str().unwrap().to_owned()
  }
}

fn in_days(n: u64) -> String { (Utc::now().date_naive() + Days::new(n)).to_string() }

fn today() -> String { Utc::now().date_naive().to_string() }

fn lot_body(lot_code: &str) -> Value {
  json!({
    "owner_code": "P-001",
    "owner_name": "Durand",
    "lot_code": lot_code,
    "address": "12 rue des Lilas",
    "postal_code": "32110",
    "city": "Nogaro",
    "floor": "ground",
    "unit_size": 2,
    "garage_elsewhere": false,
    "management_start": "2024-01-01",
    "requested_effective_date": in_days(1),
  })
}

// ─── Authentication ──────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_actor_is_401_with_challenge() {
  let f = fixture().await;
  let reply = f.send(None, Method::GET, "/lots", None, &[]).await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
  assert!(reply.headers.contains_key(header::WWW_AUTHENTICATE));
  assert!(reply.body["error"].is_string());
}

// ─── Lots ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn entry_approval_flow() {
  let f = fixture().await;
  let id = f.create_lot("L-1").await;

  let reply = f
    .as_approver(
      Method::POST,
      &format!("/lots/{id}/entry/approve"),
      Some(json!({ "contract_number": "CT-001" })),
    )
    .await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["status"], json!("approved"));
  assert_eq!(reply.body["contract_number"], json!("CT-001"));
  assert_eq!(reply.body["history"].as_array().unwrap().len(), 2);

  let kinds: Vec<HistoryKind> = f.events.take().into_iter().map(|e| e.kind).collect();
  assert_eq!(kinds, vec![HistoryKind::Creation, HistoryKind::EntryApproved]);

  let reply = f
    .as_approver(Method::GET, "/contracts/%20CT-001%20", None)
    .await;
  assert_eq!(reply.body, json!({ "contract_number": "CT-001", "in_use": true }));
  let reply = f
    .as_approver(Method::GET, &format!("/contracts/CT-001?exclude={id}"), None)
    .await;
  assert_eq!(reply.body["in_use"], json!(false));
}

#[tokio::test]
async fn lifecycle_errors_map_to_status_codes() {
  let f = fixture().await;
  let id = f.create_lot("L-1").await;

  // Submitters cannot decide.
  let reply = f
    .as_submitter(
      Method::POST,
      &format!("/lots/{id}/entry/approve"),
      Some(json!({ "contract_number": "CT-1" })),
    )
    .await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);

  // Forbidden update keys.
  let reply = f
    .as_submitter(Method::PATCH, &format!("/lots/{id}"), Some(json!({ "status": "approved" })))
    .await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);

  // Unknown lot.
  let missing = uuid::Uuid::new_v4();
  let reply = f.as_approver(Method::POST, &format!("/lots/{missing}/exit/approve"), None).await;
  assert_eq!(reply.status, StatusCode::NOT_FOUND);

  // Already decided.
  f.as_approver(
    Method::POST,
    &format!("/lots/{id}/entry/reject"),
    Some(json!({ "reason": "incomplete" })),
  )
  .await;
  let reply = f
    .as_approver(
      Method::POST,
      &format!("/lots/{id}/entry/approve"),
      Some(json!({ "contract_number": "CT-1" })),
    )
    .await;
  assert_eq!(reply.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn submitters_list_only_their_lots() {
  let f = fixture().await;
  f.create_lot("L-1").await;

  let reply = f.as_submitter(Method::GET, "/lots", None).await;
  assert_eq!(reply.body.as_array().unwrap().len(), 1);

  let reply = f.as_approver(Method::GET, "/lots", None).await;
  assert_eq!(reply.body.as_array().unwrap().len(), 1);

  let reply = f
    .as_approver(Method::GET, &format!("/lots?created_by={}", f.approver.id), None)
    .await;
  assert!(reply.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn get_lot_supports_conditional_requests() {
  let f = fixture().await;
  let id = f.create_lot("L-1").await;
  let uri = format!("/lots/{id}");

  let reply = f.as_submitter(Method::GET, &uri, None).await;
  assert_eq!(reply.status, StatusCode::OK);
  let etag = reply.headers[header::ETAG].to_str().unwrap().to_owned();

  let reply = f
    .send(Some(&f.submitter), Method::GET, &uri, None, &[(header::IF_NONE_MATCH, etag.clone())])
    .await;
  assert_eq!(reply.status, StatusCode::NOT_MODIFIED);

  f.as_submitter(Method::PATCH, &uri, Some(json!({ "city": "Auch" }))).await;
  let reply = f
    .send(Some(&f.submitter), Method::GET, &uri, None, &[(header::IF_NONE_MATCH, etag)])
    .await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["city"], json!("Auch"));
}

#[tokio::test]
async fn other_submitters_cannot_see_a_lot() {
  let f = fixture().await;
  let id = f.create_lot("L-1").await;
  let stranger = User { id: uuid::Uuid::new_v4(), ..f.submitter.clone() };

  let reply = f.send(Some(&stranger), Method::GET, &format!("/lots/{id}"), None, &[]).await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn no_op_update_returns_lot_without_event() {
  let f = fixture().await;
  let id = f.create_lot("L-1").await;
  f.events.take();

  let reply = f
    .as_submitter(Method::PATCH, &format!("/lots/{id}"), Some(json!({ "city": "Nogaro" })))
    .await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["history"].as_array().unwrap().len(), 1);
  assert!(f.events.take().is_empty());
}

#[tokio::test]
async fn exit_and_deletion_requests() {
  let f = fixture().await;
  let approved = f.create_lot("L-1").await;
  f.as_approver(
    Method::POST,
    &format!("/lots/{approved}/entry/approve"),
    Some(json!({ "contract_number": "CT-9" })),
  )
  .await;

  let reply = f
    .as_submitter(
      Method::POST,
      &format!("/lots/{approved}/exit"),
      Some(json!({ "motive": "sale", "requested_date": in_days(2), "declared_on": today() })),
    )
    .await;
  assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
  assert_eq!(reply.body["exit"]["status"], json!("pending_approval"));

  let reply = f
    .as_approver(
      Method::POST,
      &format!("/lots/{approved}/exit/reject"),
      Some(json!({ "reason": "missing deed" })),
    )
    .await;
  assert_eq!(reply.body["exit"]["status"], json!("rejected"));

  let pending = f.create_lot("L-2").await;
  let reply = f
    .as_submitter(
      Method::POST,
      &format!("/lots/{pending}/deletion"),
      Some(json!({ "reason": "sale", "requested_date": in_days(1), "declared_on": today() })),
    )
    .await;
  assert_eq!(reply.body["deletion"]["status"], json!("pending_approval"));

  let reply = f
    .as_approver(Method::POST, &format!("/lots/{pending}/deletion/approve"), None)
    .await;
  assert_eq!(reply.body["status"], json!("rejected"));
  assert_eq!(reply.body["deletion"]["status"], json!("approved"));

  let reply = f.as_approver(Method::GET, "/stats", None).await;
  assert_eq!(reply.body["approved"], json!(1));
  assert_eq!(reply.body["rejected"], json!(1));
  assert_eq!(reply.body["exits"]["rejected"], json!(1));
  assert_eq!(reply.body["deletions"]["approved"], json!(1));

  let reply = f.as_submitter(Method::GET, "/journal", None).await;
  let kinds: Vec<&str> = reply
    .body
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["type"].as_str().unwrap())
    .collect();
  assert!(kinds.iter().all(|k| [
    "creation",
    "update",
    "exit_requested",
    "deletion_requested"
  ]
  .contains(k)));
  assert_eq!(kinds.len(), 4);
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn approver_manages_users() {
  let f = fixture().await;

  let reply = f
    .as_approver(
      Method::POST,
      "/users",
      Some(json!({ "email": "new@example.com", "password": "s3cret!", "role": "submitter" })),
    )
    .await;
  assert_eq!(reply.status, StatusCode::CREATED);
  assert!(reply.body.get("password_hash").is_none());
  let id = reply.body["id"].as_str().unwrap().to_owned();

  let reply = f
    .as_approver(Method::PUT, &format!("/users/{id}/active"), Some(json!({ "active": false })))
    .await;
  assert_eq!(reply.body["active"], json!(false));

  let reply = f
    .as_approver(Method::PUT, &format!("/users/{id}/role"), Some(json!({ "role": "approver" })))
    .await;
  assert_eq!(reply.body["role"], json!("approver"));

  let reply = f.as_approver(Method::DELETE, &format!("/users/{id}"), None).await;
  assert_eq!(reply.status, StatusCode::NO_CONTENT);

  let reply = f.as_approver(Method::GET, "/users", None).await;
  assert_eq!(reply.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn user_creation_is_validated() {
  let f = fixture().await;

  let reply = f
    .as_approver(
      Method::POST,
      "/users",
      Some(json!({ "email": "short@example.com", "password": "12345", "role": "submitter" })),
    )
    .await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);

  let reply = f
    .as_approver(
      Method::POST,
      "/users",
      Some(json!({ "email": "IMREP@example.com", "password": "123456", "role": "submitter" })),
    )
    .await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submitters_cannot_manage_users() {
  let f = fixture().await;
  let reply = f.as_submitter(Method::GET, "/users", None).await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);

  let reply = f
    .as_submitter(
      Method::POST,
      "/users",
      Some(json!({ "email": "x@example.com", "password": "123456", "role": "approver" })),
    )
    .await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn root_admin_cannot_be_deleted() {
  let f = fixture().await;
  let reply = f
    .as_approver(
      Method::POST,
      "/users",
      Some(json!({ "email": "root@example.com", "password": "rootpw", "role": "approver" })),
    )
    .await;
  let id = reply.body["id"].as_str().unwrap().to_owned();

  let reply = f.as_approver(Method::DELETE, &format!("/users/{id}"), None).await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}
