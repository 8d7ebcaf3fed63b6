//! Handlers for `/lots` and `/contracts` endpoints.
//!
//! | Method  | Path | Role | Notes |
//! |---------|------|------|-------|
//! | `GET`   | `/lots` | any | Submitters see their own lots; approvers all, or `?created_by=<id>` |
//! | `POST`  | `/lots` | submitter | Body: lot details |
//! | `GET`   | `/lots/:id` | any | `ETag`; honours `If-None-Match` |
//! | `PATCH` | `/lots/:id` | submitter | Body: partial details; `null` clears |
//! | `POST`  | `/lots/:id/entry/approve` | approver | `{"contract_number":"…"}` |
//! | `POST`  | `/lots/:id/entry/reject` | approver | `{"reason":"…"}` |
//! | `POST`  | `/lots/:id/exit` | submitter | Body: exit request |
//! | `POST`  | `/lots/:id/exit/approve` | approver | |
//! | `POST`  | `/lots/:id/exit/reject` | approver | `{"reason":"…"}` |
//! | `POST`  | `/lots/:id/deletion` | submitter | Body: deletion request |
//! | `POST`  | `/lots/:id/deletion/approve` | approver | |
//! | `POST`  | `/lots/:id/deletion/reject` | approver | `{"reason":"…"}` |
//! | `GET`   | `/contracts/:number` | any | Optional `?exclude=<lot id>` |
//!
//! Role checks for transitions live in the lifecycle service; a refusal there
//! surfaces as 403.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use lotflow_core::{
  identity::Role,
  lot::{DeletionRequest, ExitRequest, Lot, LotDetails},
  store::{DocumentStore, Fields},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Actor, AppState,
  error::ApiError,
  etag::{compute_etag, if_none_match},
};

/// Load a lot the actor may see. Submitters only see lots they created.
async fn visible_lot<S: DocumentStore>(
  state: &AppState<S>,
  actor: &Actor,
  id: Uuid,
) -> Result<Lot, ApiError> {
  let lot = state
    .lots
    .lot_by_id(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("lot {id} not found")))?;
  if actor.role() == Role::Submitter && lot.created_by != actor.id() {
    return Err(ApiError::Forbidden("you may only view your own lots".into()));
  }
  Ok(lot)
}

// ─── Reads ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub created_by: Option<Uuid>,
}

/// `GET /lots[?created_by=<id>]`
pub async fn list<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Lot>>, ApiError> {
  let lots = match (actor.role(), params.created_by) {
    (Role::Submitter, _) => state.lots.lots_by_submitter(actor.id()).await?,
    (Role::Approver, Some(submitter)) => state.lots.lots_by_submitter(submitter).await?,
    (Role::Approver, None) => state.lots.all_lots().await?,
  };
  Ok(Json(lots))
}

/// `GET /lots/:id`
pub async fn get_one<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<Response, ApiError> {
  let lot = visible_lot(&state, &actor, id).await?;
  let etag = compute_etag(&lot).map_err(lotflow_core::Error::from)?;

  if if_none_match(&headers, &etag) {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }
  Ok(([(header::ETAG, etag)], Json(lot)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ContractParams {
  pub exclude: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContractUsage {
  pub contract_number: String,
  pub in_use:          bool,
}

/// `GET /contracts/:number[?exclude=<lot id>]`
pub async fn contract_in_use<S: DocumentStore>(
  State(state): State<AppState<S>>,
  _actor: Actor,
  Path(number): Path<String>,
  Query(params): Query<ContractParams>,
) -> Result<Json<ContractUsage>, ApiError> {
  let in_use = state.lots.is_contract_number_in_use(&number, params.exclude).await?;
  Ok(Json(ContractUsage { contract_number: number.trim().to_owned(), in_use }))
}

// ─── Submitter transitions ────────────────────────────────────────────────────

/// `POST /lots`
pub async fn create<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Json(details): Json<LotDetails>,
) -> Result<impl IntoResponse, ApiError> {
  let transition = state.lots.create_lot(details, actor.id()).await?;
  Ok((StatusCode::CREATED, Json(state.publish(transition))))
}

/// `PATCH /lots/:id`
///
/// An update that changes nothing returns the lot as stored.
pub async fn update<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  Json(updates): Json<Fields>,
) -> Result<Json<Lot>, ApiError> {
  match state.lots.update_lot(id, updates, actor.id()).await? {
    Some(transition) => Ok(Json(state.publish(transition))),
    None => Ok(Json(visible_lot(&state, &actor, id).await?)),
  }
}

/// `POST /lots/:id/exit`
pub async fn request_exit<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  Json(request): Json<ExitRequest>,
) -> Result<Json<Lot>, ApiError> {
  let transition = state.lots.request_exit(id, request, actor.id()).await?;
  Ok(Json(state.publish(transition)))
}

/// `POST /lots/:id/deletion`
pub async fn request_deletion<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  Json(request): Json<DeletionRequest>,
) -> Result<Json<Lot>, ApiError> {
  let transition = state.lots.request_deletion(id, request, actor.id()).await?;
  Ok(Json(state.publish(transition)))
}

// ─── Approver transitions ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApproveEntryBody {
  pub contract_number: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
  pub reason: String,
}

/// `POST /lots/:id/entry/approve`
pub async fn approve_entry<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<ApproveEntryBody>,
) -> Result<Json<Lot>, ApiError> {
  let transition = state.lots.approve_entry(id, &body.contract_number, actor.id()).await?;
  Ok(Json(state.publish(transition)))
}

/// `POST /lots/:id/entry/reject`
pub async fn reject_entry<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<RejectBody>,
) -> Result<Json<Lot>, ApiError> {
  let transition = state.lots.reject_entry(id, &body.reason, actor.id()).await?;
  Ok(Json(state.publish(transition)))
}

/// `POST /lots/:id/exit/approve`
pub async fn approve_exit<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Lot>, ApiError> {
  let transition = state.lots.approve_exit(id, actor.id()).await?;
  Ok(Json(state.publish(transition)))
}

/// `POST /lots/:id/exit/reject`
pub async fn reject_exit<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<RejectBody>,
) -> Result<Json<Lot>, ApiError> {
  let transition = state.lots.reject_exit(id, &body.reason, actor.id()).await?;
  Ok(Json(state.publish(transition)))
}

/// `POST /lots/:id/deletion/approve`
pub async fn approve_deletion<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Lot>, ApiError> {
  let transition = state.lots.approve_deletion(id, actor.id()).await?;
  Ok(Json(state.publish(transition)))
}

/// `POST /lots/:id/deletion/reject`
pub async fn reject_deletion<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<RejectBody>,
) -> Result<Json<Lot>, ApiError> {
  let transition = state.lots.reject_deletion(id, &body.reason, actor.id()).await?;
  Ok(Json(state.publish(transition)))
}
