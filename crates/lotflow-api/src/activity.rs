//! Handlers for the `/journal` and `/stats` read models.

use axum::{Json, extract::State};
use lotflow_core::{
  identity::Role,
  journal::{JournalEntry, LotStats},
  store::DocumentStore,
};

use crate::{Actor, AppState, error::ApiError};

/// `GET /journal`: every lot's history, newest first, filtered for the
/// actor's role.
pub async fn journal<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
) -> Result<Json<Vec<JournalEntry>>, ApiError> {
  Ok(Json(state.lots.journal(actor.role()).await?))
}

/// `GET /stats`: counters over the actor's own lots, or over every lot for
/// approvers.
pub async fn stats<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
) -> Result<Json<LotStats>, ApiError> {
  let lots = match actor.role() {
    Role::Approver => state.lots.all_lots().await?,
    Role::Submitter => state.lots.lots_by_submitter(actor.id()).await?,
  };
  Ok(Json(LotStats::from_lots(&lots)))
}
