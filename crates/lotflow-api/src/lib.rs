//! JSON REST API for lotflow.
//!
//! Exposes an axum [`Router`] backed by any [`DocumentStore`]. Authentication
//! is the caller's responsibility: the router expects every request to carry
//! an [`Actor`] in its extensions, inserted by an authentication layer. TLS
//! and transport concerns are likewise left to the caller.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", lotflow_api::api_router(state.clone()))
//! ```

pub mod activity;
pub mod error;
pub mod etag;
pub mod lots;
pub mod password;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  extract::FromRequestParts,
  http::request::Parts,
  routing::{get, post, put},
};
use lotflow_core::{
  LotService, Transition,
  event::EventSink,
  identity::{Role, User, UserDirectory},
  lot::Lot,
  store::DocumentStore,
};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all API handlers.
pub struct AppState<S> {
  pub lots:   Arc<LotService<S, UserDirectory<S>>>,
  pub users:  Arc<UserDirectory<S>>,
  /// Receives the event of every committed transition.
  pub events: Arc<dyn EventSink>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      lots:   Arc::clone(&self.lots),
      users:  Arc::clone(&self.users),
      events: Arc::clone(&self.events),
    }
  }
}

impl<S: DocumentStore> AppState<S> {
  pub fn new(store: Arc<S>, users: UserDirectory<S>, events: Arc<dyn EventSink>) -> Self {
    let users = Arc::new(users);
    Self {
      lots: Arc::new(LotService::new(store, Arc::clone(&users))),
      users,
      events,
    }
  }

  /// Hand the transition's event to the sink and keep the lot.
  pub(crate) fn publish(&self, transition: Transition) -> Lot {
    let Transition { lot, event } = transition;
    self.events.publish(event);
    lot
  }
}

// ─── Actor ────────────────────────────────────────────────────────────────────

/// The authenticated user a request acts on behalf of.
///
/// Handlers take it as an extractor; it is read from the request extensions
/// and rejects with 401 when absent.
#[derive(Debug, Clone)]
pub struct Actor(pub User);

impl Actor {
  pub fn id(&self) -> uuid::Uuid { self.0.id }

  pub fn role(&self) -> Role { self.0.role }

  /// Fail with 403 unless the actor has `role`.
  pub fn require(&self, role: Role) -> Result<(), ApiError> {
    if self.0.role != role {
      return Err(ApiError::Forbidden(format!("this action requires the {role} role")));
    }
    Ok(())
  }
}

impl<St: Send + Sync> FromRequestParts<St> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, ApiError> {
    parts
      .extensions
      .get::<Actor>()
      .cloned()
      .ok_or(ApiError::Unauthenticated)
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: DocumentStore + 'static,
{
  Router::new()
    // Lots
    .route("/lots", get(lots::list::<S>).post(lots::create::<S>))
    .route("/lots/{id}", get(lots::get_one::<S>).patch(lots::update::<S>))
    .route("/lots/{id}/entry/approve", post(lots::approve_entry::<S>))
    .route("/lots/{id}/entry/reject", post(lots::reject_entry::<S>))
    .route("/lots/{id}/exit", post(lots::request_exit::<S>))
    .route("/lots/{id}/exit/approve", post(lots::approve_exit::<S>))
    .route("/lots/{id}/exit/reject", post(lots::reject_exit::<S>))
    .route("/lots/{id}/deletion", post(lots::request_deletion::<S>))
    .route("/lots/{id}/deletion/approve", post(lots::approve_deletion::<S>))
    .route("/lots/{id}/deletion/reject", post(lots::reject_deletion::<S>))
    .route("/contracts/{number}", get(lots::contract_in_use::<S>))
    // Activity
    .route("/journal", get(activity::journal::<S>))
    .route("/stats", get(activity::stats::<S>))
    // Users
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route("/users/{id}", axum::routing::delete(users::delete_one::<S>))
    .route("/users/{id}/role", put(users::set_role::<S>))
    .route("/users/{id}/active", put(users::set_active::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
