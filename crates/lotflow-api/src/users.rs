//! Handlers for `/users` endpoints. All of them require the approver role.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/users` | Oldest first |
//! | `POST`   | `/users` | Body: `{"email","password","role","display_name"?}` |
//! | `PUT`    | `/users/:id/role` | Body: `{"role":"approver"}` |
//! | `PUT`    | `/users/:id/active` | Body: `{"active":false}` |
//! | `DELETE` | `/users/:id` | 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use lotflow_core::{
  identity::{NewUser, Role, User},
  store::DocumentStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Actor, AppState,
  error::ApiError,
  password::{MIN_PASSWORD_LEN, hash_password},
};

/// `GET /users`
pub async fn list<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
) -> Result<Json<Vec<User>>, ApiError> {
  actor.require(Role::Approver)?;
  Ok(Json(state.users.list_users().await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub email:        String,
  pub password:     String,
  pub role:         Role,
  #[serde(default)]
  pub display_name: Option<String>,
}

/// `POST /users`
pub async fn create<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(Role::Approver)?;
  if body.password.chars().count() < MIN_PASSWORD_LEN {
    return Err(ApiError::BadRequest(format!(
      "password must be at least {MIN_PASSWORD_LEN} characters"
    )));
  }
  let hash = hash_password(&body.password)
    .map_err(|e| ApiError::Internal(format!("cannot hash password: {e}")))?;

  let new = NewUser { email: body.email, role: body.role, display_name: body.display_name };
  let user = state.users.create_user(new, hash).await?;
  Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
  pub role: Role,
}

/// `PUT /users/:id/role`
pub async fn set_role<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<RoleBody>,
) -> Result<Json<User>, ApiError> {
  actor.require(Role::Approver)?;
  Ok(Json(state.users.set_role(id, body.role).await?))
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
  pub active: bool,
}

/// `PUT /users/:id/active`
pub async fn set_active<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<ActiveBody>,
) -> Result<Json<User>, ApiError> {
  actor.require(Role::Approver)?;
  Ok(Json(state.users.set_active(id, body.active).await?))
}

/// `DELETE /users/:id`
pub async fn delete_one<S: DocumentStore>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  actor.require(Role::Approver)?;
  state.users.delete_user(id).await?;
  Ok(StatusCode::NO_CONTENT)
}
