//! Users, roles, and the identity provider consumed by the lifecycle service.
//!
//! [`UserDirectory`] is the provider used in production: user records live in
//! the [`USERS`] collection of the same document store as the lots. Password
//! hashing is the caller's concern; the directory only stores the hash.

use std::{fmt, future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result, codec,
  store::{DocumentStore, Fields, Filter, USERS},
};

/// The organisational role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  /// Creates lots and requests exits and deletions.
  Submitter,
  /// Decides on entries, exits, and deletions.
  Approver,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Submitter => "submitter",
      Self::Approver => "approver",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:           Uuid,
  pub email:        String,
  pub role:         Role,
  #[serde(default = "default_active")]
  pub active:       bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  pub created_at:   DateTime<Utc>,
}

fn default_active() -> bool { true }

impl User {
  /// Display name if set, otherwise the email address.
  pub fn label(&self) -> &str {
    match self.display_name.as_deref() {
      Some(name) if !name.trim().is_empty() => name,
      _ => &self.email,
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Resolves user ids to user records and roles.
pub trait IdentityProvider: Send + Sync {
  /// Look up a user. Returns `None` if the id is unknown.
  fn user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>>> + Send + '_;

  /// The role a user may act with. Unknown and deactivated users have none.
  fn role(&self, id: Uuid) -> impl Future<Output = Result<Option<Role>>> + Send + '_ {
    async move { Ok(self.user(id).await?.filter(|u| u.active).map(|u| u.role)) }
  }
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// Input to [`UserDirectory::create_user`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub email:        String,
  pub role:         Role,
  #[serde(default)]
  pub display_name: Option<String>,
}

/// A user record as stored, including the password hash.
#[derive(Serialize, Deserialize)]
struct StoredUser {
  #[serde(flatten)]
  user:          User,
  password_hash: String,
}

/// Store-backed user management and [`IdentityProvider`].
pub struct UserDirectory<S> {
  store:            Arc<S>,
  /// This account can't be modified, deactivated, or deleted.
  root_admin_email: Option<String>,
}

impl<S> Clone for UserDirectory<S> {
  fn clone(&self) -> Self {
    Self {
      store:            Arc::clone(&self.store),
      root_admin_email: self.root_admin_email.clone(),
    }
  }
}

fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

impl<S: DocumentStore> UserDirectory<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store, root_admin_email: None } }

  pub fn with_root_admin(mut self, email: impl AsRef<str>) -> Self {
    self.root_admin_email = Some(normalize_email(email.as_ref()));
    self
  }

  async fn load(&self, id: Uuid) -> Result<Option<StoredUser>> {
    self
      .store
      .get(USERS, id)
      .await
      .map_err(Error::store)?
      .map(|doc| codec::decode_document(USERS, doc))
      .transpose()
  }

  async fn load_all(&self, filters: Vec<Filter>) -> Result<Vec<StoredUser>> {
    self
      .store
      .get_all(USERS, filters)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|doc| codec::decode_document(USERS, doc))
      .collect()
  }

  /// Load a user that is allowed to be changed.
  async fn load_mutable(&self, id: Uuid) -> Result<User> {
    let stored = self.load(id).await?.ok_or(Error::UserNotFound(id))?;
    if self.root_admin_email.as_deref() == Some(stored.user.email.as_str()) {
      return Err(Error::invalid_input("the root administrator cannot be modified"));
    }
    Ok(stored.user)
  }

  /// Register a new, active user. `email` is trimmed and lower-cased.
  pub async fn create_user(&self, new: NewUser, password_hash: String) -> Result<User> {
    let email = normalize_email(&new.email);
    if !email.contains('@') {
      return Err(Error::invalid_input("invalid email address"));
    }
    if !self.load_all(vec![Filter::eq("email", email.clone())]).await?.is_empty() {
      return Err(Error::invalid_input(format!("a user with email {email} already exists")));
    }

    let id = Uuid::new_v4();
    let user = User {
      id,
      email,
      role: new.role,
      active: true,
      display_name: new.display_name.filter(|n| !n.trim().is_empty()),
      created_at: Utc::now(),
    };
    let mut fields = codec::encode_fields(&StoredUser { user: user.clone(), password_hash })?;
    fields.remove("id");

    self.store.create(USERS, fields, Some(id)).await.map_err(Error::store)?;
    info!(user_id = %id, role = %user.role, "user created");
    Ok(user)
  }

  /// All users, oldest first.
  pub async fn list_users(&self) -> Result<Vec<User>> {
    let mut users: Vec<User> =
      self.load_all(vec![]).await?.into_iter().map(|s| s.user).collect();
    users.sort_by_key(|u| u.created_at);
    Ok(users)
  }

  pub async fn active_submitters(&self) -> Result<Vec<User>> {
    let filters = vec![
      Filter::eq("role", Role::Submitter.as_str()),
      Filter::eq("active", true),
    ];
    let mut users: Vec<User> =
      self.load_all(filters).await?.into_iter().map(|s| s.user).collect();
    users.sort_by(|a, b| a.label().cmp(b.label()));
    Ok(users)
  }

  /// The user registered under `email` with their password hash, for
  /// credential verification.
  pub async fn credentials(&self, email: &str) -> Result<Option<(User, String)>> {
    let found = self
      .load_all(vec![Filter::eq("email", normalize_email(email))])
      .await?
      .into_iter()
      .next();
    Ok(found.map(|s| (s.user, s.password_hash)))
  }

  pub async fn set_role(&self, id: Uuid, role: Role) -> Result<User> {
    let mut user = self.load_mutable(id).await?;
    user.role = role;
    self.write_fields(id, [("role", serde_json::json!(role))]).await?;
    info!(user_id = %id, %role, "user role changed");
    Ok(user)
  }

  pub async fn set_active(&self, id: Uuid, active: bool) -> Result<User> {
    let mut user = self.load_mutable(id).await?;
    user.active = active;
    self.write_fields(id, [("active", serde_json::json!(active))]).await?;
    info!(user_id = %id, active, "user status changed");
    Ok(user)
  }

  pub async fn delete_user(&self, id: Uuid) -> Result<()> {
    self.load_mutable(id).await?;
    self.store.delete(USERS, id).await.map_err(Error::store)?;
    info!(user_id = %id, "user deleted");
    Ok(())
  }

  async fn write_fields<const N: usize>(
    &self,
    id: Uuid,
    changes: [(&str, serde_json::Value); N],
  ) -> Result<()> {
    let mut partial: Fields =
      changes.into_iter().map(|(k, v)| (k.to_owned(), v)).collect();
    partial.insert("updated_at".to_owned(), serde_json::json!(Utc::now()));
    self.store.update(USERS, id, partial).await.map_err(Error::store)
  }
}

impl<S: DocumentStore> IdentityProvider for UserDirectory<S> {
  async fn user(&self, id: Uuid) -> Result<Option<User>> {
    Ok(self.load(id).await?.map(|s| s.user))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::memory::MemoryStore;

  fn directory() -> UserDirectory<MemoryStore> {
    UserDirectory::new(Arc::new(MemoryStore::new())).with_root_admin("Root@Example.com")
  }

  fn new_user(email: &str, role: Role) -> NewUser {
    NewUser { email: email.into(), role, display_name: None }
  }

  #[tokio::test]
  async fn created_user_resolves_role() {
    let dir = directory();
    let user = dir
      .create_user(new_user(" Alice@Example.com ", Role::Approver), "hash".into())
      .await
      .unwrap();
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(dir.role(user.id).await.unwrap(), Some(Role::Approver));
  }

  #[tokio::test]
  async fn unknown_user_has_no_role() {
    let dir = directory();
    assert_eq!(dir.role(Uuid::new_v4()).await.unwrap(), None);
  }

  #[tokio::test]
  async fn deactivated_user_has_no_role() {
    let dir = directory();
    let user = dir.create_user(new_user("s@example.com", Role::Submitter), "h".into()).await.unwrap();
    dir.set_active(user.id, false).await.unwrap();
    assert_eq!(dir.role(user.id).await.unwrap(), None);
    assert!(!dir.user(user.id).await.unwrap().unwrap().active);
  }

  #[tokio::test]
  async fn duplicate_email_rejected() {
    let dir = directory();
    dir.create_user(new_user("dup@example.com", Role::Submitter), "h".into()).await.unwrap();
    let err = dir
      .create_user(new_user("DUP@example.com", Role::Approver), "h".into())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
  }

  #[tokio::test]
  async fn email_without_at_rejected() {
    let dir = directory();
    let err = dir.create_user(new_user("nobody", Role::Submitter), "h".into()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
  }

  #[tokio::test]
  async fn root_admin_is_protected() {
    let dir = directory();
    let root = dir.create_user(new_user("root@example.com", Role::Approver), "h".into()).await.unwrap();

    assert!(matches!(dir.set_role(root.id, Role::Submitter).await, Err(Error::InvalidInput(_))));
    assert!(matches!(dir.set_active(root.id, false).await, Err(Error::InvalidInput(_))));
    assert!(matches!(dir.delete_user(root.id).await, Err(Error::InvalidInput(_))));
    assert_eq!(dir.role(root.id).await.unwrap(), Some(Role::Approver));
  }

  #[tokio::test]
  async fn credentials_lookup_by_email() {
    let dir = directory();
    let user = dir.create_user(new_user("c@example.com", Role::Submitter), "phc".into()).await.unwrap();
    let (found, hash) = dir.credentials("C@example.com").await.unwrap().unwrap();
    assert_eq!(found.id, user.id);
    assert_eq!(hash, "phc");
    assert!(dir.credentials("missing@example.com").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn active_submitters_excludes_approvers_and_inactive() {
    let dir = directory();
    let keep = dir.create_user(new_user("a@example.com", Role::Submitter), "h".into()).await.unwrap();
    let off = dir.create_user(new_user("b@example.com", Role::Submitter), "h".into()).await.unwrap();
    dir.create_user(new_user("c@example.com", Role::Approver), "h".into()).await.unwrap();
    dir.set_active(off.id, false).await.unwrap();

    let ids: Vec<Uuid> = dir.active_submitters().await.unwrap().into_iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![keep.id]);
  }

  #[tokio::test]
  async fn delete_missing_user_is_not_found() {
    let dir = directory();
    assert!(matches!(dir.delete_user(Uuid::new_v4()).await, Err(Error::UserNotFound(_))));
  }
}
