//! The lot lifecycle state machine and its read model.
//!
//! ```text
//! entry:     pending ──approve──▶ approved
//!               │
//!               └────reject────▶ rejected
//!
//! exit (approved lots):     none ─▶ pending_approval ─▶ approved | rejected
//! deletion (pending lots):  none ─▶ pending_approval ─▶ approved | rejected
//!                                   (approved forces the lot to rejected)
//! ```
//!
//! The entry decision is blocked while a deletion awaits approval.
//!
//! Every transition checks all of its preconditions before touching the
//! store, then commits with a single document update that also appends one
//! history entry. Nothing guards against two requests racing on the same lot;
//! the store's last write wins.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result, codec,
  event::LotEvent,
  history::{HistoryEntry, HistoryKind},
  identity::{IdentityProvider, Role},
  journal::{self, JournalEntry},
  lot::{
    DELETION_REJECTION_REASON, Deletion, DeletionReason, DeletionRequest, Exit,
    ExitRequest, Lot, LotDetails, LotStatus, RequestStatus,
  },
  store::{DocumentStore, Fields, Filter, LOTS},
};

/// Keys an update may never carry.
pub const FORBIDDEN_UPDATE_FIELDS: &[&str] = &[
  "contract_number",
  "decided_by",
  "status",
  "exit",
  "history",
  "created_by",
];

/// The outcome of a committed transition.
#[derive(Debug, Clone)]
pub struct Transition {
  /// The lot as stored after the transition.
  pub lot:   Lot,
  /// To be handed to an [`EventSink`](crate::event::EventSink).
  pub event: LotEvent,
}

fn today() -> NaiveDate { Utc::now().date_naive() }

fn ensure_not_past(date: NaiveDate, what: &str) -> Result<()> {
  if date < today() {
    return Err(Error::invalid_input(format!("{what} cannot be in the past")));
  }
  Ok(())
}

fn ensure_not_future(date: NaiveDate, what: &str) -> Result<()> {
  if date > today() {
    return Err(Error::invalid_input(format!("{what} cannot be in the future")));
  }
  Ok(())
}

/// Trim `value`, failing if nothing is left.
fn required_text(value: &str, what: &str) -> Result<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(Error::invalid_input(format!("{what} is required")));
  }
  Ok(trimmed.to_owned())
}

fn data<const N: usize>(pairs: [(&str, Value); N]) -> Fields {
  pairs
    .into_iter()
    .filter(|(_, v)| !v.is_null())
    .map(|(k, v)| (k.to_owned(), v))
    .collect()
}

/// Lot workflow operations over an injected store and identity provider.
pub struct LotService<S, I> {
  store:    Arc<S>,
  identity: Arc<I>,
}

impl<S, I> Clone for LotService<S, I> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), identity: Arc::clone(&self.identity) }
  }
}

impl<S, I> LotService<S, I>
where
  S: DocumentStore,
  I: IdentityProvider,
{
  pub fn new(store: Arc<S>, identity: Arc<I>) -> Self { Self { store, identity } }

  pub fn identity(&self) -> &I { &self.identity }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn load_lots(&self, filters: Vec<Filter>) -> Result<Vec<Lot>> {
    let docs = self.store.get_all(LOTS, filters).await.map_err(Error::store)?;
    let mut lots = docs
      .into_iter()
      .map(codec::decode_lot)
      .collect::<Result<Vec<_>>>()?;
    lots.sort_by(|a, b| {
      b.details
        .requested_effective_date
        .cmp(&a.details.requested_effective_date)
    });
    Ok(lots)
  }

  /// Every lot, latest requested effective date first.
  pub async fn all_lots(&self) -> Result<Vec<Lot>> { self.load_lots(vec![]).await }

  /// Lots created by `user_id`, latest requested effective date first.
  pub async fn lots_by_submitter(&self, user_id: Uuid) -> Result<Vec<Lot>> {
    self
      .load_lots(vec![Filter::eq("created_by", user_id.to_string())])
      .await
  }

  /// Returns `None` if no lot has this id.
  pub async fn lot_by_id(&self, id: Uuid) -> Result<Option<Lot>> {
    self
      .store
      .get(LOTS, id)
      .await
      .map_err(Error::store)?
      .map(codec::decode_lot)
      .transpose()
  }

  /// Whether an approved lot other than `exclude` holds `contract_number`
  /// (compared after trimming).
  pub async fn is_contract_number_in_use(
    &self,
    contract_number: &str,
    exclude: Option<Uuid>,
  ) -> Result<bool> {
    let filters = vec![
      Filter::eq("contract_number", contract_number.trim()),
      Filter::eq("status", LotStatus::Approved.as_str()),
    ];
    let docs = self.store.get_all(LOTS, filters).await.map_err(Error::store)?;
    Ok(docs.iter().any(|doc| Some(doc.id) != exclude))
  }

  /// The activity journal as seen by a user with role `viewer`.
  pub async fn journal(&self, viewer: Role) -> Result<Vec<JournalEntry>> {
    Ok(journal::journal(&self.all_lots().await?, viewer))
  }

  // ── Guards ────────────────────────────────────────────────────────────────

  async fn require_lot(&self, id: Uuid) -> Result<Lot> {
    self.lot_by_id(id).await?.ok_or(Error::LotNotFound(id))
  }

  async fn authorize(&self, actor: Uuid, required: Role, action: &str) -> Result<()> {
    match self.identity.role(actor).await? {
      Some(role) if role == required => Ok(()),
      role => {
        debug!(%actor, ?role, %required, action, "transition refused");
        Err(Error::unauthorized(format!("only {required} users may {action}")))
      }
    }
  }

  fn ensure_owner(lot: &Lot, actor: Uuid, action: &str) -> Result<()> {
    if lot.created_by != actor {
      return Err(Error::unauthorized(format!("you may only {action} your own lots")));
    }
    Ok(())
  }

  /// The entry decision waits until a pending deletion request is settled.
  fn ensure_no_pending_deletion(lot: &Lot) -> Result<()> {
    if lot.deletion_status() == Some(RequestStatus::PendingApproval) {
      return Err(Error::invalid_state(
        "a deletion request is awaiting a decision for this lot",
      ));
    }
    Ok(())
  }

  // ── Commit ────────────────────────────────────────────────────────────────

  /// Append `entry`, bump `updated_at`, and write the named top-level fields
  /// together with `updated_at` and `history` in one update.
  async fn commit(
    &self,
    mut lot: Lot,
    fields: &[&str],
    entry: HistoryEntry,
  ) -> Result<Transition> {
    lot.updated_at = entry.timestamp;
    lot.history.push(entry.clone());

    let encoded = codec::encode_lot(&lot)?;
    let partial: Fields = fields
      .iter()
      .copied()
      .chain(["updated_at", "history"])
      .map(|name| {
        (name.to_owned(), encoded.get(name).cloned().unwrap_or(Value::Null))
      })
      .collect();

    self.store.update(LOTS, lot.id, partial).await.map_err(Error::store)?;

    info!(lot_id = %lot.id, actor = %entry.user_id, kind = ?entry.kind, "lot transition committed");
    let event = LotEvent::new(&lot, &entry);
    Ok(Transition { lot, event })
  }

  // ── Submitter transitions ─────────────────────────────────────────────────

  /// Create a pending lot on behalf of a submitter.
  pub async fn create_lot(&self, details: LotDetails, actor: Uuid) -> Result<Transition> {
    self.authorize(actor, Role::Submitter, "create lots").await?;
    details.validate()?;
    ensure_not_past(details.requested_effective_date, "requested effective date")?;

    let entry = HistoryEntry::new(HistoryKind::Creation, actor, codec::encode_fields(&details)?);
    let mut lot = Lot {
      id: Uuid::nil(),
      details,
      created_by: actor,
      status: LotStatus::Pending,
      contract_number: None,
      rejection_reason: None,
      decided_by: None,
      exit: None,
      deletion: None,
      history: vec![entry.clone()],
      created_at: entry.timestamp,
      updated_at: entry.timestamp,
    };

    let fields = codec::encode_lot(&lot)?;
    lot.id = self.store.create(LOTS, fields, None).await.map_err(Error::store)?;

    info!(lot_id = %lot.id, %actor, "lot created");
    let event = LotEvent::new(&lot, &entry);
    Ok(Transition { lot, event })
  }

  /// Apply a partial update of the editable fields of a pending lot.
  ///
  /// `updates` maps field names to new values; `null` clears an optional
  /// field. Returns `Ok(None)` without writing anything when no value
  /// actually changes.
  pub async fn update_lot(
    &self,
    id: Uuid,
    updates: Fields,
    actor: Uuid,
  ) -> Result<Option<Transition>> {
    for key in updates.keys() {
      if FORBIDDEN_UPDATE_FIELDS.contains(&key.as_str()) {
        return Err(Error::invalid_input(format!("field {key} cannot be modified")));
      }
      if !LotDetails::EDITABLE_FIELDS.contains(&key.as_str()) {
        return Err(Error::invalid_input(format!("unknown or read-only field {key}")));
      }
    }

    self.authorize(actor, Role::Submitter, "update lots").await?;
    let mut lot = self.require_lot(id).await?;
    Self::ensure_owner(&lot, actor, "update")?;
    if lot.status != LotStatus::Pending {
      return Err(Error::invalid_state("only pending lots can be updated"));
    }

    let current = codec::encode_fields(&lot.details)?;
    let mut merged = current.clone();
    for (key, value) in updates {
      if value.is_null() {
        merged.remove(&key);
      } else {
        merged.insert(key, value);
      }
    }
    let details: LotDetails = serde_json::from_value(Value::Object(merged))
      .map_err(|e| Error::invalid_input(format!("invalid update: {e}")))?;
    details.validate()?;

    let canonical = codec::encode_fields(&details)?;
    let changed: Vec<&str> = LotDetails::EDITABLE_FIELDS
      .iter()
      .copied()
      .filter(|name| canonical.get(*name) != current.get(*name))
      .collect();
    if changed.is_empty() {
      debug!(lot_id = %id, "update changes nothing");
      return Ok(None);
    }
    if details.requested_effective_date != lot.details.requested_effective_date {
      ensure_not_past(details.requested_effective_date, "requested effective date")?;
    }

    let snapshot: Fields = changed
      .iter()
      .map(|name| {
        (name.to_string(), canonical.get(*name).cloned().unwrap_or(Value::Null))
      })
      .collect();
    lot.details = details;

    let entry = HistoryEntry::new(HistoryKind::Update, actor, snapshot);
    self.commit(lot, &changed, entry).await.map(Some)
  }

  /// Ask the approver to end management of an approved lot.
  pub async fn request_exit(
    &self,
    id: Uuid,
    request: ExitRequest,
    actor: Uuid,
  ) -> Result<Transition> {
    self.authorize(actor, Role::Submitter, "request exits").await?;
    let mut lot = self.require_lot(id).await?;
    Self::ensure_owner(&lot, actor, "request the exit of")?;
    if lot.status != LotStatus::Approved {
      return Err(Error::invalid_state("only approved lots can be exited"));
    }
    if lot.exit_status().is_some_and(RequestStatus::blocks_new_request) {
      return Err(Error::invalid_state("an exit is already pending or approved"));
    }
    let motive = required_text(&request.motive, "exit motive")?;
    ensure_not_past(request.requested_date, "requested exit date")?;
    ensure_not_future(request.declared_on, "exit declaration date")?;

    let entry = HistoryEntry::new(
      HistoryKind::ExitRequested,
      actor,
      data([
        ("motive", json!(motive)),
        ("requested_date", json!(request.requested_date)),
      ]),
    );
    lot.exit = Some(Exit::from(ExitRequest { motive, ..request }));
    self.commit(lot, &["exit"], entry).await
  }

  /// Ask the approver to withdraw a pending lot.
  pub async fn request_deletion(
    &self,
    id: Uuid,
    request: DeletionRequest,
    actor: Uuid,
  ) -> Result<Transition> {
    self.authorize(actor, Role::Submitter, "request deletions").await?;
    let mut lot = self.require_lot(id).await?;
    Self::ensure_owner(&lot, actor, "request the deletion of")?;
    if lot.status != LotStatus::Pending {
      return Err(Error::invalid_state("only pending lots can be deleted"));
    }
    if lot.deletion_status().is_some_and(RequestStatus::blocks_new_request) {
      return Err(Error::invalid_state("a deletion is already pending or approved"));
    }
    let reason_detail = match request.reason {
      DeletionReason::Other => Some(required_text(
        request.reason_detail.as_deref().unwrap_or_default(),
        "deletion reason detail",
      )?),
      DeletionReason::LossOfManagement | DeletionReason::Sale => None,
    };
    ensure_not_past(request.requested_date, "requested deletion date")?;
    ensure_not_future(request.declared_on, "deletion declaration date")?;

    let entry = HistoryEntry::new(
      HistoryKind::DeletionRequested,
      actor,
      data([
        ("reason", json!(request.reason)),
        ("reason_detail", json!(reason_detail)),
        ("requested_date", json!(request.requested_date)),
      ]),
    );
    lot.deletion = Some(Deletion::from(DeletionRequest { reason_detail, ..request }));
    self.commit(lot, &["deletion"], entry).await
  }

  // ── Approver transitions ──────────────────────────────────────────────────

  /// Approve a pending entry under a contract number unique among approved
  /// lots.
  pub async fn approve_entry(
    &self,
    id: Uuid,
    contract_number: &str,
    actor: Uuid,
  ) -> Result<Transition> {
    self.authorize(actor, Role::Approver, "approve entries").await?;
    let mut lot = self.require_lot(id).await?;
    if lot.status != LotStatus::Pending {
      return Err(Error::invalid_state("only pending lots can be approved"));
    }
    Self::ensure_no_pending_deletion(&lot)?;
    let contract_number = required_text(contract_number, "contract number")?;
    if self.is_contract_number_in_use(&contract_number, Some(id)).await? {
      return Err(Error::invalid_input(format!(
        "contract number {contract_number} is already used by another approved lot"
      )));
    }

    let entry = HistoryEntry::new(
      HistoryKind::EntryApproved,
      actor,
      data([("contract_number", json!(contract_number))]),
    );
    lot.status = LotStatus::Approved;
    lot.contract_number = Some(contract_number);
    lot.decided_by = Some(actor);
    self.commit(lot, &["status", "contract_number", "decided_by"], entry).await
  }

  pub async fn reject_entry(&self, id: Uuid, reason: &str, actor: Uuid) -> Result<Transition> {
    self.authorize(actor, Role::Approver, "reject entries").await?;
    let mut lot = self.require_lot(id).await?;
    if lot.status != LotStatus::Pending {
      return Err(Error::invalid_state("only pending lots can be rejected"));
    }
    Self::ensure_no_pending_deletion(&lot)?;
    let reason = required_text(reason, "rejection reason")?;

    let entry =
      HistoryEntry::new(HistoryKind::EntryRejected, actor, data([("reason", json!(reason))]));
    lot.status = LotStatus::Rejected;
    lot.rejection_reason = Some(reason);
    lot.decided_by = Some(actor);
    self.commit(lot, &["status", "rejection_reason", "decided_by"], entry).await
  }

  /// The lot's exit, provided it is awaiting a decision.
  fn pending_exit(lot: &mut Lot) -> Result<&mut Exit> {
    match lot.exit.as_mut() {
      Some(exit) if exit.status == RequestStatus::PendingApproval => Ok(exit),
      _ => Err(Error::invalid_state("no exit is awaiting approval for this lot")),
    }
  }

  fn pending_deletion(lot: &mut Lot) -> Result<&mut Deletion> {
    match lot.deletion.as_mut() {
      Some(deletion) if deletion.status == RequestStatus::PendingApproval => Ok(deletion),
      _ => Err(Error::invalid_state("no deletion is awaiting approval for this lot")),
    }
  }

  /// Approve a pending exit. The lot keeps its `approved` status.
  pub async fn approve_exit(&self, id: Uuid, actor: Uuid) -> Result<Transition> {
    self.authorize(actor, Role::Approver, "approve exits").await?;
    let mut lot = self.require_lot(id).await?;
    let exit = Self::pending_exit(&mut lot)?;
    exit.status = RequestStatus::Approved;
    exit.decided_by = Some(actor);

    let entry = HistoryEntry::new(HistoryKind::ExitApproved, actor, Fields::new());
    self.commit(lot, &["exit"], entry).await
  }

  pub async fn reject_exit(&self, id: Uuid, reason: &str, actor: Uuid) -> Result<Transition> {
    self.authorize(actor, Role::Approver, "reject exits").await?;
    let mut lot = self.require_lot(id).await?;
    let reason = required_text(reason, "rejection reason")?;
    let exit = Self::pending_exit(&mut lot)?;
    exit.status = RequestStatus::Rejected;
    exit.decided_by = Some(actor);
    exit.rejection_reason = Some(reason.clone());

    let entry =
      HistoryEntry::new(HistoryKind::ExitRejected, actor, data([("reason", json!(reason))]));
    self.commit(lot, &["exit"], entry).await
  }

  /// Approve a pending deletion: the lot becomes `rejected` with
  /// [`DELETION_REJECTION_REASON`] and stays in the store with its history.
  pub async fn approve_deletion(&self, id: Uuid, actor: Uuid) -> Result<Transition> {
    self.authorize(actor, Role::Approver, "approve deletions").await?;
    let mut lot = self.require_lot(id).await?;
    if lot.status != LotStatus::Pending {
      return Err(Error::invalid_state(format!(
        "lot is already {}, its deletion can no longer be approved",
        lot.status.as_str()
      )));
    }
    let deletion = Self::pending_deletion(&mut lot)?;
    deletion.status = RequestStatus::Approved;
    deletion.decided_by = Some(actor);

    lot.status = LotStatus::Rejected;
    lot.rejection_reason = Some(DELETION_REJECTION_REASON.to_owned());
    lot.decided_by = Some(actor);

    let entry = HistoryEntry::new(HistoryKind::DeletionApproved, actor, Fields::new());
    self
      .commit(lot, &["status", "rejection_reason", "decided_by", "deletion"], entry)
      .await
  }

  pub async fn reject_deletion(&self, id: Uuid, reason: &str, actor: Uuid) -> Result<Transition> {
    self.authorize(actor, Role::Approver, "reject deletions").await?;
    let mut lot = self.require_lot(id).await?;
    let reason = required_text(reason, "rejection reason")?;
    let deletion = Self::pending_deletion(&mut lot)?;
    deletion.status = RequestStatus::Rejected;
    deletion.decided_by = Some(actor);
    deletion.rejection_reason = Some(reason.clone());

    let entry = HistoryEntry::new(
      HistoryKind::DeletionRejected,
      actor,
      data([("reason", json!(reason))]),
    );
    self.commit(lot, &["deletion"], entry).await
  }
}
