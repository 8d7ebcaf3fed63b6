//! Lot types: the central aggregate of the workflow.
//!
//! A lot is an insurable housing unit. Its descriptive fields are editable
//! while the entry is pending; everything else is driven exclusively by the
//! transitions in [`crate::lifecycle`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, history::HistoryEntry};

/// Rejection reason recorded when an approved deletion withdraws a lot.
pub const DELETION_REJECTION_REASON: &str = "Withdrawn by the submitter";

// ─── Statuses ────────────────────────────────────────────────────────────────

/// Primary lifecycle status of a lot's entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
  Pending,
  Approved,
  Rejected,
}

impl LotStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
    }
  }
}

/// Status of an exit or deletion sub-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
  PendingApproval,
  Approved,
  Rejected,
}

impl RequestStatus {
  /// Whether this request blocks a new request of the same kind.
  /// Only a rejected request may be filed again.
  pub fn blocks_new_request(self) -> bool {
    match self {
      Self::PendingApproval | Self::Approved => true,
      Self::Rejected => false,
    }
  }
}

// ─── Descriptive sub-types ───────────────────────────────────────────────────

/// Which floor the unit sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Floor {
  Ground,
  Intermediate,
  Top,
}

/// Size class of the unit, 1 through 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct UnitSize(u8);

impl UnitSize {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 5;

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<u8> for UnitSize {
  type Error = Error;

  fn try_from(value: u8) -> Result<Self> {
    if (Self::MIN..=Self::MAX).contains(&value) {
      Ok(Self(value))
    } else {
      Err(Error::invalid_input(format!(
        "unit size must be between {} and {}, got {value}",
        Self::MIN,
        Self::MAX
      )))
    }
  }
}

impl From<UnitSize> for u8 {
  fn from(size: UnitSize) -> Self { size.0 }
}

/// The submitter-editable description of a lot. Also the input to
/// [`LotService::create_lot`](crate::lifecycle::LotService::create_lot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDetails {
  pub owner_code:               String,
  pub owner_name:               String,
  pub lot_code:                 String,
  pub address:                  String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub address_complement:       Option<String>,
  pub postal_code:              String,
  pub city:                     String,
  pub floor:                    Floor,
  pub unit_size:                UnitSize,
  pub garage_elsewhere:         bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub garage_address:           Option<String>,
  pub management_start:         NaiveDate,
  pub requested_effective_date: NaiveDate,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note:                     Option<String>,
}

impl LotDetails {
  /// Field names a submitter may change through an update.
  pub const EDITABLE_FIELDS: &'static [&'static str] = &[
    "owner_code",
    "owner_name",
    "lot_code",
    "address",
    "address_complement",
    "postal_code",
    "city",
    "floor",
    "unit_size",
    "garage_elsewhere",
    "garage_address",
    "management_start",
    "requested_effective_date",
    "note",
  ];

  /// Check required fields. Date rules depend on "today" and are enforced by
  /// the lifecycle service.
  pub fn validate(&self) -> Result<()> {
    let required = [
      ("owner_code", &self.owner_code),
      ("owner_name", &self.owner_name),
      ("lot_code", &self.lot_code),
      ("address", &self.address),
      ("postal_code", &self.postal_code),
      ("city", &self.city),
    ];
    for (name, value) in required {
      if value.trim().is_empty() {
        return Err(Error::invalid_input(format!("{name} is required")));
      }
    }

    let garage_given = self
      .garage_address
      .as_deref()
      .is_some_and(|a| !a.trim().is_empty());
    if self.garage_elsewhere && !garage_given {
      return Err(Error::invalid_input(
        "garage_address is required when the garage is at another address",
      ));
    }
    Ok(())
  }

  /// `"12 rue X, 75001 Paris"`, used in notifications and the journal.
  pub fn full_address(&self) -> String {
    format!("{}, {} {}", self.address, self.postal_code, self.city)
  }
}

// ─── Exit ────────────────────────────────────────────────────────────────────

/// Input to [`LotService::request_exit`](crate::lifecycle::LotService::request_exit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRequest {
  pub motive:         String,
  pub requested_date: NaiveDate,
  /// When the exit was declared; never in the future.
  pub declared_on:    NaiveDate,
  #[serde(default)]
  pub note:           Option<String>,
}

/// The end of active management of an approved lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
  pub motive:           String,
  pub requested_date:   NaiveDate,
  pub declared_on:      NaiveDate,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note:             Option<String>,
  pub status:           RequestStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub decided_by:       Option<Uuid>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rejection_reason: Option<String>,
}

impl From<ExitRequest> for Exit {
  fn from(r: ExitRequest) -> Self {
    Exit {
      motive:           r.motive,
      requested_date:   r.requested_date,
      declared_on:      r.declared_on,
      note:             r.note,
      status:           RequestStatus::PendingApproval,
      decided_by:       None,
      rejection_reason: None,
    }
  }
}

// ─── Deletion ────────────────────────────────────────────────────────────────

/// Why a pending lot should be withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
  LossOfManagement,
  Sale,
  /// Requires a free-text `reason_detail`.
  Other,
}

impl DeletionReason {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::LossOfManagement => "loss_of_management",
      Self::Sale => "sale",
      Self::Other => "other",
    }
  }
}

/// Input to [`LotService::request_deletion`](crate::lifecycle::LotService::request_deletion).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRequest {
  pub reason:         DeletionReason,
  #[serde(default)]
  pub reason_detail:  Option<String>,
  pub requested_date: NaiveDate,
  pub declared_on:    NaiveDate,
  #[serde(default)]
  pub note:           Option<String>,
}

/// Withdrawal of a still-pending lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deletion {
  pub reason:           DeletionReason,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason_detail:    Option<String>,
  pub requested_date:   NaiveDate,
  pub declared_on:      NaiveDate,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note:             Option<String>,
  pub status:           RequestStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub decided_by:       Option<Uuid>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rejection_reason: Option<String>,
}

impl From<DeletionRequest> for Deletion {
  fn from(r: DeletionRequest) -> Self {
    Deletion {
      reason:           r.reason,
      reason_detail:    r.reason_detail,
      requested_date:   r.requested_date,
      declared_on:      r.declared_on,
      note:             r.note,
      status:           RequestStatus::PendingApproval,
      decided_by:       None,
      rejection_reason: None,
    }
  }
}

// ─── Lot ─────────────────────────────────────────────────────────────────────

/// A lot with its full lifecycle state and audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
  pub id:               Uuid,
  #[serde(flatten)]
  pub details:          LotDetails,
  /// The submitter who created the lot; never changes.
  pub created_by:       Uuid,
  pub status:           LotStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub contract_number:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rejection_reason: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub decided_by:       Option<Uuid>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exit:             Option<Exit>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub deletion:         Option<Deletion>,
  /// Append-only; one entry per state-changing transition.
  #[serde(default)]
  pub history:          Vec<HistoryEntry>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

impl Lot {
  pub fn exit_status(&self) -> Option<RequestStatus> {
    self.exit.as_ref().map(|e| e.status)
  }

  pub fn deletion_status(&self) -> Option<RequestStatus> {
    self.deletion.as_ref().map(|d| d.status)
  }
}
