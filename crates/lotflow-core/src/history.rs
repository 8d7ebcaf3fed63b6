//! The append-only audit trail carried by every lot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{identity::Role, store::Fields};

/// The transition that produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
  Creation,
  Update,
  EntryApproved,
  EntryRejected,
  ExitRequested,
  ExitApproved,
  ExitRejected,
  DeletionRequested,
  DeletionApproved,
  DeletionRejected,
}

impl HistoryKind {
  pub const ALL: [HistoryKind; 10] = [
    Self::Creation,
    Self::Update,
    Self::EntryApproved,
    Self::EntryRejected,
    Self::ExitRequested,
    Self::ExitApproved,
    Self::ExitRejected,
    Self::DeletionRequested,
    Self::DeletionApproved,
    Self::DeletionRejected,
  ];

  /// The role that performs this kind of transition.
  pub fn initiator(self) -> Role {
    match self {
      Self::Creation
      | Self::Update
      | Self::ExitRequested
      | Self::DeletionRequested => Role::Submitter,
      Self::EntryApproved
      | Self::EntryRejected
      | Self::ExitApproved
      | Self::ExitRejected
      | Self::DeletionApproved
      | Self::DeletionRejected => Role::Approver,
    }
  }

  /// Human-readable label.
  pub fn label(self) -> &'static str {
    match self {
      Self::Creation => "Lot created",
      Self::Update => "Lot updated",
      Self::EntryApproved => "Entry approved",
      Self::EntryRejected => "Entry rejected",
      Self::ExitRequested => "Exit requested",
      Self::ExitApproved => "Exit approved",
      Self::ExitRejected => "Exit rejected",
      Self::DeletionRequested => "Deletion requested",
      Self::DeletionApproved => "Deletion approved",
      Self::DeletionRejected => "Deletion rejected",
    }
  }
}

/// One immutable record in a lot's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  #[serde(rename = "type")]
  pub kind:      HistoryKind,
  pub timestamp: DateTime<Utc>,
  pub user_id:   Uuid,
  /// Snapshot of the fields relevant to the transition: the submitted fields
  /// for a creation, the changed fields for an update, the reason for a
  /// rejection, and so on.
  #[serde(default)]
  pub data:      Fields,
}

impl HistoryEntry {
  pub fn new(kind: HistoryKind, user_id: Uuid, data: Fields) -> Self {
    Self { kind, timestamp: Utc::now(), user_id, data }
  }
}
