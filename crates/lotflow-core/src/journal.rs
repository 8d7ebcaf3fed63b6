//! Read-side projections over lots: the activity journal and the dashboard
//! counters.

use serde::Serialize;
use uuid::Uuid;

use crate::{
  history::HistoryEntry,
  identity::Role,
  lot::{Lot, LotStatus, RequestStatus},
};

/// One history entry together with the lot it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntry {
  pub lot_id:     Uuid,
  pub lot_code:   String,
  pub owner_code: String,
  pub address:    String,
  #[serde(flatten)]
  pub entry:      HistoryEntry,
}

/// Flatten the histories of `lots`, newest first.
///
/// Approvers see every entry. Submitters only see the entries their own role
/// produces.
pub fn journal(lots: &[Lot], viewer: Role) -> Vec<JournalEntry> {
  let mut entries: Vec<JournalEntry> = lots
    .iter()
    .flat_map(|lot| {
      lot
        .history
        .iter()
        .filter(move |e| viewer == Role::Approver || e.kind.initiator() == viewer)
        .map(move |e| JournalEntry {
          lot_id:     lot.id,
          lot_code:   lot.details.lot_code.clone(),
          owner_code: lot.details.owner_code.clone(),
          address:    lot.details.full_address(),
          entry:      e.clone(),
        })
    })
    .collect();
  entries.sort_by(|a, b| b.entry.timestamp.cmp(&a.entry.timestamp));
  entries
}

/// Counts of exit or deletion requests by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestCounts {
  pub pending_approval: usize,
  pub approved:         usize,
  pub rejected:         usize,
}

impl RequestCounts {
  fn add(&mut self, status: Option<RequestStatus>) {
    match status {
      Some(RequestStatus::PendingApproval) => self.pending_approval += 1,
      Some(RequestStatus::Approved) => self.approved += 1,
      Some(RequestStatus::Rejected) => self.rejected += 1,
      None => {}
    }
  }
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LotStats {
  pub total:     usize,
  pub pending:   usize,
  pub approved:  usize,
  pub rejected:  usize,
  pub exits:     RequestCounts,
  pub deletions: RequestCounts,
}

impl LotStats {
  pub fn from_lots(lots: &[Lot]) -> Self {
    let mut stats = Self { total: lots.len(), ..Self::default() };
    for lot in lots {
      match lot.status {
        LotStatus::Pending => stats.pending += 1,
        LotStatus::Approved => stats.approved += 1,
        LotStatus::Rejected => stats.rejected += 1,
      }
      stats.exits.add(lot.exit_status());
      stats.deletions.add(lot.deletion_status());
    }
    stats
  }
}
