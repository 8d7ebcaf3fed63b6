//! Events emitted by lifecycle transitions.
//!
//! The state machine never talks to the notification channel directly: every
//! transition returns a [`LotEvent`] and the caller hands it to an
//! [`EventSink`]. Sinks are fire-and-forget; they must not block and have no
//! way to report failure back to the transition.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  history::{HistoryEntry, HistoryKind},
  lot::Lot,
  store::Fields,
};

/// A committed transition, with enough lot context to describe it without
/// re-reading the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotEvent {
  pub lot_id:          Uuid,
  pub kind:            HistoryKind,
  pub actor:           Uuid,
  pub at:              DateTime<Utc>,
  pub lot_code:        String,
  pub address:         String,
  pub contract_number: Option<String>,
  /// The `data` of the history entry written by the transition.
  pub data:            Fields,
}

impl LotEvent {
  pub fn new(lot: &Lot, entry: &HistoryEntry) -> Self {
    Self {
      lot_id:          lot.id,
      kind:            entry.kind,
      actor:           entry.user_id,
      at:              entry.timestamp,
      lot_code:        lot.details.lot_code.clone(),
      address:         lot.details.full_address(),
      contract_number: lot.contract_number.clone(),
      data:            entry.data.clone(),
    }
  }
}

/// Destination for [`LotEvent`]s.
pub trait EventSink: Send + Sync {
  fn publish(&self, event: LotEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardEvents;

impl EventSink for DiscardEvents {
  fn publish(&self, _event: LotEvent) {}
}

/// Keeps every event in memory; used by tests.
#[derive(Debug, Default)]
pub struct CollectEvents {
  events: Mutex<Vec<LotEvent>>,
}

impl CollectEvents {
  pub fn take(&self) -> Vec<LotEvent> {
    std::mem::take(&mut *self.events.lock().unwrap_or_else(|p| p.into_inner()))
  }
}

impl EventSink for CollectEvents {
  fn publish(&self, event: LotEvent) {
    self.events.lock().unwrap_or_else(|p| p.into_inner()).push(event);
  }
}
