//! Core types and the lot lifecycle state machine for lotflow.
//!
//! Nothing here speaks HTTP or SQL. The document store and identity provider
//! are traits, with concrete backends in sibling crates such as
//! `lotflow-store-sqlite`.

// Trait methods return `impl Future + Send` explicitly.
#![allow(async_fn_in_trait)]

pub mod codec;
pub mod error;
pub mod event;
pub mod history;
pub mod identity;
pub mod journal;
pub mod lifecycle;
pub mod lot;
pub mod memory;
pub mod store;

pub use error::{Error, ErrorKind, Result};
pub use lifecycle::{LotService, Transition};
