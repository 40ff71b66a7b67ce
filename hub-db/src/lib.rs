// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Transactional gateway over the hub's sweep store. Two logical tables:
//! `sweeps` (read-only here) and `sweep_tails` (append plus a single
//! confirmation flip per sweep).

pub mod memory;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::MemoryHubDb;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("unknown tail {0}")]
    UnknownTail(String),
    #[error("transient database failure: {0}")]
    Transient(String),
}

/// A consolidated bundle produced by the sweep builder. The serialized
/// trytes are immutable: reattachment re-publishes exactly these frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sweep {
    pub id: i64,
    pub bundle_hash: String,
    pub trytes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// One known attachment of a sweep. Rows are append-only; `confirmed` flips
/// to true at most once per sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepTail {
    pub sweep_id: i64,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub confirmed: bool,
}

/// Transaction guard. Dropping the guard without calling either method rolls
/// back. A failed `commit` leaves the store at its pre-transaction state.
pub trait DbTransaction: Send {
    fn commit(self: Box<Self>) -> Result<()>;
    fn rollback(self: Box<Self>) -> Result<()>;
}

pub trait HubDb: Send + Sync {
    fn begin_transaction(&self) -> Result<Box<dyn DbTransaction>>;

    fn create_sweep(&self, bundle_hash: &str, trytes: &[String]) -> Result<Sweep>;

    /// Sweeps created before `as_of` with no confirmed tail, in creation
    /// order. The order is stable within a tick.
    fn get_unconfirmed_sweeps(&self, as_of: DateTime<Utc>) -> Result<Vec<Sweep>>;

    /// Tail hashes for a sweep in creation order, newest last.
    fn get_tails_for_sweep(&self, sweep_id: i64) -> Result<Vec<String>>;

    /// Upsert-if-absent; inserting a known (sweep, tail) pair is a no-op.
    fn create_tail(&self, sweep_id: i64, hash: &str) -> Result<()>;

    fn mark_tail_confirmed(&self, hash: &str) -> Result<()>;
}
