// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! In-memory gateway with snapshot transactions. Serves tests and
//! single-node deployments; a SQL backend would slot in behind [`HubDb`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{DbError, DbTransaction, HubDb, Result, Sweep, SweepTail};

#[derive(Default, Clone)]
struct State {
    next_sweep_id: i64,
    sweeps: Vec<Sweep>,
    tails: Vec<SweepTail>,
}

struct Inner {
    state: Mutex<State>,
    snapshot: Mutex<Option<State>>,
}

#[derive(Clone)]
pub struct MemoryHubDb {
    inner: Arc<Inner>,
}

impl MemoryHubDb {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                snapshot: Mutex::new(None),
            }),
        }
    }

    /// Full tail rows, for assertions and operator inspection.
    pub fn tail_rows(&self) -> Vec<SweepTail> {
        self.inner.state.lock().tails.clone()
    }

    pub fn sweep_rows(&self) -> Vec<Sweep> {
        self.inner.state.lock().sweeps.clone()
    }
}

impl Default for MemoryHubDb {
    fn default() -> Self {
        Self::new()
    }
}

impl HubDb for MemoryHubDb {
    fn begin_transaction(&self) -> Result<Box<dyn DbTransaction>> {
        let mut snapshot = self.inner.snapshot.lock();
        if snapshot.is_some() {
            return Err(DbError::Transient("transaction already open".into()));
        }
        *snapshot = Some(self.inner.state.lock().clone());
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            finished: false,
        }))
    }

    fn create_sweep(&self, bundle_hash: &str, trytes: &[String]) -> Result<Sweep> {
        let mut state = self.inner.state.lock();
        state.next_sweep_id += 1;
        let sweep = Sweep {
            id: state.next_sweep_id,
            bundle_hash: bundle_hash.to_string(),
            trytes: trytes.to_vec(),
            created_at: Utc::now(),
        };
        state.sweeps.push(sweep.clone());
        Ok(sweep)
    }

    fn get_unconfirmed_sweeps(&self, as_of: DateTime<Utc>) -> Result<Vec<Sweep>> {
        let state = self.inner.state.lock();
        Ok(state
            .sweeps
            .iter()
            .filter(|sweep| sweep.created_at < as_of)
            .filter(|sweep| {
                !state
                    .tails
                    .iter()
                    .any(|tail| tail.sweep_id == sweep.id && tail.confirmed)
            })
            .cloned()
            .collect())
    }

    fn get_tails_for_sweep(&self, sweep_id: i64) -> Result<Vec<String>> {
        let state = self.inner.state.lock();
        Ok(state
            .tails
            .iter()
            .filter(|tail| tail.sweep_id == sweep_id)
            .map(|tail| tail.hash.clone())
            .collect())
    }

    fn create_tail(&self, sweep_id: i64, hash: &str) -> Result<()> {
        let mut state = self.inner.state.lock();
        let known = state
            .tails
            .iter()
            .any(|tail| tail.sweep_id == sweep_id && tail.hash == hash);
        if !known {
            state.tails.push(SweepTail {
                sweep_id,
                hash: hash.to_string(),
                created_at: Utc::now(),
                confirmed: false,
            });
        }
        Ok(())
    }

    fn mark_tail_confirmed(&self, hash: &str) -> Result<()> {
        let mut state = self.inner.state.lock();
        match state.tails.iter_mut().find(|tail| tail.hash == hash) {
            Some(tail) => {
                tail.confirmed = true;
                Ok(())
            }
            None => Err(DbError::UnknownTail(hash.to_string())),
        }
    }
}

struct MemoryTransaction {
    inner: Arc<Inner>,
    finished: bool,
}

impl MemoryTransaction {
    fn finish(&mut self, restore: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        let mut snapshot = self.inner.snapshot.lock();
        if let Some(saved) = snapshot.take() {
            if restore {
                *self.inner.state.lock() = saved;
            }
        }
    }
}

impl DbTransaction for MemoryTransaction {
    fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish(false);
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish(true);
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.finish(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn far_future() -> DateTime<Utc> {
        Utc::now() + Duration::hours(1)
    }

    #[test]
    fn sweeps_without_confirmed_tails_are_unconfirmed() {
        let db = MemoryHubDb::new();
        let first = db.create_sweep("BUNDLEA", &["F".into()]).unwrap();
        let second = db.create_sweep("BUNDLEB", &["G".into()]).unwrap();

        db.create_tail(first.id, "TAILA").unwrap();
        db.mark_tail_confirmed("TAILA").unwrap();

        let unconfirmed = db.get_unconfirmed_sweeps(far_future()).unwrap();
        assert_eq!(unconfirmed.len(), 1);
        assert_eq!(unconfirmed[0].id, second.id);
    }

    #[test]
    fn as_of_excludes_later_sweeps() {
        let db = MemoryHubDb::new();
        let cutoff = Utc::now() - Duration::seconds(10);
        db.create_sweep("BUNDLE", &[]).unwrap();
        assert!(db.get_unconfirmed_sweeps(cutoff).unwrap().is_empty());
    }

    #[test]
    fn tails_keep_creation_order() {
        let db = MemoryHubDb::new();
        let sweep = db.create_sweep("BUNDLE", &[]).unwrap();
        db.create_tail(sweep.id, "OLD").unwrap();
        db.create_tail(sweep.id, "NEW").unwrap();
        assert_eq!(
            db.get_tails_for_sweep(sweep.id).unwrap(),
            vec!["OLD".to_string(), "NEW".to_string()]
        );
    }

    #[test]
    fn create_tail_is_idempotent() {
        let db = MemoryHubDb::new();
        let sweep = db.create_sweep("BUNDLE", &[]).unwrap();
        db.create_tail(sweep.id, "TAIL").unwrap();
        db.create_tail(sweep.id, "TAIL").unwrap();
        assert_eq!(db.get_tails_for_sweep(sweep.id).unwrap().len(), 1);
    }

    #[test]
    fn marking_an_unknown_tail_fails() {
        let db = MemoryHubDb::new();
        assert!(matches!(
            db.mark_tail_confirmed("MISSING"),
            Err(DbError::UnknownTail(_))
        ));
    }

    #[test]
    fn rollback_restores_the_snapshot() {
        let db = MemoryHubDb::new();
        let sweep = db.create_sweep("BUNDLE", &[]).unwrap();

        let tx = db.begin_transaction().unwrap();
        db.create_tail(sweep.id, "TAIL").unwrap();
        tx.rollback().unwrap();

        assert!(db.get_tails_for_sweep(sweep.id).unwrap().is_empty());
    }

    #[test]
    fn commit_keeps_the_changes() {
        let db = MemoryHubDb::new();
        let sweep = db.create_sweep("BUNDLE", &[]).unwrap();

        let tx = db.begin_transaction().unwrap();
        db.create_tail(sweep.id, "TAIL").unwrap();
        tx.commit().unwrap();

        assert_eq!(db.get_tails_for_sweep(sweep.id).unwrap().len(), 1);
    }

    #[test]
    fn dropping_the_guard_rolls_back() {
        let db = MemoryHubDb::new();
        let sweep = db.create_sweep("BUNDLE", &[]).unwrap();

        {
            let _tx = db.begin_transaction().unwrap();
            db.create_tail(sweep.id, "TAIL").unwrap();
        }

        assert!(db.get_tails_for_sweep(sweep.id).unwrap().is_empty());
    }

    #[test]
    fn nested_transactions_are_rejected() {
        let db = MemoryHubDb::new();
        let _tx = db.begin_transaction().unwrap();
        assert!(matches!(
            db.begin_transaction(),
            Err(DbError::Transient(_))
        ));
    }
}
