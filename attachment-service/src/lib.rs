//! Confirmation tracking for hub sweeps. Each tick walks every unconfirmed
//! sweep inside its own store transaction: first looking for a confirmed
//! tail (ours or a user reattachment), then promoting the newest promotable
//! tail, and reattaching the bundle outright when nothing is promotable.

pub mod scheduled;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{error, info};
use thiserror::Error;

use hub_db::{HubDb, Sweep};
use hub_types::config::AttachmentConfig;
use tangle_client::{ClientError, PowProvider, TangleClient};
use tangle_model::{transaction_hash, Bundle, ModelError, TransactionDraft};

pub use scheduled::{spawn, ScheduledService, ServiceError, ServiceHandle, TickError};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Db(#[from] hub_db::DbError),
    #[error(transparent)]
    Model(#[from] ModelError),
    /// The ledger reports two confirmed attachments of one sweep. Continuing
    /// would risk double credit; the service must stop.
    #[error("sweep {sweep_id} has more than one confirmed tail")]
    MultipleConfirmedTails { sweep_id: i64 },
}

impl SweepError {
    fn is_fatal(&self) -> bool {
        matches!(self, SweepError::MultipleConfirmedTails { .. })
    }
}

pub struct AttachmentService {
    db: Arc<dyn HubDb>,
    client: Arc<dyn TangleClient>,
    pow: Arc<dyn PowProvider>,
    config: AttachmentConfig,
}

impl AttachmentService {
    pub fn new(
        db: Arc<dyn HubDb>,
        client: Arc<dyn TangleClient>,
        pow: Arc<dyn PowProvider>,
        config: AttachmentConfig,
    ) -> Self {
        Self {
            db,
            client,
            pow,
            config,
        }
    }

    /// Step A: is one of the known tails confirmed?
    async fn check_sweep_tails_for_confirmation(
        &self,
        sweep: &Sweep,
        tails: &[String],
    ) -> Result<bool, SweepError> {
        let confirmed = self.client.filter_confirmed_tails(tails, None).await?;
        info!(
            "sweep {} ({}) has {} confirmed tails",
            sweep.id,
            sweep.bundle_hash,
            confirmed.len()
        );
        if confirmed.len() > 1 {
            return Err(SweepError::MultipleConfirmedTails { sweep_id: sweep.id });
        }
        match confirmed.into_iter().next() {
            Some(tail) => {
                info!("marking tail as confirmed: {tail}");
                self.db.mark_tail_confirmed(&tail)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Step B: did a user reattach the bundle behind our back? Confirmed
    /// reattachments settle the sweep; consistent ones are recorded so Step C
    /// can promote them.
    async fn check_for_user_reattachment(
        &self,
        sweep: &Sweep,
        known_tails: &[String],
    ) -> Result<bool, SweepError> {
        let hashes = self
            .client
            .find_transactions(None, Some(std::slice::from_ref(&sweep.bundle_hash)))
            .await?;
        if hashes.is_empty() {
            return Ok(false);
        }
        let transactions = self.client.get_trytes(&hashes).await?;
        let user_tails: Vec<String> = transactions
            .into_iter()
            .filter(|tx| tx.is_tail() && !known_tails.contains(&tx.hash))
            .map(|tx| tx.hash)
            .collect();
        if user_tails.is_empty() {
            return Ok(false);
        }

        let confirmed = self.client.filter_confirmed_tails(&user_tails, None).await?;
        // smallest hash keeps the pick deterministic when several confirmed
        // reattachments show up at once
        if let Some(tail) = confirmed.iter().min() {
            info!("inserting confirmed user-attached tail: {tail}");
            self.db.create_tail(sweep.id, tail)?;
            info!("marking tail as confirmed: {tail}");
            self.db.mark_tail_confirmed(tail)?;
            return Ok(true);
        }

        // Only record tails the node has fully seen.
        let consistent = self.client.filter_consistent_tails(&user_tails).await?;
        for tail in user_tails.iter().filter(|tail| consistent.contains(*tail)) {
            info!("inserting unconfirmed user-attached tail: {tail}");
            self.db.create_tail(sweep.id, tail)?;
        }
        Ok(false)
    }

    /// Publishes a zero-value transaction approving `tail`, pulling the sweep
    /// subgraph closer to the next milestone. No tail row is written: the
    /// promotion is not an attachment of the sweep.
    async fn promote_sweep(&self, sweep: &Sweep, tail: &str) -> Result<(), SweepError> {
        let tips = self
            .client
            .get_transactions_to_approve(self.config.promotion_depth, Some(tail))
            .await?;

        let mut bundle = Bundle::new();
        bundle.push(TransactionDraft::zero_value(
            &self.config.promotion_address,
            Utc::now().timestamp(),
        ));
        bundle.finalize()?;
        let frames = bundle.to_trytes()?;

        let attached = self.pow.do_pow(&frames, &tips.trunk, &tips.branch).await?;
        self.client.store_transactions(&attached).await?;
        self.client.broadcast_transactions(&attached).await?;
        info!("issued promotion for sweep {} referencing {tail}", sweep.id);
        Ok(())
    }

    /// Re-publishes the sweep's original frames with fresh approvals and
    /// records the new tail. Publication intentionally precedes the row
    /// insert: a failed publication leaves the sweep eligible to retry, and a
    /// lost row is rediscovered through the user-reattachment path.
    async fn reattach_sweep(&self, sweep: &Sweep) -> Result<(), SweepError> {
        let attached = self.pow.perform_pow(&sweep.trytes).await?;
        let tail_frame = attached.first().ok_or_else(|| {
            ClientError::BadResponse("attachment returned no transactions".into())
        })?;
        let tail_hash = transaction_hash(tail_frame)?;
        info!("reattached sweep {} as {tail_hash}", sweep.id);

        self.client.store_transactions(&attached).await?;
        self.client.broadcast_transactions(&attached).await?;
        self.db.create_tail(sweep.id, &tail_hash)?;
        Ok(())
    }

    async fn process_sweep(&self, sweep: &Sweep) -> Result<(), SweepError> {
        let known_tails = self.db.get_tails_for_sweep(sweep.id)?;

        if self
            .check_sweep_tails_for_confirmation(sweep, &known_tails)
            .await?
            || self.check_for_user_reattachment(sweep, &known_tails).await?
        {
            return Ok(());
        }

        // Re-read: the reattachment check may have recorded new tails.
        let tails = self.db.get_tails_for_sweep(sweep.id)?;
        let consistent = self.client.filter_consistent_tails(&tails).await?;
        match tails.iter().rev().find(|tail| consistent.contains(*tail)) {
            Some(tail) => self.promote_sweep(sweep, tail).await?,
            None => self.reattach_sweep(sweep).await?,
        }

        info!("sweep {} is still unconfirmed", sweep.id);
        Ok(())
    }
}

#[async_trait]
impl ScheduledService for AttachmentService {
    fn name(&self) -> &str {
        "attachment"
    }

    async fn tick(&self) -> Result<(), TickError> {
        let tick_start = Utc::now();
        let node_info = self
            .client
            .node_info()
            .await
            .map_err(TickError::recoverable)?;
        let sweeps = self
            .db
            .get_unconfirmed_sweeps(tick_start)
            .map_err(TickError::recoverable)?;
        info!(
            "found {} unconfirmed sweeps at milestone {}",
            sweeps.len(),
            node_info.latest_milestone
        );

        for sweep in &sweeps {
            let tx = match self.db.begin_transaction() {
                Ok(tx) => tx,
                Err(err) => {
                    error!("sweep {}: could not open transaction: {err}", sweep.id);
                    continue;
                }
            };
            match self.process_sweep(sweep).await {
                Ok(()) => {
                    if let Err(err) = tx.commit() {
                        error!("sweep {} failed to commit: {err}", sweep.id);
                    }
                }
                Err(err) => {
                    error!("sweep {} failed: {err}", sweep.id);
                    if let Err(rollback_err) = tx.rollback() {
                        error!("sweep {} rollback failed: {rollback_err}", sweep.id);
                    }
                    if err.is_fatal() {
                        return Err(TickError::Fatal(err.to_string()));
                    }
                }
            }
        }
        Ok(())
    }
}
