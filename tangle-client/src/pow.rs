// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Proof-of-work boundary. The hub delegates PoW to the node; the provider
//! owns the minimum-weight-magnitude and tip-selection-depth policy.

use std::sync::Arc;

use async_trait::async_trait;

use hub_types::types::Trytes;

use crate::{Result, TangleClient};

#[async_trait]
pub trait PowProvider: Send + Sync {
    /// Attaches `trytes` with a freshly selected tip pair. Used to reattach
    /// an already signed bundle. Returns attached frames, tail first.
    async fn perform_pow(&self, trytes: &[Trytes]) -> Result<Vec<Trytes>>;

    /// Attaches `trytes` approving the given trunk and branch. Used when the
    /// caller has already selected tips.
    async fn do_pow(&self, trytes: &[Trytes], trunk: &str, branch: &str) -> Result<Vec<Trytes>>;
}

pub struct NodePowProvider {
    client: Arc<dyn TangleClient>,
    depth: usize,
    mwm: usize,
}

impl NodePowProvider {
    pub fn new(client: Arc<dyn TangleClient>, depth: usize, mwm: usize) -> Self {
        Self { client, depth, mwm }
    }
}

#[async_trait]
impl PowProvider for NodePowProvider {
    async fn perform_pow(&self, trytes: &[Trytes]) -> Result<Vec<Trytes>> {
        let tips = self
            .client
            .get_transactions_to_approve(self.depth, None)
            .await?;
        self.client
            .attach_to_tangle(&tips.trunk, &tips.branch, self.mwm, trytes)
            .await
    }

    async fn do_pow(&self, trytes: &[Trytes], trunk: &str, branch: &str) -> Result<Vec<Trytes>> {
        self.client
            .attach_to_tangle(trunk, branch, self.mwm, trytes)
            .await
    }
}
