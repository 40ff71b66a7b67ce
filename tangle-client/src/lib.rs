// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Capability boundary over a remote tangle node.

pub mod http;
pub mod pow;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use thiserror::Error;

use hub_types::types::{NodeInfo, TipPair, Transaction, Trytes};

pub use http::HttpTangleClient;
pub use pow::{NodePowProvider, PowProvider};

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("node unavailable: {0}")]
    NodeUnavailable(String),
    #[error("tip selection failed: {0}")]
    TipSelectionFailed(String),
    #[error("publication failed: {0}")]
    PublicationFailed(String),
    #[error("malformed node response: {0}")]
    BadResponse(String),
    #[error(transparent)]
    Model(#[from] tangle_model::ModelError),
}

/// Narrow, read-mostly view of the node. Confirmation is a pure function of
/// (tails, node state) from the caller's perspective, which keeps consumers
/// testable against scripted implementations.
#[async_trait]
pub trait TangleClient: Send + Sync {
    async fn node_info(&self) -> Result<NodeInfo>;

    /// Balances per address; unknown addresses report zero.
    async fn get_balances(&self, addresses: &[String]) -> Result<HashMap<String, u64>>;

    /// Hashes matching the union of the supplied filters.
    async fn find_transactions(
        &self,
        addresses: Option<&[String]>,
        bundles: Option<&[String]>,
    ) -> Result<Vec<String>>;

    /// Transaction records for `hashes`, order preserved.
    async fn get_trytes(&self, hashes: &[String]) -> Result<Vec<Transaction>>;

    /// Subset of `tails` confirmed relative to `reference`, or to the latest
    /// milestone when no reference is given.
    async fn filter_confirmed_tails(
        &self,
        tails: &[String],
        reference: Option<&str>,
    ) -> Result<HashSet<String>>;

    /// Subset of `tails` that are still promotable.
    async fn filter_consistent_tails(&self, tails: &[String]) -> Result<HashSet<String>>;

    async fn get_transactions_to_approve(
        &self,
        depth: usize,
        reference: Option<&str>,
    ) -> Result<TipPair>;

    /// Proof-of-work over `trytes` with the given approvals; tail first.
    async fn attach_to_tangle(
        &self,
        trunk: &str,
        branch: &str,
        mwm: usize,
        trytes: &[Trytes],
    ) -> Result<Vec<Trytes>>;

    async fn store_transactions(&self, trytes: &[Trytes]) -> Result<()>;

    async fn broadcast_transactions(&self, trytes: &[Trytes]) -> Result<()>;
}
