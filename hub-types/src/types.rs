// Copyright (c) James Kassemi, SC, US. All rights reserved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw transaction payload as tryte characters (`9A-Z`).
pub type Trytes = String;

/// Read-only view of a ledger transaction as reported by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub address: String,
    pub value: i64,
    pub timestamp: DateTime<Utc>,
    pub current_index: u64,
    pub last_index: u64,
    pub bundle_hash: String,
    pub trunk_hash: String,
}

impl Transaction {
    /// Tails carry index zero and identify their bundle's attachment.
    pub fn is_tail(&self) -> bool {
        self.current_index == 0
    }
}

/// Milestone snapshot from `getNodeInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub latest_milestone: String,
    pub latest_milestone_index: u64,
    pub latest_solid_milestone_index: u64,
}

/// Trunk/branch pair produced by tip selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipPair {
    pub trunk: String,
    pub branch: String,
}
