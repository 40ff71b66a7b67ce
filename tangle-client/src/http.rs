// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! JSON HTTP implementation of [`TangleClient`]. The node speaks a
//! command-envelope protocol: every call is a POST with a `command` field and
//! the `X-IOTA-API-Version` header; errors come back in-band as `error` or
//! `exception` fields.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hub_types::retry::RetryPolicy;
use hub_types::types::{NodeInfo, TipPair, Transaction, Trytes};
use tangle_model::parse_transaction;

use crate::{ClientError, Result, TangleClient};

const API_VERSION: &str = "1";
const BALANCE_THRESHOLD: u8 = 100;

pub struct HttpTangleClient {
    client: reqwest::Client,
    uri: String,
    retry: RetryPolicy,
}

impl HttpTangleClient {
    pub fn new(uri: impl Into<String>) -> Self {
        Self::with_retry(uri, RetryPolicy::default_node())
    }

    pub fn with_retry(uri: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            uri: uri.into(),
            retry,
        }
    }

    async fn call<B, T>(&self, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let value = self
            .retry
            .run(|attempt| {
                if attempt > 0 {
                    debug!("retrying node call, attempt {attempt}");
                }
                let request = self
                    .client
                    .post(&self.uri)
                    .header("X-IOTA-API-Version", API_VERSION)
                    .json(body);
                async move {
                    let response = request.send().await.map_err(transport)?;
                    response.json::<Value>().await.map_err(transport)
                }
            })
            .await?;
        if let Some(message) = node_error(&value) {
            return Err(ClientError::BadResponse(message));
        }
        serde_json::from_value(value).map_err(|err| ClientError::BadResponse(err.to_string()))
    }
}

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::NodeUnavailable(err.to_string())
}

fn node_error(value: &Value) -> Option<String> {
    ["error", "exception"]
        .iter()
        .find_map(|key| value.get(*key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl TangleClient for HttpTangleClient {
    async fn node_info(&self) -> Result<NodeInfo> {
        let response: NodeInfoResponse = self.call(&Command::new("getNodeInfo")).await?;
        Ok(NodeInfo {
            latest_milestone: response.latest_milestone,
            latest_milestone_index: response.latest_milestone_index,
            latest_solid_milestone_index: response.latest_solid_subtangle_milestone_index,
        })
    }

    async fn get_balances(&self, addresses: &[String]) -> Result<HashMap<String, u64>> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }
        let request = GetBalancesRequest {
            command: "getBalances",
            addresses,
            threshold: BALANCE_THRESHOLD,
        };
        let response: GetBalancesResponse = self.call(&request).await?;
        if response.balances.len() != addresses.len() {
            return Err(ClientError::BadResponse(format!(
                "expected {} balances, got {}",
                addresses.len(),
                response.balances.len()
            )));
        }
        let mut balances = HashMap::with_capacity(addresses.len());
        for (address, raw) in addresses.iter().zip(response.balances) {
            let balance = raw
                .parse::<u64>()
                .map_err(|_| ClientError::BadResponse(format!("bad balance {raw:?}")))?;
            balances.insert(address.clone(), balance);
        }
        Ok(balances)
    }

    async fn find_transactions(
        &self,
        addresses: Option<&[String]>,
        bundles: Option<&[String]>,
    ) -> Result<Vec<String>> {
        if addresses.is_none() && bundles.is_none() {
            return Ok(Vec::new());
        }
        let request = FindTransactionsRequest {
            command: "findTransactions",
            addresses,
            bundles,
        };
        let response: FindTransactionsResponse = self.call(&request).await?;
        Ok(response.hashes)
    }

    async fn get_trytes(&self, hashes: &[String]) -> Result<Vec<Transaction>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let request = GetTrytesRequest {
            command: "getTrytes",
            hashes,
        };
        let response: GetTrytesResponse = self.call(&request).await?;
        if response.trytes.len() != hashes.len() {
            return Err(ClientError::BadResponse(format!(
                "expected {} transactions, got {}",
                hashes.len(),
                response.trytes.len()
            )));
        }
        response
            .trytes
            .iter()
            .map(|frame| parse_transaction(frame).map_err(ClientError::from))
            .collect()
    }

    async fn filter_confirmed_tails(
        &self,
        tails: &[String],
        reference: Option<&str>,
    ) -> Result<HashSet<String>> {
        if tails.is_empty() {
            return Ok(HashSet::new());
        }
        let reference = match reference {
            Some(reference) => reference.to_string(),
            None => self.node_info().await?.latest_milestone,
        };
        let request = GetInclusionStatesRequest {
            command: "getInclusionStates",
            transactions: tails,
            tips: &[reference],
        };
        let response: GetInclusionStatesResponse = self.call(&request).await?;
        if response.states.len() != tails.len() {
            return Err(ClientError::BadResponse(format!(
                "expected {} inclusion states, got {}",
                tails.len(),
                response.states.len()
            )));
        }
        Ok(tails
            .iter()
            .zip(response.states)
            .filter(|(_, confirmed)| *confirmed)
            .map(|(tail, _)| tail.clone())
            .collect())
    }

    async fn filter_consistent_tails(&self, tails: &[String]) -> Result<HashSet<String>> {
        let mut consistent = HashSet::new();
        for tail in tails {
            let request = CheckConsistencyRequest {
                command: "checkConsistency",
                tails: std::slice::from_ref(tail),
            };
            match self.call::<_, CheckConsistencyResponse>(&request).await {
                Ok(response) if response.state => {
                    consistent.insert(tail.clone());
                }
                Ok(response) => {
                    if let Some(info) = response.info {
                        debug!("tail {tail} not promotable: {info}");
                    }
                }
                // The node rejects tails it has not fully seen; those are
                // simply not promotable.
                Err(ClientError::BadResponse(message)) => {
                    debug!("tail {tail} rejected by node: {message}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(consistent)
    }

    async fn get_transactions_to_approve(
        &self,
        depth: usize,
        reference: Option<&str>,
    ) -> Result<TipPair> {
        let request = GetTransactionsToApproveRequest {
            command: "getTransactionsToApprove",
            depth,
            reference,
        };
        match self
            .call::<_, GetTransactionsToApproveResponse>(&request)
            .await
        {
            Ok(response) => Ok(TipPair {
                trunk: response.trunk_transaction,
                branch: response.branch_transaction,
            }),
            Err(ClientError::BadResponse(message)) => {
                Err(ClientError::TipSelectionFailed(message))
            }
            Err(err) => Err(err),
        }
    }

    async fn attach_to_tangle(
        &self,
        trunk: &str,
        branch: &str,
        mwm: usize,
        trytes: &[Trytes],
    ) -> Result<Vec<Trytes>> {
        let request = AttachToTangleRequest {
            command: "attachToTangle",
            trunk_transaction: trunk,
            branch_transaction: branch,
            min_weight_magnitude: mwm,
            trytes,
        };
        let response: AttachToTangleResponse = self.call(&request).await?;
        Ok(response.trytes)
    }

    async fn store_transactions(&self, trytes: &[Trytes]) -> Result<()> {
        let request = TrytesRequest {
            command: "storeTransactions",
            trytes,
        };
        self.call::<_, Value>(&request)
            .await
            .map_err(|err| ClientError::PublicationFailed(err.to_string()))?;
        Ok(())
    }

    async fn broadcast_transactions(&self, trytes: &[Trytes]) -> Result<()> {
        let request = TrytesRequest {
            command: "broadcastTransactions",
            trytes,
        };
        self.call::<_, Value>(&request)
            .await
            .map_err(|err| ClientError::PublicationFailed(err.to_string()))?;
        Ok(())
    }
}

#[derive(Serialize)]
struct Command {
    command: &'static str,
}

impl Command {
    fn new(command: &'static str) -> Self {
        Self { command }
    }
}

#[derive(Serialize)]
struct GetBalancesRequest<'a> {
    command: &'static str,
    addresses: &'a [String],
    threshold: u8,
}

#[derive(Serialize)]
struct FindTransactionsRequest<'a> {
    command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    addresses: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bundles: Option<&'a [String]>,
}

#[derive(Serialize)]
struct GetTrytesRequest<'a> {
    command: &'static str,
    hashes: &'a [String],
}

#[derive(Serialize)]
struct GetInclusionStatesRequest<'a> {
    command: &'static str,
    transactions: &'a [String],
    tips: &'a [String],
}

#[derive(Serialize)]
struct CheckConsistencyRequest<'a> {
    command: &'static str,
    tails: &'a [String],
}

#[derive(Serialize)]
struct GetTransactionsToApproveRequest<'a> {
    command: &'static str,
    depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachToTangleRequest<'a> {
    command: &'static str,
    trunk_transaction: &'a str,
    branch_transaction: &'a str,
    min_weight_magnitude: usize,
    trytes: &'a [Trytes],
}

#[derive(Serialize)]
struct TrytesRequest<'a> {
    command: &'static str,
    trytes: &'a [Trytes],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeInfoResponse {
    latest_milestone: String,
    latest_milestone_index: u64,
    latest_solid_subtangle_milestone_index: u64,
}

#[derive(Deserialize)]
struct GetBalancesResponse {
    balances: Vec<String>,
}

#[derive(Deserialize)]
struct FindTransactionsResponse {
    hashes: Vec<String>,
}

#[derive(Deserialize)]
struct GetTrytesResponse {
    trytes: Vec<String>,
}

#[derive(Deserialize)]
struct GetInclusionStatesResponse {
    states: Vec<bool>,
}

#[derive(Deserialize)]
struct CheckConsistencyResponse {
    state: bool,
    info: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetTransactionsToApproveResponse {
    trunk_transaction: String,
    branch_transaction: String,
}

#[derive(Deserialize)]
struct AttachToTangleResponse {
    trytes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_errors_are_detected_in_band() {
        assert_eq!(
            node_error(&json!({"error": "invalid command"})),
            Some("invalid command".to_string())
        );
        assert_eq!(
            node_error(&json!({"exception": "tip selection interrupted"})),
            Some("tip selection interrupted".to_string())
        );
        assert_eq!(node_error(&json!({"hashes": []})), None);
    }

    #[test]
    fn requests_use_the_node_field_names() {
        let request = AttachToTangleRequest {
            command: "attachToTangle",
            trunk_transaction: "TRUNK",
            branch_transaction: "BRANCH",
            min_weight_magnitude: 14,
            trytes: &["FRAME".to_string()],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["trunkTransaction"], "TRUNK");
        assert_eq!(value["branchTransaction"], "BRANCH");
        assert_eq!(value["minWeightMagnitude"], 14);
    }

    #[test]
    fn absent_filters_are_omitted() {
        let request = FindTransactionsRequest {
            command: "findTransactions",
            addresses: None,
            bundles: Some(&["BUNDLE".to_string()]),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("addresses").is_none());
        assert_eq!(value["bundles"][0], "BUNDLE");
    }

    #[test]
    fn node_info_response_parses() {
        let value = json!({
            "latestMilestone": "MILESTONE",
            "latestMilestoneIndex": 1_050,
            "latestSolidSubtangleMilestoneIndex": 1_049,
            "appName": "IRI"
        });
        let parsed: NodeInfoResponse = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.latest_milestone, "MILESTONE");
        assert_eq!(parsed.latest_solid_subtangle_milestone_index, 1_049);
    }
}
