//! Block-engine relay client
//!
//! JSON-RPC over HTTP against `{base_url}/api/v1/bundles`. A relay-side
//! `error` member is surfaced with the relay's message untouched.

use crate::tx_builder::{BundleState, BundleStatus, TransactionBuilderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const BUNDLES_PATH: &str = "/api/v1/bundles";

#[async_trait]
pub trait BundleRelay: Send + Sync {
    /// Published tip destinations, as base58 text
    async fn tip_accounts(&self) -> Result<Vec<String>, TransactionBuilderError>;

    /// Submit base58-encoded transactions in order; returns the bundle id
    async fn send_bundle(&self, transactions: &[String]) -> Result<String, TransactionBuilderError>;

    /// Statuses the relay currently tracks; unknown ids are simply absent
    async fn inflight_bundle_statuses(
        &self,
        bundle_ids: &[String],
    ) -> Result<Vec<BundleStatus>, TransactionBuilderError>;
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct InflightResult {
    #[serde(default)]
    value: Vec<InflightEntry>,
}

#[derive(Debug, Deserialize)]
struct InflightEntry {
    bundle_id: String,
    status: String,
    #[serde(default)]
    landed_slot: Option<u64>,
}

pub struct JitoRelayClient {
    http: Client,
    endpoint: String,
    auth_uuid: Option<String>,
}

impl JitoRelayClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        auth_uuid: Option<String>,
    ) -> Result<Self, TransactionBuilderError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransactionBuilderError::config(format!("relay http client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), BUNDLES_PATH),
            auth_uuid,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, TransactionBuilderError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut req = self.http.post(&self.endpoint).json(&payload);
        if let Some(uuid) = &self.auth_uuid {
            req = req.header("x-jito-auth", uuid);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TransactionBuilderError::relay(format!("{} request failed: {}", method, e)))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransactionBuilderError::relay(format!("{} body read failed: {}", method, e)))?;

        debug!(method, status = %status, "Relay responded");

        let envelope: RpcEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            TransactionBuilderError::relay(format!(
                "{} returned HTTP {} with unreadable body ({}): {}",
                method, status, e, body
            ))
        })?;

        if let Some(err) = envelope.error {
            return Err(TransactionBuilderError::relay(err.message));
        }

        envelope
            .result
            .ok_or_else(|| TransactionBuilderError::relay(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl BundleRelay for JitoRelayClient {
    async fn tip_accounts(&self) -> Result<Vec<String>, TransactionBuilderError> {
        self.call("getTipAccounts", json!([])).await
    }

    async fn send_bundle(&self, transactions: &[String]) -> Result<String, TransactionBuilderError> {
        self.call("sendBundle", json!([transactions])).await
    }

    async fn inflight_bundle_statuses(
        &self,
        bundle_ids: &[String],
    ) -> Result<Vec<BundleStatus>, TransactionBuilderError> {
        let result: InflightResult = self
            .call("getInflightBundleStatuses", json!([bundle_ids]))
            .await?;

        Ok(result
            .value
            .into_iter()
            .map(|entry| BundleStatus {
                state: BundleState::from_relay(&entry.status),
                bundle_id: entry.bundle_id,
                landed_slot: entry.landed_slot,
            })
            .collect())
    }
}
