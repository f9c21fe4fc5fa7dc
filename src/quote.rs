//! Quoting service client (Jupiter v6)
//!
//! Route-finding belongs to the service. This module only moves quotes and
//! instruction descriptors across the HTTP boundary and decodes them into
//! typed structs.

use crate::tx_builder::TransactionBuilderError;
use crate::types::{QuoteResponse, SwapInstructionsResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// `amount` is in raw base units of the input mint
    async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<QuoteResponse, TransactionBuilderError>;

    async fn get_swap_instructions(
        &self,
        quote: &QuoteResponse,
        payer: &Pubkey,
    ) -> Result<SwapInstructionsResponse, TransactionBuilderError>;
}

pub struct JupiterClient {
    http: Client,
    base_url: String,
}

impl JupiterClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransactionBuilderError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransactionBuilderError::config(format!("quote http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn read_json<T: DeserializeOwned>(
        what: &str,
        resp: reqwest::Response,
    ) -> Result<T, TransactionBuilderError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransactionBuilderError::Quote(format!("{} body read failed: {}", what, e)))?;

        if !status.is_success() {
            return Err(TransactionBuilderError::Quote(format!(
                "{} returned HTTP {}: {}",
                what, status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| TransactionBuilderError::Quote(format!("{} response malformed: {}", what, e)))
    }
}

#[async_trait]
impl QuoteProvider for JupiterClient {
    async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<QuoteResponse, TransactionBuilderError> {
        let url = format!("{}/quote", self.base_url);
        debug!(%input_mint, %output_mint, amount, slippage_bps, "Requesting quote");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("inputMint", input_mint.to_string()),
                ("outputMint", output_mint.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", slippage_bps.to_string()),
            ])
            .send()
            .await
            .map_err(|e| TransactionBuilderError::Quote(format!("quote request failed: {}", e)))?;

        Self::read_json("quote", resp).await
    }

    async fn get_swap_instructions(
        &self,
        quote: &QuoteResponse,
        payer: &Pubkey,
    ) -> Result<SwapInstructionsResponse, TransactionBuilderError> {
        let url = format!("{}/swap-instructions", self.base_url);
        let payload = json!({
            "quoteResponse": quote,
            "userPublicKey": payer.to_string(),
            "wrapAndUnwrapSol": true,
        });

        let resp = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                TransactionBuilderError::Quote(format!("swap-instructions request failed: {}", e))
            })?;

        Self::read_json("swap-instructions", resp).await
    }
}
