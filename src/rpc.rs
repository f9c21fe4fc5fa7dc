//! Network RPC collaborator
//!
//! The pipeline talks to the chain only through [`ChainRpc`]. The real
//! implementation is the nonblocking `RpcClient`; tests substitute
//! `test_utils::MockRpc`.

use crate::tx_builder::TransactionBuilderError;
use async_trait::async_trait;
use solana_account_decoder::UiAccountData;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::RpcSimulateTransactionConfig;
use solana_rpc_client_api::request::TokenAccountsFilter;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    transaction::VersionedTransaction,
};
use std::str::FromStr;
use tracing::debug;

/// Outcome of one simulation round trip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    pub units_consumed: Option<u64>,
    /// Debug rendering of the transaction error, if the simulation failed
    pub err: Option<String>,
    pub logs: Vec<String>,
}

/// SPL token balance owned by a wallet
#[derive(Debug, Clone, PartialEq)]
pub struct TokenHolding {
    pub mint: Pubkey,
    pub ui_amount: f64,
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn latest_blockhash(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<Hash, TransactionBuilderError>;

    /// Raw account data, `None` if the account does not exist
    async fn account_data(
        &self,
        address: &Pubkey,
    ) -> Result<Option<Vec<u8>>, TransactionBuilderError>;

    /// Simulate without signature verification, replacing the blockhash
    async fn simulate(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SimulationReport, TransactionBuilderError>;

    async fn token_holdings(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenHolding>, TransactionBuilderError>;
}

#[async_trait]
impl ChainRpc for RpcClient {
    async fn latest_blockhash(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<Hash, TransactionBuilderError> {
        self.get_latest_blockhash_with_commitment(commitment)
            .await
            .map(|(hash, _last_valid_height)| hash)
            .map_err(|e| TransactionBuilderError::blockhash_unavailable(e.to_string()))
    }

    async fn account_data(
        &self,
        address: &Pubkey,
    ) -> Result<Option<Vec<u8>>, TransactionBuilderError> {
        let response = self
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await
            .map_err(|e| TransactionBuilderError::Rpc(e.to_string()))?;
        Ok(response.value.map(|account| account.data))
    }

    async fn simulate(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SimulationReport, TransactionBuilderError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(CommitmentConfig::confirmed()),
            ..RpcSimulateTransactionConfig::default()
        };

        let result = self
            .simulate_transaction_with_config(tx, config)
            .await
            .map_err(|e| TransactionBuilderError::Rpc(e.to_string()))?
            .value;

        Ok(SimulationReport {
            units_consumed: result.units_consumed,
            // The error type differs between client versions; match on its Debug text
            err: result.err.map(|e| format!("{:?}", e)),
            logs: result.logs.unwrap_or_default(),
        })
    }

    async fn token_holdings(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenHolding>, TransactionBuilderError> {
        let accounts = self
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(spl_token::id()))
            .await
            .map_err(|e| TransactionBuilderError::Rpc(e.to_string()))?;

        let holdings = accounts
            .iter()
            .filter_map(|keyed| match &keyed.account.data {
                UiAccountData::Json(parsed) => parse_token_holding(&parsed.parsed),
                _ => {
                    debug!(account = %keyed.pubkey, "Token account not returned as jsonParsed");
                    None
                }
            })
            .collect();

        Ok(holdings)
    }
}

/// Extract mint and UI balance from a jsonParsed SPL token account
pub fn parse_token_holding(parsed: &serde_json::Value) -> Option<TokenHolding> {
    let info = parsed.get("info")?;
    let mint = Pubkey::from_str(info.get("mint")?.as_str()?).ok()?;
    let amount = info.get("tokenAmount")?;
    let ui_amount = match amount.get("uiAmount").and_then(|v| v.as_f64()) {
        Some(v) => v,
        None => amount.get("uiAmountString")?.as_str()?.parse().ok()?,
    };
    Some(TokenHolding { mint, ui_amount })
}
