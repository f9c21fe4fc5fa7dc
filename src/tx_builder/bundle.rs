//! Jito bundle assembly, submission, and status polling
//!
//! A bundle is always `[tip, payload]`. The tip transaction is rebuilt with
//! a fresh blockhash for every bundle and is never reused.

use crate::metrics::metrics;
use crate::relay::BundleRelay;
use crate::rpc::ChainRpc;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::output::SignedTransaction;
use serde::Serialize;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction,
    transaction::Transaction,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Relay-side view of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BundleState {
    Pending,
    Landed,
    Failed,
    Unknown,
}

impl BundleState {
    /// Map the relay's status string; "Invalid" and anything new become Unknown
    pub fn from_relay(status: &str) -> Self {
        match status {
            "Pending" => Self::Pending,
            "Landed" => Self::Landed,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Landed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleStatus {
    pub bundle_id: String,
    pub state: BundleState,
    pub landed_slot: Option<u64>,
}

/// Result of a status lookup; absence is not failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleLookup {
    Found(BundleStatus),
    NotFound,
}

impl BundleLookup {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Found(status) if status.state.is_terminal())
    }
}

/// Base58-encoded `[tip, payload]` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    encoded: [String; 2],
}

impl Bundle {
    pub fn new(tip: &Transaction, payload: &SignedTransaction) -> Result<Self, TransactionBuilderError> {
        let tip_bytes = bincode::serialize(tip)
            .map_err(|e| TransactionBuilderError::Serialization(e.to_string()))?;
        let payload_bytes = payload.wire_bytes()?;

        Ok(Self {
            encoded: [
                bs58::encode(tip_bytes).into_string(),
                bs58::encode(payload_bytes).into_string(),
            ],
        })
    }

    pub fn transactions(&self) -> &[String] {
        &self.encoded
    }

    pub fn tip(&self) -> &str {
        &self.encoded[0]
    }

    pub fn payload(&self) -> &str {
        &self.encoded[1]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleConfig {
    pub tip_lamports: u64,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            tip_lamports: 1_000_000,
            poll_attempts: 10,
            poll_interval_ms: 2_000,
        }
    }
}

pub struct BundleAssembler {
    relay: Arc<dyn BundleRelay>,
    rpc: Arc<dyn ChainRpc>,
    config: BundleConfig,
}

impl BundleAssembler {
    pub fn new(relay: Arc<dyn BundleRelay>, rpc: Arc<dyn ChainRpc>, config: BundleConfig) -> Self {
        Self { relay, rpc, config }
    }

    /// Pick a tip destination uniformly at random
    pub async fn select_tip_account(&self) -> Result<Pubkey, TransactionBuilderError> {
        let published = self.relay.tip_accounts().await?;
        let accounts: Vec<Pubkey> = published
            .iter()
            .filter_map(|raw| match Pubkey::from_str(raw) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(account = %raw, error = %e, "Skipping unparseable tip account");
                    None
                }
            })
            .collect();

        if accounts.is_empty() {
            return Err(TransactionBuilderError::EmptyTipAccounts);
        }

        let chosen = accounts[fastrand::usize(..accounts.len())];
        debug!(tip_account = %chosen, candidates = accounts.len(), "Selected tip account");
        Ok(chosen)
    }

    /// Signed legacy transfer of the configured tip
    pub async fn build_tip_transaction(
        &self,
        payer: &Keypair,
        tip_account: &Pubkey,
    ) -> Result<Transaction, TransactionBuilderError> {
        let blockhash = self
            .rpc
            .latest_blockhash(CommitmentConfig::confirmed())
            .await?;

        #[allow(deprecated)]
        let ix = system_instruction::transfer(&payer.pubkey(), tip_account, self.config.tip_lamports);

        let mut tx = Transaction::new_with_payer(&[ix], Some(&payer.pubkey()));
        tx.try_sign(&[payer], blockhash)
            .map_err(|e| TransactionBuilderError::Signing(e.to_string()))?;
        Ok(tx)
    }

    /// Select a tip account, sign a fresh tip, and pair it with the payload
    pub async fn assemble(
        &self,
        payer: &Keypair,
        payload: &SignedTransaction,
    ) -> Result<Bundle, TransactionBuilderError> {
        let tip_account = self.select_tip_account().await?;
        let tip = self.build_tip_transaction(payer, &tip_account).await?;
        let bundle = Bundle::new(&tip, payload)?;
        info!(
            tip_account = %tip_account,
            tip_lamports = self.config.tip_lamports,
            "Bundle created"
        );
        Ok(bundle)
    }

    /// Send once; relay errors are returned verbatim and never resubmitted
    pub async fn submit(&self, bundle: &Bundle) -> Result<String, TransactionBuilderError> {
        let bundle_id = self.relay.send_bundle(bundle.transactions()).await?;
        metrics().bundles_submitted.inc();
        info!(bundle_id = %bundle_id, "Bundle submitted");
        Ok(bundle_id)
    }

    /// Single status check; any failure reads as not found
    pub async fn check_status(&self, bundle_id: &str) -> BundleLookup {
        let ids = [bundle_id.to_string()];
        match self.relay.inflight_bundle_statuses(&ids).await {
            Ok(statuses) => match statuses.into_iter().find(|s| s.bundle_id == bundle_id) {
                Some(status) => BundleLookup::Found(status),
                None => {
                    debug!(bundle_id, "No status found for bundle");
                    metrics().bundle_status_not_found.inc();
                    BundleLookup::NotFound
                }
            },
            Err(e) => {
                warn!(bundle_id, error = %e, "Bundle status check failed");
                metrics().bundle_status_not_found.inc();
                BundleLookup::NotFound
            }
        }
    }

    /// Poll until landed or failed, or until the attempt budget runs out
    pub async fn poll_until_terminal(&self, bundle_id: &str) -> BundleLookup {
        let attempts = self.config.poll_attempts.max(1);
        let mut last = BundleLookup::NotFound;

        for attempt in 1..=attempts {
            last = self.check_status(bundle_id).await;
            if last.is_terminal() {
                break;
            }
            if attempt < attempts {
                tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
            }
        }

        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{signed_sample, MockRelay, MockRpc};
    use solana_sdk::transaction::VersionedTransaction;

    fn assembler(relay: Arc<MockRelay>, config: BundleConfig) -> BundleAssembler {
        BundleAssembler::new(relay, Arc::new(MockRpc::new()), config)
    }

    #[test]
    fn test_bundle_state_mapping() {
        assert_eq!(BundleState::from_relay("Landed"), BundleState::Landed);
        assert_eq!(BundleState::from_relay("Pending"), BundleState::Pending);
        assert_eq!(BundleState::from_relay("Failed"), BundleState::Failed);
        assert_eq!(BundleState::from_relay("Invalid"), BundleState::Unknown);
        assert!(!BundleState::Pending.is_terminal());
    }

    #[tokio::test]
    async fn test_tip_first_payload_second() {
        let tip_account = Pubkey::new_unique();
        let relay = Arc::new(MockRelay::with_tip_accounts(vec![tip_account.to_string()]));
        let (payer, payload) = signed_sample();

        let bundle = assembler(relay, BundleConfig::default())
            .assemble(&payer, &payload)
            .await
            .unwrap();

        assert_eq!(bundle.transactions().len(), 2);

        let tip_bytes = bs58::decode(bundle.tip()).into_vec().unwrap();
        let tip: Transaction = bincode::deserialize(&tip_bytes).unwrap();
        assert!(tip.message.account_keys.contains(&tip_account));
        assert!(tip.verify().is_ok());

        let payload_bytes = bs58::decode(bundle.payload()).into_vec().unwrap();
        let decoded: VersionedTransaction = bincode::deserialize(&payload_bytes).unwrap();
        assert_eq!(decoded.signatures[0], *payload.signature());
    }

    #[tokio::test]
    async fn test_empty_tip_accounts_is_fatal() {
        let relay = Arc::new(MockRelay::with_tip_accounts(vec![]));
        let (payer, payload) = signed_sample();

        let result = assembler(relay, BundleConfig::default())
            .assemble(&payer, &payload)
            .await;
        assert!(matches!(result, Err(TransactionBuilderError::EmptyTipAccounts)));
    }

    #[tokio::test]
    async fn test_unparseable_tip_accounts_skipped() {
        let good = Pubkey::new_unique();
        let relay = Arc::new(MockRelay::with_tip_accounts(vec![
            "garbage".to_string(),
            good.to_string(),
        ]));
        let chosen = assembler(relay, BundleConfig::default())
            .select_tip_account()
            .await
            .unwrap();
        assert_eq!(chosen, good);
    }

    #[tokio::test]
    async fn test_tip_amount_from_config() {
        let tip_account = Pubkey::new_unique();
        let relay = Arc::new(MockRelay::with_tip_accounts(vec![tip_account.to_string()]));
        let payer = Keypair::new();
        let config = BundleConfig {
            tip_lamports: 42_000,
            ..BundleConfig::default()
        };

        let tip = assembler(relay, config)
            .build_tip_transaction(&payer, &tip_account)
            .await
            .unwrap();

        // SystemInstruction::Transfer: u32 tag 2 followed by u64 lamports
        let data = &tip.message.instructions[0].data;
        assert_eq!(&data[..4], &[2, 0, 0, 0]);
        assert_eq!(u64::from_le_bytes(data[4..12].try_into().unwrap()), 42_000);
    }

    #[tokio::test]
    async fn test_submit_surfaces_relay_message() {
        let relay = Arc::new(MockRelay::with_tip_accounts(vec![Pubkey::new_unique().to_string()]));
        relay.fail_send("bundle already processed");
        let (payer, payload) = signed_sample();
        let asm = assembler(relay, BundleConfig::default());

        let bundle = asm.assemble(&payer, &payload).await.unwrap();
        match asm.submit(&bundle).await {
            Err(TransactionBuilderError::Relay(msg)) => assert_eq!(msg, "bundle already processed"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_empty_result_is_not_found() {
        let relay = Arc::new(MockRelay::with_tip_accounts(vec![]));
        let asm = assembler(relay, BundleConfig::default());
        assert_eq!(asm.check_status("abc").await, BundleLookup::NotFound);
    }

    #[tokio::test]
    async fn test_status_error_is_not_found() {
        let relay = Arc::new(MockRelay::with_tip_accounts(vec![]));
        relay.fail_status("rate limited");
        let asm = assembler(relay, BundleConfig::default());
        assert_eq!(asm.check_status("abc").await, BundleLookup::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_on_landed() {
        let relay = Arc::new(MockRelay::with_tip_accounts(vec![]));
        relay.push_status(None);
        relay.push_status(Some(BundleState::Pending));
        relay.push_status(Some(BundleState::Landed));
        relay.push_status(Some(BundleState::Landed));
        let asm = assembler(relay.clone(), BundleConfig::default());

        let lookup = asm.poll_until_terminal("bundle-1").await;
        match lookup {
            BundleLookup::Found(status) => {
                assert_eq!(status.state, BundleState::Landed);
                assert_eq!(status.bundle_id, "bundle-1");
            }
            BundleLookup::NotFound => panic!("expected landed status"),
        }
        assert_eq!(relay.status_checks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhausts_attempts() {
        let relay = Arc::new(MockRelay::with_tip_accounts(vec![]));
        let config = BundleConfig {
            poll_attempts: 4,
            ..BundleConfig::default()
        };
        let asm = assembler(relay.clone(), config);

        assert_eq!(asm.poll_until_terminal("x").await, BundleLookup::NotFound);
        assert_eq!(relay.status_checks(), 4);
    }
}
