//! Swap orchestration
//!
//! Sequences one swap, or a batch of swaps, through the whole pipeline:
//!
//! 1. Read phase, concurrent across the batch: mint decimals, quote,
//!    swap instructions. Any failure or routeless quote aborts everything.
//! 2. Decode setup/swap/cleanup instructions in request order.
//! 3. Resolve the union of lookup tables.
//! 4. One shared blockhash, one simulation over the combined instructions.
//! 5. Build and sign a single v0 transaction.
//! 6. Wrap it with a fresh tip transaction, submit the bundle, poll status.
//!
//! Nothing is signed until every read has succeeded, so a batch is never
//! partially submitted.

use crate::metrics::{metrics, Timer};
use crate::observability::CorrelationId;
use crate::quote::QuoteProvider;
use crate::relay::BundleRelay;
use crate::rpc::{ChainRpc, TokenHolding};
use crate::structured_logging::PipelineContext;
use crate::tx_builder::{
    decode_swap_instructions, parse_lookup_table_addresses, resolve_lookup_tables, BuildRequest,
    BundleAssembler, BundleConfig, BundleLookup, ComputeEstimate, ComputeSimulator, PriorityFee,
    SimulationConfig, TransactionBuilder, TransactionBuilderError, MAX_COMPUTE_UNIT_LIMIT,
};
use crate::types::{QuoteResponse, SwapInstructionsResponse, SwapRequest};
use crate::wallet::WalletManager;
use futures::future::try_join_all;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Mint;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// Holdings at or below this UI balance are treated as dust
pub const DUST_THRESHOLD: f64 = 0.001;

/// Pipeline stage, used to report where a swap failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapStage {
    Validate,
    Decimals,
    Quote,
    SwapInstructions,
    Decode,
    Blockhash,
    Simulate,
    Build,
    Sign,
    Bundle,
    Submit,
}

impl SwapStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Decimals => "decimals",
            Self::Quote => "quote",
            Self::SwapInstructions => "swap_instructions",
            Self::Decode => "decode",
            Self::Blockhash => "blockhash",
            Self::Simulate => "simulate",
            Self::Build => "build",
            Self::Sign => "sign",
            Self::Bundle => "bundle",
            Self::Submit => "submit",
        }
    }
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A swap failure and the stage it happened in
#[derive(Error, Debug)]
#[error("swap failed at {stage} stage: {source}")]
pub struct SwapError {
    pub stage: SwapStage,
    #[source]
    pub source: TransactionBuilderError,
}

impl SwapError {
    pub fn new(stage: SwapStage, source: TransactionBuilderError) -> Self {
        Self { stage, source }
    }
}

trait AtStage<T> {
    fn at(self, stage: SwapStage) -> Result<T, SwapError>;
}

impl<T> AtStage<T> for Result<T, TransactionBuilderError> {
    fn at(self, stage: SwapStage) -> Result<T, SwapError> {
        self.map_err(|e| SwapError::new(stage, e))
    }
}

/// What the caller gets back from a submitted swap
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub correlation_id: CorrelationId,
    pub signature: Signature,
    pub bundle_id: String,
    pub compute_estimate: ComputeEstimate,
    pub compute_unit_limit: u32,
    pub status: BundleLookup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub simulation: SimulationConfig,
    pub bundle: BundleConfig,
    pub priority_fee: PriorityFee,
    pub fallback_compute_unit_limit: u32,
    pub max_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            bundle: BundleConfig::default(),
            priority_fee: PriorityFee::default(),
            fallback_compute_unit_limit: MAX_COMPUTE_UNIT_LIMIT,
            max_batch_size: 4,
        }
    }
}

struct PreparedSwap {
    quote: QuoteResponse,
    instructions: SwapInstructionsResponse,
}

/// Convert a UI amount into raw base units
pub fn to_raw_amount(amount: f64, decimals: u8) -> Result<u64, TransactionBuilderError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(TransactionBuilderError::config(format!(
            "swap amount must be a positive number, got {}",
            amount
        )));
    }

    let raw = (amount * 10f64.powi(decimals as i32)).round();
    if raw < 1.0 || raw >= u64::MAX as f64 {
        return Err(TransactionBuilderError::config(format!(
            "swap amount {} is out of range for {} decimals",
            amount, decimals
        )));
    }
    Ok(raw as u64)
}

pub struct SwapEngine {
    rpc: Arc<dyn ChainRpc>,
    quotes: Arc<dyn QuoteProvider>,
    wallet: WalletManager,
    simulator: ComputeSimulator,
    builder: TransactionBuilder,
    bundler: BundleAssembler,
    config: EngineConfig,
}

impl SwapEngine {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        quotes: Arc<dyn QuoteProvider>,
        relay: Arc<dyn BundleRelay>,
        wallet: WalletManager,
        config: EngineConfig,
    ) -> Self {
        Self {
            simulator: ComputeSimulator::new(rpc.clone(), config.simulation.clone()),
            builder: TransactionBuilder::new(config.fallback_compute_unit_limit),
            bundler: BundleAssembler::new(relay, rpc.clone(), config.bundle.clone()),
            rpc,
            quotes,
            wallet,
            config,
        }
    }

    pub fn payer(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    /// Single swap; a batch of one
    pub async fn execute_swap(&self, request: &SwapRequest) -> Result<SwapOutcome, SwapError> {
        self.execute_batch(std::slice::from_ref(request)).await
    }

    /// Execute all swaps in one transaction and one bundle
    #[instrument(skip(self, requests), fields(swaps = requests.len()))]
    pub async fn execute_batch(&self, requests: &[SwapRequest]) -> Result<SwapOutcome, SwapError> {
        let ctx = PipelineContext::new();
        let timer = Timer::new();
        metrics().swaps_total.inc();
        ctx.logger.log_swap_attempt(requests.len());

        let result = self.run(&ctx, requests).await;
        match &result {
            Ok(outcome) => {
                timer.observe_duration(&metrics().swap_latency);
                metrics().swaps_success.inc();
                ctx.logger.log_swap_submitted(
                    &outcome.signature.to_string(),
                    &outcome.bundle_id,
                    timer.elapsed_ms(),
                );
            }
            Err(e) => {
                metrics()
                    .swaps_failed
                    .with_label_values(&[e.stage.as_str(), e.source.category()])
                    .inc();
                ctx.logger.log_stage_failure(
                    e.stage.as_str(),
                    e.source.category(),
                    e.source.is_retryable(),
                    &e.source.to_string(),
                );
            }
        }
        result
    }

    async fn run(
        &self,
        ctx: &PipelineContext,
        requests: &[SwapRequest],
    ) -> Result<SwapOutcome, SwapError> {
        self.validate(requests).at(SwapStage::Validate)?;
        let payer = self.wallet.pubkey();

        let read_timer = Timer::new();
        let prepared = try_join_all(requests.iter().map(|r| self.prepare(r, &payer))).await?;
        read_timer.observe_duration(&metrics().read_phase_latency);
        ctx.logger.log_stage_success(
            "read",
            &format!("{} quote(s) and instruction set(s) received", prepared.len()),
        );

        let mut instructions = Vec::new();
        let mut table_addresses = Vec::new();
        let mut hint: u32 = 0;
        for swap in &prepared {
            instructions.extend(decode_swap_instructions(&swap.instructions).at(SwapStage::Decode)?);
            table_addresses.extend(
                parse_lookup_table_addresses(&swap.instructions.address_lookup_table_addresses)
                    .at(SwapStage::Decode)?,
            );
            hint = hint.saturating_add(swap.instructions.compute_unit_limit);
            debug!(
                input_mint = %swap.quote.input_mint,
                output_mint = %swap.quote.output_mint,
                in_amount = %swap.quote.in_amount,
                out_amount = %swap.quote.out_amount,
                hops = swap.quote.route_plan.len(),
                "Decoded swap"
            );
        }
        ctx.logger.log_stage_success(
            "decode",
            &format!("{} instruction(s)", instructions.len()),
        );

        let tables = resolve_lookup_tables(self.rpc.as_ref(), &table_addresses).await;
        ctx.logger.log_stage_success(
            "lookup_tables",
            &format!("{} of {} table(s) resolved", tables.len(), table_addresses.len()),
        );

        let blockhash = self
            .rpc
            .latest_blockhash(CommitmentConfig::confirmed())
            .await
            .at(SwapStage::Blockhash)?;
        ctx.logger
            .log_stage_success("blockhash", &blockhash.to_string());

        let estimate = self
            .simulator
            .estimate_with_blockhash(&instructions, &payer, &tables, blockhash)
            .await;
        match estimate {
            ComputeEstimate::Units(units) => ctx
                .logger
                .log_stage_success("simulate", &format!("{} compute units", units)),
            ComputeEstimate::Unknown => ctx
                .logger
                .warn("Simulation gave no estimate, falling back to default compute budget"),
            ComputeEstimate::InsufficientFundsForRent => {
                return Err(SwapError::new(
                    SwapStage::Simulate,
                    TransactionBuilderError::InsufficientFundsForRent,
                ));
            }
        }

        let draft = self
            .builder
            .build(BuildRequest {
                instructions,
                payer,
                lookup_tables: &tables,
                blockhash,
                compute_estimate: estimate,
                compute_unit_hint: (hint > 0).then_some(hint),
                priority_fee: self.config.priority_fee,
            })
            .at(SwapStage::Build)?;
        let compute_unit_limit = draft.compute_unit_limit();

        let signed = draft.sign(self.wallet.keypair()).at(SwapStage::Sign)?;
        ctx.logger
            .log_stage_success("sign", &signed.signature().to_string());

        let bundle = self
            .bundler
            .assemble(self.wallet.keypair(), &signed)
            .await
            .at(SwapStage::Bundle)?;

        let bundle_id = self.bundler.submit(&bundle).await.at(SwapStage::Submit)?;
        ctx.logger.log_stage_success("submit", &bundle_id);

        let status = self.bundler.poll_until_terminal(&bundle_id).await;
        ctx.logger.log_stage_success("status", &format!("{:?}", status));

        Ok(SwapOutcome {
            correlation_id: ctx.correlation_id.clone(),
            signature: *signed.signature(),
            bundle_id,
            compute_estimate: estimate,
            compute_unit_limit,
            status,
        })
    }

    fn validate(&self, requests: &[SwapRequest]) -> Result<(), TransactionBuilderError> {
        if requests.is_empty() {
            return Err(TransactionBuilderError::config("no swaps requested"));
        }
        if requests.len() > self.config.max_batch_size {
            return Err(TransactionBuilderError::config(format!(
                "batch of {} swaps exceeds the limit of {}",
                requests.len(),
                self.config.max_batch_size
            )));
        }
        for r in requests {
            if r.input_mint == r.output_mint {
                return Err(TransactionBuilderError::config(format!(
                    "input and output mint are both {}",
                    r.input_mint
                )));
            }
            if !r.amount.is_finite() || r.amount <= 0.0 {
                return Err(TransactionBuilderError::config(format!(
                    "swap amount must be a positive number, got {}",
                    r.amount
                )));
            }
        }
        Ok(())
    }

    async fn prepare(&self, request: &SwapRequest, payer: &Pubkey) -> Result<PreparedSwap, SwapError> {
        let decimals = self
            .mint_decimals(&request.input_mint)
            .await
            .at(SwapStage::Decimals)?;
        let raw_amount = to_raw_amount(request.amount, decimals).at(SwapStage::Validate)?;

        let quote = self
            .quotes
            .get_quote(
                &request.input_mint,
                &request.output_mint,
                raw_amount,
                request.slippage_bps,
            )
            .await
            .at(SwapStage::Quote)?;
        if !quote.has_route() {
            return Err(SwapError::new(
                SwapStage::Quote,
                TransactionBuilderError::Quote(format!(
                    "no route plan for {} -> {}",
                    request.input_mint, request.output_mint
                )),
            ));
        }

        let instructions = self
            .quotes
            .get_swap_instructions(&quote, payer)
            .await
            .at(SwapStage::SwapInstructions)?;

        Ok(PreparedSwap {
            quote,
            instructions,
        })
    }

    /// Decimals from the mint account's base SPL layout
    pub async fn mint_decimals(&self, mint: &Pubkey) -> Result<u8, TransactionBuilderError> {
        let data = self
            .rpc
            .account_data(mint)
            .await?
            .ok_or_else(|| TransactionBuilderError::Rpc(format!("mint account {} not found", mint)))?;

        if data.len() < Mint::LEN {
            return Err(TransactionBuilderError::Rpc(format!(
                "account {} is not a token mint ({} bytes)",
                mint,
                data.len()
            )));
        }

        Mint::unpack(&data[..Mint::LEN])
            .map(|m| m.decimals)
            .map_err(|e| TransactionBuilderError::Rpc(format!("mint {} unreadable: {}", mint, e)))
    }

    /// One status check for a previously submitted bundle
    pub async fn bundle_status(&self, bundle_id: &str) -> BundleLookup {
        self.bundler.check_status(bundle_id).await
    }

    /// Non-dust SPL token balances held by the payer
    pub async fn holdings(&self) -> Result<Vec<TokenHolding>, TransactionBuilderError> {
        let holdings = self.rpc.token_holdings(&self.wallet.pubkey()).await?;
        Ok(holdings
            .into_iter()
            .filter(|h| h.ui_amount > DUST_THRESHOLD)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_raw_amount() {
        assert_eq!(to_raw_amount(10.0, 6).unwrap(), 10_000_000);
        assert_eq!(to_raw_amount(0.1, 9).unwrap(), 100_000_000);
        assert_eq!(to_raw_amount(1.5, 0).unwrap(), 2);
        assert!(to_raw_amount(0.0, 6).is_err());
        assert!(to_raw_amount(-1.0, 6).is_err());
        assert!(to_raw_amount(f64::NAN, 6).is_err());
        assert!(to_raw_amount(0.0000001, 6).is_err());
        assert!(to_raw_amount(1e30, 9).is_err());
    }

    #[test]
    fn test_swap_error_names_stage() {
        let err = SwapError::new(SwapStage::Submit, TransactionBuilderError::relay("rejected"));
        assert_eq!(
            err.to_string(),
            "swap failed at submit stage: Relay error: rejected"
        );
    }
}
