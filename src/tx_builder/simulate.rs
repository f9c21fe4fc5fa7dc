//! Compute-unit estimation by simulation
//!
//! Compiles a throwaway v0 message, simulates it with signature verification
//! off, and scales the consumed units by a safety margin. Transient failures
//! are retried on a fixed interval; rent shortfalls short-circuit. Running
//! out of attempts yields [`ComputeEstimate::Unknown`], never an error.

use crate::metrics::metrics;
use crate::rpc::ChainRpc;
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio_retry::{strategy::FixedInterval, RetryIf};
use tracing::{debug, info, warn};

const INSUFFICIENT_FUNDS_FOR_RENT: &str = "InsufficientFundsForRent";

/// Result of a compute-unit estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeEstimate {
    /// Scaled units, ready to use as the compute-unit limit
    Units(u32),
    /// The payer cannot cover rent for an account the swap creates
    InsufficientFundsForRent,
    /// No estimate could be obtained
    Unknown,
}

impl ComputeEstimate {
    pub fn units(&self) -> Option<u32> {
        match self {
            Self::Units(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Total simulation attempts, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub retry_delay_ms: u64,
    /// Safety margin as a percentage of consumed units (120 = ×1.2)
    pub margin_percent: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_ms: 1_000,
            margin_percent: 120,
        }
    }
}

#[derive(Debug)]
enum AttemptError {
    InsufficientFundsForRent,
    Transient(String),
}

/// `ceil(units × margin_percent / 100)`, saturating at `u32::MAX`
pub fn apply_margin(units: u64, margin_percent: u32) -> u32 {
    let scaled = (units as u128 * margin_percent as u128).div_ceil(100);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

pub struct ComputeSimulator {
    rpc: Arc<dyn ChainRpc>,
    config: SimulationConfig,
}

impl ComputeSimulator {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: SimulationConfig) -> Self {
        Self { rpc, config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Estimate compute units for `instructions` paid by `payer`
    ///
    /// Fetches its own blockhash; a failed fetch yields `Unknown`.
    pub async fn estimate(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        lookup_tables: &[AddressLookupTableAccount],
    ) -> ComputeEstimate {
        let blockhash = match self
            .rpc
            .latest_blockhash(CommitmentConfig::confirmed())
            .await
        {
            Ok(hash) => hash,
            Err(e) => {
                warn!(error = %e, "No blockhash for simulation, compute estimate unknown");
                metrics().simulation_outcomes.with_label_values(&["unknown"]).inc();
                return ComputeEstimate::Unknown;
            }
        };

        self.estimate_with_blockhash(instructions, payer, lookup_tables, blockhash)
            .await
    }

    /// Same as [`Self::estimate`], against a blockhash the caller already holds
    pub async fn estimate_with_blockhash(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        lookup_tables: &[AddressLookupTableAccount],
        blockhash: Hash,
    ) -> ComputeEstimate {
        let attempt_no = AtomicU32::new(0);
        let counter = &attempt_no;
        let strategy = FixedInterval::from_millis(self.config.retry_delay_ms)
            .take(self.config.max_attempts.max(1) as usize - 1);

        let outcome = RetryIf::spawn(
            strategy,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                self.attempt(n, instructions, payer, lookup_tables, blockhash)
            },
            |e: &AttemptError| matches!(e, AttemptError::Transient(_)),
        )
        .await;

        let attempts = attempt_no.load(Ordering::SeqCst);
        match outcome {
            Ok(units) => {
                let scaled = apply_margin(units, self.config.margin_percent);
                info!(
                    units_consumed = units,
                    compute_units = scaled,
                    attempts,
                    "Simulation successful"
                );
                metrics().simulation_outcomes.with_label_values(&["units"]).inc();
                ComputeEstimate::Units(scaled)
            }
            Err(AttemptError::InsufficientFundsForRent) => {
                warn!(attempts, "Simulation reports insufficient funds for rent");
                metrics().simulation_outcomes.with_label_values(&["rent"]).inc();
                ComputeEstimate::InsufficientFundsForRent
            }
            Err(AttemptError::Transient(reason)) => {
                warn!(attempts, last_error = %reason, "Max simulation attempts reached, compute estimate unknown");
                metrics().simulation_outcomes.with_label_values(&["unknown"]).inc();
                ComputeEstimate::Unknown
            }
        }
    }

    async fn attempt(
        &self,
        attempt: u32,
        instructions: &[Instruction],
        payer: &Pubkey,
        lookup_tables: &[AddressLookupTableAccount],
        blockhash: Hash,
    ) -> Result<u64, AttemptError> {
        metrics().simulation_attempts.inc();
        debug!(attempt, max_attempts = self.config.max_attempts, "Simulating transaction");

        let message = v0::Message::try_compile(payer, instructions, lookup_tables, blockhash)
            .map_err(|e| {
                warn!(attempt, error = %e, "Simulation message compile failed");
                AttemptError::Transient(e.to_string())
            })?;

        let message = VersionedMessage::V0(message);
        let signature_count = message.header().num_required_signatures as usize;
        let tx = VersionedTransaction {
            signatures: vec![Signature::default(); signature_count],
            message,
        };

        let report = match self.rpc.simulate(&tx).await {
            Ok(report) => report,
            Err(e) => {
                let reason = e.to_string();
                warn!(attempt, error = %reason, "Simulation request failed");
                return Err(classify(reason));
            }
        };

        if let Some(err) = report.err {
            warn!(attempt, error = %err, logs = ?report.logs, "Simulation error");
            let rent = err.contains(INSUFFICIENT_FUNDS_FOR_RENT)
                || report
                    .logs
                    .iter()
                    .any(|line| line.contains(INSUFFICIENT_FUNDS_FOR_RENT));
            if rent {
                return Err(AttemptError::InsufficientFundsForRent);
            }
            return Err(AttemptError::Transient(err));
        }

        Ok(report.units_consumed.unwrap_or(0))
    }
}

fn classify(reason: String) -> AttemptError {
    if reason.contains(INSUFFICIENT_FUNDS_FOR_RENT) {
        AttemptError::InsufficientFundsForRent
    } else {
        AttemptError::Transient(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_instruction, MockRpc, SimStep};

    fn simulator(rpc: Arc<MockRpc>, max_attempts: u32) -> ComputeSimulator {
        ComputeSimulator::new(
            rpc,
            SimulationConfig {
                max_attempts,
                ..SimulationConfig::default()
            },
        )
    }

    #[test]
    fn test_apply_margin_rounds_up() {
        assert_eq!(apply_margin(100_000, 120), 120_000);
        assert_eq!(apply_margin(1, 120), 2);
        assert_eq!(apply_margin(0, 120), 0);
        assert_eq!(apply_margin(12_345, 120), 14_814);
        assert_eq!(apply_margin(u64::MAX, 120), u32::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_simulation(SimStep::Units(50_000));
        let sim = simulator(rpc.clone(), 5);

        let estimate = sim
            .estimate(&[sample_instruction(1)], &Pubkey::new_unique(), &[])
            .await;

        assert_eq!(estimate, ComputeEstimate::Units(60_000));
        assert_eq!(rpc.simulations(), 1);
        assert_eq!(rpc.blockhash_fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rent_error_in_logs_short_circuits() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_simulation(SimStep::ErrWithLogs(
            "InstructionError(3, Custom(1))".into(),
            vec!["Transfer: insufficient lamports, InsufficientFundsForRent".into()],
        ));
        let sim = simulator(rpc.clone(), 5);

        let estimate = sim
            .estimate(&[sample_instruction(1)], &Pubkey::new_unique(), &[])
            .await;

        assert_eq!(estimate, ComputeEstimate::InsufficientFundsForRent);
        assert_eq!(rpc.simulations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blockhash_failure_is_unknown() {
        let rpc = Arc::new(MockRpc::new());
        rpc.fail_blockhash();
        let sim = simulator(rpc.clone(), 5);

        let estimate = sim
            .estimate(&[sample_instruction(1)], &Pubkey::new_unique(), &[])
            .await;

        assert_eq!(estimate, ComputeEstimate::Unknown);
        assert_eq!(rpc.simulations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_blockhash_skips_fetch() {
        let rpc = Arc::new(MockRpc::new());
        rpc.fail_blockhash();
        rpc.push_simulation(SimStep::Units(10_000));
        let sim = simulator(rpc.clone(), 5);

        let estimate = sim
            .estimate_with_blockhash(
                &[sample_instruction(1)],
                &Pubkey::new_unique(),
                &[],
                Hash::new_unique(),
            )
            .await;

        assert_eq!(estimate, ComputeEstimate::Units(12_000));
        assert_eq!(rpc.blockhash_fetches(), 0);
        assert_eq!(rpc.simulations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_budget() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_simulation(SimStep::Transport("timeout".into()));
        rpc.push_simulation(SimStep::Units(10));
        let sim = simulator(rpc.clone(), 1);

        let estimate = sim
            .estimate(&[sample_instruction(1)], &Pubkey::new_unique(), &[])
            .await;

        assert_eq!(estimate, ComputeEstimate::Unknown);
        assert_eq!(rpc.simulations(), 1);
    }
}
