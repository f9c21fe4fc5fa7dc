//! Versioned transaction assembly
//!
//! Takes decoded payload instructions plus a compute estimate and produces a
//! compiled v0 draft. Signing consumes the draft, so a signed transaction can
//! never be re-signed or mutated in place.

use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::instructions::{plan_swap_instructions, PriorityFee, MAX_COMPUTE_UNIT_LIMIT};
use crate::tx_builder::output::SignedTransaction;
use crate::tx_builder::simulate::ComputeEstimate;
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
use tracing::{debug, warn};

/// Inputs for one transaction build
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub instructions: Vec<Instruction>,
    pub payer: Pubkey,
    pub lookup_tables: &'a [AddressLookupTableAccount],
    pub blockhash: Hash,
    pub compute_estimate: ComputeEstimate,
    /// Limit suggested by the quoting service, used when simulation gave none
    pub compute_unit_hint: Option<u32>,
    pub priority_fee: PriorityFee,
}

/// Compiled, unsigned transaction
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    message: VersionedMessage,
    payer: Pubkey,
    compute_unit_limit: u32,
    priority_fee: PriorityFee,
}

impl TransactionDraft {
    pub fn message(&self) -> &VersionedMessage {
        &self.message
    }

    pub fn payer(&self) -> &Pubkey {
        &self.payer
    }

    pub fn compute_unit_limit(&self) -> u32 {
        self.compute_unit_limit
    }

    pub fn priority_fee(&self) -> PriorityFee {
        self.priority_fee
    }

    /// Sign with the payer key, consuming the draft
    pub fn sign(self, payer: &Keypair) -> Result<SignedTransaction, TransactionBuilderError> {
        if payer.pubkey() != self.payer {
            return Err(TransactionBuilderError::Signing(format!(
                "signer {} does not match payer {}",
                payer.pubkey(),
                self.payer
            )));
        }

        let tx = VersionedTransaction::try_new(self.message, &[payer])
            .map_err(|e| TransactionBuilderError::Signing(e.to_string()))?;

        Ok(SignedTransaction::new(
            tx,
            self.compute_unit_limit,
            self.priority_fee,
        ))
    }
}

/// Builds v0 swap transactions with a compute-budget prefix
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    fallback_compute_unit_limit: u32,
}

impl TransactionBuilder {
    pub fn new(fallback_compute_unit_limit: u32) -> Self {
        Self {
            fallback_compute_unit_limit: fallback_compute_unit_limit.min(MAX_COMPUTE_UNIT_LIMIT),
        }
    }

    /// Pick the compute-unit limit for an estimate
    ///
    /// A zero or unknown estimate falls back to the service hint, then to the
    /// configured limit. Rent shortfalls are not buildable.
    pub fn resolve_compute_unit_limit(
        &self,
        estimate: ComputeEstimate,
        hint: Option<u32>,
    ) -> Result<u32, TransactionBuilderError> {
        match estimate {
            ComputeEstimate::Units(n) if n > 0 => Ok(n.min(MAX_COMPUTE_UNIT_LIMIT)),
            ComputeEstimate::InsufficientFundsForRent => {
                Err(TransactionBuilderError::InsufficientFundsForRent)
            }
            ComputeEstimate::Units(_) | ComputeEstimate::Unknown => {
                let limit = match hint {
                    Some(h) if h > 0 => h.min(MAX_COMPUTE_UNIT_LIMIT),
                    _ => self.fallback_compute_unit_limit,
                };
                warn!(
                    estimate = ?estimate,
                    compute_unit_limit = limit,
                    "No compute estimate, using fallback limit"
                );
                Ok(limit)
            }
        }
    }

    pub fn build(&self, request: BuildRequest<'_>) -> Result<TransactionDraft, TransactionBuilderError> {
        let compute_unit_limit =
            self.resolve_compute_unit_limit(request.compute_estimate, request.compute_unit_hint)?;

        let plan = plan_swap_instructions(
            compute_unit_limit,
            request.priority_fee,
            request.instructions,
        )?;

        let message = v0::Message::try_compile(
            &request.payer,
            &plan.instructions,
            request.lookup_tables,
            request.blockhash,
        )
        .map_err(|e| TransactionBuilderError::MessageCompile(e.to_string()))?;

        debug!(
            instructions = plan.instructions.len(),
            lookup_tables = request.lookup_tables.len(),
            compute_unit_limit,
            priority_fee = request.priority_fee.micro_lamports_per_unit,
            "Compiled v0 message"
        );

        Ok(TransactionDraft {
            message: VersionedMessage::V0(message),
            payer: request.payer,
            compute_unit_limit,
            priority_fee: request.priority_fee,
        })
    }
}
