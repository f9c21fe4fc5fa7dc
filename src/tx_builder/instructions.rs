//! Instruction decoding and compute-budget planning
//!
//! Swap transactions are laid out as:
//! 1. `set_compute_unit_limit`
//! 2. `set_compute_unit_price`
//! 3. Setup, swap, and cleanup instructions from the quoting service
//!
//! Decoding is pure: no I/O, and any malformed address or payload is a
//! contract violation reported as `InstructionDecode`.

use crate::tx_builder::errors::TransactionBuilderError;
use crate::types::{AccountDescriptor, InstructionDescriptor, SwapInstructionsResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_sdk::{
    compute_budget::{self, ComputeBudgetInstruction},
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::str::FromStr;

/// Runtime ceiling for a single transaction's compute budget
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

// Borsh discriminants of the compute budget program
const SET_COMPUTE_UNIT_LIMIT_TAG: u8 = 2;
const SET_COMPUTE_UNIT_PRICE_TAG: u8 = 3;

/// Priority fee in micro-lamports per compute unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityFee {
    pub micro_lamports_per_unit: u64,
}

impl PriorityFee {
    pub fn new(micro_lamports_per_unit: u64) -> Self {
        Self {
            micro_lamports_per_unit,
        }
    }
}

/// Ordered instructions ready for message compilation
#[derive(Debug, Clone)]
pub struct InstructionPlan {
    pub instructions: Vec<Instruction>,
    pub compute_unit_limit: u32,
    pub priority_fee: PriorityFee,
}

/// Decode one descriptor from the quoting service
pub fn decode_instruction(
    descriptor: &InstructionDescriptor,
) -> Result<Instruction, TransactionBuilderError> {
    let program_id = Pubkey::from_str(&descriptor.program_id)
        .map_err(|e| TransactionBuilderError::decode_failed("programId", e.to_string()))?;

    let accounts = descriptor
        .accounts
        .iter()
        .enumerate()
        .map(|(idx, account)| {
            let pubkey = Pubkey::from_str(&account.pubkey).map_err(|e| {
                TransactionBuilderError::decode_failed(
                    format!("accounts[{}].pubkey", idx),
                    e.to_string(),
                )
            })?;
            Ok(AccountMeta {
                pubkey,
                is_signer: account.is_signer,
                is_writable: account.is_writable,
            })
        })
        .collect::<Result<Vec<_>, TransactionBuilderError>>()?;

    let data = STANDARD
        .decode(descriptor.data.as_bytes())
        .map_err(|e| TransactionBuilderError::decode_failed("data", e.to_string()))?;

    Ok(Instruction {
        program_id,
        accounts,
        data,
    })
}

/// Inverse of [`decode_instruction`]
pub fn encode_instruction(ix: &Instruction) -> InstructionDescriptor {
    InstructionDescriptor {
        program_id: ix.program_id.to_string(),
        accounts: ix
            .accounts
            .iter()
            .map(|meta| AccountDescriptor {
                pubkey: meta.pubkey.to_string(),
                is_signer: meta.is_signer,
                is_writable: meta.is_writable,
            })
            .collect(),
        data: STANDARD.encode(&ix.data),
    }
}

/// Decode a swap's instructions as setup, swap, then optional cleanup
///
/// The service's own compute budget and token ledger instructions are
/// ignored; the builder emits its own budget prefix.
pub fn decode_swap_instructions(
    response: &SwapInstructionsResponse,
) -> Result<Vec<Instruction>, TransactionBuilderError> {
    response
        .setup_instructions
        .iter()
        .chain(std::iter::once(&response.swap_instruction))
        .chain(response.cleanup_instruction.iter())
        .map(decode_instruction)
        .collect()
}

/// Prefix the payload with the compute-unit limit and price instructions
///
/// Both budget instructions are always present, even for a zero price. A
/// payload carrying its own compute budget instruction is rejected.
pub fn plan_swap_instructions(
    compute_unit_limit: u32,
    priority_fee: PriorityFee,
    payload: Vec<Instruction>,
) -> Result<InstructionPlan, TransactionBuilderError> {
    if payload.is_empty() {
        return Err(TransactionBuilderError::config(
            "Swap payload has no instructions",
        ));
    }

    if let Some(idx) = payload
        .iter()
        .position(|ix| ix.program_id == compute_budget::id())
    {
        return Err(TransactionBuilderError::invalid_order(format!(
            "Duplicate compute budget instruction in payload at position {}",
            idx + 2
        )));
    }

    let mut instructions = Vec::with_capacity(payload.len() + 2);
    instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
        compute_unit_limit,
    ));
    instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
        priority_fee.micro_lamports_per_unit,
    ));
    instructions.extend(payload);

    sanity_check_ix_order(&instructions)?;

    Ok(InstructionPlan {
        instructions,
        compute_unit_limit,
        priority_fee,
    })
}

fn budget_tag(ix: &Instruction) -> Option<u8> {
    if ix.program_id != compute_budget::id() {
        return None;
    }
    ix.data.first().copied()
}

/// Check the compute-budget prefix (debug/test builds only)
///
/// Expects exactly one limit at index 0, one price at index 1, and no
/// further compute budget instructions after them.
#[cfg(debug_assertions)]
pub fn sanity_check_ix_order(instructions: &[Instruction]) -> Result<(), TransactionBuilderError> {
    if instructions.len() < 3 {
        return Err(TransactionBuilderError::invalid_order(format!(
            "Expected budget prefix plus payload, got {} instructions",
            instructions.len()
        )));
    }

    if budget_tag(&instructions[0]) != Some(SET_COMPUTE_UNIT_LIMIT_TAG) {
        return Err(TransactionBuilderError::invalid_order(format!(
            "Instruction 0 must be set_compute_unit_limit, got program_id: {}",
            instructions[0].program_id
        )));
    }

    if budget_tag(&instructions[1]) != Some(SET_COMPUTE_UNIT_PRICE_TAG) {
        return Err(TransactionBuilderError::invalid_order(format!(
            "Instruction 1 must be set_compute_unit_price, got program_id: {}",
            instructions[1].program_id
        )));
    }

    if let Some(idx) = instructions
        .iter()
        .skip(2)
        .position(|ix| ix.program_id == compute_budget::id())
    {
        return Err(TransactionBuilderError::invalid_order(format!(
            "Duplicate compute budget instruction in payload at position {}",
            idx + 2
        )));
    }

    Ok(())
}

#[cfg(not(debug_assertions))]
#[inline]
pub fn sanity_check_ix_order(_instructions: &[Instruction]) -> Result<(), TransactionBuilderError> {
    Ok(())
}
