//! Compute-budget prefix and payload ordering in compiled messages

use crate::test_utils::{sample_instruction, sample_swap_instructions};
use crate::tx_builder::{
    decode_swap_instructions, BuildRequest, ComputeEstimate, PriorityFee, TransactionBuilder,
    TransactionBuilderError, MAX_COMPUTE_UNIT_LIMIT,
};
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    compute_budget::{self, ComputeBudgetInstruction},
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    message::VersionedMessage,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

fn compile(
    payer: &Keypair,
    instructions: Vec<Instruction>,
    tables: &[AddressLookupTableAccount],
) -> Result<VersionedMessage, TransactionBuilderError> {
    TransactionBuilder::new(MAX_COMPUTE_UNIT_LIMIT)
        .build(BuildRequest {
            instructions,
            payer: payer.pubkey(),
            lookup_tables: tables,
            blockhash: Hash::new_unique(),
            compute_estimate: ComputeEstimate::Units(150_000),
            compute_unit_hint: None,
            priority_fee: PriorityFee::new(25_000),
        })
        .map(|draft| draft.message().clone())
}

/// Program id and data of every compiled instruction, in order
fn compiled_programs(message: &VersionedMessage) -> Vec<(Pubkey, Vec<u8>)> {
    let keys = message.static_account_keys();
    message
        .instructions()
        .iter()
        .map(|ix| (keys[ix.program_id_index as usize], ix.data.clone()))
        .collect()
}

#[test]
fn budget_prefix_precedes_payload_in_original_order() {
    let payer = Keypair::new();
    let payload: Vec<Instruction> = (0..5).map(sample_instruction).collect();
    let expected: Vec<Pubkey> = payload.iter().map(|ix| ix.program_id).collect();

    let message = compile(&payer, payload, &[]).unwrap();
    let compiled = compiled_programs(&message);

    assert_eq!(compiled.len(), 7);
    assert_eq!(compiled[0].0, compute_budget::id());
    assert_eq!(
        compiled[0].1,
        ComputeBudgetInstruction::set_compute_unit_limit(150_000).data
    );
    assert_eq!(compiled[1].0, compute_budget::id());
    assert_eq!(
        compiled[1].1,
        ComputeBudgetInstruction::set_compute_unit_price(25_000).data
    );

    let rest: Vec<Pubkey> = compiled[2..].iter().map(|(p, _)| *p).collect();
    assert_eq!(rest, expected);
    for (i, (_, data)) in compiled[2..].iter().enumerate() {
        assert_eq!(data, &vec![i as u8]);
    }
}

#[test]
fn decoded_swap_keeps_setup_swap_cleanup_order() {
    let payer = Keypair::new();
    let response = sample_swap_instructions();
    let decoded = decode_swap_instructions(&response).unwrap();

    let message = compile(&payer, decoded, &[]).unwrap();
    let data: Vec<Vec<u8>> = compiled_programs(&message)
        .into_iter()
        .skip(2)
        .map(|(_, data)| data)
        .collect();

    assert_eq!(data, vec![vec![10], vec![11], vec![12]]);
}

#[test]
fn payload_budget_instruction_is_rejected() {
    let payer = Keypair::new();
    for budget_ix in [
        ComputeBudgetInstruction::set_compute_unit_limit(10),
        ComputeBudgetInstruction::set_compute_unit_price(5),
    ] {
        let payload = vec![sample_instruction(1), budget_ix];
        let result = compile(&payer, payload, &[]);
        assert!(matches!(
            result,
            Err(TransactionBuilderError::InvalidInstructionOrder(_))
        ));
    }
}

#[test]
fn lookup_table_compresses_payload_accounts() {
    let payer = Keypair::new();
    let shared: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
    let program = Pubkey::new_unique();
    let ix = Instruction::new_with_bytes(
        program,
        &[9],
        shared.iter().map(|k| AccountMeta::new(*k, false)).collect(),
    );
    let table = AddressLookupTableAccount {
        key: Pubkey::new_unique(),
        addresses: shared.clone(),
    };

    let message = compile(&payer, vec![ix], &[table.clone()]).unwrap();

    let lookups = message.address_table_lookups().unwrap_or_default();
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].account_key, table.key);
    assert_eq!(lookups[0].writable_indexes.len(), shared.len());
    for key in &shared {
        assert!(!message.static_account_keys().contains(key));
    }

    let compiled = compiled_programs(&message);
    assert_eq!(compiled[0].0, compute_budget::id());
    assert_eq!(compiled[1].0, compute_budget::id());
    assert_eq!(compiled[2].0, program);
}
