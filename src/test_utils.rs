//! Test Utilities Module
//!
//! Scripted stand-ins for the chain RPC, the bundle relay and the quoting
//! service, plus fixture builders. Nothing here touches the network.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::quote::QuoteProvider;
use crate::relay::BundleRelay;
use crate::rpc::{ChainRpc, SimulationReport, TokenHolding};
use crate::tx_builder::{
    encode_instruction, BuildRequest, BundleState, BundleStatus, ComputeEstimate, PriorityFee,
    SignedTransaction, TransactionBuilder, TransactionBuilderError, MAX_COMPUTE_UNIT_LIMIT,
};
use crate::types::{QuoteResponse, RoutePlanStep, SwapInfo, SwapInstructionsResponse};
use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
use spl_token::solana_program::program_option::COption;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Mint;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Bundle id returned by [`MockRelay`] for every accepted bundle
pub const MOCK_BUNDLE_ID: &str = "mock-bundle-id";

const LOOKUP_TABLE_META_SIZE: usize = 56;

/// Instruction with a fresh program id, one writable account and `[tag]` as data
pub fn sample_instruction(tag: u8) -> Instruction {
    Instruction::new_with_bytes(
        Pubkey::new_unique(),
        &[tag],
        vec![AccountMeta::new(Pubkey::new_unique(), false)],
    )
}

/// A payer and a signed single-instruction payload
pub fn signed_sample() -> (Keypair, SignedTransaction) {
    let payer = Keypair::new();
    let signed = TransactionBuilder::new(MAX_COMPUTE_UNIT_LIMIT)
        .build(BuildRequest {
            instructions: vec![sample_instruction(1)],
            payer: payer.pubkey(),
            lookup_tables: &[],
            blockhash: Hash::new_unique(),
            compute_estimate: ComputeEstimate::Units(100_000),
            compute_unit_hint: None,
            priority_fee: PriorityFee::new(1_000),
        })
        .and_then(|draft| draft.sign(&payer))
        .expect("sample transaction builds");
    (payer, signed)
}

/// Raw account data of an active lookup table holding `addresses`
pub fn lookup_table_bytes(addresses: &[Pubkey]) -> Vec<u8> {
    let mut data = vec![0u8; LOOKUP_TABLE_META_SIZE];
    // ProgramState::LookupTable
    data[0..4].copy_from_slice(&1u32.to_le_bytes());
    // deactivation_slot: never deactivated
    data[4..12].copy_from_slice(&u64::MAX.to_le_bytes());
    // last_extended_slot, start index and authority (None) stay zero
    for address in addresses {
        data.extend_from_slice(address.as_ref());
    }
    data
}

/// Raw account data of an initialized mint
pub fn mint_bytes(decimals: u8) -> Vec<u8> {
    let mint = Mint {
        mint_authority: COption::None,
        supply: 1_000_000_000,
        decimals,
        is_initialized: true,
        freeze_authority: COption::None,
    };
    let mut data = vec![0u8; Mint::LEN];
    Mint::pack(mint, &mut data).expect("mint packs");
    data
}

/// One scripted simulation response
#[derive(Debug, Clone)]
pub enum SimStep {
    /// Success reporting consumed units
    Units(u64),
    /// Simulation ran but the transaction failed
    ErrWithLogs(String, Vec<String>),
    /// The RPC call itself failed
    Transport(String),
}

/// Scripted [`ChainRpc`]
///
/// Simulations replay the queued steps in order; once the queue is drained
/// the last step repeats.
pub struct MockRpc {
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    failing_accounts: Mutex<HashSet<Pubkey>>,
    simulation_script: Mutex<VecDeque<SimStep>>,
    last_simulation: Mutex<SimStep>,
    holdings: Mutex<Vec<TokenHolding>>,
    blockhash_fails: AtomicBool,
    account_fetches: AtomicUsize,
    simulations: AtomicUsize,
    blockhash_fetches: AtomicUsize,
}

impl MockRpc {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            failing_accounts: Mutex::new(HashSet::new()),
            simulation_script: Mutex::new(VecDeque::new()),
            last_simulation: Mutex::new(SimStep::Units(200_000)),
            holdings: Mutex::new(Vec::new()),
            blockhash_fails: AtomicBool::new(false),
            account_fetches: AtomicUsize::new(0),
            simulations: AtomicUsize::new(0),
            blockhash_fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.lock().unwrap().insert(address, data);
    }

    pub fn set_mint(&self, mint: Pubkey, decimals: u8) {
        self.set_account(mint, mint_bytes(decimals));
    }

    pub fn fail_account(&self, address: Pubkey) {
        self.failing_accounts.lock().unwrap().insert(address);
    }

    pub fn push_simulation(&self, step: SimStep) {
        self.simulation_script.lock().unwrap().push_back(step);
    }

    pub fn fail_blockhash(&self) {
        self.blockhash_fails.store(true, Ordering::SeqCst);
    }

    pub fn set_holdings(&self, holdings: Vec<TokenHolding>) {
        *self.holdings.lock().unwrap() = holdings;
    }

    pub fn account_fetches(&self) -> usize {
        self.account_fetches.load(Ordering::SeqCst)
    }

    pub fn simulations(&self) -> usize {
        self.simulations.load(Ordering::SeqCst)
    }

    pub fn blockhash_fetches(&self) -> usize {
        self.blockhash_fetches.load(Ordering::SeqCst)
    }

    fn next_simulation(&self) -> SimStep {
        let mut last = self.last_simulation.lock().unwrap();
        if let Some(step) = self.simulation_script.lock().unwrap().pop_front() {
            *last = step;
        }
        last.clone()
    }
}

impl Default for MockRpc {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn latest_blockhash(
        &self,
        _commitment: CommitmentConfig,
    ) -> Result<Hash, TransactionBuilderError> {
        self.blockhash_fetches.fetch_add(1, Ordering::SeqCst);
        if self.blockhash_fails.load(Ordering::SeqCst) {
            return Err(TransactionBuilderError::blockhash_unavailable(
                "mock blockhash unavailable",
            ));
        }
        Ok(Hash::new_unique())
    }

    async fn account_data(
        &self,
        address: &Pubkey,
    ) -> Result<Option<Vec<u8>>, TransactionBuilderError> {
        self.account_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_accounts.lock().unwrap().contains(address) {
            return Err(TransactionBuilderError::Rpc(format!(
                "mock fetch failed for {}",
                address
            )));
        }
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn simulate(
        &self,
        _tx: &VersionedTransaction,
    ) -> Result<SimulationReport, TransactionBuilderError> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        match self.next_simulation() {
            SimStep::Units(units) => Ok(SimulationReport {
                units_consumed: Some(units),
                ..SimulationReport::default()
            }),
            SimStep::ErrWithLogs(err, logs) => Ok(SimulationReport {
                units_consumed: None,
                err: Some(err),
                logs,
            }),
            SimStep::Transport(reason) => Err(TransactionBuilderError::Rpc(reason)),
        }
    }

    async fn token_holdings(
        &self,
        _owner: &Pubkey,
    ) -> Result<Vec<TokenHolding>, TransactionBuilderError> {
        Ok(self.holdings.lock().unwrap().clone())
    }
}

/// Scripted [`BundleRelay`]
///
/// Status checks replay queued states; `None` (or an empty queue) means the
/// relay has no record of the bundle.
pub struct MockRelay {
    tip_accounts: Vec<String>,
    send_error: Mutex<Option<String>>,
    status_error: Mutex<Option<String>>,
    statuses: Mutex<VecDeque<Option<BundleState>>>,
    sent: Mutex<Vec<Vec<String>>>,
    status_checks: AtomicUsize,
}

impl MockRelay {
    pub fn with_tip_accounts(tip_accounts: Vec<String>) -> Self {
        Self {
            tip_accounts,
            send_error: Mutex::new(None),
            status_error: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            status_checks: AtomicUsize::new(0),
        }
    }

    pub fn fail_send(&self, message: &str) {
        *self.send_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_status(&self, message: &str) {
        *self.status_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn push_status(&self, state: Option<BundleState>) {
        self.statuses.lock().unwrap().push_back(state);
    }

    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }

    /// Every bundle accepted so far, in submission order
    pub fn sent_bundles(&self) -> Vec<Vec<String>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl BundleRelay for MockRelay {
    async fn tip_accounts(&self) -> Result<Vec<String>, TransactionBuilderError> {
        Ok(self.tip_accounts.clone())
    }

    async fn send_bundle(&self, transactions: &[String]) -> Result<String, TransactionBuilderError> {
        if let Some(message) = self.send_error.lock().unwrap().clone() {
            return Err(TransactionBuilderError::relay(message));
        }
        self.sent.lock().unwrap().push(transactions.to_vec());
        Ok(MOCK_BUNDLE_ID.to_string())
    }

    async fn inflight_bundle_statuses(
        &self,
        bundle_ids: &[String],
    ) -> Result<Vec<BundleStatus>, TransactionBuilderError> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.status_error.lock().unwrap().clone() {
            return Err(TransactionBuilderError::relay(message));
        }

        let next = self.statuses.lock().unwrap().pop_front().flatten();
        Ok(match (next, bundle_ids.first()) {
            (Some(state), Some(id)) => vec![BundleStatus {
                bundle_id: id.clone(),
                state,
                landed_slot: (state == BundleState::Landed).then_some(1),
            }],
            _ => Vec::new(),
        })
    }
}

/// Quote for `input -> output` with a single-hop route
pub fn sample_quote(input_mint: &Pubkey, output_mint: &Pubkey, amount: u64) -> QuoteResponse {
    QuoteResponse {
        input_mint: input_mint.to_string(),
        in_amount: amount.to_string(),
        output_mint: output_mint.to_string(),
        out_amount: (amount / 2).to_string(),
        other_amount_threshold: (amount / 2).to_string(),
        swap_mode: "ExactIn".to_string(),
        slippage_bps: 50,
        platform_fee: None,
        price_impact_pct: "0".to_string(),
        route_plan: vec![RoutePlanStep {
            swap_info: SwapInfo {
                amm_key: Pubkey::new_unique().to_string(),
                label: Some("Mock".to_string()),
                input_mint: input_mint.to_string(),
                output_mint: output_mint.to_string(),
                in_amount: amount.to_string(),
                out_amount: (amount / 2).to_string(),
                fee_amount: None,
                fee_mint: None,
                extra: serde_json::Map::new(),
            },
            percent: 100,
            extra: serde_json::Map::new(),
        }],
        context_slot: Some(1),
        time_taken: None,
        extra: serde_json::Map::new(),
    }
}

/// Setup, swap and cleanup descriptors with no lookup tables
pub fn sample_swap_instructions() -> SwapInstructionsResponse {
    SwapInstructionsResponse {
        token_ledger_instruction: None,
        compute_budget_instructions: Vec::new(),
        setup_instructions: vec![encode_instruction(&sample_instruction(10))],
        swap_instruction: encode_instruction(&sample_instruction(11)),
        cleanup_instruction: Some(encode_instruction(&sample_instruction(12))),
        other_instructions: Vec::new(),
        address_lookup_table_addresses: Vec::new(),
        prioritization_fee_lamports: 0,
        compute_unit_limit: 250_000,
    }
}

/// Scripted [`QuoteProvider`]
///
/// Every quote is built with [`sample_quote`] for the requested pair and
/// every instruction set with [`sample_swap_instructions`].
pub struct MockQuoteProvider {
    failing_input_mints: Mutex<HashSet<Pubkey>>,
    empty_routes: AtomicBool,
    instructions_fail: AtomicBool,
    quote_calls: AtomicUsize,
    instruction_calls: AtomicUsize,
    amounts: Mutex<Vec<u64>>,
}

impl MockQuoteProvider {
    pub fn new() -> Self {
        Self {
            failing_input_mints: Mutex::new(HashSet::new()),
            empty_routes: AtomicBool::new(false),
            instructions_fail: AtomicBool::new(false),
            quote_calls: AtomicUsize::new(0),
            instruction_calls: AtomicUsize::new(0),
            amounts: Mutex::new(Vec::new()),
        }
    }

    /// Quotes for this input mint fail with an HTTP-style error
    pub fn fail_quotes_for(&self, input_mint: Pubkey) {
        self.failing_input_mints.lock().unwrap().insert(input_mint);
    }

    /// Quotes come back without a route plan
    pub fn return_empty_routes(&self) {
        self.empty_routes.store(true, Ordering::SeqCst);
    }

    pub fn fail_instructions(&self) {
        self.instructions_fail.store(true, Ordering::SeqCst);
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn instruction_calls(&self) -> usize {
        self.instruction_calls.load(Ordering::SeqCst)
    }

    /// Raw amounts requested so far
    pub fn requested_amounts(&self) -> Vec<u64> {
        self.amounts.lock().unwrap().clone()
    }
}

impl Default for MockQuoteProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteProvider for MockQuoteProvider {
    async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        _slippage_bps: u16,
    ) -> Result<QuoteResponse, TransactionBuilderError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        self.amounts.lock().unwrap().push(amount);

        if self.failing_input_mints.lock().unwrap().contains(input_mint) {
            return Err(TransactionBuilderError::Quote(
                "quote returned HTTP 400 Bad Request: no route".to_string(),
            ));
        }

        let mut quote = sample_quote(input_mint, output_mint, amount);
        if self.empty_routes.load(Ordering::SeqCst) {
            quote.route_plan.clear();
        }
        Ok(quote)
    }

    async fn get_swap_instructions(
        &self,
        _quote: &QuoteResponse,
        _payer: &Pubkey,
    ) -> Result<SwapInstructionsResponse, TransactionBuilderError> {
        self.instruction_calls.fetch_add(1, Ordering::SeqCst);
        if self.instructions_fail.load(Ordering::SeqCst) {
            return Err(TransactionBuilderError::Quote(
                "swap-instructions returned HTTP 500 Internal Server Error".to_string(),
            ));
        }
        Ok(sample_swap_instructions())
    }
}
