//! Swap transaction assembly and bundling
//!
//! The pipeline is split into focused modules:
//! - **errors**: error taxonomy shared by every stage
//! - **instructions**: descriptor decoding and compute-budget planning
//! - **lookup**: address lookup table resolution
//! - **simulate**: compute-unit estimation with fixed-interval retries
//! - **builder**: v0 message compilation and signing
//! - **output**: the signed transaction
//! - **bundle**: tip transaction, `[tip, payload]` bundles, relay status
//!
//! ## Instruction layout
//!
//! Every payload transaction starts with `set_compute_unit_limit` followed by
//! `set_compute_unit_price`, then the swap instructions in the order the
//! quoting service gave them (setup, swap, cleanup).
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use swap_bundler::tx_builder::{
//!     BuildRequest, ComputeEstimate, PriorityFee, TransactionBuilder, TransactionBuilderError,
//! };
//! # use solana_sdk::{hash::Hash, instruction::Instruction, signature::{Keypair, Signer}};
//!
//! # fn example(payer: Keypair, ixs: Vec<Instruction>, blockhash: Hash) -> Result<(), TransactionBuilderError> {
//! let draft = TransactionBuilder::new(1_400_000).build(BuildRequest {
//!     instructions: ixs,
//!     payer: payer.pubkey(),
//!     lookup_tables: &[],
//!     blockhash,
//!     compute_estimate: ComputeEstimate::Units(120_000),
//!     compute_unit_hint: None,
//!     priority_fee: PriorityFee::new(0),
//! })?;
//! let signed = draft.sign(&payer)?;
//! println!("{}", signed.signature());
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub use errors::TransactionBuilderError;

mod builder;
mod bundle;
mod instructions;
mod lookup;
mod output;
mod simulate;

pub use builder::{BuildRequest, TransactionBuilder, TransactionDraft};
pub use bundle::{Bundle, BundleAssembler, BundleConfig, BundleLookup, BundleState, BundleStatus};
pub use instructions::{
    decode_instruction, decode_swap_instructions, encode_instruction, plan_swap_instructions,
    sanity_check_ix_order, InstructionPlan, PriorityFee, MAX_COMPUTE_UNIT_LIMIT,
};
pub use lookup::{parse_lookup_table_addresses, resolve_lookup_tables};
pub use output::SignedTransaction;
pub use simulate::{apply_margin, ComputeEstimate, ComputeSimulator, SimulationConfig};
