//! Swap Bundler - Solana token swaps as Jito bundles
//!
//! Fetches routes and instructions from a quoting service, assembles one
//! versioned transaction with a compute budget, pairs it with a tip
//! transaction and submits both as a bundle to a block-engine relay.

pub mod config;
pub mod metrics;
pub mod observability;
pub mod quote;
pub mod relay;
pub mod rpc;
pub mod structured_logging;
pub mod swap_engine;
pub mod test_utils;
pub mod tx_builder;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
pub use swap_engine::{SwapEngine, SwapError, SwapOutcome, SwapStage};
pub use tx_builder::TransactionBuilderError;

#[cfg(test)]
mod tests {
    mod bundle_order_tests;
    mod codec_properties;
    mod instruction_ordering_tests;
    mod simulation_retry_tests;
    mod swap_engine_tests;
}
