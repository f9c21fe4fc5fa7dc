//! Wire and request types shared across the pipeline
//!
//! Everything the quoting service sends us is decoded into these structs at
//! the HTTP boundary. Nothing downstream sees a `serde_json::Value`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// One account reference inside an instruction descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccountDescriptor {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// Instruction as published by the quoting service
///
/// Addresses are base58 text and `data` is base64. Decoding into a
/// `solana_sdk::instruction::Instruction` happens in
/// [`crate::tx_builder::decode_instruction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InstructionDescriptor {
    pub program_id: String,
    pub accounts: Vec<AccountDescriptor>,
    pub data: String,
}

/// Platform fee attached to a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFee {
    pub amount: String,
    pub fee_bps: u16,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// AMM hop inside a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    pub amm_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: String,
    pub out_amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_mint: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanStep {
    pub swap_info: SwapInfo,
    pub percent: u8,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Quote returned by `GET /quote`
///
/// The same value is posted back to `/swap-instructions`, so fields we do
/// not model are kept in `extra`, at every nesting level, and serialized
/// back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub input_mint: String,
    pub in_amount: String,
    pub output_mint: String,
    pub out_amount: String,
    pub other_amount_threshold: String,
    pub swap_mode: String,
    pub slippage_bps: u16,
    #[serde(default)]
    pub platform_fee: Option<PlatformFee>,
    pub price_impact_pct: String,
    #[serde(default)]
    pub route_plan: Vec<RoutePlanStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_slot: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl QuoteResponse {
    /// A quote without hops cannot be executed
    pub fn has_route(&self) -> bool {
        !self.route_plan.is_empty()
    }
}

/// Response of `POST /swap-instructions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInstructionsResponse {
    #[serde(default)]
    pub token_ledger_instruction: Option<InstructionDescriptor>,
    #[serde(default)]
    pub compute_budget_instructions: Vec<InstructionDescriptor>,
    #[serde(default)]
    pub setup_instructions: Vec<InstructionDescriptor>,
    pub swap_instruction: InstructionDescriptor,
    #[serde(default)]
    pub cleanup_instruction: Option<InstructionDescriptor>,
    #[serde(default)]
    pub other_instructions: Vec<InstructionDescriptor>,
    #[serde(default)]
    pub address_lookup_table_addresses: Vec<String>,
    #[serde(default)]
    pub prioritization_fee_lamports: u64,
    #[serde(default)]
    pub compute_unit_limit: u32,
}

/// A single swap to execute, amount in UI units of the input mint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SwapRequest {
    #[serde(with = "pubkey_str")]
    pub input_mint: Pubkey,
    #[serde(with = "pubkey_str")]
    pub output_mint: Pubkey,
    pub amount: f64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
}

fn default_slippage_bps() -> u16 {
    50
}

impl SwapRequest {
    pub fn new(input_mint: Pubkey, output_mint: Pubkey, amount: f64, slippage_bps: u16) -> Self {
        Self {
            input_mint,
            output_mint,
            amount,
            slippage_bps,
        }
    }
}

/// Batch file layout: `[[swap]]` tables
#[derive(Debug, Clone, Deserialize)]
pub struct SwapBatchFile {
    #[serde(rename = "swap", default)]
    pub swaps: Vec<SwapRequest>,
}

/// Base58 text form for pubkeys in config and batch files
pub mod pubkey_str {
    use super::*;

    pub fn serialize<S: Serializer>(key: &Pubkey, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Pubkey, D::Error> {
        let raw = String::deserialize(d)?;
        Pubkey::from_str(&raw).map_err(serde::de::Error::custom)
    }
}
