//! Address lookup table resolution
//!
//! Tables that cannot be fetched or deserialized are dropped with a warning.
//! A missing table only costs message size; it never blocks a swap.

use crate::rpc::ChainRpc;
use crate::tx_builder::errors::TransactionBuilderError;
use futures::future::join_all;
use solana_sdk::address_lookup_table::{state::AddressLookupTable, AddressLookupTableAccount};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, warn};

/// Parse table addresses published by the quoting service
pub fn parse_lookup_table_addresses(
    addresses: &[String],
) -> Result<Vec<Pubkey>, TransactionBuilderError> {
    addresses
        .iter()
        .map(|raw| {
            Pubkey::from_str(raw).map_err(|e| {
                TransactionBuilderError::decode_failed("addressLookupTableAddresses", e.to_string())
            })
        })
        .collect()
}

/// Fetch and deserialize every table concurrently
///
/// Duplicate addresses are fetched once. The result only contains tables
/// that resolved; its order is not significant.
pub async fn resolve_lookup_tables(
    rpc: &dyn ChainRpc,
    addresses: &[Pubkey],
) -> Vec<AddressLookupTableAccount> {
    let mut seen = HashSet::with_capacity(addresses.len());
    let unique: Vec<Pubkey> = addresses
        .iter()
        .copied()
        .filter(|key| seen.insert(*key))
        .collect();

    if unique.is_empty() {
        return Vec::new();
    }

    let fetches = unique.iter().map(|key| resolve_one(rpc, *key));
    let resolved: Vec<AddressLookupTableAccount> =
        join_all(fetches).await.into_iter().flatten().collect();

    debug!(
        requested = unique.len(),
        resolved = resolved.len(),
        "Resolved address lookup tables"
    );
    resolved
}

async fn resolve_one(rpc: &dyn ChainRpc, key: Pubkey) -> Option<AddressLookupTableAccount> {
    let data = match rpc.account_data(&key).await {
        Ok(Some(data)) => data,
        Ok(None) => {
            warn!(table = %key, "Lookup table account not found, skipping");
            return None;
        }
        Err(e) => {
            warn!(table = %key, error = %e, "Failed to fetch lookup table, skipping");
            return None;
        }
    };

    match AddressLookupTable::deserialize(&data) {
        Ok(table) => Some(AddressLookupTableAccount {
            key,
            addresses: table.addresses.to_vec(),
        }),
        Err(e) => {
            warn!(table = %key, error = %e, "Failed to deserialize lookup table, skipping");
            None
        }
    }
}
