//! Wallet management module

use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;
use zeroize::Zeroize;

const KEYPAIR_LEN: usize = 64;

/// Holds the payer keypair; cloning shares the same key
#[derive(Clone)]
pub struct WalletManager {
    keypair: Arc<Keypair>,
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("pubkey", &self.pubkey())
            .finish()
    }
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != KEYPAIR_LEN {
        anyhow::bail!(
            "Invalid keypair length: expected {} bytes, got {}",
            KEYPAIR_LEN,
            bytes.len()
        );
    }
    if bytes.iter().all(|&b| b == 0) {
        anyhow::bail!("Invalid keypair: all-zero key rejected");
    }
    Keypair::try_from(bytes).context("Invalid keypair bytes")
}

impl WalletManager {
    /// Create a wallet from a base58-encoded 64-byte secret key
    pub fn from_base58_secret(secret: &str) -> Result<Self> {
        let mut bytes = bs58::decode(secret.trim())
            .into_vec()
            .context("Private key is not valid base58")?;
        let keypair = keypair_from_bytes(&bytes);
        bytes.zeroize();

        Ok(Self::from_keypair(keypair?))
    }

    /// Create a wallet from a keypair file (JSON byte array or raw 64 bytes)
    pub fn from_file(path: &str) -> Result<Self> {
        let mut raw = std::fs::read(path)
            .with_context(|| format!("Failed to read keypair file: {}", path))?;

        let keypair = if raw.len() == KEYPAIR_LEN {
            keypair_from_bytes(&raw)
        } else {
            let mut json: Vec<u8> =
                serde_json::from_slice(&raw).context("Failed to parse keypair JSON")?;
            let keypair = keypair_from_bytes(&json);
            json.zeroize();
            keypair
        };
        raw.zeroize();

        Ok(Self::from_keypair(keypair?))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}
