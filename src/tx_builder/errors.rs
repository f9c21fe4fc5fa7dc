//! Error types for the swap assembly pipeline
//!
//! One taxonomy covers every stage between the quoting service and the
//! bundle relay. Degraded-but-valid outcomes (a dropped lookup table, an
//! unknown compute estimate, a bundle status that is not yet visible) are
//! values, not errors, and never show up here.

use thiserror::Error;

/// Error type for all transaction assembly and bundle operations
#[derive(Error, Debug)]
pub enum TransactionBuilderError {
    /// Missing or invalid configuration
    ///
    /// Raised at startup for a missing RPC endpoint or signing key, and for
    /// swap requests that cannot be converted into raw amounts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The quoting service returned an instruction descriptor we cannot decode
    ///
    /// Contains the offending field and the parse failure. Never retried:
    /// malformed collaborator output is a contract violation.
    #[error("Instruction decode error (field={field}): {reason}")]
    InstructionDecode {
        /// The descriptor field that failed to parse
        field: String,
        /// Detailed reason for the failure
        reason: String,
    },

    /// Quote or swap-instruction fetch failed
    #[error("Quote error: {0}")]
    Quote(String),

    /// RPC client error
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Failed to fetch a recent blockhash
    #[error("Blockhash error: {0}")]
    Blockhash(String),

    /// Simulation reported that an account would be left below rent exemption
    #[error("Insufficient funds for rent")]
    InsufficientFundsForRent,

    /// Compute-budget prefix missing, misplaced, or duplicated
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Versioned message compilation failed (e.g. unresolvable account reference)
    #[error("Message compile error: {0}")]
    MessageCompile(String),

    /// Failed to sign a transaction
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The relay published no tip accounts, so no bundle can be built
    #[error("Relay returned no tip accounts")]
    EmptyTipAccounts,

    /// Relay rejected a request; the message is the relay's own text
    #[error("Relay error: {0}")]
    Relay(String),

    /// Wire encoding of a transaction failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TransactionBuilderError {
    /// Check if this error is potentially retryable
    ///
    /// Retrying here means rebuilding from a fresh blockhash, never resending
    /// an already signed artifact.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rpc(_) => true,
            Self::Blockhash(_) => true,
            Self::Quote(_) => true,

            Self::Configuration(_) => false,
            Self::InstructionDecode { .. } => false,
            Self::InsufficientFundsForRent => false,
            Self::InvalidInstructionOrder(_) => false,
            Self::MessageCompile(_) => false,
            Self::Signing(_) => false,
            Self::EmptyTipAccounts => false,
            Self::Relay(_) => false,
            Self::Serialization(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config",
            Self::InstructionDecode { .. } => "decode",
            Self::Quote(_) => "quote",
            Self::Rpc(_) => "rpc",
            Self::Blockhash(_) => "blockhash",
            Self::InsufficientFundsForRent => "rent",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::MessageCompile(_) => "compile",
            Self::Signing(_) => "signing",
            Self::EmptyTipAccounts => "tip",
            Self::Relay(_) => "relay",
            Self::Serialization(_) => "serialization",
        }
    }
}

// Convenience constructors for common error scenarios
impl TransactionBuilderError {
    /// Create a decode error for a specific descriptor field
    pub fn decode_failed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstructionDecode {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a blockhash error
    pub fn blockhash_unavailable(reason: impl Into<String>) -> Self {
        Self::Blockhash(reason.into())
    }

    /// Create an invalid instruction order error
    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    /// Create a relay error carrying the relay's message verbatim
    pub fn relay(message: impl Into<String>) -> Self {
        Self::Relay(message.into())
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }
}
