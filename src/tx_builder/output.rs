//! Signed transaction output
//!
//! The only way to get a [`SignedTransaction`] is `TransactionDraft::sign`.
//! It exposes read access to the transaction and its wire encoding, never a
//! mutable handle.

use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::instructions::PriorityFee;
use solana_sdk::{signature::Signature, transaction::VersionedTransaction};

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    tx: VersionedTransaction,
    compute_unit_limit: u32,
    priority_fee: PriorityFee,
}

impl SignedTransaction {
    pub(crate) fn new(
        tx: VersionedTransaction,
        compute_unit_limit: u32,
        priority_fee: PriorityFee,
    ) -> Self {
        Self {
            tx,
            compute_unit_limit,
            priority_fee,
        }
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.tx
    }

    /// Fee payer signature, which is also the transaction id
    pub fn signature(&self) -> &Signature {
        &self.tx.signatures[0]
    }

    pub fn compute_unit_limit(&self) -> u32 {
        self.compute_unit_limit
    }

    pub fn priority_fee(&self) -> PriorityFee {
        self.priority_fee
    }

    /// Bincode wire encoding
    pub fn wire_bytes(&self) -> Result<Vec<u8>, TransactionBuilderError> {
        bincode::serialize(&self.tx)
            .map_err(|e| TransactionBuilderError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::signed_sample;
    use solana_sdk::signature::Signer;

    #[test]
    fn test_payer_is_sole_signer() {
        let (payer, signed) = signed_sample();
        let tx = signed.transaction();
        assert_eq!(tx.message.header().num_required_signatures, 1);
        assert_eq!(tx.message.static_account_keys()[0], payer.pubkey());
    }

    #[test]
    fn test_wire_bytes_decode_back() {
        let (_, signed) = signed_sample();
        let bytes = signed.wire_bytes().unwrap();
        let decoded: solana_sdk::transaction::VersionedTransaction =
            bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.signatures[0], *signed.signature());
    }
}
