//! Bundle layout: tip first, payload second, fresh tip every time

use crate::relay::BundleRelay;
use crate::test_utils::{signed_sample, MockRelay, MockRpc};
use crate::tx_builder::{BundleAssembler, BundleConfig};
use solana_sdk::{
    pubkey::Pubkey,
    signature::Signer,
    system_program,
    transaction::{Transaction, VersionedTransaction},
};
use std::sync::Arc;

fn decode_tip(encoded: &str) -> Transaction {
    bincode::deserialize(&bs58::decode(encoded).into_vec().unwrap()).unwrap()
}

#[tokio::test]
async fn submitted_bundle_is_tip_then_payload() {
    let tip_account = Pubkey::new_unique();
    let relay = Arc::new(MockRelay::with_tip_accounts(vec![tip_account.to_string()]));
    let asm = BundleAssembler::new(relay.clone(), Arc::new(MockRpc::new()), BundleConfig::default());
    let (payer, payload) = signed_sample();

    let bundle = asm.assemble(&payer, &payload).await.unwrap();
    asm.submit(&bundle).await.unwrap();

    let sent = relay.sent_bundles();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].len(), 2);

    let tip = decode_tip(&sent[0][0]);
    assert_eq!(tip.message.account_keys[0], payer.pubkey());
    assert!(tip.message.account_keys.contains(&system_program::id()));
    assert_eq!(tip.message.instructions.len(), 1);

    let payload_tx: VersionedTransaction =
        bincode::deserialize(&bs58::decode(&sent[0][1]).into_vec().unwrap()).unwrap();
    assert_eq!(payload_tx.signatures[0], *payload.signature());
    assert!(payload_tx.verify_with_results().iter().all(|ok| *ok));
}

#[tokio::test]
async fn every_bundle_gets_a_fresh_tip() {
    let relay = Arc::new(MockRelay::with_tip_accounts(vec![Pubkey::new_unique().to_string()]));
    let rpc = Arc::new(MockRpc::new());
    let asm = BundleAssembler::new(relay, rpc.clone(), BundleConfig::default());
    let (payer, payload) = signed_sample();

    let first = asm.assemble(&payer, &payload).await.unwrap();
    let second = asm.assemble(&payer, &payload).await.unwrap();

    assert_ne!(first.tip(), second.tip());
    assert_eq!(first.payload(), second.payload());
    assert_eq!(rpc.blockhash_fetches(), 2);

    let a = decode_tip(first.tip());
    let b = decode_tip(second.tip());
    assert_ne!(a.message.recent_blockhash, b.message.recent_blockhash);
}

#[tokio::test]
async fn tip_goes_to_a_published_account() {
    let published: Vec<Pubkey> = (0..8).map(|_| Pubkey::new_unique()).collect();
    let relay = Arc::new(MockRelay::with_tip_accounts(
        published.iter().map(|k| k.to_string()).collect(),
    ));
    let asm = BundleAssembler::new(relay.clone(), Arc::new(MockRpc::new()), BundleConfig::default());

    for _ in 0..16 {
        let chosen = asm.select_tip_account().await.unwrap();
        assert!(published.contains(&chosen));
    }
    assert_eq!(relay.tip_accounts().await.unwrap().len(), 8);
}
