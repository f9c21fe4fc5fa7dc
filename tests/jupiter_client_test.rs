//! Quoting service client against a mocked HTTP endpoint

use mockito::Matcher;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use swap_bundler::quote::{JupiterClient, QuoteProvider};
use swap_bundler::tx_builder::{decode_swap_instructions, TransactionBuilderError};

const SOL: &str = "So11111111111111111111111111111111111111112";
const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

fn quote_body() -> serde_json::Value {
    json!({
        "inputMint": SOL,
        "inAmount": "10000000000",
        "outputMint": USDC,
        "outAmount": "1423000000",
        "otherAmountThreshold": "1415885000",
        "swapMode": "ExactIn",
        "slippageBps": 50,
        "platformFee": null,
        "priceImpactPct": "0",
        "routePlan": [{
            "swapInfo": {
                "ammKey": "HcoJqG325TTifs6jyWvRJ9ET4pDu12Xrt2EQKZGFmuKX",
                "label": "Whirlpool",
                "inputMint": SOL,
                "outputMint": USDC,
                "inAmount": "10000000000",
                "outAmount": "1423000000",
                "feeAmount": "300000",
                "feeMint": SOL
            },
            "percent": 100
        }],
        "contextSlot": 299283763,
        "timeTaken": 0.01,
        "swapUsdValue": "1423.1"
    })
}

fn ix(program: &str, data: &str) -> serde_json::Value {
    json!({
        "programId": program,
        "accounts": [{
            "pubkey": "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM",
            "isSigner": true,
            "isWritable": true
        }],
        "data": data
    })
}

fn client(server: &mockito::ServerGuard) -> JupiterClient {
    JupiterClient::new(&server.url(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn quote_sends_query_and_decodes_route() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/quote")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("inputMint".into(), SOL.into()),
            Matcher::UrlEncoded("outputMint".into(), USDC.into()),
            Matcher::UrlEncoded("amount".into(), "10000000000".into()),
            Matcher::UrlEncoded("slippageBps".into(), "50".into()),
        ]))
        .with_body(quote_body().to_string())
        .create_async()
        .await;

    let quote = client(&server)
        .get_quote(
            &Pubkey::from_str(SOL).unwrap(),
            &Pubkey::from_str(USDC).unwrap(),
            10_000_000_000,
            50,
        )
        .await
        .unwrap();

    assert!(quote.has_route());
    assert_eq!(quote.route_plan[0].swap_info.label.as_deref(), Some("Whirlpool"));
    assert_eq!(quote.out_amount, "1423000000");
    assert_eq!(quote.extra.get("swapUsdValue"), Some(&json!("1423.1")));
    mock.assert_async().await;
}

#[tokio::test]
async fn quote_http_error_carries_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/quote")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"error":"Could not find any route","errorCode":"COULD_NOT_FIND_ANY_ROUTE"}"#)
        .create_async()
        .await;

    let err = client(&server)
        .get_quote(&Pubkey::new_unique(), &Pubkey::new_unique(), 1, 50)
        .await
        .unwrap_err();

    match err {
        TransactionBuilderError::Quote(msg) => {
            assert!(msg.contains("400"));
            assert!(msg.contains("COULD_NOT_FIND_ANY_ROUTE"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn swap_instructions_posts_quote_and_decodes() {
    let mut server = mockito::Server::new_async().await;
    let payer = Pubkey::new_unique();
    let mock = server
        .mock("POST", "/swap-instructions")
        .match_body(Matcher::PartialJson(json!({
            "userPublicKey": payer.to_string(),
            "wrapAndUnwrapSol": true,
            "quoteResponse": {"inputMint": SOL, "swapUsdValue": "1423.1"}
        })))
        .with_body(
            json!({
                "tokenLedgerInstruction": null,
                "computeBudgetInstructions": [ix("ComputeBudget111111111111111111111111111111", "AsBcFQA=")],
                "setupInstructions": [ix("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL", "AQ==")],
                "swapInstruction": ix("JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4", "5RfLl3rjrSoBAAAA"),
                "cleanupInstruction": ix("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA", "CQ=="),
                "otherInstructions": [],
                "addressLookupTableAddresses": ["GxS6FiQ3mNnAar9HGQ6mxP7t6FcwmHkU7peSeQDUHmpN"],
                "prioritizationFeeLamports": 0,
                "computeUnitLimit": 1400000
            })
            .to_string(),
        )
        .create_async()
        .await;

    let quote: swap_bundler::types::QuoteResponse =
        serde_json::from_value(quote_body()).unwrap();
    let response = client(&server)
        .get_swap_instructions(&quote, &payer)
        .await
        .unwrap();
    mock.assert_async().await;

    assert_eq!(response.address_lookup_table_addresses.len(), 1);
    assert_eq!(response.compute_unit_limit, 1_400_000);

    let decoded = decode_swap_instructions(&response).unwrap();
    assert_eq!(decoded.len(), 3);
    assert_eq!(
        decoded[1].program_id.to_string(),
        "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4"
    );
    assert_eq!(decoded[2].data, vec![9]);
}

#[tokio::test]
async fn malformed_swap_instructions_rejected_at_boundary() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/swap-instructions")
        .with_body(json!({"swapInstruction": {"programId": 42}}).to_string())
        .create_async()
        .await;

    let quote: swap_bundler::types::QuoteResponse =
        serde_json::from_value(quote_body()).unwrap();
    let err = client(&server)
        .get_swap_instructions(&quote, &Pubkey::new_unique())
        .await
        .unwrap_err();

    match err {
        TransactionBuilderError::Quote(msg) => assert!(msg.contains("malformed")),
        other => panic!("unexpected error: {other:?}"),
    }
}
