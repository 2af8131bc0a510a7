//! Move network client and module calls against a mocked REST API.

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;

use cresca_wallet::config::MovementConfig;
use cresca_wallet::movement::{MovementClient, MovementError, MovementService};
use cresca_wallet::storage::{
    movement_key, LocalStore, MemorySecretStore, TransactionHistory, TxKind,
    KEY_TRANSACTION_HISTORY,
};

/// 32-byte Ed25519 seed used by every test account.
const SEED: &str = "0x9bf49a6a0755f953811fce125f2683d50429c3bb49e074147e0089a52eae155f";
const RECIPIENT: &str = "0x2";
const RECIPIENT_LONG: &str = "0x0000000000000000000000000000000000000000000000000000000000000002";

struct Harness {
    server: MockServer,
    service: MovementService,
    address: String,
}

async fn harness() -> Harness {
    let server = MockServer::start_async().await;
    let config = MovementConfig {
        rpc_url: server.url("/v1"),
        faucet_url: server.base_url(),
        confirmation_timeout_secs: 5,
        ..MovementConfig::default()
    };

    let local = Arc::new(LocalStore::in_memory());
    let client =
        MovementClient::new(config, Arc::new(MemorySecretStore::new()), local.clone()).unwrap();
    let address = client.import_wallet(SEED).await.unwrap();

    let history = TransactionHistory::new(local, movement_key(KEY_TRANSACTION_HISTORY), 50);
    let service = MovementService::new(Arc::new(client), history).unwrap();

    Harness {
        server,
        service,
        address,
    }
}

impl Harness {
    /// Mock the account lookup, the submission and the committed status.
    async fn mock_submission(&self, hash: &str, committed: serde_json::Value) {
        let account_path = format!("/v1/accounts/{}", self.address);
        let status_path = format!("/v1/transactions/by_hash/{}", hash);

        self.server
            .mock_async(|when, then| {
                when.method(GET).path(account_path);
                then.status(200).json_body(json!({
                    "sequence_number": "4",
                    "authentication_key": "0x00",
                }));
            })
            .await;
        self.server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/transactions")
                    .body_contains("ed25519_signature");
                then.status(202).json_body(json!({ "hash": hash }));
            })
            .await;
        self.server
            .mock_async(|when, then| {
                when.method(GET).path(status_path);
                then.status(200).json_body(committed);
            })
            .await;
    }
}

#[tokio::test]
async fn test_unknown_account_has_zero_balance() {
    let h = harness().await;
    h.server
        .mock_async(|when, then| {
            when.method(GET).path_contains("/resource/");
            then.status(404)
                .json_body(json!({ "message": "Resource not found", "error_code": "resource_not_found" }));
        })
        .await;

    assert_eq!(h.service.client().get_balance(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_balance_from_coin_store() {
    let h = harness().await;
    let resource_prefix = format!("/v1/accounts/{}/resource/", RECIPIENT_LONG);
    h.server
        .mock_async(|when, then| {
            when.method(GET).path_contains(resource_prefix);
            then.status(200).json_body(json!({
                "type": "0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>",
                "data": { "coin": { "value": "150000000" } },
            }));
        })
        .await;

    let balance = h.service.client().get_balance(Some(RECIPIENT)).await.unwrap();
    assert_eq!(balance, 150_000_000);
}

#[tokio::test]
async fn test_faucet_mints_one_coin() {
    let h = harness().await;
    let mint = h
        .server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/mint")
                .query_param("address", h.address.as_str())
                .query_param("amount", "100000000");
            then.status(200).json_body(json!(["0xabc"]));
        })
        .await;

    h.service.client().fund_from_faucet(None).await.unwrap();
    mint.assert_async().await;
}

#[tokio::test]
async fn test_send_payment_submits_and_records() {
    let h = harness().await;
    h.mock_submission(
        "0xfeed",
        json!({ "type": "user_transaction", "success": true, "vm_status": "Executed successfully" }),
    )
    .await;
    let encode = h
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/transactions/encode_submission")
                .json_body_partial(
                    json!({
                        "sequence_number": "4",
                        "payload": {
                            "type": "entry_function_payload",
                            "arguments": [RECIPIENT_LONG, "150000000", "0x6869"],
                        },
                    })
                    .to_string(),
                );
            then.status(200).json_body(json!("0x01"));
        })
        .await;

    let hash = h.service.send_payment(RECIPIENT, "1.5", " hi ").await.unwrap();

    assert_eq!(hash, "0xfeed");
    encode.assert_async().await;

    let history = h.service.transaction_history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TxKind::Payment);
    assert_eq!(history[0].amount, "1.50000000");
    assert_eq!(history[0].counterparty.as_deref(), Some(RECIPIENT_LONG));
}

#[tokio::test]
async fn test_failed_vm_status_is_an_error() {
    let h = harness().await;
    h.mock_submission(
        "0xdead",
        json!({
            "type": "user_transaction",
            "success": false,
            "vm_status": "Move abort in 0x1::coin: EINSUFFICIENT_BALANCE(0x10006)",
        }),
    )
    .await;
    h.server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/transactions/encode_submission");
            then.status(200).json_body(json!("0x01"));
        })
        .await;

    let result = h.service.tap_to_pay(RECIPIENT, "10").await;

    match result {
        Err(MovementError::TransactionFailed { hash, vm_status }) => {
            assert_eq!(hash, "0xdead");
            assert!(vm_status.contains("EINSUFFICIENT_BALANCE"));
        }
        other => panic!("expected failed transaction, got {:?}", other),
    }
    assert!(h.service.transaction_history().unwrap().is_empty());
}

#[tokio::test]
async fn test_api_error_message_is_surfaced() {
    let h = harness().await;
    let account_path = format!("/v1/accounts/{}", h.address);
    h.server
        .mock_async(|when, then| {
            when.method(GET).path(account_path);
            then.status(500).json_body(json!({ "message": "node overloaded" }));
        })
        .await;

    let result = h.service.close_position(3).await;

    assert!(matches!(
        result,
        Err(MovementError::Api { status: 500, message }) if message == "node overloaded"
    ));
}

#[tokio::test]
async fn test_payment_stats_from_view_functions() {
    let h = harness().await;
    h.server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/view")
                .body_contains("::payments::get_payment_count");
            then.status(200).json_body(json!(["3", "2"]));
        })
        .await;
    h.server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/view")
                .body_contains("::payments::get_total_volume");
            then.status(200).json_body(json!(["250000000", "100000000"]));
        })
        .await;
    h.server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/view")
                .body_contains("::payments::is_initialized");
            then.status(200).json_body(json!([true]));
        })
        .await;

    let stats = h.service.payment_stats(None).await.unwrap();
    assert_eq!(stats.sent_count, 3);
    assert_eq!(stats.received_count, 2);
    assert_eq!(stats.total_sent, "2.50000000");
    assert_eq!(stats.total_received, "1.00000000");

    assert!(h.service.is_payments_initialized(Some(RECIPIENT)).await.unwrap());
}
