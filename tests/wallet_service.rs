//! Wallet service flows against a simulated chain.

mod common;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{TxHash, U256};
use alloy::sol_types::SolCall;
use serde_json::json;

use common::{
    open_service, start_chain_backend, start_rpc_backend, test_config, unused_url, ChainSim,
    MockReply, INITIAL_BLOCK, MAINNET_CHAIN_ID, ONE_ETHER, ONE_GWEI, RECIPIENT, TESTNET_CHAIN_ID,
    TEST_ADDRESS, TEST_PRIVATE_KEY,
};
use cresca_wallet::blockchain::{
    parse_address, BlockchainError, ConfirmationStatus, NetworkKind, TxBuilder, Wallet,
};
use cresca_wallet::contracts::abi::ICrescaPayments;
use cresca_wallet::storage::TxKind;
use cresca_wallet::WalletService;

/// Wait until the published balance reaches `expected`.
async fn wait_for_balance(service: &WalletService, expected: &str) {
    tokio::time::timeout(Duration::from_secs(3), async {
        while service.state().balance() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_concurrent_initialization_creates_one_wallet() {
    let chain = ChainSim::new(TESTNET_CHAIN_ID, 0);
    let backend = start_chain_backend(chain).await;
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(open_service(
        test_config(vec![backend.url.clone()], vec![unused_url().await]),
        dir.path(),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move { service.initialize_wallet().await }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| o.is_new).count(), 1);
    let address = outcomes[0].address;
    assert!(outcomes.iter().all(|o| o.address == address));
    assert!(service.state().is_ready());
}

#[tokio::test]
async fn test_key_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let urls = vec![unused_url().await];

    let first = open_service(test_config(urls.clone(), urls.clone()), dir.path());
    let created = first.initialize_wallet().await.unwrap();
    assert!(created.is_new);
    drop(first);

    let second = open_service(test_config(urls.clone(), urls), dir.path());
    let loaded = second.initialize_wallet().await.unwrap();
    assert!(!loaded.is_new);
    assert_eq!(loaded.address, created.address);
}

#[tokio::test]
async fn test_balance_initializes_wallet() {
    let chain = ChainSim::new(TESTNET_CHAIN_ID, 3 * ONE_ETHER);
    let backend = start_chain_backend(chain).await;
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(
        test_config(vec![backend.url.clone()], vec![unused_url().await]),
        dir.path(),
    );

    assert!(!service.is_wallet_initialized());
    assert_eq!(service.refresh_balance().await.unwrap(), "3.0");
    assert!(service.is_wallet_initialized());
    assert_eq!(service.state().balance(), "3.0");
}

#[tokio::test]
async fn test_send_native_confirms_and_records() {
    let chain = ChainSim::new(TESTNET_CHAIN_ID, 10 * ONE_ETHER);
    chain.set_nonce(7);
    let backend = start_chain_backend(chain.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(
        test_config(vec![backend.url.clone()], vec![unused_url().await]),
        dir.path(),
    );
    let address = service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();
    assert_eq!(address, parse_address(TEST_ADDRESS).unwrap());

    let sent = service.send_native(RECIPIENT, "0.5").await.unwrap();

    assert_eq!(sent.nonce, 7);
    assert_eq!(sent.block_number, INITIAL_BLOCK + 1);
    assert_eq!(sent.gas_used, 21_000);
    // 21000 estimate plus the 25% buffer.
    assert_eq!(sent.gas_limit, 26_250);
    assert_eq!(sent.gas_price, ONE_GWEI);
    assert_eq!(chain.mined(), vec![sent.hash.to_string()]);

    let history = service.transaction_history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].hash, sent.hash.to_string());
    assert_eq!(history[0].kind, TxKind::Send);
    assert_eq!(history[0].amount, "0.5");
    assert_eq!(history[0].counterparty.as_deref(), Some(RECIPIENT));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_use_distinct_nonces() {
    let chain = ChainSim::new(TESTNET_CHAIN_ID, 10 * ONE_ETHER);
    let backend = start_chain_backend(chain.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(open_service(
        test_config(vec![backend.url.clone()], vec![unused_url().await]),
        dir.path(),
    ));
    service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.send_native(RECIPIENT, "0.1").await
        }));
    }

    let mut nonces = Vec::new();
    for handle in handles {
        nonces.push(handle.await.unwrap().unwrap().nonce);
    }
    nonces.sort_unstable();

    assert_eq!(nonces, vec![0, 1, 2, 3]);
    assert_eq!(chain.mined().len(), 4);
    assert_eq!(service.transaction_history().unwrap().len(), 4);
}

#[tokio::test]
async fn test_confirmation_status_tracks_depth() {
    let chain = ChainSim::new(TESTNET_CHAIN_ID, 10 * ONE_ETHER);
    let backend = start_chain_backend(chain.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(vec![backend.url.clone()], vec![unused_url().await]);
    let service = open_service(config.clone(), dir.path());
    service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();

    let sent = service.send_native(RECIPIENT, "0.5").await.unwrap();
    let builder = service.tx_builder().unwrap();
    assert_eq!(
        builder.confirmation_status(sent.hash).await.unwrap(),
        ConfirmationStatus::Confirmed {
            block_number: INITIAL_BLOCK + 1,
            gas_used: 21_000
        }
    );
    assert_eq!(
        builder.confirmation_status(TxHash::repeat_byte(0xab)).await.unwrap(),
        ConfirmationStatus::Pending
    );

    let mut deep = config.transactions.clone();
    deep.confirmations = 3;
    let deep = TxBuilder::new(service.client(), Wallet::random(TESTNET_CHAIN_ID), deep);
    assert_eq!(
        deep.confirmation_status(sent.hash).await.unwrap(),
        ConfirmationStatus::Confirming {
            current: 1,
            required: 3
        }
    );
}

#[tokio::test]
async fn test_insufficient_balance_is_rejected_before_signing() {
    let chain = ChainSim::new(TESTNET_CHAIN_ID, ONE_ETHER / 10);
    let backend = start_chain_backend(chain.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(
        test_config(vec![backend.url.clone()], vec![unused_url().await]),
        dir.path(),
    );
    service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();

    let result = service.send_native(RECIPIENT, "1").await;

    match result {
        Err(BlockchainError::InsufficientBalance { available, required }) => {
            assert_eq!(available, "0.1");
            assert_eq!(required, "1.0");
        }
        other => panic!("expected insufficient balance, got {:?}", other),
    }
    assert!(chain.raw_transactions().is_empty());
    assert!(service.transaction_history().unwrap().is_empty());
}

#[tokio::test]
async fn test_gas_spike_is_rejected() {
    let chain = ChainSim::new(TESTNET_CHAIN_ID, 10 * ONE_ETHER);
    chain.set_gas_price(600 * ONE_GWEI as u64);
    let backend = start_chain_backend(chain.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(
        test_config(vec![backend.url.clone()], vec![unused_url().await]),
        dir.path(),
    );
    service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();

    let result = service.send_native(RECIPIENT, "1").await;

    assert!(matches!(
        result,
        Err(BlockchainError::GasPriceTooHigh {
            current_gwei: 600,
            max_gwei: 500
        })
    ));
    assert!(chain.raw_transactions().is_empty());
}

#[tokio::test]
async fn test_reverted_receipt_is_an_error() {
    let chain = ChainSim::new(TESTNET_CHAIN_ID, 10 * ONE_ETHER);
    chain.revert_transactions();
    let backend = start_chain_backend(chain.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(
        test_config(vec![backend.url.clone()], vec![unused_url().await]),
        dir.path(),
    );
    service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();

    let result = service.send_native(RECIPIENT, "1").await;

    assert!(matches!(result, Err(BlockchainError::Reverted(_))));
    assert_eq!(chain.mined().len(), 1);
    assert!(service.transaction_history().unwrap().is_empty());
}

#[tokio::test]
async fn test_switch_network_persists_and_rebinds() {
    let testnet = start_chain_backend(ChainSim::new(TESTNET_CHAIN_ID, ONE_ETHER)).await;
    let mainnet = start_chain_backend(ChainSim::new(MAINNET_CHAIN_ID, 2 * ONE_ETHER)).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(vec![testnet.url.clone()], vec![mainnet.url.clone()]);

    let service = open_service(config.clone(), dir.path());
    service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();
    assert_eq!(service.current_network(), NetworkKind::Testnet);
    assert_eq!(service.get_balance().await.unwrap(), U256::from(ONE_ETHER));
    wait_for_balance(&service, "1.0").await;

    service.switch_network(NetworkKind::Mainnet).await.unwrap();

    let info = service.network_info();
    assert_eq!(info.kind, NetworkKind::Mainnet);
    assert_eq!(info.chain_id, MAINNET_CHAIN_ID);
    assert_eq!(info.rpc_url, mainnet.url);
    assert_eq!(service.get_balance().await.unwrap(), U256::from(2 * ONE_ETHER));
    assert_eq!(service.tx_builder().unwrap().address(), parse_address(TEST_ADDRESS).unwrap());

    // The new network is verified and its balance published in the background.
    wait_for_balance(&service, "2.0").await;
    assert!(mainnet.count("eth_chainId") >= 1);

    let reopened = open_service(config, dir.path());
    assert_eq!(reopened.current_network(), NetworkKind::Mainnet);
}

#[tokio::test]
async fn test_payment_contract_write_and_read() {
    let chain = ChainSim::new(TESTNET_CHAIN_ID, 10 * ONE_ETHER);
    let sim = chain.clone();
    let backend = start_rpc_backend(move |method, params| match method {
        // getPaymentCount -> (sent = 3, received = 5)
        "eth_call" => MockReply::Result(json!(format!("0x{:064x}{:064x}", 3, 5))),
        _ => sim.handle(method, params),
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(
        test_config(vec![backend.url.clone()], vec![unused_url().await]),
        dir.path(),
    );
    let me = service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();
    let payments = service.payments().unwrap();
    let to = parse_address(RECIPIENT).unwrap();

    let sent = payments
        .send_payment(to, U256::from(ONE_ETHER / 4), "  lunch  ")
        .await
        .unwrap();

    let raw = &chain.raw_transactions()[0];
    let selector = ICrescaPayments::sendPaymentCall::SELECTOR;
    assert!(raw.windows(4).any(|w| w == &selector[..]));

    let history = service.transaction_history().unwrap();
    assert_eq!(history[0].hash, sent.hash.to_string());
    assert_eq!(history[0].kind, TxKind::Payment);
    assert_eq!(history[0].amount, "0.25");

    let count = payments.payment_count(me).await.unwrap();
    assert_eq!((count.sent, count.received), (3, 5));
}

#[tokio::test]
async fn test_payment_validation_skips_rpc() {
    let chain = ChainSim::new(TESTNET_CHAIN_ID, 10 * ONE_ETHER);
    let backend = start_chain_backend(chain.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(
        test_config(vec![backend.url.clone()], vec![unused_url().await]),
        dir.path(),
    );
    service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();
    let payments = service.payments().unwrap();
    let to = parse_address(RECIPIENT).unwrap();

    assert!(matches!(
        payments.send_payment(to, U256::ZERO, "memo").await,
        Err(BlockchainError::InvalidAmount(_))
    ));
    assert!(matches!(
        payments.send_payment(to, U256::from(1u64), &"x".repeat(201)).await,
        Err(BlockchainError::Validation(_))
    ));
    assert!(matches!(
        payments.batch_send(&[to], &[]).await,
        Err(BlockchainError::Validation(_))
    ));

    assert!(chain.raw_transactions().is_empty());
}
