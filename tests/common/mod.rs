//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::hex;
use alloy::primitives::keccak256;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use cresca_wallet::config::{RpcConfig, WalletConfig};
use cresca_wallet::storage::{EncryptedFileStore, LocalStore};
use cresca_wallet::WalletService;

/// Well-known development key (address 0xf39F...2266).
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

pub const TESTNET_CHAIN_ID: u64 = 10143;
pub const MAINNET_CHAIN_ID: u64 = 10141;
pub const INITIAL_BLOCK: u64 = 100;
pub const ONE_GWEI: u128 = 1_000_000_000;
pub const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

/// Answer of a mock endpoint to one JSON-RPC request.
#[derive(Debug, Clone)]
pub enum MockReply {
    Result(Value),
    Error(i64, String),
    Status(u16),
    Stall(Duration),
}

/// A running mock endpoint.
pub struct MockBackend {
    pub url: String,
    methods: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Methods received so far, in arrival order.
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }

    pub fn total(&self) -> usize {
        self.methods.lock().unwrap().len()
    }
}

/// Start a JSON-RPC endpoint on a free local port; `handler` answers each call.
pub async fn start_rpc_backend<F>(handler: F) -> MockBackend
where
    F: Fn(&str, &Value) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);
    let methods = Arc::new(Mutex::new(Vec::new()));

    let seen = methods.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let handler = handler.clone();
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        serve(socket, handler.as_ref(), &seen).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend {
        url: format!("http://{}", addr),
        methods,
    }
}

/// Start an endpoint backed by a simulated chain.
pub async fn start_chain_backend(chain: Arc<ChainSim>) -> MockBackend {
    start_rpc_backend(move |method, params| chain.handle(method, params)).await
}

/// URL of a local port nothing listens on.
pub async fn unused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn serve<F>(mut socket: TcpStream, handler: &F, seen: &Mutex<Vec<String>>)
where
    F: Fn(&str, &Value) -> MockReply,
{
    let Some(body) = read_request(&mut socket).await else {
        return;
    };
    let Ok(request) = serde_json::from_slice::<Value>(&body) else {
        write_response(&mut socket, 400, "").await;
        return;
    };

    let method = request["method"].as_str().unwrap_or_default().to_string();
    seen.lock().unwrap().push(method.clone());
    let id = request["id"].clone();

    match handler(&method, &request["params"]) {
        MockReply::Result(result) => {
            let body = json!({ "jsonrpc": "2.0", "id": id, "result": result });
            write_response(&mut socket, 200, &body.to_string()).await;
        }
        MockReply::Error(code, message) => {
            let body = json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": message },
            });
            write_response(&mut socket, 200, &body.to_string()).await;
        }
        MockReply::Status(status) => write_response(&mut socket, status, "").await,
        MockReply::Stall(duration) => tokio::time::sleep(duration).await,
    }
}

/// Read one HTTP/1.1 request and return its body.
async fn read_request(socket: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(buf[header_end..].to_vec())
}

async fn write_response(socket: &mut TcpStream, status: u16, body: &str) {
    let status_text = match status {
        200 => "200 OK",
        400 => "400 Bad Request",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Minimal EVM node: one account balance, instant mining, legacy receipts.
pub struct ChainSim {
    chain_id: u64,
    balance: Mutex<u128>,
    gas_price: AtomicU64,
    block: AtomicU64,
    nonce: AtomicU64,
    revert: AtomicBool,
    mined: Mutex<Vec<(String, u64)>>,
    raw: Mutex<Vec<Vec<u8>>>,
}

impl ChainSim {
    pub fn new(chain_id: u64, balance: u128) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            balance: Mutex::new(balance),
            gas_price: AtomicU64::new(ONE_GWEI as u64),
            block: AtomicU64::new(INITIAL_BLOCK),
            nonce: AtomicU64::new(0),
            revert: AtomicBool::new(false),
            mined: Mutex::new(Vec::new()),
            raw: Mutex::new(Vec::new()),
        })
    }

    pub fn set_gas_price(&self, wei: u64) {
        self.gas_price.store(wei, Ordering::SeqCst);
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }

    /// Make every following transaction fail on-chain.
    pub fn revert_transactions(&self) {
        self.revert.store(true, Ordering::SeqCst);
    }

    /// Hashes of the transactions mined so far.
    pub fn mined(&self) -> Vec<String> {
        self.mined.lock().unwrap().iter().map(|(h, _)| h.clone()).collect()
    }

    /// Raw signed transactions received so far.
    pub fn raw_transactions(&self) -> Vec<Vec<u8>> {
        self.raw.lock().unwrap().clone()
    }

    pub fn block(&self) -> u64 {
        self.block.load(Ordering::SeqCst)
    }

    pub fn handle(&self, method: &str, params: &Value) -> MockReply {
        match method {
            "eth_chainId" => quantity(self.chain_id as u128),
            "eth_blockNumber" => quantity(self.block() as u128),
            "eth_getBalance" => quantity(*self.balance.lock().unwrap()),
            "eth_getTransactionCount" => quantity(self.nonce.load(Ordering::SeqCst) as u128),
            "eth_gasPrice" => quantity(self.gas_price.load(Ordering::SeqCst) as u128),
            "eth_estimateGas" => quantity(21_000),
            "eth_call" => MockReply::Result(json!("0x")),
            "eth_getCode" => MockReply::Result(json!("0x6080604052")),
            "eth_sendRawTransaction" => self.mine(params),
            "eth_getTransactionReceipt" => self.receipt(params),
            _ => MockReply::Error(-32601, format!("Method {} not found", method)),
        }
    }

    fn mine(&self, params: &Value) -> MockReply {
        let Some(raw) = params[0].as_str().and_then(|s| hex::decode(s).ok()) else {
            return MockReply::Error(-32602, "invalid raw transaction".to_string());
        };

        let hash = keccak256(&raw).to_string();
        let block = self.block.fetch_add(1, Ordering::SeqCst) + 1;
        self.nonce.fetch_add(1, Ordering::SeqCst);
        self.mined.lock().unwrap().push((hash.clone(), block));
        self.raw.lock().unwrap().push(raw);

        MockReply::Result(json!(hash))
    }

    fn receipt(&self, params: &Value) -> MockReply {
        let requested = params[0].as_str().unwrap_or_default().to_lowercase();
        let mined = self.mined.lock().unwrap();
        let Some((hash, block)) = mined.iter().find(|(h, _)| *h == requested) else {
            return MockReply::Result(Value::Null);
        };

        let status = if self.revert.load(Ordering::SeqCst) { "0x0" } else { "0x1" };
        MockReply::Result(json!({
            "transactionHash": hash,
            "transactionIndex": "0x0",
            "blockHash": format!("0x{}", "11".repeat(32)),
            "blockNumber": format!("0x{:x}", block),
            "from": TEST_ADDRESS.to_lowercase(),
            "to": RECIPIENT.to_lowercase(),
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "effectiveGasPrice": format!("0x{:x}", self.gas_price.load(Ordering::SeqCst)),
            "contractAddress": null,
            "logs": [],
            "logsBloom": format!("0x{}", "0".repeat(512)),
            "status": status,
            "type": "0x0",
        }))
    }
}

fn quantity(value: u128) -> MockReply {
    MockReply::Result(json!(format!("0x{:x}", value)))
}

/// Config with fast retries pointing the testnet profile at `testnet_urls`.
pub fn test_config(testnet_urls: Vec<String>, mainnet_urls: Vec<String>) -> WalletConfig {
    let mut config = WalletConfig::default();
    config.network.testnet.rpc_urls = testnet_urls;
    config.network.mainnet.rpc_urls = mainnet_urls;
    config.rpc = RpcConfig {
        timeout_ms: 2_000,
        max_retries: 2,
        base_delay_ms: 1,
        delay_step_ms: 1,
        verify_timeout_ms: 1_000,
    };
    config.transactions.poll_interval_ms = 10;
    config.transactions.confirmation_timeout_secs = 5;
    config
}

/// Service over an encrypted key store and a local file under `dir`.
pub fn open_service(config: WalletConfig, dir: &Path) -> WalletService {
    let secrets = EncryptedFileStore::new(dir.join("keys"), "test-password").unwrap();
    let local = LocalStore::open(dir.join("local.json")).unwrap();
    WalletService::new(Arc::new(config), Arc::new(secrets), Arc::new(local)).unwrap()
}
