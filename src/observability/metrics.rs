//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define wallet metrics (RPC calls, failovers, prices, transactions)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `wallet_rpc_requests_total` (counter): RPC calls by method, outcome
//! - `wallet_rpc_failovers_total` (counter): endpoint rotations
//! - `wallet_rpc_healthy` (gauge): 1=healthy, 0=unhealthy, by network
//! - `wallet_price_fetch_total` (counter): price lookups by source, outcome
//! - `wallet_price_cache_total` (counter): cache lookups by result
//! - `wallet_transactions_total` (counter): submitted transactions by kind, status

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_rpc_request(method: &'static str, outcome: &'static str) {
    counter!("wallet_rpc_requests_total", "method" => method, "outcome" => outcome).increment(1);
}

pub fn record_rpc_failover() {
    counter!("wallet_rpc_failovers_total").increment(1);
}

pub fn record_rpc_health(network: &str, healthy: bool) {
    gauge!("wallet_rpc_healthy", "network" => network.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_price_fetch(source: &'static str, outcome: &'static str) {
    counter!("wallet_price_fetch_total", "source" => source, "outcome" => outcome).increment(1);
}

pub fn record_price_cache(result: &'static str) {
    counter!("wallet_price_cache_total", "result" => result).increment(1);
}

pub fn record_transaction(kind: &'static str, status: &'static str) {
    counter!("wallet_transactions_total", "kind" => kind, "status" => status).increment(1);
}
