//! # Prometheus Metrics
//!
//! Exposes pool figures and operation counters. Scraped by Prometheus at
//! the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] under
//! the `restake` namespace. Amounts are in wei and exported as floats;
//! precision loss above 2^53 wei is acceptable for dashboards.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use restake_contracts::{ErrorClass, PoolStatus};
use restake_protocol::config::RATE_PRECISION;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly: prometheus handles are reference counted internally.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    pub share_supply: Gauge,
    /// Asset per share as a float (`rate / 1e18`).
    pub rate: Gauge,
    pub vault_balance: Gauge,
    pub claim_reserve: Gauge,
    pub queued_claims: Gauge,
    pub surplus: Gauge,
    pub total_ordered: Gauge,
    pub total_released: Gauge,
    pub open_orders: IntGauge,
    /// 1 while the pool is halted.
    pub halted: IntGauge,
    pub deposits_total: IntCounter,
    pub withdrawal_requests_total: IntCounter,
    pub claims_total: IntCounter,
    pub keeper_advances_total: IntCounter,
    /// Rejections, labelled by error class.
    pub rejected_operations_total: IntCounterVec,
    pub keeper_tick_seconds: Histogram,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let g = Gauge::new(name, help)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let g = IntGauge::new(name, help)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let c = IntCounter::new(name, help)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("restake".into()), None)?;

        let rejected_operations_total = IntCounterVec::new(
            Opts::new(
                "rejected_operations_total",
                "Operations rejected by the pool, by error class",
            ),
            &["class"],
        )?;
        registry.register(Box::new(rejected_operations_total.clone()))?;

        let keeper_tick_seconds = Histogram::with_opts(
            HistogramOpts::new("keeper_tick_seconds", "Duration of one keeper tick in seconds")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(keeper_tick_seconds.clone()))?;

        Ok(Self {
            share_supply: gauge(&registry, "share_supply", "Outstanding shares in wei")?,
            rate: gauge(&registry, "rate", "Base asset per share")?,
            vault_balance: gauge(&registry, "vault_balance", "Asset held by the vault in wei")?,
            claim_reserve: gauge(
                &registry,
                "claim_reserve",
                "Released, unclaimed withdrawal asset in wei",
            )?,
            queued_claims: gauge(
                &registry,
                "queued_claims",
                "Ordered, unreleased withdrawal asset in wei",
            )?,
            surplus: gauge(&registry, "surplus", "Asset available for restaking in wei")?,
            total_ordered: gauge(&registry, "total_ordered", "Cumulative asset ordered in wei")?,
            total_released: gauge(
                &registry,
                "total_released",
                "Cumulative asset released to the queue in wei",
            )?,
            open_orders: int_gauge(&registry, "open_orders", "Unclaimed withdrawal orders")?,
            halted: int_gauge(&registry, "halted", "1 if the pool is halted")?,
            deposits_total: counter(&registry, "deposits_total", "Accepted deposits")?,
            withdrawal_requests_total: counter(
                &registry,
                "withdrawal_requests_total",
                "Accepted withdrawal requests",
            )?,
            claims_total: counter(&registry, "claims_total", "Paid ticket claims")?,
            keeper_advances_total: counter(
                &registry,
                "keeper_advances_total",
                "Keeper ticks that released liquidity to the queue",
            )?,
            rejected_operations_total,
            keeper_tick_seconds,
            registry,
        })
    }

    /// Copies pool figures into the gauges.
    pub fn observe(&self, status: &PoolStatus) {
        self.share_supply.set(status.total_shares as f64);
        self.rate.set(status.rate as f64 / RATE_PRECISION as f64);
        self.vault_balance.set(status.vault_balance as f64);
        self.claim_reserve.set(status.claim_reserve as f64);
        self.queued_claims.set(status.queued_claims as f64);
        self.surplus.set(status.surplus as f64);
        self.total_ordered.set(status.total_ordered as f64);
        self.total_released.set(status.total_released as f64);
        self.open_orders
            .set(i64::try_from(status.open_orders).unwrap_or(i64::MAX));
        self.halted.set(i64::from(status.halted));
    }

    /// Counts one rejected operation.
    pub fn reject(&self, class: ErrorClass) {
        self.rejected_operations_total
            .with_label_values(&[&class.to_string()])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
