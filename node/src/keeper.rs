//! # Keeper
//!
//! Background task that, every tick, advances the withdrawal queue with
//! whatever vault liquidity is free, refreshes the gauges, and persists a
//! pool snapshot. Advancement is permissionless, so the keeper holds no
//! role.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use restake_contracts::PoolError;
use restake_protocol::storage::SnapshotStore;
use restake_protocol::types::Amount;

use crate::api::SharedPool;
use crate::metrics::NodeMetrics;

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeeperReport {
    /// Asset moved into the claim reserve.
    pub released: Amount,
    /// Sequence number of the snapshot written.
    pub snapshot_seq: u64,
    /// Old snapshots removed.
    pub pruned: usize,
}

/// Runs one keeper tick.
///
/// A halted pool is still snapshotted; the advance is skipped and the
/// halt is left for an admin.
pub async fn tick(
    pool: &SharedPool,
    store: &SnapshotStore,
    metrics: &NodeMetrics,
    keep: usize,
) -> Result<KeeperReport> {
    let _timer = metrics.keeper_tick_seconds.start_timer();

    let (released, snapshot) = {
        let mut pool = pool.write().await;
        let released = match pool.advance_queue() {
            Ok(released) => released,
            Err(PoolError::Halted) => {
                tracing::warn!("keeper skipped advance, pool halted");
                0
            }
            Err(e) => {
                metrics.reject(e.class());
                tracing::error!(error = %e, class = %e.class(), "keeper advance failed");
                0
            }
        };
        if released > 0 {
            metrics.keeper_advances_total.inc();
        }
        match pool.status() {
            Ok(status) => metrics.observe(&status),
            Err(e) => tracing::warn!(error = %e, "status unavailable in keeper"),
        }
        (released, pool.snapshot())
    };

    let snapshot_seq = store
        .put_snapshot(&snapshot)
        .context("failed to persist pool snapshot")?;
    let pruned = store.prune(keep).context("failed to prune snapshots")?;

    tracing::debug!(released, snapshot_seq, pruned, "keeper tick");
    Ok(KeeperReport {
        released,
        snapshot_seq,
        pruned,
    })
}

/// Ticks every `period` until the task is aborted.
pub async fn run(
    pool: SharedPool,
    store: Arc<SnapshotStore>,
    metrics: Arc<NodeMetrics>,
    period: Duration,
    keep: usize,
) {
    tracing::info!(period_secs = period.as_secs(), keep, "keeper started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(e) = tick(&pool, &store, &metrics, keep).await {
            tracing::error!("keeper tick failed: {:#}", e);
        }
    }
}
