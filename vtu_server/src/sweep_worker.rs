//! The background reconciliation sweep.
//!
//! A single task per process that periodically chases stale pending transactions through
//! [`ReconcileApi::sweep`]. The sweep is idempotent and race-safe against webhooks and inline status checks, so
//! running it aggressively costs only upstream query volume.
use std::time::Duration;

use log::*;
use tokio::task::JoinHandle;
use vtu_engine::{ReconcileApi, SqliteDatabase};

use crate::config::ServerConfig;

pub fn start_sweep_worker(api: ReconcileApi<SqliteDatabase>, config: &ServerConfig) -> JoinHandle<()> {
    let interval_secs = config.sweep_interval_secs.max(1);
    let staleness = config.sweep_staleness;
    let abandon_window = config.funding_abandon_window;
    let batch = config.sweep_batch as i64;
    info!("🕰️ Reconciliation sweep running every {interval_secs}s (staleness {staleness}, batch {batch})");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            trace!("🕰️ Reconciliation sweep starting");
            match api.sweep(staleness, abandon_window, batch).await {
                Ok(report) => {
                    if report.processed() > 0 || report.errors > 0 {
                        debug!("🕰️ Sweep processed {} transaction(s), {} error(s)", report.processed(), report.errors);
                    }
                },
                Err(e) => error!("🕰️ Reconciliation sweep failed outright: {e}"),
            }
        }
    })
}
