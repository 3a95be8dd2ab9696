//! Fixed-interval cycle driver

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::orchestrator::{CycleReport, SyncOrchestrator};

/// Run one cycle and log its summary
pub async fn run_once(orchestrator: &SyncOrchestrator) -> Option<CycleReport> {
    match orchestrator.run_cycle().await {
        Ok(report) => {
            info!(
                lookback_block = ?report.lookback_block,
                master_inserted = report.master.inserted,
                requesters = report.requesters.len(),
                discovered = report.discovered.len(),
                inserted = report.total_inserted(),
                failed_wallets = report.failed_wallets(),
                "Sync cycle complete"
            );
            Some(report)
        }
        Err(e) => {
            error!("Sync cycle aborted: {}", e);
            None
        }
    }
}

/// Run cycles every `interval` until `shutdown` resolves.
///
/// A cycle in progress always runs to completion; a late cycle delays the
/// following ticks instead of bunching them up.
pub async fn run_scheduler<F>(orchestrator: Arc<SyncOrchestrator>, interval: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        interval_secs = interval.as_secs(),
        master_wallet = orchestrator.master_wallet(),
        "Sync scheduler started"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Sync scheduler stopping");
                break;
            }
            _ = ticker.tick() => {
                run_once(&orchestrator).await;
            }
        }
    }
}
