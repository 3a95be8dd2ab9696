//! Sync orchestrator
//!
//! One cycle runs the master phase and then the requester phase. Every wallet
//! is an independent unit of work: fetch from its watermark, write, then
//! advance the watermark. A failure is logged on the wallet's report and the
//! cycle moves on; the next cycle retries from the last durable watermark.

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::discovery::WalletDiscovery;
use super::writer::{IdempotentWriter, SyncPass};
use crate::config::IndexerConfig;
use crate::core::{IndexerResult, LedgerStore, TransferSource, WatermarkStore};

/// Outcome of one wallet's unit of work
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalletReport {
    pub wallet: String,
    pub start_block: u64,
    /// Transfers returned by the source, before classification
    pub fetched: usize,
    pub inserted: u64,
    /// Watermark after this cycle
    pub watermark: Option<u64>,
    pub error: Option<String>,
}

impl WalletReport {
    fn new(wallet: &str, start_block: u64, watermark: Option<u64>) -> Self {
        Self {
            wallet: wallet.to_string(),
            start_block,
            watermark,
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one full sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Start block for wallets without a watermark; `None` when it could
    /// not be resolved this cycle
    pub lookback_block: Option<u64>,
    pub master: WalletReport,
    pub requesters: Vec<WalletReport>,
    /// Requester wallets first paid by the master during this cycle
    pub discovered: Vec<String>,
    /// Set when the requester set could not be loaded
    pub requester_phase_error: Option<String>,
}

impl CycleReport {
    pub fn total_inserted(&self) -> u64 {
        self.master.inserted + self.requesters.iter().map(|r| r.inserted).sum::<u64>()
    }

    pub fn failed_wallets(&self) -> usize {
        std::iter::once(&self.master)
            .chain(self.requesters.iter())
            .filter(|r| !r.is_ok())
            .count()
    }
}

pub struct SyncOrchestrator {
    source: Arc<dyn TransferSource>,
    watermarks: Arc<dyn WatermarkStore>,
    writer: IdempotentWriter,
    discovery: WalletDiscovery,
    master_wallet: String,
    lookback: ChronoDuration,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn TransferSource>,
        ledger: Arc<dyn LedgerStore>,
        watermarks: Arc<dyn WatermarkStore>,
        config: &IndexerConfig,
    ) -> Self {
        let master_wallet = config.chain.master_wallet.clone();

        Self {
            source,
            watermarks,
            writer: IdempotentWriter::new(
                ledger.clone(),
                master_wallet.clone(),
                config.sync.batch_size,
                config.chain.token_decimals,
            ),
            discovery: WalletDiscovery::new(ledger, master_wallet.clone()),
            master_wallet,
            lookback: ChronoDuration::days(i64::from(config.sync.lookback_days)),
        }
    }

    pub fn master_wallet(&self) -> &str {
        &self.master_wallet
    }

    /// Run the master phase then the requester phase.
    ///
    /// Every failure is contained to the wallet that hit it. When the lookback
    /// block cannot be resolved only wallets without a watermark are skipped.
    pub async fn run_cycle(&self) -> IndexerResult<CycleReport> {
        let horizon = (Utc::now() - self.lookback).timestamp();
        let lookback_block = match self.source.block_at_or_before(horizon).await {
            Ok(block) => {
                debug!(lookback_block = block, horizon, "Resolved lookback block");
                Some(block)
            }
            Err(e) => {
                warn!(horizon, "Failed to resolve lookback block, new wallets wait a cycle: {}", e);
                None
            }
        };

        // Snapshot taken before the master phase: wallets it discovers are
        // picked up by the next cycle.
        let requesters = self.discovery.requester_wallets().await;

        let mut report = CycleReport {
            lookback_block,
            ..CycleReport::default()
        };

        // Master phase
        let master_mark = self.watermarks.get(&self.master_wallet).await;
        let (master_report, recipients) = match master_mark {
            Ok(mark) => {
                self.sync_wallet(SyncPass::Master, &self.master_wallet, mark, lookback_block)
                    .await
            }
            Err(e) => {
                error!(wallet = %self.master_wallet, "Failed to read watermark: {}", e);
                (failed(&self.master_wallet, None, e), BTreeSet::new())
            }
        };
        report.master = master_report;

        let known: BTreeSet<String> = match &requesters {
            Ok(wallets) => wallets.iter().cloned().collect(),
            Err(_) => BTreeSet::new(),
        };
        report.discovered = WalletDiscovery::newly_discovered(&known, &recipients);
        report.discovered.retain(|w| *w != self.master_wallet);

        if !report.discovered.is_empty() {
            info!(count = report.discovered.len(), wallets = ?report.discovered, "Discovered requester wallets");
        }

        // Requester phase
        let wallets = match requesters {
            Ok(wallets) => wallets,
            Err(e) => {
                error!("Failed to load requester wallets: {}", e);
                report.requester_phase_error = Some(e.to_string());
                return Ok(report);
            }
        };

        let marks = match self.watermarks.get_many(&wallets).await {
            Ok(marks) => marks,
            Err(e) => {
                error!("Failed to load requester watermarks: {}", e);
                report.requester_phase_error = Some(e.to_string());
                return Ok(report);
            }
        };

        report.requesters = self.sync_requesters(&wallets, &marks, lookback_block).await;

        Ok(report)
    }

    async fn sync_requesters(
        &self,
        wallets: &[String],
        marks: &HashMap<String, u64>,
        lookback_block: Option<u64>,
    ) -> Vec<WalletReport> {
        let mut reports = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            let mark = marks.get(wallet).copied();
            let (wallet_report, _) = self
                .sync_wallet(SyncPass::Requester(wallet), wallet, mark, lookback_block)
                .await;
            reports.push(wallet_report);
        }
        reports
    }

    /// One wallet's fetch, write and watermark advance
    async fn sync_wallet(
        &self,
        pass: SyncPass<'_>,
        wallet: &str,
        watermark: Option<u64>,
        lookback_block: Option<u64>,
    ) -> (WalletReport, BTreeSet<String>) {
        let Some(start_block) = watermark.or(lookback_block) else {
            warn!(wallet, "Skipping wallet this cycle, no watermark and no lookback block");
            return (
                failed(wallet, None, "lookback block unavailable"),
                BTreeSet::new(),
            );
        };
        let mut report = WalletReport::new(wallet, start_block, watermark);

        let transfers = match self.source.fetch_transfers(wallet, start_block).await {
            Ok(transfers) => transfers,
            Err(e) => {
                warn!(wallet, start_block, "Skipping wallet this cycle, fetch failed: {}", e);
                report.error = Some(e.to_string());
                return (report, BTreeSet::new());
            }
        };
        report.fetched = transfers.len();

        let Some(max_block) = transfers.iter().map(|t| t.block_number).max() else {
            debug!(wallet, start_block, "No transfers since watermark");
            return (report, BTreeSet::new());
        };

        let outcome = match self.writer.write(pass, &transfers).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(wallet, start_block, "Write failed, watermark left unchanged: {}", e);
                report.error = Some(e.to_string());
                return (report, BTreeSet::new());
            }
        };
        report.inserted = outcome.inserted;

        // Blocks that were fetched but filtered out still count as seen
        let next_mark = watermark.map_or(max_block, |mark| mark.max(max_block));
        if watermark != Some(next_mark) {
            if let Err(e) = self.watermarks.set(wallet, next_mark).await {
                error!(wallet, watermark = next_mark, "Failed to advance watermark: {}", e);
                report.error = Some(e.to_string());
                return (report, outcome.recipients);
            }
        }
        report.watermark = Some(next_mark);

        info!(
            wallet,
            start_block,
            fetched = report.fetched,
            inserted = report.inserted,
            duplicates = outcome.duplicates,
            watermark = next_mark,
            "Wallet synced"
        );

        (report, outcome.recipients)
    }
}

fn failed(wallet: &str, watermark: Option<u64>, err: impl std::fmt::Display) -> WalletReport {
    WalletReport {
        error: Some(err.to_string()),
        ..WalletReport::new(wallet, watermark.unwrap_or_default(), watermark)
    }
}
