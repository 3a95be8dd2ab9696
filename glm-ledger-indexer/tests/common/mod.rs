//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use glm_ledger_indexer::config::IndexerConfig;
use glm_ledger_indexer::core::{
    Keyset, LedgerStore, NewTransaction, RawTransfer, SortBy, SortOrder, SourceError, Transaction,
    TransferSource, TxType,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const MASTER: &str = "0x00000000000000000000000000000000000000aa";
pub const STRANGER: &str = "0x00000000000000000000000000000000000000ff";

pub fn requester(n: u8) -> String {
    format!("0x{:040x}", 0xb000u32 + u32::from(n))
}

pub fn provider(n: u8) -> String {
    format!("0x{:040x}", 0xc000u32 + u32::from(n))
}

pub fn test_config() -> IndexerConfig {
    let mut config = IndexerConfig::default();
    config.chain.master_wallet = MASTER.to_string();
    config.source.api_key = "test-key".to_string();
    config.sync.batch_size = 2;
    config
}

pub fn transfer(hash: &str, from: &str, to: &str, block: u64, wei: &str) -> RawTransfer {
    RawTransfer {
        tx_hash: hash.to_string(),
        block_number: block,
        block_timestamp: 1_700_000_000 + (block as i64) * 2,
        from_address: from.to_string(),
        to_address: to.to_string(),
        value_wei: wei.to_string(),
        gas_used: Some(52_000),
        gas_price_wei: Some("30000000000".to_string()),
    }
}

/// In-process explorer replaying a fixed chain of transfers
pub struct ScriptedSource {
    chain: Mutex<Vec<RawTransfer>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, u64)>>,
    lookback_block: u64,
    fail_lookback: AtomicBool,
}

impl ScriptedSource {
    pub fn new(lookback_block: u64, chain: Vec<RawTransfer>) -> Self {
        Self {
            chain: Mutex::new(chain),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            lookback_block,
            fail_lookback: AtomicBool::new(false),
        }
    }

    pub fn push(&self, transfer: RawTransfer) {
        self.chain.lock().unwrap().push(transfer);
    }

    pub fn fail_wallet(&self, wallet: &str) {
        self.failing.lock().unwrap().insert(wallet.to_string());
    }

    pub fn recover_wallet(&self, wallet: &str) {
        self.failing.lock().unwrap().remove(wallet);
    }

    /// Rewrite a transfer already on the scripted chain
    pub fn fix_transfer(&self, hash: &str, fix: impl Fn(&mut RawTransfer)) {
        for transfer in self.chain.lock().unwrap().iter_mut() {
            if transfer.tx_hash == hash {
                fix(transfer);
            }
        }
    }

    pub fn fail_lookback(&self, fail: bool) {
        self.fail_lookback.store(fail, Ordering::SeqCst);
    }

    /// `(wallet, start_block)` of every fetch so far
    pub fn calls(&self) -> Vec<(String, u64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl TransferSource for ScriptedSource {
    async fn fetch_transfers(
        &self,
        wallet: &str,
        start_block: u64,
    ) -> Result<Vec<RawTransfer>, SourceError> {
        self.calls
            .lock()
            .unwrap()
            .push((wallet.to_string(), start_block));

        if self.failing.lock().unwrap().contains(wallet) {
            return Err(SourceError::Status(502));
        }

        let mut transfers: Vec<RawTransfer> = self
            .chain
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.block_number >= start_block)
            .filter(|t| t.from_address == wallet || t.to_address == wallet)
            .cloned()
            .collect();
        transfers.sort_by_key(|t| t.block_number);
        Ok(transfers)
    }

    async fn block_at_or_before(&self, _unix_ts: i64) -> Result<u64, SourceError> {
        if self.fail_lookback.load(Ordering::SeqCst) {
            return Err(SourceError::Upstream("No closest block found".to_string()));
        }
        Ok(self.lookback_block)
    }
}

/// Ledger row with a timestamp `seconds` past a fixed epoch
pub fn ledger_row(hash: &str, seconds: i64, glm: u64, tx_type: TxType) -> NewTransaction {
    let wei = format!("{}000000000000000000", glm);
    NewTransaction {
        tx_hash: hash.to_string(),
        block_number: 1_000 + seconds,
        block_timestamp: Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap(),
        from_address: MASTER.to_string(),
        to_address: requester((seconds % 200) as u8),
        value_wei: wei,
        value_glm: glm as f64,
        gas_used: None,
        gas_price_wei: None,
        tx_type,
    }
}

/// Every ledger row in block order, read through the store contract
pub async fn ledger_rows(store: &dyn LedgerStore) -> anyhow::Result<Vec<Transaction>> {
    let keyset = Keyset {
        sort_by: SortBy::Block,
        order: SortOrder::Asc,
        after: None,
        tx_type: None,
    };
    Ok(store.fetch_keyset(&keyset, 10_000).await?)
}
