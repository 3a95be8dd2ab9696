//! Embedded in-process store
//!
//! Implements the same ledger and watermark contracts as the PostgreSQL store,
//! including conflict-ignore on `tx_hash` and composite keyset ordering. Used
//! for dry runs and by the sync and pagination test suites.

use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;

use crate::core::{
    Boundary, IndexerResult, Keyset, LedgerStore, NewTransaction, SortBy, SortKey, SortOrder,
    Transaction, TxType, WatermarkStore,
};

#[derive(Default)]
struct MemoryState {
    /// Insertion-ordered ledger
    rows: Vec<Transaction>,
    hashes: HashSet<String>,
    watermarks: HashMap<String, u64>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare_keys(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        (SortKey::Time(a), SortKey::Time(b)) => a.cmp(b),
        (SortKey::Value(a), SortKey::Value(b)) => a.total_cmp(b),
        (SortKey::Block(a), SortKey::Block(b)) => a.cmp(b),
        // Keys of different columns never meet inside one scan
        _ => Ordering::Equal,
    }
}

/// Ascending composite order of a row relative to a boundary
fn compare_to_boundary(sort_by: SortBy, tx: &Transaction, boundary: &Boundary) -> Ordering {
    compare_keys(&SortKey::of(sort_by, tx), &boundary.key)
        .then_with(|| tx.tx_hash.cmp(&boundary.tx_hash))
}

fn matches_keyset(keyset: &Keyset, tx: &Transaction) -> bool {
    if let Some(tx_type) = keyset.tx_type {
        if tx.tx_type != tx_type {
            return false;
        }
    }

    match &keyset.after {
        None => true,
        Some(after) => {
            let ordering = compare_to_boundary(keyset.sort_by, tx, after);
            match keyset.order {
                SortOrder::Asc => ordering == Ordering::Greater,
                SortOrder::Desc => ordering == Ordering::Less,
            }
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn existing_hashes(&self, hashes: &[String]) -> IndexerResult<HashSet<String>> {
        let state = self.state.read().await;
        Ok(hashes
            .iter()
            .filter(|h| state.hashes.contains(*h))
            .cloned()
            .collect())
    }

    async fn insert_batch(&self, rows: &[NewTransaction]) -> IndexerResult<u64> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut inserted = 0;

        for row in rows {
            if state.hashes.insert(row.tx_hash.clone()) {
                state.rows.push(Transaction::from_new(row.clone(), now));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn requester_wallets(&self) -> IndexerResult<Vec<String>> {
        let state = self.state.read().await;
        let wallets: BTreeSet<String> = state
            .rows
            .iter()
            .filter(|tx| tx.tx_type == TxType::MasterToRequester)
            .map(|tx| tx.to_address.clone())
            .collect();
        Ok(wallets.into_iter().collect())
    }

    async fn fetch_keyset(&self, keyset: &Keyset, limit: i64) -> IndexerResult<Vec<Transaction>> {
        let state = self.state.read().await;
        let mut rows: Vec<Transaction> = state
            .rows
            .iter()
            .filter(|tx| matches_keyset(keyset, tx))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ordering = compare_keys(&SortKey::of(keyset.sort_by, a), &SortKey::of(keyset.sort_by, b))
                .then_with(|| a.tx_hash.cmp(&b.tx_hash));
            match keyset.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn exists_beyond(&self, keyset: &Keyset) -> IndexerResult<bool> {
        let state = self.state.read().await;
        Ok(state.rows.iter().any(|tx| matches_keyset(keyset, tx)))
    }

    async fn count(&self, tx_type: Option<TxType>) -> IndexerResult<u64> {
        let state = self.state.read().await;
        let count = match tx_type {
            Some(tx_type) => state.rows.iter().filter(|tx| tx.tx_type == tx_type).count(),
            None => state.rows.len(),
        };
        Ok(count as u64)
    }

    async fn health_check(&self) -> IndexerResult<()> {
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    async fn get(&self, wallet: &str) -> IndexerResult<Option<u64>> {
        Ok(self.state.read().await.watermarks.get(wallet).copied())
    }

    async fn set(&self, wallet: &str, block: u64) -> IndexerResult<()> {
        self.state
            .write()
            .await
            .watermarks
            .insert(wallet.to_string(), block);
        Ok(())
    }

    async fn get_many(&self, wallets: &[String]) -> IndexerResult<HashMap<String, u64>> {
        let state = self.state.read().await;
        Ok(wallets
            .iter()
            .filter_map(|w| state.watermarks.get(w).map(|b| (w.clone(), *b)))
            .collect())
    }
}
