//! Core trait abstractions (Ports in Hexagonal Architecture)

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use super::error::{IndexerResult, SourceError};
use super::types::*;

/// Transfer source port - abstraction over the block explorer
#[async_trait]
pub trait TransferSource: Send + Sync {
    /// All token transfers touching `wallet` from `start_block` (inclusive)
    /// up to the chain head, in the order the explorer returns them
    async fn fetch_transfers(
        &self,
        wallet: &str,
        start_block: u64,
    ) -> Result<Vec<RawTransfer>, SourceError>;

    /// Highest block number mined at or before `unix_ts`
    async fn block_at_or_before(&self, unix_ts: i64) -> Result<u64, SourceError>;
}

/// Ledger storage port
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Subset of `hashes` already present in the ledger
    async fn existing_hashes(&self, hashes: &[String]) -> IndexerResult<HashSet<String>>;

    /// Insert rows, silently skipping any `tx_hash` that already exists.
    /// Returns the number of rows actually written.
    async fn insert_batch(&self, rows: &[NewTransaction]) -> IndexerResult<u64>;

    /// Distinct recipients of master wallet outflows
    async fn requester_wallets(&self) -> IndexerResult<Vec<String>>;

    /// Up to `limit` rows of the keyset scan, in scan order
    async fn fetch_keyset(&self, keyset: &Keyset, limit: i64) -> IndexerResult<Vec<Transaction>>;

    /// Whether the keyset scan yields at least one row
    async fn exists_beyond(&self, keyset: &Keyset) -> IndexerResult<bool>;

    /// Row count, optionally restricted to one classification
    async fn count(&self, tx_type: Option<TxType>) -> IndexerResult<u64>;

    async fn health_check(&self) -> IndexerResult<()>;
}

/// Per-wallet sync progress port
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get(&self, wallet: &str) -> IndexerResult<Option<u64>>;

    /// Unconditional upsert; callers only pass a new maximum
    async fn set(&self, wallet: &str, block: u64) -> IndexerResult<()>;

    async fn get_many(&self, wallets: &[String]) -> IndexerResult<HashMap<String, u64>>;
}
