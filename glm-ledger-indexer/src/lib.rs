//! GLM Payment Ledger Indexer Library
//!
//! Pulls GLM token transfers from an Etherscan-compatible explorer, keeps a
//! deduplicated ledger of master → requester → provider payments in
//! PostgreSQL and serves it through a keyset-paginated read API.

pub mod api;
pub mod config;
pub mod core;
pub mod database;
pub mod pagination;
pub mod source;
pub mod sync;

// Re-export commonly used types
pub use config::IndexerConfig;
pub use crate::core::{IndexerError, IndexerResult, LedgerStore, TransferSource, WatermarkStore};
pub use database::{DatabaseHealth, MemoryStore, PostgresStore};
pub use pagination::{Page, PageRequest, PaginationEngine};
pub use source::{ExplorerClient, RateLimiter};
pub use sync::{CycleReport, SyncOrchestrator};
