//! Ledger and watermark storage backends

pub mod memory;
pub mod postgres;

use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Result of a storage health probe, reported by `/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub ledger: bool,
    pub overall: bool,
}
