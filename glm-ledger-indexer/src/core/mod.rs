//! Core domain abstractions and types
//!
//! This module contains the foundational types, traits, and error definitions
//! shared by the sync protocol and the read path. It's designed to be
//! independent of any specific infrastructure concerns.

pub mod amount;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use amount::{wei_to_units, GLM_DECIMALS};
pub use error::{IndexerError, IndexerResult, SourceError, StorageError};
pub use traits::{LedgerStore, TransferSource, WatermarkStore};
pub use types::{
    Boundary, Direction, Keyset, NewTransaction, RawTransfer, SortBy, SortKey, SortOrder,
    Transaction, TxType,
};
