//! Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::IndexerError;

/// Classification assigned to a ledger row when it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    MasterToRequester,
    RequesterToProvider,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::MasterToRequester => "master_to_requester",
            TxType::RequesterToProvider => "requester_to_provider",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master_to_requester" => Ok(TxType::MasterToRequester),
            "requester_to_provider" => Ok(TxType::RequesterToProvider),
            other => Err(IndexerError::Validation(format!("unknown tx_type: {}", other))),
        }
    }
}

/// A token transfer as reported by the explorer, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransfer {
    pub tx_hash: String,
    pub block_number: u64,
    /// UNIX seconds
    pub block_timestamp: i64,
    pub from_address: String,
    pub to_address: String,
    /// Exact integer amount in the token's base unit
    pub value_wei: String,
    pub gas_used: Option<u64>,
    pub gas_price_wei: Option<String>,
}

/// A classified transfer ready to be written to the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub tx_hash: String,
    pub block_number: i64,
    pub block_timestamp: DateTime<Utc>,
    pub from_address: String,
    pub to_address: String,
    pub value_wei: String,
    pub value_glm: f64,
    pub gas_used: Option<i64>,
    pub gas_price_wei: Option<String>,
    pub tx_type: TxType,
}

/// A ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_hash: String,
    pub block_number: i64,
    pub block_timestamp: DateTime<Utc>,
    pub from_address: String,
    pub to_address: String,
    pub value_wei: String,
    pub value_glm: f64,
    pub gas_used: Option<i64>,
    pub gas_price_wei: Option<String>,
    pub tx_type: TxType,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Materialize a pending row with the given insertion time
    pub fn from_new(tx: NewTransaction, created_at: DateTime<Utc>) -> Self {
        Self {
            tx_hash: tx.tx_hash,
            block_number: tx.block_number,
            block_timestamp: tx.block_timestamp,
            from_address: tx.from_address,
            to_address: tx.to_address,
            value_wei: tx.value_wei,
            value_glm: tx.value_glm,
            gas_used: tx.gas_used,
            gas_price_wei: tx.gas_price_wei,
            tx_type: tx.tx_type,
            created_at,
        }
    }
}

/// Sortable ledger columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Time,
    Value,
    Block,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Time => "time",
            SortBy::Value => "value",
            SortBy::Block => "block",
        }
    }

    /// Backing column name in the ledger table
    pub fn column(&self) -> &'static str {
        match self {
            SortBy::Time => "block_timestamp",
            SortBy::Value => "value_glm",
            SortBy::Block => "block_number",
        }
    }
}

impl FromStr for SortBy {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time" => Ok(SortBy::Time),
            "value" => Ok(SortBy::Value),
            "block" => Ok(SortBy::Block),
            other => Err(IndexerError::Validation(format!("unsupported sort_by: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(IndexerError::Validation(format!("unsupported sort_order: {}", other))),
        }
    }
}

/// Navigation direction relative to the supplied cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Next,
    Prev,
}

impl FromStr for Direction {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => Ok(Direction::Next),
            "prev" => Ok(Direction::Prev),
            other => Err(IndexerError::Validation(format!("unsupported direction: {}", other))),
        }
    }
}

/// Literal value of a sort column at a page boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortKey {
    Time(DateTime<Utc>),
    Value(f64),
    Block(i64),
}

impl SortKey {
    /// Extract the key for `sort_by` from a ledger row
    pub fn of(sort_by: SortBy, tx: &Transaction) -> Self {
        match sort_by {
            SortBy::Time => SortKey::Time(tx.block_timestamp),
            SortBy::Value => SortKey::Value(tx.value_glm),
            SortBy::Block => SortKey::Block(tx.block_number),
        }
    }

    pub fn sort_by(&self) -> SortBy {
        match self {
            SortKey::Time(_) => SortBy::Time,
            SortKey::Value(_) => SortBy::Value,
            SortKey::Block(_) => SortBy::Block,
        }
    }
}

/// Keyset position: sort key plus `tx_hash` as a tiebreaker
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    pub key: SortKey,
    pub tx_hash: String,
}

impl Boundary {
    pub fn of(sort_by: SortBy, tx: &Transaction) -> Self {
        Self {
            key: SortKey::of(sort_by, tx),
            tx_hash: tx.tx_hash.clone(),
        }
    }
}

/// A scan over the ledger in `order`, starting strictly after `after`
#[derive(Debug, Clone, PartialEq)]
pub struct Keyset {
    pub sort_by: SortBy,
    pub order: SortOrder,
    pub after: Option<Boundary>,
    pub tx_type: Option<TxType>,
}
