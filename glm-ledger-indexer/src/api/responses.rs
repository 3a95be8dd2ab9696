//! API response types

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::value::RawValue;

use crate::core::{IndexerResult, Transaction, TxType};
use crate::pagination::Page;

/// Ledger row as exposed to the web layer.
///
/// Integer amounts are emitted as exact JSON numbers rather than strings or
/// lossy floats.
#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub tx_hash: String,
    pub block_number: i64,
    /// ISO-8601, UTC
    pub block_timestamp: String,
    pub from_address: String,
    pub to_address: String,
    pub value_wei: Box<RawValue>,
    pub value_glm: f64,
    pub gas_used: Option<i64>,
    pub gas_price_wei: Option<Box<RawValue>>,
    pub tx_type: TxType,
    pub created_at: String,
}

/// JSON number text for a decimal integer string
fn integer_number(digits: &str) -> IndexerResult<Box<RawValue>> {
    let trimmed = digits.trim_start_matches('0');
    let canonical = if trimmed.is_empty() { "0" } else { trimmed };
    Ok(RawValue::from_string(canonical.to_string())?)
}

impl TryFrom<Transaction> for TransactionView {
    type Error = crate::core::IndexerError;

    fn try_from(tx: Transaction) -> Result<Self, Self::Error> {
        Ok(Self {
            value_wei: integer_number(&tx.value_wei)?,
            gas_price_wei: tx.gas_price_wei.as_deref().map(integer_number).transpose()?,
            block_timestamp: tx.block_timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            created_at: tx.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            tx_hash: tx.tx_hash,
            block_number: tx.block_number,
            from_address: tx.from_address,
            to_address: tx.to_address,
            value_glm: tx.value_glm,
            gas_used: tx.gas_used,
            tx_type: tx.tx_type,
        })
    }
}

/// Response for `GET /metrics/transactions`
#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionView>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub total: u64,
}

impl TryFrom<Page> for TransactionsResponse {
    type Error = crate::core::IndexerError;

    fn try_from(page: Page) -> Result<Self, Self::Error> {
        let transactions = page
            .transactions
            .into_iter()
            .map(TransactionView::try_from)
            .collect::<IndexerResult<Vec<_>>>()?;

        Ok(Self {
            transactions,
            next_cursor: page.next_cursor,
            prev_cursor: page.prev_cursor,
            total: page.total,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: crate::database::DatabaseHealth,
    pub timestamp: i64,
    pub service: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub timestamp: i64,
}
