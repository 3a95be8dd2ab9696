//! Keyset pagination over the ledger
//!
//! A cursor names the boundary row of a page: its sort key plus its
//! `tx_hash`, so rows sharing a timestamp, value or block still have a
//! strict order. Pages are always emitted in the caller's canonical order;
//! `direction=prev` scans the reversed order and flips the result.
//!
//! Cursor text is URL-safe base64 of `"<sort_by>|<key>|<tx_hash>"` where the
//! key is epoch microseconds for `time`, the shortest round-tripping decimal
//! for `value` and the block height for `block`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{TimeZone, Utc};
use serde::Serialize;

use crate::core::{
    Boundary, Direction, IndexerError, IndexerResult, Keyset, LedgerStore, SortBy, SortKey,
    SortOrder, Transaction, TxType,
};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A validated page query
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub limit: u32,
    pub cursor: Option<String>,
    pub direction: Direction,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub tx_type: Option<TxType>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
            direction: Direction::Next,
            sort_by: SortBy::Time,
            sort_order: SortOrder::Desc,
            tx_type: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub transactions: Vec<Transaction>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    /// Snapshot count at query time; may lag concurrent inserts
    pub total: u64,
}

pub fn encode_cursor(sort_by: SortBy, boundary: &Boundary) -> String {
    let key = match boundary.key {
        SortKey::Time(ts) => ts.timestamp_micros().to_string(),
        SortKey::Value(v) => v.to_string(),
        SortKey::Block(b) => b.to_string(),
    };
    let raw = format!("{}|{}|{}", sort_by.as_str(), key, boundary.tx_hash);
    URL_SAFE_NO_PAD.encode(raw)
}

/// Decode a cursor, rejecting one issued for a different sort column
pub fn decode_cursor(cursor: &str, sort_by: SortBy) -> IndexerResult<Boundary> {
    let invalid = || IndexerError::Validation("invalid cursor".to_string());

    let bytes = URL_SAFE_NO_PAD.decode(cursor.trim()).map_err(|_| invalid())?;
    let raw = String::from_utf8(bytes).map_err(|_| invalid())?;

    let mut parts = raw.splitn(3, '|');
    let (Some(column), Some(key), Some(tx_hash)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if tx_hash.is_empty() {
        return Err(invalid());
    }

    let cursor_sort: SortBy = column.parse().map_err(|_| invalid())?;
    if cursor_sort != sort_by {
        return Err(IndexerError::Validation(format!(
            "cursor was issued for sort_by={}, not {}",
            cursor_sort.as_str(),
            sort_by.as_str()
        )));
    }

    let key = match sort_by {
        SortBy::Time => {
            let micros: i64 = key.parse().map_err(|_| invalid())?;
            SortKey::Time(Utc.timestamp_micros(micros).single().ok_or_else(invalid)?)
        }
        SortBy::Value => {
            let value: f64 = key.parse().map_err(|_| invalid())?;
            if !value.is_finite() {
                return Err(invalid());
            }
            SortKey::Value(value)
        }
        SortBy::Block => SortKey::Block(key.parse().map_err(|_| invalid())?),
    };

    Ok(Boundary {
        key,
        tx_hash: tx_hash.to_string(),
    })
}

#[derive(Debug, Clone, Copy)]
pub struct PaginationEngine {
    max_page_size: u32,
}

impl Default for PaginationEngine {
    fn default() -> Self {
        Self::new(MAX_PAGE_SIZE)
    }
}

impl PaginationEngine {
    pub fn new(max_page_size: u32) -> Self {
        Self {
            max_page_size: max_page_size.max(1),
        }
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    /// Serve one page. Input is validated before the store is touched.
    pub async fn paginate(&self, store: &dyn LedgerStore, req: &PageRequest) -> IndexerResult<Page> {
        if req.limit < 1 || req.limit > self.max_page_size {
            return Err(IndexerError::Validation(format!(
                "limit must be between 1 and {}",
                self.max_page_size
            )));
        }

        let after = req
            .cursor
            .as_deref()
            .map(|c| decode_cursor(c, req.sort_by))
            .transpose()?;

        let forward = req.sort_order;
        let backward = req.sort_order.reversed();
        let scan_order = match req.direction {
            Direction::Next => forward,
            Direction::Prev => backward,
        };

        let keyset = Keyset {
            sort_by: req.sort_by,
            order: scan_order,
            after: after.clone(),
            tx_type: req.tx_type,
        };
        let mut transactions = store.fetch_keyset(&keyset, i64::from(req.limit)).await?;
        if req.direction == Direction::Prev {
            transactions.reverse();
        }

        // Boundaries of the emitted page; an empty page past a cursor keeps
        // the cursor itself as the boundary on the side it came from.
        let (last, first) = match (transactions.last(), transactions.first()) {
            (Some(last), Some(first)) => (
                Some(Boundary::of(req.sort_by, last)),
                Some(Boundary::of(req.sort_by, first)),
            ),
            _ => match req.direction {
                Direction::Next => (None, after),
                Direction::Prev => (after, None),
            },
        };

        let next_cursor = match last {
            Some(boundary) => self.probe(store, req, forward, boundary).await?,
            None => None,
        };
        let prev_cursor = match first {
            Some(boundary) => self.probe(store, req, backward, boundary).await?,
            None => None,
        };

        let total = store.count(req.tx_type).await?;

        Ok(Page {
            transactions,
            next_cursor,
            prev_cursor,
            total,
        })
    }

    /// Cursor for `boundary` if any row lies beyond it in `order`
    async fn probe(
        &self,
        store: &dyn LedgerStore,
        req: &PageRequest,
        order: SortOrder,
        boundary: Boundary,
    ) -> IndexerResult<Option<String>> {
        let cursor = encode_cursor(req.sort_by, &boundary);
        let keyset = Keyset {
            sort_by: req.sort_by,
            order,
            after: Some(boundary),
            tx_type: req.tx_type,
        };
        Ok(store.exists_beyond(&keyset).await?.then_some(cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_keys_survive_encoding() {
        let ts = Utc.timestamp_micros(1_700_000_000_123_456).unwrap();
        let cases = [
            (SortBy::Time, SortKey::Time(ts)),
            (SortBy::Value, SortKey::Value(0.1 + 0.2)),
            (SortBy::Block, SortKey::Block(50_000_001)),
        ];

        for (sort_by, key) in cases {
            let boundary = Boundary {
                key,
                tx_hash: "0xabc".to_string(),
            };
            let cursor = encode_cursor(sort_by, &boundary);
            assert!(!cursor.contains('='));
            assert_eq!(decode_cursor(&cursor, sort_by).unwrap(), boundary);
        }
    }

    #[test]
    fn cursor_for_other_column_is_rejected() {
        let boundary = Boundary {
            key: SortKey::Block(7),
            tx_hash: "0x1".to_string(),
        };
        let cursor = encode_cursor(SortBy::Block, &boundary);
        let err = decode_cursor(&cursor, SortBy::Time).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn garbage_cursors_are_client_errors() {
        for cursor in ["", "!!!", "dGltZXw", "dGltZXxub3RhbnVtYmVyfDB4MQ"] {
            let err = decode_cursor(cursor, SortBy::Time).unwrap_err();
            assert!(err.is_client_error(), "{cursor}");
        }
    }
}
