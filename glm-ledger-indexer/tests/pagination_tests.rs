//! Keyset pagination tests over the in-memory ledger

mod common;

use anyhow::Result;
use common::*;
use glm_ledger_indexer::core::{Direction, LedgerStore, SortBy, SortOrder, TxType};
use glm_ledger_indexer::database::MemoryStore;
use glm_ledger_indexer::pagination::{Page, PageRequest, PaginationEngine};

/// 25 rows one second apart; hashes sort the same way as time
async fn seeded_store() -> Result<MemoryStore> {
    let store = MemoryStore::new();
    let rows: Vec<_> = (0..25)
        .map(|i| {
            let tx_type = if i % 5 == 0 {
                TxType::RequesterToProvider
            } else {
                TxType::MasterToRequester
            };
            ledger_row(&format!("0x{:04}", i), i, (i % 7) as u64, tx_type)
        })
        .collect();
    store.insert_batch(&rows).await?;
    Ok(store)
}

fn hashes(page: &Page) -> Vec<String> {
    page.transactions.iter().map(|t| t.tx_hash.clone()).collect()
}

fn request(limit: u32) -> PageRequest {
    PageRequest {
        limit,
        ..PageRequest::default()
    }
}

fn follow(cursor: &Option<String>, direction: Direction, limit: u32) -> PageRequest {
    PageRequest {
        cursor: cursor.clone(),
        direction,
        ..request(limit)
    }
}

#[tokio::test]
async fn next_then_prev_returns_to_first_page() -> Result<()> {
    let store = seeded_store().await?;
    let engine = PaginationEngine::default();

    let first = engine.paginate(&store, &request(10)).await?;
    assert_eq!(first.transactions.len(), 10);
    assert_eq!(first.transactions[0].tx_hash, "0x0024");
    assert!(first.prev_cursor.is_none());
    assert_eq!(first.total, 25);

    let mut pages = vec![first.clone()];
    loop {
        let cursor = pages.last().and_then(|p| p.next_cursor.clone());
        if cursor.is_none() {
            break;
        }
        let next = engine
            .paginate(&store, &follow(&cursor, Direction::Next, 10))
            .await?;
        pages.push(next);
    }
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[2].transactions.len(), 5);
    assert!(pages[2].next_cursor.is_none());

    let walked: Vec<String> = pages.iter().flat_map(hashes).collect();
    let expected: Vec<String> = (0..25).rev().map(|i| format!("0x{:04}", i)).collect();
    assert_eq!(walked, expected);

    // Walk back with prev cursors
    let mut page = pages[2].clone();
    for expected_page in pages[..2].iter().rev() {
        page = engine
            .paginate(&store, &follow(&page.prev_cursor, Direction::Prev, 10))
            .await?;
        assert_eq!(hashes(&page), hashes(expected_page));
    }
    assert_eq!(hashes(&page), hashes(&first));
    assert!(page.prev_cursor.is_none());
    assert!(page.next_cursor.is_some());
    Ok(())
}

#[tokio::test]
async fn prev_cursor_appears_when_newer_rows_arrive() -> Result<()> {
    let store = seeded_store().await?;
    let engine = PaginationEngine::default();

    let first = engine.paginate(&store, &request(10)).await?;
    let second = engine
        .paginate(&store, &follow(&first.next_cursor, Direction::Next, 10))
        .await?;

    store
        .insert_batch(&[
            ledger_row("0x0100", 100, 1, TxType::MasterToRequester),
            ledger_row("0x0101", 101, 1, TxType::MasterToRequester),
        ])
        .await?;

    let back = engine
        .paginate(&store, &follow(&second.prev_cursor, Direction::Prev, 10))
        .await?;
    assert_eq!(hashes(&back), hashes(&first));
    assert!(back.prev_cursor.is_some());
    assert_eq!(back.total, 27);

    let newest = engine
        .paginate(&store, &follow(&back.prev_cursor, Direction::Prev, 10))
        .await?;
    assert_eq!(hashes(&newest), vec!["0x0101", "0x0100"]);
    assert!(newest.prev_cursor.is_none());
    Ok(())
}

#[tokio::test]
async fn prev_without_cursor_shows_last_page() -> Result<()> {
    let store = seeded_store().await?;
    let engine = PaginationEngine::default();

    let page = engine
        .paginate(&store, &follow(&None, Direction::Prev, 10))
        .await?;
    let expected: Vec<String> = (0..10).rev().map(|i| format!("0x{:04}", i)).collect();
    assert_eq!(hashes(&page), expected);
    assert!(page.next_cursor.is_none());
    assert!(page.prev_cursor.is_some());
    Ok(())
}

#[tokio::test]
async fn equal_sort_keys_are_neither_skipped_nor_repeated() -> Result<()> {
    let store = MemoryStore::new();
    // Twelve rows share one timestamp
    let rows: Vec<_> = (0..12)
        .map(|i| ledger_row(&format!("0x{:04}", i), 0, 1, TxType::MasterToRequester))
        .collect();
    store.insert_batch(&rows).await?;

    let engine = PaginationEngine::default();
    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = engine
            .paginate(&store, &follow(&cursor, Direction::Next, 5))
            .await?;
        seen.extend(hashes(&page));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    let mut expected: Vec<String> = (0..12).map(|i| format!("0x{:04}", i)).collect();
    expected.reverse();
    assert_eq!(seen, expected);
    Ok(())
}

#[tokio::test]
async fn sorts_by_value_ascending_with_filter() -> Result<()> {
    let store = seeded_store().await?;
    let engine = PaginationEngine::default();

    let req = PageRequest {
        limit: 3,
        sort_by: SortBy::Value,
        sort_order: SortOrder::Asc,
        tx_type: Some(TxType::RequesterToProvider),
        ..PageRequest::default()
    };
    let page = engine.paginate(&store, &req).await?;

    assert_eq!(page.total, 5);
    assert!(page
        .transactions
        .iter()
        .all(|t| t.tx_type == TxType::RequesterToProvider));
    let values: Vec<f64> = page.transactions.iter().map(|t| t.value_glm).collect();
    assert!(values.windows(2).all(|w| w[0] <= w[1]));

    let rest = engine
        .paginate(
            &store,
            &PageRequest {
                cursor: page.next_cursor.clone(),
                ..req.clone()
            },
        )
        .await?;
    assert_eq!(rest.transactions.len(), 2);
    assert!(rest.next_cursor.is_none());
    assert!(rest.transactions[0].value_glm >= *values.last().unwrap());
    Ok(())
}

#[tokio::test]
async fn invalid_input_never_reaches_the_store() -> Result<()> {
    let store = seeded_store().await?;
    let engine = PaginationEngine::default();

    for limit in [0, 101] {
        let err = engine.paginate(&store, &request(limit)).await.unwrap_err();
        assert!(err.is_client_error());
    }

    let page = engine.paginate(&store, &request(5)).await?;
    let by_block = PageRequest {
        sort_by: SortBy::Block,
        cursor: page.next_cursor,
        ..request(5)
    };
    let err = engine.paginate(&store, &by_block).await.unwrap_err();
    assert!(err.is_client_error());
    Ok(())
}
