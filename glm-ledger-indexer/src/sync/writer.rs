//! Idempotent ledger writer
//!
//! Classifies raw transfers for one sync pass, drops hashes the ledger
//! already holds and inserts the rest in fixed-size batches. The ledger's
//! conflict-ignore insert stays the final guard against concurrent or
//! overlapping writers.

use chrono::{TimeZone, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{
    wei_to_units, IndexerError, IndexerResult, LedgerStore, NewTransaction, RawTransfer,
    SourceError, TxType,
};

/// Which wallet's history is being imported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPass<'a> {
    /// Outflows of the master wallet
    Master,
    /// Outflows of a discovered requester wallet
    Requester(&'a str),
}

impl SyncPass<'_> {
    pub fn tx_type(&self) -> TxType {
        match self {
            SyncPass::Master => TxType::MasterToRequester,
            SyncPass::Requester(_) => TxType::RequesterToProvider,
        }
    }
}

/// What one write call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Transfers that passed classification
    pub candidates: usize,
    /// Candidates dropped because the ledger already had their hash
    pub duplicates: usize,
    /// Rows the ledger reported as written
    pub inserted: u64,
    /// Distinct recipients among the rows sent for insertion
    pub recipients: BTreeSet<String>,
}

/// Keep only the transfers that belong to `pass` and type them
///
/// Requester-to-requester transfers are kept as provider payments. A kept
/// transfer whose fields cannot be stored fails the whole fetch, so the
/// wallet's watermark never moves past it.
pub fn classify(
    pass: SyncPass<'_>,
    master_wallet: &str,
    transfers: &[RawTransfer],
    decimals: u32,
) -> IndexerResult<Vec<NewTransaction>> {
    let tx_type = pass.tx_type();

    transfers
        .iter()
        .filter(|t| match pass {
            SyncPass::Master => t.from_address == master_wallet,
            SyncPass::Requester(wallet) => {
                t.from_address == wallet && t.to_address != master_wallet
            }
        })
        .map(|t| {
            to_new_transaction(t, tx_type, decimals).map_err(|e| {
                warn!(tx_hash = %t.tx_hash, block = t.block_number, "Transfer has unusable fields: {}", e);
                IndexerError::Source(SourceError::Malformed(format!("transfer {}: {}", t.tx_hash, e)))
            })
        })
        .collect()
}

fn to_new_transaction(
    transfer: &RawTransfer,
    tx_type: TxType,
    decimals: u32,
) -> IndexerResult<NewTransaction> {
    let value_glm = wei_to_units(&transfer.value_wei, decimals)?;
    let block_timestamp = Utc
        .timestamp_opt(transfer.block_timestamp, 0)
        .single()
        .ok_or_else(|| {
            IndexerError::Validation(format!(
                "block timestamp out of range: {}",
                transfer.block_timestamp
            ))
        })?;

    Ok(NewTransaction {
        tx_hash: transfer.tx_hash.clone(),
        block_number: i64::try_from(transfer.block_number).map_err(|_| {
            IndexerError::Validation(format!(
                "block number out of range: {}",
                transfer.block_number
            ))
        })?,
        block_timestamp,
        from_address: transfer.from_address.clone(),
        to_address: transfer.to_address.clone(),
        value_wei: transfer.value_wei.clone(),
        value_glm,
        gas_used: transfer.gas_used.and_then(|g| i64::try_from(g).ok()),
        gas_price_wei: transfer.gas_price_wei.clone(),
        tx_type,
    })
}

pub struct IdempotentWriter {
    ledger: Arc<dyn LedgerStore>,
    master_wallet: String,
    batch_size: usize,
    decimals: u32,
}

impl IdempotentWriter {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        master_wallet: impl Into<String>,
        batch_size: usize,
        decimals: u32,
    ) -> Self {
        Self {
            ledger,
            master_wallet: master_wallet.into(),
            batch_size: batch_size.max(1),
            decimals,
        }
    }

    /// Classify, deduplicate and persist one wallet's fetch
    pub async fn write(
        &self,
        pass: SyncPass<'_>,
        transfers: &[RawTransfer],
    ) -> IndexerResult<WriteOutcome> {
        let mut candidates = classify(pass, &self.master_wallet, transfers, self.decimals)?;
        let candidate_count = candidates.len();

        // A hash seen twice in one fetch is written once
        let mut seen = HashSet::with_capacity(candidates.len());
        candidates.retain(|tx| seen.insert(tx.tx_hash.clone()));

        let hashes: Vec<String> = candidates.iter().map(|tx| tx.tx_hash.clone()).collect();
        let existing = self.ledger.existing_hashes(&hashes).await?;
        candidates.retain(|tx| !existing.contains(&tx.tx_hash));

        let mut outcome = WriteOutcome {
            candidates: candidate_count,
            duplicates: candidate_count - candidates.len(),
            ..WriteOutcome::default()
        };

        for batch in candidates.chunks(self.batch_size) {
            let inserted = self.ledger.insert_batch(batch).await?;
            outcome.inserted += inserted;
            debug!(batch = batch.len(), inserted, "Inserted ledger batch");
        }

        outcome.recipients = candidates.into_iter().map(|tx| tx.to_address).collect();

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    const MASTER: &str = "0x00000000000000000000000000000000000000aa";
    const REQUESTER: &str = "0x00000000000000000000000000000000000000bb";
    const PROVIDER: &str = "0x00000000000000000000000000000000000000cc";

    fn transfer(hash: &str, from: &str, to: &str, block: u64) -> RawTransfer {
        RawTransfer {
            tx_hash: hash.to_string(),
            block_number: block,
            block_timestamp: 1_700_000_000 + block as i64,
            from_address: from.to_string(),
            to_address: to.to_string(),
            value_wei: "1000000000000000000".to_string(),
            gas_used: Some(21_000),
            gas_price_wei: Some("30000000000".to_string()),
        }
    }

    #[test]
    fn master_pass_keeps_only_outflows() {
        let transfers = vec![
            transfer("0x1", MASTER, REQUESTER, 10),
            transfer("0x2", PROVIDER, MASTER, 11),
        ];
        let rows = classify(SyncPass::Master, MASTER, &transfers, 18).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tx_type, TxType::MasterToRequester);
        assert_eq!(rows[0].value_glm, 1.0);
    }

    #[test]
    fn requester_pass_excludes_refunds_and_inbound() {
        let transfers = vec![
            transfer("0x1", REQUESTER, PROVIDER, 10),
            transfer("0x2", REQUESTER, MASTER, 11),
            transfer("0x3", MASTER, REQUESTER, 12),
        ];
        let rows = classify(SyncPass::Requester(REQUESTER), MASTER, &transfers, 18).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tx_hash, "0x1");
        assert_eq!(rows[0].tx_type, TxType::RequesterToProvider);
    }

    #[test]
    fn unusable_fields_fail_the_fetch() {
        let mut bad_amount = transfer("0x1", MASTER, REQUESTER, 10);
        bad_amount.value_wei = "12abc".to_string();
        let mut bad_time = transfer("0x2", MASTER, REQUESTER, 11);
        bad_time.block_timestamp = i64::MAX;
        let bad_block = transfer("0x3", MASTER, REQUESTER, u64::MAX);

        for bad in [bad_amount, bad_time, bad_block] {
            let rows = vec![transfer("0x0", MASTER, REQUESTER, 9), bad];
            let err = classify(SyncPass::Master, MASTER, &rows, 18).unwrap_err();
            assert!(matches!(err, IndexerError::Source(SourceError::Malformed(_))));
        }
    }

    #[test]
    fn unusable_rows_of_other_passes_are_ignored() {
        let mut inbound = transfer("0x1", PROVIDER, MASTER, 10);
        inbound.value_wei = "not a number".to_string();
        let rows = classify(SyncPass::Master, MASTER, &[inbound], 18).unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn write_counts_only_new_rows() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let writer = IdempotentWriter::new(store.clone(), MASTER, 2, 18);

        let transfers: Vec<_> = (0..5)
            .map(|i| transfer(&format!("0x{:02}", i), MASTER, REQUESTER, 10 + i))
            .collect();

        let first = writer.write(SyncPass::Master, &transfers).await?;
        assert_eq!(first.candidates, 5);
        assert_eq!(first.inserted, 5);
        assert!(first.recipients.contains(REQUESTER));

        let second = writer.write(SyncPass::Master, &transfers).await?;
        assert_eq!(second.duplicates, 5);
        assert_eq!(second.inserted, 0);
        assert!(second.recipients.is_empty());

        assert_eq!(store.count(None).await?, 5);
        Ok(())
    }
}
