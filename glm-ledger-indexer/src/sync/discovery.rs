//! Requester wallet discovery
//!
//! The requester set is not configured anywhere: it is whatever the ledger
//! says the master wallet has paid. Rebuilding it from stored rows means a
//! restarted indexer resumes with the same set it had before.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::{IndexerResult, LedgerStore};

pub struct WalletDiscovery {
    ledger: Arc<dyn LedgerStore>,
    master_wallet: String,
}

impl WalletDiscovery {
    pub fn new(ledger: Arc<dyn LedgerStore>, master_wallet: impl Into<String>) -> Self {
        Self {
            ledger,
            master_wallet: master_wallet.into(),
        }
    }

    /// Distinct recipients of stored master outflows, excluding the master itself
    pub async fn requester_wallets(&self) -> IndexerResult<Vec<String>> {
        let mut wallets = self.ledger.requester_wallets().await?;
        wallets.retain(|w| *w != self.master_wallet);
        wallets.dedup();
        Ok(wallets)
    }

    /// Recipients that were not yet part of `known`
    pub fn newly_discovered<'a>(
        known: &BTreeSet<String>,
        recipients: impl IntoIterator<Item = &'a String>,
    ) -> Vec<String> {
        recipients
            .into_iter()
            .filter(|r| !known.contains(*r))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NewTransaction, TxType};
    use crate::database::MemoryStore;
    use chrono::Utc;

    fn paid(hash: &str, from: &str, to: &str, tx_type: TxType) -> NewTransaction {
        NewTransaction {
            tx_hash: hash.to_string(),
            block_number: 1,
            block_timestamp: Utc::now(),
            from_address: from.to_string(),
            to_address: to.to_string(),
            value_wei: "5".to_string(),
            value_glm: 5e-18,
            gas_used: None,
            gas_price_wei: None,
            tx_type,
        }
    }

    #[tokio::test]
    async fn only_master_recipients_are_requesters() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_batch(&[
                paid("0x1", "0xmaster", "0xr1", TxType::MasterToRequester),
                paid("0x2", "0xmaster", "0xr2", TxType::MasterToRequester),
                paid("0x3", "0xmaster", "0xr1", TxType::MasterToRequester),
                paid("0x4", "0xr1", "0xprovider", TxType::RequesterToProvider),
            ])
            .await?;

        let discovery = WalletDiscovery::new(store, "0xmaster");
        assert_eq!(discovery.requester_wallets().await?, vec!["0xr1", "0xr2"]);
        Ok(())
    }

    #[test]
    fn newly_discovered_skips_known() {
        let known: BTreeSet<String> = ["0xr1".to_string()].into_iter().collect();
        let recipients = vec!["0xr2".to_string(), "0xr1".to_string(), "0xr2".to_string()];
        assert_eq!(
            WalletDiscovery::newly_discovered(&known, &recipients),
            vec!["0xr2".to_string()]
        );
    }
}
