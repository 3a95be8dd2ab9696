//! PostgreSQL ledger and watermark store with runtime queries (no compile-time checking)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::core::{
    IndexerError, IndexerResult, Keyset, LedgerStore, NewTransaction, SortKey, SortOrder,
    StorageError, Transaction, TxType, WatermarkStore,
};

const TRANSACTION_COLUMNS: &str = "tx_hash, block_number, block_timestamp, from_address, \
     to_address, value_wei, value_glm, gas_used, gas_price_wei, tx_type, created_at";

#[derive(Clone)]
pub struct PostgresStore {
    pub pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &DatabaseConfig) -> IndexerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await?;

        info!("PostgreSQL connected successfully");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn run_migrations(&self) -> IndexerResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_transaction(row: &PgRow) -> IndexerResult<Transaction> {
    let tx_type: String = row.try_get("tx_type")?;
    let tx_type = tx_type.parse::<TxType>().map_err(|_| {
        IndexerError::Storage(StorageError::Database(format!(
            "unexpected tx_type in ledger: {}",
            tx_type
        )))
    })?;

    Ok(Transaction {
        tx_hash: row.try_get("tx_hash")?,
        block_number: row.try_get("block_number")?,
        block_timestamp: row.try_get::<DateTime<Utc>, _>("block_timestamp")?,
        from_address: row.try_get("from_address")?,
        to_address: row.try_get("to_address")?,
        value_wei: row.try_get("value_wei")?,
        value_glm: row.try_get("value_glm")?,
        gas_used: row.try_get("gas_used")?,
        gas_price_wei: row.try_get("gas_price_wei")?,
        tx_type,
        created_at: row.try_get("created_at")?,
    })
}

/// Append the WHERE clause of a keyset scan
fn push_keyset_filter(qb: &mut QueryBuilder<'_, Postgres>, keyset: &Keyset) {
    qb.push(" WHERE TRUE");

    if let Some(tx_type) = keyset.tx_type {
        qb.push(" AND tx_type = ").push_bind(tx_type.as_str());
    }

    if let Some(after) = &keyset.after {
        let op = match keyset.order {
            SortOrder::Desc => " < ",
            SortOrder::Asc => " > ",
        };
        qb.push(" AND (")
            .push(keyset.sort_by.column())
            .push(", tx_hash)")
            .push(op)
            .push("(");
        match after.key {
            SortKey::Time(ts) => qb.push_bind(ts),
            SortKey::Value(v) => qb.push_bind(v),
            SortKey::Block(b) => qb.push_bind(b),
        };
        qb.push(", ").push_bind(after.tx_hash.clone()).push(")");
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn existing_hashes(&self, hashes: &[String]) -> IndexerResult<HashSet<String>> {
        if hashes.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query("SELECT tx_hash FROM transactions WHERE tx_hash = ANY($1)")
            .bind(hashes)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("tx_hash").map_err(IndexerError::from))
            .collect()
    }

    async fn insert_batch(&self, rows: &[NewTransaction]) -> IndexerResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO transactions (tx_hash, block_number, block_timestamp, from_address, \
             to_address, value_wei, value_glm, gas_used, gas_price_wei, tx_type) ",
        );
        qb.push_values(rows, |mut b, row| {
            b.push_bind(row.tx_hash.clone())
                .push_bind(row.block_number)
                .push_bind(row.block_timestamp)
                .push_bind(row.from_address.clone())
                .push_bind(row.to_address.clone())
                .push_bind(row.value_wei.clone())
                .push_bind(row.value_glm)
                .push_bind(row.gas_used)
                .push_bind(row.gas_price_wei.clone())
                .push_bind(row.tx_type.as_str());
        });
        qb.push(" ON CONFLICT (tx_hash) DO NOTHING");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn requester_wallets(&self) -> IndexerResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT to_address FROM transactions WHERE tx_type = $1 ORDER BY to_address",
        )
        .bind(TxType::MasterToRequester.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("to_address").map_err(IndexerError::from))
            .collect()
    }

    async fn fetch_keyset(&self, keyset: &Keyset, limit: i64) -> IndexerResult<Vec<Transaction>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(TRANSACTION_COLUMNS).push(" FROM transactions");
        push_keyset_filter(&mut qb, keyset);

        let order = keyset.order.as_sql();
        qb.push(" ORDER BY ")
            .push(keyset.sort_by.column())
            .push(" ")
            .push(order)
            .push(", tx_hash ")
            .push(order)
            .push(" LIMIT ")
            .push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_transaction).collect()
    }

    async fn exists_beyond(&self, keyset: &Keyset) -> IndexerResult<bool> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT EXISTS (SELECT 1 FROM transactions");
        push_keyset_filter(&mut qb, keyset);
        qb.push(")");

        let exists: bool = qb.build_query_scalar::<bool>().fetch_one(&self.pool).await?;
        Ok(exists)
    }

    async fn count(&self, tx_type: Option<TxType>) -> IndexerResult<u64> {
        let count: i64 = match tx_type {
            Some(tx_type) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE tx_type = $1")
                    .bind(tx_type.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count.max(0) as u64)
    }

    async fn health_check(&self) -> IndexerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for PostgresStore {
    async fn get(&self, wallet: &str) -> IndexerResult<Option<u64>> {
        let block: Option<i64> = sqlx::query_scalar(
            "SELECT last_processed_block FROM sync_state WHERE wallet_address = $1",
        )
        .bind(wallet)
        .fetch_optional(&self.pool)
        .await?;

        Ok(block.map(|b| b.max(0) as u64))
    }

    async fn set(&self, wallet: &str, block: u64) -> IndexerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (wallet_address, last_processed_block, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (wallet_address) DO UPDATE SET
                last_processed_block = EXCLUDED.last_processed_block,
                updated_at = NOW()
            "#,
        )
        .bind(wallet)
        .bind(block as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_many(&self, wallets: &[String]) -> IndexerResult<HashMap<String, u64>> {
        if wallets.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT wallet_address, last_processed_block FROM sync_state WHERE wallet_address = ANY($1)",
        )
        .bind(wallets)
        .fetch_all(&self.pool)
        .await?;

        let mut watermarks = HashMap::with_capacity(rows.len());
        for row in rows {
            let wallet: String = row.try_get("wallet_address")?;
            let block: i64 = row.try_get("last_processed_block")?;
            watermarks.insert(wallet, block.max(0) as u64);
        }
        Ok(watermarks)
    }
}
