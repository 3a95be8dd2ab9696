//! Block explorer client for token transfer history
//!
//! Speaks the Etherscan-compatible `account/tokentx` and
//! `block/getblocknobytime` endpoints. Every request goes through the shared
//! [`RateLimiter`]; throttling responses are retried with exponential backoff,
//! any other failure is returned to the caller.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::rate_limit::RateLimiter;
use crate::config::{ChainConfig, SourceConfig};
use crate::core::{IndexerResult, RawTransfer, SourceError, TransferSource};

/// Upper block bound accepted by the explorer as "chain head"
const OPEN_END_BLOCK: u64 = 99_999_999;

/// Envelope shared by every explorer response
#[derive(Debug, Deserialize)]
pub struct ExplorerResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

/// One row of `account/tokentx`; every number arrives as a decimal string
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenTransferRow {
    block_number: String,
    time_stamp: String,
    hash: String,
    from: String,
    to: String,
    value: String,
    #[serde(default)]
    gas_used: Option<String>,
    #[serde(default)]
    gas_price: Option<String>,
}

impl TryFrom<TokenTransferRow> for RawTransfer {
    type Error = SourceError;

    fn try_from(row: TokenTransferRow) -> Result<Self, Self::Error> {
        let block_number = row
            .block_number
            .parse::<u64>()
            .map_err(|_| SourceError::Malformed(format!("blockNumber {:?}", row.block_number)))?;
        let block_timestamp = row
            .time_stamp
            .parse::<i64>()
            .map_err(|_| SourceError::Malformed(format!("timeStamp {:?}", row.time_stamp)))?;
        if row.value.is_empty() || !row.value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SourceError::Malformed(format!("value {:?}", row.value)));
        }

        Ok(RawTransfer {
            tx_hash: row.hash.to_lowercase(),
            block_number,
            block_timestamp,
            from_address: row.from.to_lowercase(),
            to_address: row.to.to_lowercase(),
            value_wei: row.value,
            gas_used: row.gas_used.and_then(|g| g.parse::<u64>().ok()),
            gas_price_wei: row.gas_price.filter(|p| !p.is_empty()),
        })
    }
}

/// Interpret a `tokentx` response
pub fn parse_transfer_page(response: ExplorerResponse) -> Result<Vec<RawTransfer>, SourceError> {
    if response.status != "1" {
        return match check_failure(&response) {
            Some(err) => Err(err),
            None => Ok(Vec::new()),
        };
    }

    let rows: Vec<TokenTransferRow> = serde_json::from_value(response.result)
        .map_err(|e| SourceError::Malformed(format!("tokentx result: {}", e)))?;

    rows.into_iter().map(RawTransfer::try_from).collect()
}

/// Interpret a `getblocknobytime` response
pub fn parse_block_number(response: ExplorerResponse) -> Result<u64, SourceError> {
    if response.status != "1" {
        return Err(check_failure(&response)
            .unwrap_or_else(|| SourceError::Upstream(response.message.clone())));
    }

    match &response.result {
        Value::String(s) => s
            .parse::<u64>()
            .map_err(|_| SourceError::Malformed(format!("block number {:?}", s))),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| SourceError::Malformed(format!("block number {}", n))),
        other => Err(SourceError::Malformed(format!("block number {}", other))),
    }
}

/// Classify a `status != "1"` envelope. `None` means "empty result".
fn check_failure(response: &ExplorerResponse) -> Option<SourceError> {
    let detail = match &response.result {
        Value::String(s) => s.clone(),
        Value::Array(rows) if rows.is_empty() => String::new(),
        other => other.to_string(),
    };

    if detail.to_lowercase().contains("rate limit") {
        return Some(SourceError::RateLimited(detail));
    }
    if response.message.starts_with("No transactions found") || response.message == "No records found" {
        return None;
    }
    if detail.is_empty() && response.result.is_array() {
        return None;
    }
    Some(SourceError::Upstream(format!("{}: {}", response.message, detail)))
}

/// HTTP client for the explorer API
pub struct ExplorerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chain_id: u64,
    token_contract: String,
    page_size: u32,
    max_result_window: u32,
    max_retries: u32,
    retry_backoff: Duration,
    limiter: Arc<RateLimiter>,
}

impl ExplorerClient {
    pub fn new(
        source: &SourceConfig,
        chain: &ChainConfig,
        limiter: Arc<RateLimiter>,
    ) -> IndexerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(source.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: source.base_url.clone(),
            api_key: source.api_key.clone(),
            chain_id: chain.chain_id,
            token_contract: chain.token_contract.clone(),
            page_size: source.page_size,
            max_result_window: source.max_result_window,
            max_retries: source.max_retries,
            retry_backoff: Duration::from_millis(source.retry_backoff_ms),
            limiter,
        })
    }

    /// Issue one request, retrying only when the explorer throttles us
    async fn call<T, F>(&self, params: &[(&str, String)], parse: F) -> Result<T, SourceError>
    where
        F: Fn(ExplorerResponse) -> Result<T, SourceError>,
    {
        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;

            let result = match self.send(params).await {
                Ok(response) => parse(response),
                Err(e) => Err(e),
            };

            match result {
                Err(e) if e.is_rate_limited() && attempt < self.max_retries => {
                    let delay = self.retry_backoff * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Explorer throttled request, backing off: {}",
                        e
                    );
                    self.limiter.penalize(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn send(&self, params: &[(&str, String)]) -> Result<ExplorerResponse, SourceError> {
        let mut query: Vec<(&str, String)> = Vec::with_capacity(params.len() + 2);
        query.push(("chainid", self.chain_id.to_string()));
        query.extend(params.iter().cloned());
        query.push(("apikey", self.api_key.clone()));

        let response = self.http.get(&self.base_url).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))
    }

    async fn fetch_page(
        &self,
        wallet: &str,
        start_block: u64,
        page: u32,
    ) -> Result<Vec<RawTransfer>, SourceError> {
        let params = [
            ("module", "account".to_string()),
            ("action", "tokentx".to_string()),
            ("contractaddress", self.token_contract.clone()),
            ("address", wallet.to_string()),
            ("startblock", start_block.to_string()),
            ("endblock", OPEN_END_BLOCK.to_string()),
            ("page", page.to_string()),
            ("offset", self.page_size.to_string()),
            ("sort", "asc".to_string()),
        ];
        self.call(&params, parse_transfer_page).await
    }
}

#[async_trait]
impl TransferSource for ExplorerClient {
    async fn fetch_transfers(
        &self,
        wallet: &str,
        start_block: u64,
    ) -> Result<Vec<RawTransfer>, SourceError> {
        let mut transfers = Vec::new();
        let mut seen = HashSet::new();
        let mut window_start = start_block;
        let mut page = 1u32;

        loop {
            let rows = self.fetch_page(wallet, window_start, page).await?;
            let row_count = rows.len();
            debug!(wallet, window_start, page, rows = row_count, "Fetched transfer page");

            let last_block = rows.last().map(|t| t.block_number);
            for transfer in rows {
                if seen.insert(transfer.tx_hash.clone()) {
                    transfers.push(transfer);
                }
            }

            if row_count < self.page_size as usize {
                break;
            }

            // The explorer refuses page * offset beyond its result window, so
            // restart the walk from the last block we have seen.
            if (page + 1).saturating_mul(self.page_size) > self.max_result_window {
                match last_block {
                    Some(block) if block > window_start => {
                        window_start = block;
                        page = 1;
                    }
                    _ => {
                        warn!(
                            wallet,
                            window_start,
                            "Result window exhausted within a single block, truncating walk"
                        );
                        break;
                    }
                }
            } else {
                page += 1;
            }
        }

        Ok(transfers)
    }

    async fn block_at_or_before(&self, unix_ts: i64) -> Result<u64, SourceError> {
        let params = [
            ("module", "block".to_string()),
            ("action", "getblocknobytime".to_string()),
            ("timestamp", unix_ts.to_string()),
            ("closest", "before".to_string()),
        ];
        self.call(&params, parse_block_number).await
    }
}
