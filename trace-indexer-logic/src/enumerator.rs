use std::collections::{HashMap, HashSet};

use crate::{
    error::Error,
    etherscan::{EtherscanClient, TxListKind, PAGE_SIZE},
    node_client::NodeClient,
    settings::ExtractionSettings,
    types::{normalize, ContractSet},
};

/// Inclusive window size for `eth_getLogs` chunking.
pub const LOG_CHUNK_SIZE: u64 = 10_000;

/// Candidate transaction produced by one of the enumeration sources.
#[derive(Debug, Clone)]
pub struct TxRecord {
    pub hash: String,
    pub block_number: u64,
    /// Block timestamp, seconds since epoch.
    pub timestamp: u64,
    /// Frontier contract that surfaced this transaction (by-events source).
    pub contract_address: Option<String>,
}

/// Result of one enumeration pass over the current frontier.
#[derive(Debug, Default)]
pub struct Enumerated {
    pub records: Vec<TxRecord>,
    /// Contracts whose transaction lists could not be fetched; the run
    /// continues without them and reports them in the summary.
    pub unresolved: Vec<String>,
}

/// Enumerates candidate transaction hashes for the discovery loop from the
/// explorer transaction lists and from on-chain event logs.
pub struct TxEnumerator {
    node: NodeClient,
    etherscan: EtherscanClient,
    sources: ExtractionSettings,
}

impl TxEnumerator {
    pub fn new(node: NodeClient, etherscan: EtherscanClient, sources: ExtractionSettings) -> Self {
        Self {
            node,
            etherscan,
            sources,
        }
    }

    /// Collects candidates for every frontier contract inside
    /// `[min_block, max_block]`, deduplicates keep-last by hash and drops
    /// everything in `seen` so the discovery loop terminates.
    pub async fn enumerate(
        &self,
        frontier: &ContractSet,
        min_block: u64,
        max_block: u64,
        seen: &HashSet<String>,
    ) -> Result<Enumerated, Error> {
        if !self.sources.normal_transactions
            && !self.sources.internal_transactions
            && !self.sources.transactions_by_events
        {
            return Err(Error::Config(
                "all transaction extraction sources are disabled".to_string(),
            ));
        }

        let mut records = Vec::new();
        let mut unresolved = Vec::new();

        if self.sources.normal_transactions {
            self.account_txs(
                TxListKind::Normal,
                frontier,
                min_block,
                max_block,
                &mut records,
                &mut unresolved,
            )
            .await;
        }
        if self.sources.internal_transactions {
            self.account_txs(
                TxListKind::Internal,
                frontier,
                min_block,
                max_block,
                &mut records,
                &mut unresolved,
            )
            .await;
        }
        if self.sources.transactions_by_events {
            self.txs_by_events(frontier, min_block, max_block, &mut records, &mut unresolved)
                .await;
        }

        let records = dedup_keep_last(records);
        let records: Vec<TxRecord> = records
            .into_iter()
            .filter(|record| !seen.contains(&record.hash))
            .collect();
        Ok(Enumerated {
            records,
            unresolved,
        })
    }

    async fn account_txs(
        &self,
        kind: TxListKind,
        frontier: &ContractSet,
        min_block: u64,
        max_block: u64,
        records: &mut Vec<TxRecord>,
        unresolved: &mut Vec<String>,
    ) {
        for (position, contract) in frontier.iter().enumerate() {
            match self
                .account_txs_for_contract(kind, contract, min_block, max_block)
                .await
            {
                Ok(mut found) => {
                    records.append(&mut found);
                    tracing::info!(
                        source = kind.label(),
                        contract = %contract,
                        position = position + 1,
                        contracts = frontier.len(),
                        total = records.len(),
                        "transaction lists received"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        source = kind.label(),
                        contract = %contract,
                        error = %err,
                        "transactions could not be received, contract is skipped"
                    );
                    unresolved.push(contract.clone());
                }
            }
        }
    }

    async fn account_txs_for_contract(
        &self,
        kind: TxListKind,
        contract: &str,
        min_block: u64,
        max_block: u64,
    ) -> Result<Vec<TxRecord>, Error> {
        let mut records = Vec::new();
        let mut start_block = min_block;
        loop {
            let page = self
                .etherscan
                .tx_list(kind, contract, start_block, max_block)
                .await?;
            let page_len = page.len();
            let mut page_max_block = start_block;
            for row in page {
                let block_number = row.block_number.parse::<u64>().unwrap_or_default();
                page_max_block = page_max_block.max(block_number);
                records.push(TxRecord {
                    hash: normalize(&row.hash),
                    block_number,
                    timestamp: row.time_stamp.parse::<u64>().unwrap_or_default(),
                    contract_address: None,
                });
            }
            if page_len < PAGE_SIZE {
                break;
            }
            // A full page likely cut a block in half, so the requery starts
            // at the page's maximum block number, not one past it.
            if page_max_block <= start_block {
                tracing::warn!(contract, start_block, "paging made no progress, stopping");
                break;
            }
            start_block = page_max_block;
        }
        Ok(records)
    }

    async fn txs_by_events(
        &self,
        frontier: &ContractSet,
        min_block: u64,
        max_block: u64,
        records: &mut Vec<TxRecord>,
        unresolved: &mut Vec<String>,
    ) {
        tracing::info!("starting to get transactions by events");
        // Block objects are fetched once per block number and reused across
        // consecutive logs.
        let mut timestamps: HashMap<u64, u64> = HashMap::new();
        for (position, contract) in frontier.iter().enumerate() {
            let mut failed = false;
            for (chunk_start, chunk_end) in log_windows(min_block, max_block) {
                let logs = match self.node.get_logs(contract, chunk_start, chunk_end).await {
                    Ok(logs) => logs,
                    Err(err) => {
                        tracing::error!(
                            contract = %contract,
                            chunk_start,
                            chunk_end,
                            error = %err,
                            "failed to retrieve events, contract is skipped"
                        );
                        failed = true;
                        break;
                    }
                };
                tracing::debug!(
                    contract = %contract,
                    chunk_start,
                    chunk_end,
                    count = logs.len(),
                    "events fetched"
                );
                for log in logs {
                    let (Some(block_number), Some(tx_hash)) =
                        (log.block_number, log.transaction_hash)
                    else {
                        continue;
                    };
                    let block_number = block_number.as_u64();
                    let timestamp = match timestamps.get(&block_number) {
                        Some(timestamp) => *timestamp,
                        None => match self.node.block_timestamp(block_number).await {
                            Ok(timestamp) => {
                                timestamps.insert(block_number, timestamp);
                                timestamp
                            }
                            Err(err) => {
                                tracing::warn!(block_number, error = %err, "no block timestamp, log skipped");
                                continue;
                            }
                        },
                    };
                    records.push(TxRecord {
                        hash: normalize(&format!("{tx_hash:#x}")),
                        block_number,
                        timestamp,
                        contract_address: Some(contract.clone()),
                    });
                }
            }
            if failed {
                unresolved.push(contract.clone());
            } else {
                tracing::info!(
                    contract = %contract,
                    position = position + 1,
                    contracts = frontier.len(),
                    total = records.len(),
                    "event-based transactions collected"
                );
            }
        }
    }
}

/// Inclusive `eth_getLogs` windows of [`LOG_CHUNK_SIZE`] blocks, the last
/// one capped at `max_block`.
fn log_windows(min_block: u64, max_block: u64) -> Vec<(u64, u64)> {
    let mut windows = Vec::new();
    let mut chunk_start = min_block;
    while chunk_start <= max_block {
        let chunk_end = max_block.min(chunk_start.saturating_add(LOG_CHUNK_SIZE - 1));
        windows.push((chunk_start, chunk_end));
        if chunk_end == max_block {
            break;
        }
        chunk_start = chunk_end + 1;
    }
    windows
}

/// Keep-last deduplication by transaction hash: the surviving record is the
/// latest occurrence, at its original position among the kept rows.
fn dedup_keep_last(records: Vec<TxRecord>) -> Vec<TxRecord> {
    let mut seen = HashSet::new();
    let mut kept: Vec<TxRecord> = records
        .into_iter()
        .rev()
        .filter(|record| seen.insert(record.hash.clone()))
        .collect();
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, block_number: u64) -> TxRecord {
        TxRecord {
            hash: hash.to_string(),
            block_number,
            timestamp: 0,
            contract_address: None,
        }
    }

    #[test]
    fn dedup_keeps_the_last_occurrence() {
        let records = vec![record("0xa", 1), record("0xb", 2), record("0xa", 3)];
        let deduped = dedup_keep_last(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].hash, "0xb");
        assert_eq!(deduped[1].hash, "0xa");
        assert_eq!(deduped[1].block_number, 3);
    }

    #[test]
    fn log_windows_are_inclusive_chunks() {
        assert_eq!(
            log_windows(5_000, 27_500),
            vec![(5_000, 14_999), (15_000, 24_999), (25_000, 27_500)]
        );
        assert_eq!(log_windows(100, 100), vec![(100, 100)]);
        assert!(log_windows(10, 9).is_empty());
    }
}
