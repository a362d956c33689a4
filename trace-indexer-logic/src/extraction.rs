use std::collections::{BTreeSet, HashMap, HashSet};

use futures::{stream, StreamExt};

use crate::{
    create_relations::create_relations,
    enumerator::{TxEnumerator, TxRecord},
    error::Error,
    node_client::NodeClient,
    reconstructor::flatten_trace,
    settings::IndexerSettings,
    types::{normalize, ContractSet, TraceRow},
};

/// Everything the discovery loop produced: the flattened trace relation,
/// the final contract set and the units that could not be resolved.
#[derive(Debug)]
pub struct Extraction {
    pub rows: Vec<TraceRow>,
    pub contracts_dapp: ContractSet,
    /// First seed address; keys the run artifacts.
    pub base_contract: String,
    pub seen_txs: HashSet<String>,
    pub invalid_txs: Vec<String>,
    pub unresolved_contracts: Vec<String>,
}

/// Fixed-point driver over enumeration, trace reconstruction and
/// CREATE-relation analysis.
///
/// Iterations are strictly sequential (each depends on the widened set of
/// the previous one); within an iteration the per-transaction trace
/// reconstruction fans out over bounded concurrency and is reduced
/// single-threadedly into the row collection.
pub struct DiscoveryDriver {
    node: NodeClient,
    enumerator: TxEnumerator,
    concurrency: usize,
}

impl DiscoveryDriver {
    pub fn new(node: NodeClient, enumerator: TxEnumerator, concurrency: usize) -> Self {
        Self {
            node,
            enumerator,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(&self, settings: &IndexerSettings) -> Result<Extraction, Error> {
        let seeds: Vec<String> = settings.contracts.dapp.iter().map(|a| normalize(a)).collect();
        let base_contract = seeds
            .first()
            .cloned()
            .ok_or_else(|| Error::Config("empty seed set".to_string()))?;
        let deny_list: ContractSet = settings
            .contracts
            .non_dapp
            .iter()
            .map(|a| normalize(a))
            .collect();

        let mut contracts_dapp: ContractSet = seeds.into_iter().collect();
        let mut frontier = contracts_dapp.clone();
        let mut seen_txs: HashSet<String> = HashSet::new();
        let mut rows: Vec<TraceRow> = Vec::new();
        let mut invalid_txs: Vec<String> = Vec::new();
        let mut unresolved_contracts: Vec<String> = Vec::new();

        let min_block = settings.block_range.min_block;
        let max_block = settings.block_range.max_block;
        let mut level = 1u32;

        while !frontier.is_empty() {
            let mut enumerated = self
                .enumerator
                .enumerate(&frontier, min_block, max_block, &seen_txs)
                .await?;
            unresolved_contracts.append(&mut enumerated.unresolved);
            if enumerated.records.is_empty() {
                tracing::info!("no additional transactions were found, extraction ends");
                break;
            }
            tracing::info!(
                level,
                new_transactions = enumerated.records.len(),
                "computing traces"
            );
            seen_txs.extend(enumerated.records.iter().map(|r| r.hash.clone()));

            let (mut new_rows, mut invalid) = self.reconstruct(enumerated.records).await;
            rows.append(&mut new_rows);
            invalid_txs.append(&mut invalid);

            let adopted = create_relations(&rows, &mut contracts_dapp, &deny_list);
            tracing::info!(level, new_contracts = adopted.len(), "discovery iteration complete");
            frontier = adopted;
            level += 1;
        }

        enrich_transaction_indexes(&self.node, &mut rows).await;

        tracing::info!(
            operations = rows.len(),
            contracts = contracts_dapp.len(),
            invalid_txs = invalid_txs.len(),
            "extraction finished"
        );
        Ok(Extraction {
            rows,
            contracts_dapp,
            base_contract,
            seen_txs,
            invalid_txs,
            unresolved_contracts,
        })
    }

    /// Recomputes and flattens traces for a batch of transactions. Each
    /// transaction is independent; `buffered` keeps the reduce order equal
    /// to the enumeration order so repeated runs produce identical output.
    async fn reconstruct(&self, records: Vec<TxRecord>) -> (Vec<TraceRow>, Vec<String>) {
        let results: Vec<(TxRecord, Result<serde_json::Value, Error>)> =
            stream::iter(records.into_iter().map(|record| {
                let node = self.node.clone();
                async move {
                    let trace = node.trace_transaction(&record.hash).await;
                    (record, trace)
                }
            }))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut rows = Vec::new();
        let mut invalid = Vec::new();
        for (record, outcome) in results {
            match outcome {
                Ok(trace) => rows.extend(flatten_trace(&record, trace)),
                Err(err) => {
                    tracing::error!(tx_hash = %record.hash, error = %err, "invalid trace, transaction skipped");
                    invalid.push(record.hash);
                }
            }
        }
        (rows, invalid)
    }
}

/// Joins `transactionIndex` onto every row so rows of different
/// transactions in the same block order consistently. Failures leave the
/// index unset and are reported, never fatal.
pub async fn enrich_transaction_indexes(node: &NodeClient, rows: &mut [TraceRow]) {
    let hashes: BTreeSet<String> = rows.iter().map(|row| row.tx_hash.clone()).collect();
    let total = hashes.len();
    let mut indexes: HashMap<String, u64> = HashMap::new();
    for (position, hash) in hashes.into_iter().enumerate() {
        match node.transaction_index(&hash).await {
            Ok(Some(index)) => {
                indexes.insert(hash, index);
            }
            Ok(None) => {
                tracing::warn!(tx_hash = %hash, "transaction has no index (pending or unknown)");
            }
            Err(err) => {
                tracing::warn!(tx_hash = %hash, error = %err, "failed to retrieve transaction index");
            }
        }
        if (position + 1) % 100 == 0 || position + 1 == total {
            tracing::info!(processed = position + 1, total, "transaction index query");
        }
    }
    for row in rows.iter_mut() {
        row.transaction_index = indexes.get(&row.tx_hash).copied();
    }
}
