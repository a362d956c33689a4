//! End-to-end scenarios against mocked node and explorer servers.

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trace_indexer_logic::{
    abi::FallbackChain,
    enumerator::TxEnumerator,
    etherscan::EtherscanClient,
    node_client::NodeClient,
    settings::{
        BlockRangeSettings, ContractsSettings, EtherscanSettings, ExtractionSettings,
        IndexerSettings, NodeSettings, StreamSettings,
    },
    types::CallKind,
    Pipeline,
};

const SEED: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const FACTORY_CHILD: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const GRANDCHILD: &str = "0xcccccccccccccccccccccccccccccccccccccccc";
const SENDER: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

const TX_1: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
const TX_2: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

const TRANSFER_TOPIC0: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

fn settings(node: &MockServer, explorer: &MockServer) -> IndexerSettings {
    IndexerSettings {
        node: NodeSettings {
            protocol: "http://".to_string(),
            host: node.address().ip().to_string(),
            port: node.address().port(),
            max_attempts: 2,
            retry_delay_ms: 1,
            concurrency: 2,
        },
        etherscan: EtherscanSettings {
            api_key: "test-key".to_string(),
            base_url: format!("{}/api", explorer.uri()),
            max_retries: 1,
            request_delay_ms: 0,
        },
        contracts: ContractsSettings {
            dapp: vec![SEED.to_string()],
            non_dapp: vec![],
        },
        block_range: BlockRangeSettings {
            min_block: 100,
            max_block: 200,
        },
        extraction: ExtractionSettings {
            normal_transactions: true,
            internal_transactions: false,
            transactions_by_events: false,
        },
        ..Default::default()
    }
}

fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    }))
}

fn tx_list_page(rows: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "1",
        "message": "OK",
        "result": rows,
    }))
}

fn empty_tx_list() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "0",
        "message": "No transactions found",
        "result": [],
    }))
}

fn pad_address(address: &str) -> String {
    format!("0x{:0>64}", address.trim_start_matches("0x"))
}

fn transaction_json(hash: &str, index: u64) -> Value {
    json!({
        "hash": hash,
        "nonce": "0x0",
        "blockHash": format!("0x{:064x}", 0xb10c_u64),
        "blockNumber": "0x64",
        "transactionIndex": format!("0x{index:x}"),
        "from": SENDER,
        "to": SEED,
        "value": "0x0",
        "gasPrice": "0x1",
        "gas": "0x5208",
        "input": "0x",
        "v": "0x1b",
        "r": "0x1",
        "s": "0x1",
    })
}

async fn mount_tx_list(explorer: &MockServer, address: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("module", "account"))
        .and(query_param("action", "txlist"))
        .and(query_param("address", address))
        .respond_with(response)
        .mount(explorer)
        .await;
}

async fn mount_abi_not_verified(explorer: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("module", "contract"))
        .and(query_param("action", "getabi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Contract source code not verified",
        })))
        .mount(explorer)
        .await;
}

async fn mount_trace(node: &MockServer, tx_hash: &str, trace: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "debug_traceTransaction",
            "params": [tx_hash],
        })))
        .respond_with(rpc_result(trace))
        .mount(node)
        .await;
}

async fn mount_transaction(node: &MockServer, tx_hash: &str, index: u64) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getTransactionByHash",
            "params": [tx_hash],
        })))
        .respond_with(rpc_result(transaction_json(tx_hash, index)))
        .mount(node)
        .await;
}

/// Seed → CREATE → child → CREATE → grandchild, discovered over three
/// iterations; an ERC-20 Transfer decodes through the fallback chain and a
/// reverted transaction flags all of its rows.
#[tokio::test]
async fn fixed_point_discovery_decodes_and_flags() {
    let node = MockServer::start().await;
    let explorer = MockServer::start().await;

    mount_tx_list(
        &explorer,
        SEED,
        tx_list_page(json!([
            {"hash": TX_1, "blockNumber": "100", "timeStamp": "1600000000"},
        ])),
    )
    .await;
    mount_tx_list(
        &explorer,
        FACTORY_CHILD,
        tx_list_page(json!([
            {"hash": TX_2, "blockNumber": "101", "timeStamp": "1600000013"},
        ])),
    )
    .await;
    mount_tx_list(&explorer, GRANDCHILD, empty_tx_list()).await;
    mount_abi_not_verified(&explorer).await;

    mount_trace(
        &node,
        TX_1,
        json!({
            "type": "CALL",
            "from": SENDER,
            "to": SEED,
            "value": "0x0",
            "gas": "0x30d40",
            "gasUsed": "0x2a8b0",
            "input": "0x",
            "calls": [
                {"type": "CREATE", "from": SEED, "to": FACTORY_CHILD,
                 "value": "0x0", "gas": "0x1e848", "gasUsed": "0x1adb0", "input": "0x60"}
            ],
            "logs": [
                {"address": SEED,
                 "topics": [TRANSFER_TOPIC0, pad_address(SENDER), pad_address(FACTORY_CHILD)],
                 "data": format!("0x{:064x}", 1_000u64)}
            ]
        }),
    )
    .await;
    mount_trace(
        &node,
        TX_2,
        json!({
            "type": "CALL",
            "from": SENDER,
            "to": FACTORY_CHILD,
            "value": "0x0",
            "gas": "0x30d40",
            "gasUsed": "0x30d40",
            "input": "0x",
            "error": "out of gas",
            "calls": [
                {"type": "CREATE2", "from": FACTORY_CHILD, "to": GRANDCHILD,
                 "value": "0x0", "gas": "0x1e848", "gasUsed": "0x1adb0", "input": "0x60"}
            ]
        }),
    )
    .await;
    mount_transaction(&node, TX_1, 0).await;
    mount_transaction(&node, TX_2, 1).await;

    let mut settings = settings(&node, &explorer);
    settings.decoding.dapp = StreamSettings {
        events: true,
        calls: true,
        zero_value_calls: true,
        delegatecalls: true,
        creations: true,
    };

    let pipeline = Pipeline::new(settings).unwrap();
    let output = pipeline.run().await.unwrap();

    let dapp: Vec<&str> = output
        .extraction
        .contracts_dapp
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(dapp, vec![SEED, FACTORY_CHILD, GRANDCHILD]);

    assert_eq!(output.extraction.rows.len(), 5);
    assert!(output.extraction.invalid_txs.is_empty());
    for row in &output.extraction.rows {
        let expected_index = if row.tx_hash == TX_1 { 0 } else { 1 };
        assert_eq!(row.transaction_index, Some(expected_index));
    }

    let events = &output.log.events_dapp;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].activity, "Transfer");
    assert!(events[0].decoded);
    let params: Vec<&str> = events[0].params.keys().map(String::as_str).collect();
    assert_eq!(params, vec!["_from", "_to", "_value"]);
    assert!(!events[0].is_reverted);

    let creations = &output.log.creations_dapp;
    assert_eq!(creations.len(), 2);
    let create2 = creations
        .iter()
        .find(|row| row.tx_hash == TX_2)
        .expect("creation of the grandchild");
    assert!(create2.is_reverted);
    assert_eq!(create2.calltype, CallKind::Create2);
    assert_eq!(output.log.summary.reverted_transactions, 1);

    // Zero-value root calls land in the zero-value stream, undecoded
    // because nothing is verified.
    assert_eq!(output.log.zero_value_calls_dapp.len(), 2);
    assert!(output
        .log
        .zero_value_calls_dapp
        .iter()
        .all(|row| row.activity == "CALL" && !row.decoded));
}

/// Same deployment chain, but the child is deny-listed: the branch is
/// pruned and the grandchild is never discovered.
#[tokio::test]
async fn deny_listed_branch_is_never_adopted() {
    let node = MockServer::start().await;
    let explorer = MockServer::start().await;

    mount_tx_list(
        &explorer,
        SEED,
        tx_list_page(json!([
            {"hash": TX_1, "blockNumber": "100", "timeStamp": "1600000000"},
        ])),
    )
    .await;
    mount_abi_not_verified(&explorer).await;
    mount_trace(
        &node,
        TX_1,
        json!({
            "type": "CALL",
            "from": SENDER,
            "to": SEED,
            "value": "0x0",
            "calls": [
                {"type": "CREATE", "from": SEED, "to": FACTORY_CHILD, "value": "0x0"}
            ]
        }),
    )
    .await;
    mount_transaction(&node, TX_1, 0).await;

    let mut settings = settings(&node, &explorer);
    settings.contracts.non_dapp = vec![FACTORY_CHILD.to_string()];

    let pipeline = Pipeline::new(settings).unwrap();
    let output = pipeline.run().await.unwrap();

    let dapp: Vec<&str> = output
        .extraction
        .contracts_dapp
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(dapp, vec![SEED]);
    // The frontier emptied after pruning, so only the seed was enumerated.
    assert_eq!(output.extraction.seen_txs.len(), 1);
}

/// A full explorer page (exactly 10,000 rows) requeries from the page's
/// maximum block number, not one past it, so intra-block siblings are not
/// lost; 23,000 transactions come back in three requests.
#[tokio::test]
async fn explorer_paging_requeries_from_max_block() {
    let node = MockServer::start().await;
    let explorer = MockServer::start().await;

    let page = |from: u64, to: u64| -> Value {
        let rows: Vec<Value> = (from..=to)
            .map(|i| {
                json!({
                    "hash": format!("0x{i:064x}"),
                    "blockNumber": i.to_string(),
                    "timeStamp": (1_600_000_000 + i).to_string(),
                })
            })
            .collect();
        Value::Array(rows)
    };

    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("action", "txlist"))
        .and(query_param("startblock", "1"))
        .respond_with(tx_list_page(page(1, 10_000)))
        .expect(1)
        .mount(&explorer)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("action", "txlist"))
        .and(query_param("startblock", "10000"))
        .respond_with(tx_list_page(page(10_000, 19_999)))
        .expect(1)
        .mount(&explorer)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("action", "txlist"))
        .and(query_param("startblock", "19999"))
        .respond_with(tx_list_page(page(19_999, 23_000)))
        .expect(1)
        .mount(&explorer)
        .await;

    let mut settings = settings(&node, &explorer);
    settings.block_range = BlockRangeSettings {
        min_block: 1,
        max_block: 30_000,
    };
    let enumerator = TxEnumerator::new(
        NodeClient::new(&settings.node).unwrap(),
        EtherscanClient::new(&settings.etherscan).unwrap(),
        settings.extraction.clone(),
    );
    let frontier = [SEED.to_string()].into_iter().collect();
    let enumerated = enumerator
        .enumerate(&frontier, 1, 30_000, &Default::default())
        .await
        .unwrap();

    assert_eq!(enumerated.records.len(), 23_000);
    assert!(enumerated.unresolved.is_empty());
}

/// `max_block < min_block` yields zero candidates, zero iterations and
/// empty outputs without an error.
#[tokio::test]
async fn inverted_block_range_is_a_clean_no_op() {
    let node = MockServer::start().await;
    let explorer = MockServer::start().await;
    mount_tx_list(&explorer, SEED, empty_tx_list()).await;

    let mut settings = settings(&node, &explorer);
    settings.block_range = BlockRangeSettings {
        min_block: 200,
        max_block: 100,
    };

    let pipeline = Pipeline::new(settings).unwrap();
    let output = pipeline.run().await.unwrap();
    assert!(output.extraction.rows.is_empty());
    assert!(output.extraction.seen_txs.is_empty());
    assert_eq!(output.extraction.contracts_dapp.len(), 1);
    assert!(output.log.merged().is_empty());
}

/// A definitive node error for one transaction marks it invalid and the
/// run continues with the remaining ones.
#[tokio::test]
async fn invalid_trace_is_skipped_not_fatal() {
    let node = MockServer::start().await;
    let explorer = MockServer::start().await;

    mount_tx_list(
        &explorer,
        SEED,
        tx_list_page(json!([
            {"hash": TX_1, "blockNumber": "100", "timeStamp": "1600000000"},
            {"hash": TX_2, "blockNumber": "101", "timeStamp": "1600000013"},
        ])),
    )
    .await;
    mount_abi_not_verified(&explorer).await;

    mount_trace(
        &node,
        TX_1,
        json!({"type": "CALL", "from": SENDER, "to": SEED, "value": "0x0"}),
    )
    .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "debug_traceTransaction",
            "params": [TX_2],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "transaction not found"},
        })))
        .mount(&node)
        .await;
    mount_transaction(&node, TX_1, 0).await;

    let pipeline = Pipeline::new(settings(&node, &explorer)).unwrap();
    let output = pipeline.run().await.unwrap();

    assert_eq!(output.extraction.invalid_txs, vec![TX_2.to_string()]);
    assert_eq!(output.extraction.rows.len(), 1);
    assert_eq!(output.extraction.rows[0].tx_hash, TX_1);
}

/// By-events enumeration chunks the range, extracts one record per log and
/// caches block timestamps across consecutive logs of the same block.
#[tokio::test]
async fn by_events_enumeration_caches_block_timestamps() {
    let node = MockServer::start().await;
    let explorer = MockServer::start().await;

    let log = |block: u64, tx: &str| {
        json!({
            "address": SEED,
            "topics": [TRANSFER_TOPIC0],
            "data": "0x",
            "blockNumber": format!("0x{block:x}"),
            "transactionHash": tx,
            "transactionIndex": "0x0",
            "logIndex": "0x0",
            "blockHash": format!("0x{:064x}", 0xb10c_u64),
            "removed": false,
        })
    };
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getLogs"})))
        .respond_with(rpc_result(json!([
            log(150, TX_1),
            log(150, TX_1),
            log(151, TX_2),
        ])))
        .expect(1)
        .mount(&node)
        .await;

    let block_json = |number: u64, timestamp: u64| -> Value {
        json!({
            "hash": format!("0x{number:064x}"),
            "parentHash": format!("0x{:064x}", number - 1),
            "sha3Uncles": format!("0x{:064x}", 0u64),
            "miner": "0x0000000000000000000000000000000000000000",
            "stateRoot": format!("0x{:064x}", 0u64),
            "transactionsRoot": format!("0x{:064x}", 0u64),
            "receiptsRoot": format!("0x{:064x}", 0u64),
            "number": format!("0x{number:x}"),
            "gasUsed": "0x0",
            "gasLimit": "0x1c9c380",
            "extraData": "0x",
            "logsBloom": format!("0x{:0512x}", 0u64),
            "timestamp": format!("0x{timestamp:x}"),
            "difficulty": "0x0",
            "totalDifficulty": "0x0",
            "sealFields": [],
            "uncles": [],
            "transactions": [],
            "size": "0x0",
            "mixHash": format!("0x{:064x}", 0u64),
            "nonce": "0x0000000000000000",
        })
    };
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getBlockByNumber",
            "params": ["0x96"],
        })))
        .respond_with(rpc_result(block_json(150, 1_600_000_100)))
        .expect(1)
        .mount(&node)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getBlockByNumber",
            "params": ["0x97"],
        })))
        .respond_with(rpc_result(block_json(151, 1_600_000_113)))
        .expect(1)
        .mount(&node)
        .await;

    let mut settings = settings(&node, &explorer);
    settings.extraction = ExtractionSettings {
        normal_transactions: false,
        internal_transactions: false,
        transactions_by_events: true,
    };
    let enumerator = TxEnumerator::new(
        NodeClient::new(&settings.node).unwrap(),
        EtherscanClient::new(&settings.etherscan).unwrap(),
        settings.extraction.clone(),
    );
    let frontier = [SEED.to_string()].into_iter().collect();
    let enumerated = enumerator
        .enumerate(&frontier, 100, 200, &Default::default())
        .await
        .unwrap();

    // Two distinct transactions survive keep-last deduplication.
    assert_eq!(enumerated.records.len(), 2);
    assert_eq!(enumerated.records[0].hash, TX_1);
    assert_eq!(enumerated.records[0].block_number, 150);
    assert_eq!(enumerated.records[0].timestamp, 1_600_000_100);
    assert_eq!(enumerated.records[1].hash, TX_2);
    assert_eq!(enumerated.records[1].timestamp, 1_600_000_113);
}

/// `eth_getCode` answers are advisory address-type hints; self-destructed
/// contracts return empty code, so nothing in the pipeline gates on them.
#[tokio::test]
async fn code_lookup_and_preflight() {
    let node = MockServer::start().await;
    let explorer = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_blockNumber"})))
        .respond_with(rpc_result(json!("0xc8")))
        .mount(&node)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getCode",
            "params": [SEED],
        })))
        .respond_with(rpc_result(json!("0x6001")))
        .mount(&node)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getCode",
            "params": [GRANDCHILD],
        })))
        .respond_with(rpc_result(json!("0x")))
        .mount(&node)
        .await;

    let client = NodeClient::new(&settings(&node, &explorer).node).unwrap();
    assert_eq!(client.block_number().await.unwrap(), 200);
    assert_eq!(client.get_code(SEED).await.unwrap(), vec![0x60, 0x01]);
    assert!(client.get_code(GRANDCHILD).await.unwrap().is_empty());
}

/// Re-decoding the same extraction against the same registry produces
/// identical output.
#[tokio::test]
async fn decoding_is_idempotent() {
    let node = MockServer::start().await;
    let explorer = MockServer::start().await;

    mount_tx_list(
        &explorer,
        SEED,
        tx_list_page(json!([
            {"hash": TX_1, "blockNumber": "100", "timeStamp": "1600000000"},
        ])),
    )
    .await;
    mount_abi_not_verified(&explorer).await;
    mount_trace(
        &node,
        TX_1,
        json!({
            "type": "CALL",
            "from": SENDER,
            "to": SEED,
            "value": "0x0",
            "logs": [
                {"address": SEED,
                 "topics": [TRANSFER_TOPIC0, pad_address(SENDER), pad_address(FACTORY_CHILD)],
                 "data": format!("0x{:064x}", 7u64)}
            ]
        }),
    )
    .await;
    mount_transaction(&node, TX_1, 0).await;

    let pipeline = Pipeline::new(settings(&node, &explorer)).unwrap();
    let extraction = pipeline.extract().await.unwrap();
    let registry = pipeline.resolve_abis(&extraction).await;
    let chain = FallbackChain::standard();

    let first = pipeline.decode(&extraction, &registry, &chain);
    let second = pipeline.decode(&extraction, &registry, &chain);
    let serialize = |log: &trace_indexer_logic::log_assembler::DecodedLog| {
        serde_json::to_string(&log.merged()).unwrap()
    };
    assert_eq!(serialize(&first), serialize(&second));
}
