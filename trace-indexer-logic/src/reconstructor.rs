use serde_json::{Map, Value};

use crate::{
    enumerator::TxRecord,
    types::{normalize, CallKind, HexNumber, TraceRow},
};

/// Flattens the call-tracer tree of one transaction into rows.
///
/// The tree is consumed as an owned value and walked once in pre-order;
/// `trace_pos` is a shared counter incremented on entry to every object
/// node (call frames and log objects both count, list wrappers do not),
/// with the `calls` array visited before `logs`. `trace_pos_depth` is the
/// dotted child path, where the per-parent child counter keeps running
/// across the `calls` and `logs` arrays. This walk reproduces the ordering
/// of the historical datasets bit for bit; do not "clean it up".
pub fn flatten_trace(record: &TxRecord, trace: Value) -> Vec<TraceRow> {
    let mut rows = Vec::new();
    if let Value::Object(root) = trace {
        let mut counter = 0u64;
        walk_call(&root, "1".to_string(), &mut counter, record, &mut rows);
    }
    rows
}

fn walk_call(
    node: &Map<String, Value>,
    path: String,
    counter: &mut u64,
    record: &TxRecord,
    rows: &mut Vec<TraceRow>,
) {
    *counter += 1;
    rows.push(call_row(node, *counter, path.clone(), record));

    let mut child = 0usize;
    if let Some(Value::Array(calls)) = node.get("calls") {
        for value in calls {
            if let Value::Object(nested) = value {
                child += 1;
                walk_call(nested, format!("{path}.{child}"), counter, record, rows);
            }
        }
    }
    if let Some(Value::Array(logs)) = node.get("logs") {
        for value in logs {
            if let Value::Object(log) = value {
                child += 1;
                *counter += 1;
                rows.push(log_row(log, *counter, format!("{path}.{child}"), record));
            }
        }
    }
}

fn call_row(node: &Map<String, Value>, pos: u64, path: String, record: &TxRecord) -> TraceRow {
    TraceRow {
        tx_hash: record.hash.clone(),
        block_number: record.block_number,
        timestamp: record.timestamp,
        transaction_index: None,
        trace_pos: pos,
        trace_pos_depth: path,
        kind: str_field(node, "type")
            .map(|kind| CallKind::parse(&kind))
            .unwrap_or_else(|| CallKind::Other("UNKNOWN".to_string())),
        from: address_field(node, "from"),
        to: address_field(node, "to"),
        gas: number_field(node, "gas"),
        gas_used: number_field(node, "gasUsed"),
        call_value: number_field(node, "value"),
        input: str_field(node, "input"),
        output: str_field(node, "output"),
        error: str_field(node, "error"),
        address: None,
        topics: Vec::new(),
        data: None,
    }
}

fn log_row(node: &Map<String, Value>, pos: u64, path: String, record: &TxRecord) -> TraceRow {
    let topics = match node.get("topics") {
        Some(Value::Array(topics)) => topics
            .iter()
            .filter_map(Value::as_str)
            .map(normalize)
            .collect(),
        _ => Vec::new(),
    };
    TraceRow {
        tx_hash: record.hash.clone(),
        block_number: record.block_number,
        timestamp: record.timestamp,
        transaction_index: None,
        trace_pos: pos,
        trace_pos_depth: path,
        kind: CallKind::Log,
        from: None,
        to: None,
        gas: None,
        gas_used: None,
        call_value: None,
        input: None,
        output: None,
        error: None,
        address: address_field(node, "address"),
        topics,
        data: str_field(node, "data"),
    }
}

fn str_field(node: &Map<String, Value>, key: &str) -> Option<String> {
    node.get(key).and_then(Value::as_str).map(str::to_string)
}

fn address_field(node: &Map<String, Value>, key: &str) -> Option<String> {
    node.get(key).and_then(Value::as_str).map(normalize)
}

fn number_field(node: &Map<String, Value>, key: &str) -> Option<HexNumber> {
    node.get(key)
        .and_then(Value::as_str)
        .map(HexNumber::parse)
}
