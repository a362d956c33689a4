use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use ethers::types::{H160, H256, U256};
use serde::{Serialize, Serializer};

use crate::error::Error;

/// The growing set of addresses considered part of the DApp. Addresses are
/// stored in normalized (lowercase, `0x`-prefixed) form; `BTreeSet` keeps
/// iteration deterministic across runs.
pub type ContractSet = BTreeSet<String>;

/// Row-level `error` values that flag the whole transaction as reverted.
pub const REVERTED_ERRORS: [&str; 6] = [
    "execution reverted",
    "out of gas",
    "invalid jump destination",
    "write protection",
    "invalid opcode: INVALID",
    "contract creation code storage out of gas",
];

/// Lowercases an address or hash; equality and hashing always happen in
/// this form.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn parse_address(value: &str) -> Result<H160, Error> {
    value
        .parse::<H160>()
        .map_err(|err| Error::Protocol(format!("invalid address {value}: {err}")))
}

pub fn parse_hash(value: &str) -> Result<H256, Error> {
    value
        .parse::<H256>()
        .map_err(|err| Error::Protocol(format!("invalid transaction hash {value}: {err}")))
}

/// Decodes a `0x`-prefixed hex string into bytes. Returns `None` for
/// malformed payloads so callers can fall back to pass-through behavior.
pub fn decode_hex(value: &str) -> Option<Vec<u8>> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    if stripped.is_empty() {
        return Some(Vec::new());
    }
    hex::decode(stripped).ok()
}

/// Step kind as reported by the call tracer, plus `Log` for emitted events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
    SelfDestruct,
    Log,
    Other(String),
}

impl CallKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "CALL" => CallKind::Call,
            "STATICCALL" => CallKind::StaticCall,
            "DELEGATECALL" => CallKind::DelegateCall,
            "CALLCODE" => CallKind::CallCode,
            "CREATE" => CallKind::Create,
            "CREATE2" => CallKind::Create2,
            "SELFDESTRUCT" => CallKind::SelfDestruct,
            other => CallKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CallKind::Call => "CALL",
            CallKind::StaticCall => "STATICCALL",
            CallKind::DelegateCall => "DELEGATECALL",
            CallKind::CallCode => "CALLCODE",
            CallKind::Create => "CREATE",
            CallKind::Create2 => "CREATE2",
            CallKind::SelfDestruct => "SELFDESTRUCT",
            CallKind::Log => "LOG",
            CallKind::Other(other) => other,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, CallKind::Create | CallKind::Create2)
    }
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CallKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Hex quantity parsed to a big integer. Values the node reports in a shape
/// we cannot parse keep their original string instead of failing the
/// pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HexNumber {
    Number(U256),
    Raw(String),
}

impl HexNumber {
    pub fn parse(value: &str) -> Self {
        let stripped = value.strip_prefix("0x").unwrap_or(value);
        match U256::from_str_radix(stripped, 16) {
            Ok(number) => HexNumber::Number(number),
            Err(_) => HexNumber::Raw(value.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<U256> {
        match self {
            HexNumber::Number(number) => Some(*number),
            HexNumber::Raw(_) => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, HexNumber::Number(number) if number.is_zero())
    }
}

impl Serialize for HexNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HexNumber::Number(number) => serializer.serialize_str(&number.to_string()),
            HexNumber::Raw(raw) => serializer.serialize_str(raw),
        }
    }
}

/// One step of a transaction's execution tree: a call-kind frame or an
/// emitted event log, flattened out of the call-tracer JSON.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRow {
    pub tx_hash: String,
    pub block_number: u64,
    /// Block timestamp, seconds since epoch.
    pub timestamp: u64,
    /// Position of the transaction inside its block, joined in after the
    /// discovery loop terminates.
    pub transaction_index: Option<u64>,
    /// Total order within the transaction tree, assigned in pre-order.
    pub trace_pos: u64,
    /// Dotted path from the root, e.g. `"1.2.3"`.
    pub trace_pos_depth: String,
    pub kind: CallKind,
    pub from: Option<String>,
    pub to: Option<String>,
    pub gas: Option<HexNumber>,
    pub gas_used: Option<HexNumber>,
    pub call_value: Option<HexNumber>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
    /// Emitter address, LOG rows only.
    pub address: Option<String>,
    pub topics: Vec<String>,
    pub data: Option<String>,
}

/// Decoded parameter value. Heterogeneous streams merge into one schema, so
/// values are a tagged union instead of per-stream structs.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Address(String),
    Uint(U256),
    Int(U256),
    Bytes(String),
    String(String),
    Bool(bool),
    Array(Vec<ParamValue>),
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Address(address) => serializer.serialize_str(address),
            ParamValue::Uint(number) | ParamValue::Int(number) => {
                serializer.serialize_str(&number.to_string())
            }
            ParamValue::Bytes(bytes) => serializer.serialize_str(bytes),
            ParamValue::String(string) => serializer.serialize_str(string),
            ParamValue::Bool(flag) => serializer.serialize_bool(*flag),
            ParamValue::Array(items) => items.serialize(serializer),
        }
    }
}

/// A trace row with decoding results and run-level flags applied.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedRow {
    /// Event or function name; falls back to the raw call kind
    /// (or `"undecoded event"` for LOG rows) when nothing matched.
    pub activity: String,
    pub decoded: bool,
    pub tx_hash: String,
    pub block_number: u64,
    pub transaction_index: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub trace_pos: u64,
    pub trace_pos_depth: String,
    pub calltype: CallKind,
    pub from: Option<String>,
    pub to: Option<String>,
    pub gas: Option<HexNumber>,
    pub gas_used: Option<HexNumber>,
    pub call_value: Option<HexNumber>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub address: Option<String>,
    pub topics: Vec<String>,
    pub data: Option<String>,
    pub is_reverted: bool,
    pub is_dapp: bool,
    pub params: BTreeMap<String, ParamValue>,
}

/// Applies the dataset-wide total order `(block_number, transaction_index,
/// trace_pos)`. Rows whose transaction index could not be resolved sort
/// after resolved ones within their block.
pub fn sort_rows(rows: &mut [DecodedRow]) {
    rows.sort_by_key(|row| {
        (
            row.block_number,
            row.transaction_index.unwrap_or(u64::MAX),
            row.trace_pos,
        )
    });
}
