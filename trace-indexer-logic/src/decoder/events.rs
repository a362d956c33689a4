use ethabi::{Contract, RawLog};
use ethers::types::H256;

use crate::{
    abi::{AbiRegistry, FallbackChain},
    decoder::{is_reserved, token_to_value},
    types::{decode_hex, ParamValue, TraceRow},
};

/// A successfully decoded event log.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub name: String,
    pub params: Vec<(String, ParamValue)>,
}

/// Decodes a LOG row against the emitter's verified ABI followed by the
/// fallback chain. Indexed parameters consume topics 1..3, non-indexed ones
/// are ABI-decoded from `data` in declaration order. Returns `None` when no
/// candidate matches; the caller passes the row through undecoded.
pub fn decode_event_row(
    row: &TraceRow,
    registry: &AbiRegistry,
    chain: &FallbackChain,
) -> Option<DecodedEvent> {
    let address = row.address.as_deref()?;
    let topics: Vec<H256> = row
        .topics
        .iter()
        .map(|topic| topic.parse::<H256>().ok())
        .collect::<Option<Vec<_>>>()?;
    let topic0 = *topics.first()?;
    let data = decode_hex(row.data.as_deref().unwrap_or("0x"))?;

    let primary = registry.verified(address);
    let candidates = primary.into_iter().chain(chain.contracts());
    for contract in candidates {
        if let Some(decoded) = try_decode(contract, topic0, &topics, &data) {
            tracing::debug!(address, event = %decoded.name, "event decoded");
            return Some(decoded);
        }
    }
    tracing::debug!(address, "event topic is not present in given abis");
    None
}

fn try_decode(
    contract: &Contract,
    topic0: H256,
    topics: &[H256],
    data: &[u8],
) -> Option<DecodedEvent> {
    for event in contract.events() {
        if event.anonymous || event.signature() != topic0 {
            continue;
        }
        let log = RawLog {
            topics: topics.to_vec(),
            data: data.to_vec(),
        };
        if let Ok(decoded) = event.parse_log(log) {
            let params = decoded
                .params
                .into_iter()
                .map(|param| (rename_event_param(param.name), token_to_value(param.value)))
                .collect();
            return Some(DecodedEvent {
                name: event.name.clone(),
                params,
            });
        }
    }
    None
}

/// Event parameter names are kept as declared; only collisions with trace
/// columns are suffixed.
fn rename_event_param(name: String) -> String {
    if is_reserved(&name) {
        format!("{name}_eventAttribute")
    } else {
        name
    }
}
