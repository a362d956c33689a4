use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::{
    abi::{AbiRegistry, FallbackChain},
    decoder::{
        calls::{decode_call_row, value_class, ValueClass},
        events::decode_event_row,
    },
    settings::DecodingSettings,
    types::{CallKind, ContractSet, DecodedRow, ParamValue, TraceRow, REVERTED_ERRORS},
};

/// Transactions with at least one row-level error from the fixed
/// vocabulary. Not every operation of a reverted transaction carries the
/// error, often only one does, so the flag is propagated tx-wide.
pub fn reverted_set(rows: &[TraceRow]) -> HashSet<String> {
    rows.iter()
        .filter(|row| {
            row.error
                .as_deref()
                .map_or(false, |error| REVERTED_ERRORS.contains(&error))
        })
        .map(|row| row.tx_hash.clone())
        .collect()
}

#[derive(Debug, Default, Clone)]
pub struct DecodingSummary {
    pub decoded_events: usize,
    pub undecoded_events: usize,
    pub decoded_calls: usize,
    pub undecoded_calls: usize,
    pub reverted_transactions: usize,
}

/// The ten decoded output streams: events, value-bearing calls, zero-value
/// calls, delegatecalls and creations, each split by DApp membership.
#[derive(Debug, Default)]
pub struct DecodedLog {
    pub events_dapp: Vec<DecodedRow>,
    pub events_non_dapp: Vec<DecodedRow>,
    pub calls_dapp: Vec<DecodedRow>,
    pub calls_non_dapp: Vec<DecodedRow>,
    pub zero_value_calls_dapp: Vec<DecodedRow>,
    pub zero_value_calls_non_dapp: Vec<DecodedRow>,
    pub delegatecalls_dapp: Vec<DecodedRow>,
    pub delegatecalls_non_dapp: Vec<DecodedRow>,
    pub creations_dapp: Vec<DecodedRow>,
    pub creations_non_dapp: Vec<DecodedRow>,
    pub summary: DecodingSummary,
}

impl DecodedLog {
    pub fn streams(&self) -> [(&'static str, &Vec<DecodedRow>); 10] {
        [
            ("events_dapp", &self.events_dapp),
            ("events_non_dapp", &self.events_non_dapp),
            ("calls_dapp", &self.calls_dapp),
            ("calls_non_dapp", &self.calls_non_dapp),
            ("zero_value_calls_dapp", &self.zero_value_calls_dapp),
            ("zero_value_calls_non_dapp", &self.zero_value_calls_non_dapp),
            ("delegatecalls_dapp", &self.delegatecalls_dapp),
            ("delegatecalls_non_dapp", &self.delegatecalls_non_dapp),
            ("creations_dapp", &self.creations_dapp),
            ("creations_non_dapp", &self.creations_non_dapp),
        ]
    }

    /// All streams merged into one relation; callers apply the final sort.
    pub fn merged(&self) -> Vec<DecodedRow> {
        self.streams()
            .into_iter()
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect()
    }
}

/// Uniform normalization and decoding pass over the frozen trace relation:
/// reverted flags are computed once over the whole transaction population,
/// DApp membership is flagged per row, and each enabled stream is decoded
/// against the registry plus the fallback chain. Disabled streams stay
/// empty; their rows remain part of the trace relation.
pub fn assemble(
    rows: &[TraceRow],
    contracts_dapp: &ContractSet,
    registry: &AbiRegistry,
    chain: &FallbackChain,
    settings: &DecodingSettings,
) -> DecodedLog {
    let reverted = reverted_set(rows);
    let mut log = DecodedLog {
        summary: DecodingSummary {
            reverted_transactions: reverted.len(),
            ..Default::default()
        },
        ..Default::default()
    };

    for row in rows {
        let is_reverted = reverted.contains(&row.tx_hash);
        match &row.kind {
            CallKind::Log => {
                let is_dapp = row
                    .address
                    .as_ref()
                    .map_or(false, |address| contracts_dapp.contains(address));
                if !settings.for_side(is_dapp).events {
                    continue;
                }
                let decoded = decode_event_row(row, registry, chain);
                let assembled = match decoded {
                    Some(event) => {
                        log.summary.decoded_events += 1;
                        decoded_row(row, event.name, true, event.params, is_reverted, is_dapp)
                    }
                    None => {
                        log.summary.undecoded_events += 1;
                        decoded_row(
                            row,
                            "undecoded event".to_string(),
                            false,
                            Vec::new(),
                            is_reverted,
                            is_dapp,
                        )
                    }
                };
                side_stream(&mut log.events_dapp, &mut log.events_non_dapp, is_dapp)
                    .push(assembled);
            }
            CallKind::Call | CallKind::DelegateCall => {
                let is_dapp = row
                    .to
                    .as_ref()
                    .map_or(false, |to| contracts_dapp.contains(to));
                let side = settings.for_side(is_dapp);
                let stream = match (&row.kind, value_class(row)) {
                    (CallKind::DelegateCall, _) if side.delegatecalls => Some(side_stream(
                        &mut log.delegatecalls_dapp,
                        &mut log.delegatecalls_non_dapp,
                        is_dapp,
                    )),
                    (CallKind::Call, ValueClass::NonZero) if side.calls => Some(side_stream(
                        &mut log.calls_dapp,
                        &mut log.calls_non_dapp,
                        is_dapp,
                    )),
                    (CallKind::Call, ValueClass::Zero) if side.zero_value_calls => {
                        Some(side_stream(
                            &mut log.zero_value_calls_dapp,
                            &mut log.zero_value_calls_non_dapp,
                            is_dapp,
                        ))
                    }
                    _ => None,
                };
                let Some(stream) = stream else { continue };
                let assembled = match decode_call_row(row, registry) {
                    Some(call) => {
                        log.summary.decoded_calls += 1;
                        decoded_row(row, call.name, true, call.params, is_reverted, is_dapp)
                    }
                    None => {
                        log.summary.undecoded_calls += 1;
                        decoded_row(
                            row,
                            row.kind.to_string(),
                            false,
                            Vec::new(),
                            is_reverted,
                            is_dapp,
                        )
                    }
                };
                stream.push(assembled);
            }
            CallKind::Create | CallKind::Create2 => {
                let is_dapp = row
                    .to
                    .as_ref()
                    .map_or(false, |to| contracts_dapp.contains(to));
                if !settings.for_side(is_dapp).creations {
                    continue;
                }
                let assembled = decoded_row(
                    row,
                    row.kind.to_string(),
                    false,
                    Vec::new(),
                    is_reverted,
                    is_dapp,
                );
                side_stream(&mut log.creations_dapp, &mut log.creations_non_dapp, is_dapp)
                    .push(assembled);
            }
            _ => {}
        }
    }
    log
}

fn side_stream<'a>(
    dapp: &'a mut Vec<DecodedRow>,
    non_dapp: &'a mut Vec<DecodedRow>,
    is_dapp: bool,
) -> &'a mut Vec<DecodedRow> {
    if is_dapp {
        dapp
    } else {
        non_dapp
    }
}

fn decoded_row(
    row: &TraceRow,
    activity: String,
    decoded: bool,
    params: Vec<(String, ParamValue)>,
    is_reverted: bool,
    is_dapp: bool,
) -> DecodedRow {
    DecodedRow {
        activity,
        decoded,
        tx_hash: row.tx_hash.clone(),
        block_number: row.block_number,
        transaction_index: row.transaction_index,
        timestamp: DateTime::<Utc>::from_timestamp(row.timestamp as i64, 0)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        trace_pos: row.trace_pos,
        trace_pos_depth: row.trace_pos_depth.clone(),
        calltype: row.kind.clone(),
        from: row.from.clone(),
        to: row.to.clone(),
        gas: row.gas.clone(),
        gas_used: row.gas_used.clone(),
        call_value: row.call_value.clone(),
        input: row.input.clone(),
        output: row.output.clone(),
        error: row.error.clone(),
        address: row.address.clone(),
        topics: row.topics.clone(),
        data: row.data.clone(),
        is_reverted,
        is_dapp,
        params: params.into_iter().collect::<BTreeMap<_, _>>(),
    }
}
