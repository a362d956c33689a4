use crate::{
    abi::AbiRegistry,
    decoder::{is_reserved, token_to_value},
    types::{decode_hex, ParamValue, TraceRow},
};

/// A successfully decoded function call.
#[derive(Debug, Clone)]
pub struct DecodedCall {
    pub name: String,
    pub params: Vec<(String, ParamValue)>,
}

/// Value class of a call. Zero-value and value-bearing calls run through
/// two separately flagged decoding streams; downstream analyses rely on
/// the split. A missing `value` field (the tracer omits it on
/// DELEGATECALL frames) counts as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueClass {
    Zero,
    NonZero,
}

pub fn value_class(row: &TraceRow) -> ValueClass {
    match &row.call_value {
        Some(value) if !value.is_zero() => ValueClass::NonZero,
        _ => ValueClass::Zero,
    }
}

/// Decodes a call-kind row by looking up the 4-byte selector of its input
/// in the callee's verified ABI. Returns `None` when the callee is
/// unverified, the input is shorter than a selector, or the selector is
/// unknown; the row then passes through undecoded.
pub fn decode_call_row(row: &TraceRow, registry: &AbiRegistry) -> Option<DecodedCall> {
    let to = row.to.as_deref()?;
    let contract = registry.verified(to)?;
    let input = decode_hex(row.input.as_deref()?)?;
    if input.len() < 4 {
        return None;
    }
    let selector: [u8; 4] = input[..4].try_into().ok()?;
    let function = contract
        .functions()
        .find(|function| function.short_signature() == selector)?;
    let tokens = function.decode_input(&input[4..]).ok()?;

    let params = function
        .inputs
        .iter()
        .zip(tokens)
        .enumerate()
        .map(|(index, (input, token))| {
            (
                rename_function_param(&input.name, index),
                token_to_value(token),
            )
        })
        .collect();
    Some(DecodedCall {
        name: function.name.clone(),
        params,
    })
}

/// Function parameter naming: the leading underscore convention is
/// stripped, the reserved `to`/`from` names move aside so they never
/// shadow the call's own endpoints, and remaining collisions with trace
/// columns get a suffix.
fn rename_function_param(name: &str, index: usize) -> String {
    let name = name.strip_prefix('_').unwrap_or(name);
    if name.is_empty() {
        return format!("arg{index}");
    }
    match name {
        "to" => "to_function_internal".to_string(),
        "from" => "from_function_internal".to_string(),
        name if is_reserved(name) => format!("{name}_functionAttribute"),
        name => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiResolution;
    use crate::types::{CallKind, HexNumber};
    use ethabi::Token;
    use ethers::types::U256;
    use pretty_assertions::assert_eq;

    const MARKET: &str = "0x24e2b1d415e6e0d04042eaa45dc2a08fc33ca6cd";

    fn call_row(to: &str, input: String, value: &str) -> TraceRow {
        TraceRow {
            tx_hash: "0x02".to_string(),
            block_number: 1,
            timestamp: 0,
            transaction_index: None,
            trace_pos: 1,
            trace_pos_depth: "1".to_string(),
            kind: CallKind::Call,
            from: Some("0x00000000000000000000000000000000000000a1".to_string()),
            to: Some(to.to_string()),
            gas: None,
            gas_used: None,
            call_value: Some(HexNumber::parse(value)),
            input: Some(input),
            output: None,
            error: None,
            address: None,
            topics: Vec::new(),
            data: None,
        }
    }

    fn registry_with_trade_abi() -> AbiRegistry {
        let abi = r#"[
            {"type": "function", "name": "publicTrade", "stateMutability": "payable",
             "inputs": [
                {"name": "_direction", "type": "uint8"},
                {"name": "_market", "type": "address"},
                {"name": "_amount", "type": "uint256"},
                {"name": "to", "type": "address"},
                {"name": "_gas", "type": "uint256"}],
             "outputs": []}
        ]"#;
        let contract = serde_json::from_str::<ethabi::Contract>(abi).unwrap();
        let mut registry = AbiRegistry::default();
        registry.insert(
            MARKET,
            AbiResolution::Verified {
                contract,
                raw: abi.to_string(),
            },
        );
        registry
    }

    fn encoded_trade_input(registry: &AbiRegistry) -> String {
        let function = registry.verified(MARKET).unwrap().function("publicTrade").unwrap();
        let market = "0x00000000000000000000000000000000000000b2".parse().unwrap();
        let recipient = "0x00000000000000000000000000000000000000c3".parse().unwrap();
        let bytes = function
            .encode_input(&[
                Token::Uint(U256::from(1u8)),
                Token::Address(market),
                Token::Uint(U256::from(500u64)),
                Token::Address(recipient),
                Token::Uint(U256::from(21_000u64)),
            ])
            .unwrap();
        format!("0x{}", hex::encode(bytes))
    }

    #[test]
    fn selector_lookup_and_param_renaming() {
        let registry = registry_with_trade_abi();
        let row = call_row(MARKET, encoded_trade_input(&registry), "0x1");
        let decoded = decode_call_row(&row, &registry).expect("selector must match");
        assert_eq!(decoded.name, "publicTrade");
        let names: Vec<&str> = decoded.params.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "direction",
                "market",
                "amount",
                "to_function_internal",
                "gas_functionAttribute",
            ]
        );
        assert_eq!(decoded.params[2].1, ParamValue::Uint(U256::from(500u64)));
    }

    #[test]
    fn unverified_callee_passes_through() {
        let registry = AbiRegistry::default();
        let row = call_row(MARKET, "0xdeadbeef".to_string(), "0x1");
        assert!(decode_call_row(&row, &registry).is_none());
    }

    #[test]
    fn unknown_selector_passes_through() {
        let registry = registry_with_trade_abi();
        let row = call_row(MARKET, "0x0badc0de".to_string(), "0x1");
        assert!(decode_call_row(&row, &registry).is_none());
    }

    #[test]
    fn short_input_passes_through() {
        let registry = registry_with_trade_abi();
        let row = call_row(MARKET, "0x00".to_string(), "0x1");
        assert!(decode_call_row(&row, &registry).is_none());
    }

    #[test]
    fn value_classes_split_zero_and_value_bearing_calls() {
        let registry = registry_with_trade_abi();
        let zero = call_row(MARKET, encoded_trade_input(&registry), "0x0");
        let paid = call_row(MARKET, encoded_trade_input(&registry), "0x2386f26fc10000");
        assert_eq!(value_class(&zero), ValueClass::Zero);
        assert_eq!(value_class(&paid), ValueClass::NonZero);

        let mut missing = zero;
        missing.call_value = None;
        assert_eq!(value_class(&missing), ValueClass::Zero);
    }
}
