pub mod calls;
pub mod events;

use ethabi::Token;

use crate::types::ParamValue;

/// Column names already taken by the trace schema (current names plus the
/// raw tracer spellings). Decoded parameters that would collide get a
/// per-stream suffix instead of silently shadowing trace data.
pub(crate) const RESERVED_COLUMNS: [&str; 33] = [
    "activity",
    "name",
    "decoded",
    "address",
    "timestamp",
    "timeStamp",
    "trace_pos",
    "tracePos",
    "trace_pos_depth",
    "tracePosDepth",
    "tx_hash",
    "hash",
    "block_number",
    "blockNumber",
    "transaction_index",
    "transactionIndex",
    "from",
    "to",
    "gas",
    "gas_used",
    "gasUsed",
    "input",
    "output",
    "call_value",
    "callvalue",
    "value",
    "calltype",
    "type",
    "error",
    "topics",
    "data",
    "is_reverted",
    "is_dapp",
];

pub(crate) fn is_reserved(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&name)
}

pub(crate) fn token_to_value(token: Token) -> ParamValue {
    match token {
        Token::Address(address) => ParamValue::Address(format!("{address:#x}")),
        Token::FixedBytes(bytes) | Token::Bytes(bytes) => {
            ParamValue::Bytes(format!("0x{}", hex::encode(bytes)))
        }
        Token::Uint(number) => ParamValue::Uint(number),
        Token::Int(number) => ParamValue::Int(number),
        Token::Bool(flag) => ParamValue::Bool(flag),
        Token::String(string) => ParamValue::String(string),
        Token::FixedArray(items) | Token::Array(items) | Token::Tuple(items) => {
            ParamValue::Array(items.into_iter().map(token_to_value).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{H160, U256};

    #[test]
    fn tokens_map_to_tagged_values() {
        let address = "0x75228dce4d82566d93068a8d5d49435216551599"
            .parse::<H160>()
            .unwrap();
        assert_eq!(
            token_to_value(Token::Address(address)),
            ParamValue::Address("0x75228dce4d82566d93068a8d5d49435216551599".to_string())
        );
        assert_eq!(
            token_to_value(Token::Uint(U256::from(7u64))),
            ParamValue::Uint(U256::from(7u64))
        );
        assert_eq!(
            token_to_value(Token::Bytes(vec![0xde, 0xad])),
            ParamValue::Bytes("0xdead".to_string())
        );
        assert_eq!(
            token_to_value(Token::Array(vec![Token::Bool(true)])),
            ParamValue::Array(vec![ParamValue::Bool(true)])
        );
    }

    #[test]
    fn schema_columns_are_reserved() {
        for name in ["to", "from", "value", "hash", "gas"] {
            assert!(is_reserved(name));
        }
        assert!(!is_reserved("amount"));
    }
}
