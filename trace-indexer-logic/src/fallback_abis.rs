//! Standard token-event ABIs appended after any per-address ABI during
//! decoding. Kept as parsed, indexed structures, assembled once at startup.

use ethabi::Contract;
use lazy_static::lazy_static;

// event Transfer(address indexed _from, address indexed _to, uint256 _value)
// _from is the zero address when tokens are minted.
// event Approval(address indexed _owner, address indexed _spender, uint256 _value)
const ERC20: &str = r#"[
    {"type": "event", "name": "Transfer", "anonymous": false, "inputs": [
        {"name": "_from", "type": "address", "indexed": true},
        {"name": "_to", "type": "address", "indexed": true},
        {"name": "_value", "type": "uint256", "indexed": false}]},
    {"type": "event", "name": "Approval", "anonymous": false, "inputs": [
        {"name": "_owner", "type": "address", "indexed": true},
        {"name": "_spender", "type": "address", "indexed": true},
        {"name": "_value", "type": "uint256", "indexed": false}]}
]"#;

const ERC777: &str = r#"[
    {"type": "event", "name": "Sent", "anonymous": false, "inputs": [
        {"name": "operator", "type": "address", "indexed": true},
        {"name": "from", "type": "address", "indexed": true},
        {"name": "to", "type": "address", "indexed": true},
        {"name": "amount", "type": "uint256", "indexed": false},
        {"name": "data", "type": "bytes", "indexed": false},
        {"name": "operatorData", "type": "bytes", "indexed": false}]},
    {"type": "event", "name": "Minted", "anonymous": false, "inputs": [
        {"name": "operator", "type": "address", "indexed": true},
        {"name": "to", "type": "address", "indexed": true},
        {"name": "amount", "type": "uint256", "indexed": false},
        {"name": "data", "type": "bytes", "indexed": false},
        {"name": "operatorData", "type": "bytes", "indexed": false}]},
    {"type": "event", "name": "Burned", "anonymous": false, "inputs": [
        {"name": "operator", "type": "address", "indexed": true},
        {"name": "from", "type": "address", "indexed": true},
        {"name": "amount", "type": "uint256", "indexed": false},
        {"name": "data", "type": "bytes", "indexed": false},
        {"name": "operatorData", "type": "bytes", "indexed": false}]},
    {"type": "event", "name": "AuthorizedOperator", "anonymous": false, "inputs": [
        {"name": "operator", "type": "address", "indexed": true},
        {"name": "holder", "type": "address", "indexed": true}]},
    {"type": "event", "name": "RevokedOperator", "anonymous": false, "inputs": [
        {"name": "operator", "type": "address", "indexed": true},
        {"name": "holder", "type": "address", "indexed": true}]}
]"#;

// Same Transfer signature as ERC-20 but with three indexed inputs; the
// topic count keeps the two apart during decoding.
const ERC721: &str = r#"[
    {"type": "event", "name": "Transfer", "anonymous": false, "inputs": [
        {"name": "_from", "type": "address", "indexed": true},
        {"name": "_to", "type": "address", "indexed": true},
        {"name": "_tokenId", "type": "uint256", "indexed": true}]},
    {"type": "event", "name": "Approval", "anonymous": false, "inputs": [
        {"name": "_owner", "type": "address", "indexed": true},
        {"name": "_approved", "type": "address", "indexed": true},
        {"name": "_tokenId", "type": "uint256", "indexed": true}]},
    {"type": "event", "name": "ApprovalForAll", "anonymous": false, "inputs": [
        {"name": "_owner", "type": "address", "indexed": true},
        {"name": "_operator", "type": "address", "indexed": true},
        {"name": "_approved", "type": "bool", "indexed": false}]}
]"#;

const ERC1155: &str = r#"[
    {"type": "event", "name": "TransferSingle", "anonymous": false, "inputs": [
        {"name": "_operator", "type": "address", "indexed": true},
        {"name": "_from", "type": "address", "indexed": true},
        {"name": "_to", "type": "address", "indexed": true},
        {"name": "_id", "type": "uint256", "indexed": false},
        {"name": "_value", "type": "uint256", "indexed": false}]},
    {"type": "event", "name": "TransferBatch", "anonymous": false, "inputs": [
        {"name": "_operator", "type": "address", "indexed": true},
        {"name": "_from", "type": "address", "indexed": true},
        {"name": "_to", "type": "address", "indexed": true},
        {"name": "_ids", "type": "uint256[]", "indexed": false},
        {"name": "_values", "type": "uint256[]", "indexed": false}]},
    {"type": "event", "name": "ApprovalForAll", "anonymous": false, "inputs": [
        {"name": "_owner", "type": "address", "indexed": true},
        {"name": "_operator", "type": "address", "indexed": true},
        {"name": "_approved", "type": "bool", "indexed": false}]},
    {"type": "event", "name": "URI", "anonymous": false, "inputs": [
        {"name": "_value", "type": "string", "indexed": false},
        {"name": "_id", "type": "uint256", "indexed": true}]}
]"#;

lazy_static! {
    static ref STANDARD: Vec<(String, Contract)> = [
        ("ERC-20", ERC20),
        ("ERC-777", ERC777),
        ("ERC-721", ERC721),
        ("ERC-1155", ERC1155),
    ]
    .into_iter()
    .map(|(label, raw)| {
        let contract =
            serde_json::from_str::<Contract>(raw).expect("embedded standard abi must parse");
        (label.to_string(), contract)
    })
    .collect();
}

pub(crate) fn standard_chain() -> Vec<(String, Contract)> {
    STANDARD.clone()
}
