use std::collections::BTreeSet;

use crate::types::{ContractSet, TraceRow};

/// Widens the DApp contract set with CREATE/CREATE2 relations mined from
/// the trace rows and returns the newly adopted addresses (the frontier of
/// the next discovery iteration).
///
/// Two directions count: creators of contracts already known to belong to
/// the DApp, and creations issued by known DApp contracts. The closure is
/// taken to a fixed point over the whole row collection because a single
/// batch can contain multi-level deployment chains. Deny-listed addresses
/// are never adopted; pruning a branch here keeps sibling DApps sharing an
/// EOA root out of the set.
pub fn create_relations(
    rows: &[TraceRow],
    contracts_dapp: &mut ContractSet,
    deny_list: &ContractSet,
) -> ContractSet {
    let creates: Vec<(&str, &str)> = rows
        .iter()
        .filter(|row| row.kind.is_create())
        .filter_map(|row| Some((row.from.as_deref()?, row.to.as_deref()?)))
        .collect();

    let before = contracts_dapp.clone();
    loop {
        let mut adopted: ContractSet = BTreeSet::new();
        for (creator, creation) in &creates {
            if contracts_dapp.contains(*creation) && !contracts_dapp.contains(*creator) {
                adopted.insert((*creator).to_string());
            }
            if contracts_dapp.contains(*creator) && !contracts_dapp.contains(*creation) {
                adopted.insert((*creation).to_string());
            }
        }
        let pruned = adopted.len();
        adopted.retain(|address| !deny_list.contains(address));
        if pruned != adopted.len() {
            tracing::info!(
                excluded = pruned - adopted.len(),
                "predefined non-dapp contracts were excluded"
            );
        }
        if adopted.is_empty() {
            break;
        }
        contracts_dapp.extend(adopted);
    }

    contracts_dapp.difference(&before).cloned().collect()
}
