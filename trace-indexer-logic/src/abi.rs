use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use ethabi::Contract;

use crate::{
    error::Error,
    etherscan::EtherscanClient,
    fallback_abis::standard_chain,
    types::{CallKind, ContractSet, TraceRow},
};

/// Per-address ABI resolution. Unverified contracts are remembered so they
/// are not asked for again; their rows decode through the fallback chain
/// only.
#[derive(Debug, Clone)]
pub enum AbiResolution {
    Verified { contract: Contract, raw: String },
    Unverified,
}

/// Mapping from lowercase address to its resolved ABI, populated once per
/// run for the union of event emitters and call targets. Write-once,
/// read-concurrently afterwards.
#[derive(Debug, Default)]
pub struct AbiRegistry {
    entries: HashMap<String, AbiResolution>,
}

impl AbiRegistry {
    /// Resolves all addresses through the explorer. The not-verified answer
    /// is definitive; transient failures are retried inside the client and
    /// downgraded to `Unverified` once the budget is exhausted.
    pub async fn populate(
        client: &EtherscanClient,
        addresses: impl IntoIterator<Item = String>,
    ) -> Self {
        let addresses: BTreeSet<String> = addresses.into_iter().collect();
        let total = addresses.len();
        let mut entries = HashMap::with_capacity(total);
        let mut verified = 0usize;
        for (position, address) in addresses.into_iter().enumerate() {
            let resolution = match client.get_abi(&address).await {
                Ok(raw) => match serde_json::from_str::<Contract>(&raw) {
                    Ok(contract) => {
                        verified += 1;
                        AbiResolution::Verified { contract, raw }
                    }
                    Err(err) => {
                        tracing::warn!(address = %address, error = %err, "unparseable abi, treating as unverified");
                        AbiResolution::Unverified
                    }
                },
                Err(Error::NotVerified(_)) => AbiResolution::Unverified,
                Err(err) => {
                    tracing::warn!(address = %address, error = %err, "abi could not be resolved");
                    AbiResolution::Unverified
                }
            };
            entries.insert(address, resolution);
            if (position + 1) % 25 == 0 || position + 1 == total {
                tracing::info!(processed = position + 1, total, verified, "abi dictionary");
            }
        }
        Self { entries }
    }

    pub fn insert(&mut self, address: &str, resolution: AbiResolution) {
        self.entries.insert(address.to_lowercase(), resolution);
    }

    pub fn verified(&self, address: &str) -> Option<&Contract> {
        match self.entries.get(address) {
            Some(AbiResolution::Verified { contract, .. }) => Some(contract),
            _ => None,
        }
    }

    pub fn verified_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| matches!(entry, AbiResolution::Verified { .. }))
            .count()
    }

    pub fn unverified_count(&self) -> usize {
        self.entries.len() - self.verified_count()
    }

    /// Address → raw ABI (or `None` for unverified), for the registry
    /// snapshot artifact.
    pub fn snapshot(&self) -> BTreeMap<String, Option<&str>> {
        self.entries
            .iter()
            .map(|(address, resolution)| {
                let raw = match resolution {
                    AbiResolution::Verified { raw, .. } => Some(raw.as_str()),
                    AbiResolution::Unverified => None,
                };
                (address.clone(), raw)
            })
            .collect()
    }
}

/// Addresses whose ABIs the decoders will ask for: event emitters plus the
/// targets of all call kinds. Optionally restricted to the DApp set when no
/// non-DApp stream is enabled.
pub fn address_universe(rows: &[TraceRow], restrict_to: Option<&ContractSet>) -> BTreeSet<String> {
    let mut addresses = BTreeSet::new();
    for row in rows {
        let address = match row.kind {
            CallKind::Log => row.address.as_ref(),
            _ => row.to.as_ref(),
        };
        if let Some(address) = address {
            addresses.insert(address.clone());
        }
    }
    if let Some(allowed) = restrict_to {
        addresses.retain(|address| allowed.contains(address));
    }
    addresses
}

/// The fixed, ordered list of ABIs tried after any per-address ABI:
/// ERC-20, ERC-777, ERC-721, ERC-1155 and, last, project-specific event
/// definitions from a static configuration file.
#[derive(Debug, Clone)]
pub struct FallbackChain {
    entries: Vec<(String, Contract)>,
}

impl FallbackChain {
    pub fn standard() -> Self {
        Self {
            entries: standard_chain(),
        }
    }

    pub fn new(custom_events: Option<&Path>) -> Result<Self, Error> {
        let mut entries = standard_chain();
        if let Some(path) = custom_events {
            entries.extend(load_custom_events(path)?);
        }
        Ok(Self { entries })
    }

    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.entries.iter().map(|(_, contract)| contract)
    }

    pub fn entries(&self) -> &[(String, Contract)] {
        &self.entries
    }
}

/// Loads project-specific event definitions: a JSON object mapping a label
/// to an ABI array.
fn load_custom_events(path: &Path) -> Result<Vec<(String, Contract)>, Error> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        Error::Config(format!(
            "cannot read custom event definitions {}: {err}",
            path.display()
        ))
    })?;
    let definitions: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&raw).map_err(|err| {
            Error::Config(format!(
                "malformed custom event definitions {}: {err}",
                path.display()
            ))
        })?;
    definitions
        .into_iter()
        .map(|(label, abi)| {
            let contract = serde_json::from_value::<Contract>(abi).map_err(|err| {
                Error::Config(format!("invalid abi for custom events {label}: {err}"))
            })?;
            Ok((label, contract))
        })
        .collect()
}
