use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerSettings {
    pub node: NodeSettings,
    pub etherscan: EtherscanSettings,
    pub contracts: ContractsSettings,
    pub block_range: BlockRangeSettings,
    pub extraction: ExtractionSettings,
    pub decoding: DecodingSettings,
    pub misc: MiscSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NodeSettings {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Attempt budget for one RPC unit; exhaustion marks the unit
    /// unresolved without aborting the run.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Concurrent trace reconstructions within one discovery iteration.
    pub concurrency: usize,
}

impl NodeSettings {
    pub fn url(&self) -> String {
        format!("{}{}:{}", self.protocol, self.host, self.port)
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            protocol: "http://".to_string(),
            host: "localhost".to_string(),
            port: 8545,
            max_attempts: 15,
            retry_delay_ms: 250,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EtherscanSettings {
    pub api_key: String,
    pub base_url: String,
    pub max_retries: u32,
    /// Fixed pause before each explorer request; keeps the run inside the
    /// public API rate limits.
    pub request_delay_ms: u64,
}

impl Default for EtherscanSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.etherscan.io/api".to_string(),
            max_retries: 5,
            request_delay_ms: 20,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ContractsSettings {
    /// Seed set of DApp addresses; the first entry keys the run artifacts.
    pub dapp: Vec<String>,
    /// Deny list pruning the CREATE-relation expansion.
    pub non_dapp: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BlockRangeSettings {
    pub min_block: u64,
    pub max_block: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionSettings {
    pub normal_transactions: bool,
    pub internal_transactions: bool,
    pub transactions_by_events: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            normal_transactions: true,
            internal_transactions: true,
            transactions_by_events: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DecodingSettings {
    pub dapp: StreamSettings,
    pub non_dapp: StreamSettings,
}

impl Default for DecodingSettings {
    fn default() -> Self {
        Self {
            dapp: StreamSettings::default(),
            non_dapp: StreamSettings::disabled(),
        }
    }
}

impl DecodingSettings {
    pub fn for_side(&self, dapp: bool) -> &StreamSettings {
        if dapp {
            &self.dapp
        } else {
            &self.non_dapp
        }
    }

    /// True when no non-DApp stream is requested; ABI resolution then only
    /// has to cover the DApp contract set.
    pub fn non_dapp_disabled(&self) -> bool {
        self.non_dapp == StreamSettings::disabled()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSettings {
    pub events: bool,
    pub calls: bool,
    pub zero_value_calls: bool,
    pub delegatecalls: bool,
    pub creations: bool,
}

impl StreamSettings {
    pub fn disabled() -> Self {
        Self {
            events: false,
            calls: false,
            zero_value_calls: false,
            delegatecalls: false,
            creations: false,
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            events: true,
            calls: true,
            zero_value_calls: false,
            delegatecalls: true,
            creations: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MiscSettings {
    /// Enables downstream activity splitting by contract/token; the
    /// renaming itself happens in an external collaborator.
    pub sensitive_events: bool,
    pub log_folder: PathBuf,
    /// Optional JSON file with project-specific event definitions appended
    /// to the fallback chain, keyed by label.
    pub custom_events: Option<PathBuf>,
}

impl Default for MiscSettings {
    fn default() -> Self {
        Self {
            sensitive_events: false,
            log_folder: PathBuf::from("resources"),
            custom_events: None,
        }
    }
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            node: NodeSettings::default(),
            etherscan: EtherscanSettings::default(),
            contracts: ContractsSettings::default(),
            block_range: BlockRangeSettings::default(),
            extraction: ExtractionSettings::default(),
            decoding: DecodingSettings::default(),
            misc: MiscSettings::default(),
        }
    }
}

const API_KEY_PLACEHOLDER: &str = "ETHERSCAN_API_KEY";

impl IndexerSettings {
    /// Fatal configuration checks, run before any network call.
    pub fn validate(&self) -> Result<(), Error> {
        if self.contracts.dapp.is_empty() {
            return Err(Error::Config(
                "contracts.dapp must contain at least one seed address".to_string(),
            ));
        }
        if self.etherscan.api_key.is_empty() || self.etherscan.api_key == API_KEY_PLACEHOLDER {
            return Err(Error::Config(
                "please provide your Etherscan API key in the configuration".to_string(),
            ));
        }
        let extraction = &self.extraction;
        if !extraction.normal_transactions
            && !extraction.internal_transactions
            && !extraction.transactions_by_events
        {
            return Err(Error::Config(
                "all transaction extraction sources are disabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> IndexerSettings {
        IndexerSettings {
            contracts: ContractsSettings {
                dapp: vec!["0x75228DcE4D82566D93068a8d5D49435216551599".to_string()],
                non_dapp: vec![],
            },
            etherscan: EtherscanSettings {
                api_key: "test-key".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn node_url_assembly() {
        let settings = NodeSettings {
            protocol: "http://".to_string(),
            host: "archive.example.org".to_string(),
            port: 8545,
            ..Default::default()
        };
        assert_eq!(settings.url(), "http://archive.example.org:8545");
    }

    #[test]
    fn empty_seed_set_is_a_config_error() {
        let mut settings = valid_settings();
        settings.contracts.dapp.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn placeholder_api_key_is_rejected() {
        let mut settings = valid_settings();
        settings.etherscan.api_key = API_KEY_PLACEHOLDER.to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn all_sources_disabled_is_a_config_error() {
        let mut settings = valid_settings();
        settings.extraction = ExtractionSettings {
            normal_transactions: false,
            internal_transactions: false,
            transactions_by_events: false,
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn valid_settings_pass() {
        assert!(valid_settings().validate().is_ok());
    }
}
