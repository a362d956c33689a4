use crate::{
    abi::{address_universe, AbiRegistry, FallbackChain},
    enumerator::TxEnumerator,
    error::Error,
    etherscan::EtherscanClient,
    extraction::{DiscoveryDriver, Extraction},
    log_assembler::{assemble, DecodedLog},
    node_client::NodeClient,
    settings::IndexerSettings,
};

/// Output of a full run: the frozen extraction context, the ABI registry
/// snapshot and the decoded streams.
pub struct RunOutput {
    pub extraction: Extraction,
    pub registry: AbiRegistry,
    pub log: DecodedLog,
}

/// Owns the clients and settings of one run and carries all mutable state
/// explicitly through the phases; there is no global state anywhere in the
/// pipeline.
pub struct Pipeline {
    settings: IndexerSettings,
    node: NodeClient,
    etherscan: EtherscanClient,
}

impl Pipeline {
    pub fn new(settings: IndexerSettings) -> Result<Self, Error> {
        settings.validate()?;
        let node = NodeClient::new(&settings.node)?;
        let etherscan = EtherscanClient::new(&settings.etherscan)?;
        Ok(Self {
            settings,
            node,
            etherscan,
        })
    }

    pub fn settings(&self) -> &IndexerSettings {
        &self.settings
    }

    pub fn node(&self) -> &NodeClient {
        &self.node
    }

    /// Discovery loop plus transaction-index enrichment. The contract set
    /// is frozen once this returns.
    pub async fn extract(&self) -> Result<Extraction, Error> {
        let enumerator = TxEnumerator::new(
            self.node.clone(),
            self.etherscan.clone(),
            self.settings.extraction.clone(),
        );
        let driver = DiscoveryDriver::new(
            self.node.clone(),
            enumerator,
            self.settings.node.concurrency,
        );
        driver.run(&self.settings).await
    }

    /// Resolves ABIs for every address the decoders will look at. When no
    /// non-DApp stream is enabled, only DApp contracts are queried.
    pub async fn resolve_abis(&self, extraction: &Extraction) -> AbiRegistry {
        let restrict_to = self
            .settings
            .decoding
            .non_dapp_disabled()
            .then_some(&extraction.contracts_dapp);
        let universe = address_universe(&extraction.rows, restrict_to);
        tracing::info!(addresses = universe.len(), "starting to retrieve abis");
        AbiRegistry::populate(&self.etherscan, universe).await
    }

    pub fn decode(
        &self,
        extraction: &Extraction,
        registry: &AbiRegistry,
        chain: &FallbackChain,
    ) -> DecodedLog {
        assemble(
            &extraction.rows,
            &extraction.contracts_dapp,
            registry,
            chain,
            &self.settings.decoding,
        )
    }

    pub async fn run(&self) -> Result<RunOutput, Error> {
        let chain = FallbackChain::new(self.settings.misc.custom_events.as_deref())?;
        let extraction = self.extract().await?;
        let registry = self.resolve_abis(&extraction).await;
        let log = self.decode(&extraction, &registry, &chain);
        tracing::info!(
            decoded_events = log.summary.decoded_events,
            undecoded_events = log.summary.undecoded_events,
            decoded_calls = log.summary.decoded_calls,
            undecoded_calls = log.summary.undecoded_calls,
            reverted_transactions = log.summary.reverted_transactions,
            invalid_txs = extraction.invalid_txs.len(),
            unresolved_contracts = extraction.unresolved_contracts.len(),
            "decoding process complete"
        );
        Ok(RunOutput {
            extraction,
            registry,
            log,
        })
    }
}
