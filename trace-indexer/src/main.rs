mod settings;
mod sink;

use anyhow::Context;
use blockscout_service_launcher as launcher;
use blockscout_service_launcher::launcher::ConfigSettings;
use trace_indexer_logic::{abi::FallbackChain, types::sort_rows, Pipeline};

use crate::{settings::Settings, sink::Sink};

const SERVICE_NAME: &str = "trace_indexer";

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let settings = Settings::build().context("failed to read config")?;
    launcher::tracing::init_logs(SERVICE_NAME, &settings.tracing, &settings.jaeger)
        .context("tracing initialization")?;

    let pipeline = Pipeline::new(settings.indexer.clone()).context("pipeline initialization")?;

    // Fail fast on an unreachable node before the discovery loop starts.
    let tip = pipeline
        .node()
        .block_number()
        .await
        .context("node connection preflight")?;
    tracing::info!(tip, "connected to the archive node");

    if !settings.phases.extraction {
        tracing::info!("extraction phase disabled, nothing to do");
        return Ok(());
    }

    let chain = FallbackChain::new(settings.indexer.misc.custom_events.as_deref())
        .context("fallback chain assembly")?;

    tracing::info!("starting extraction phase");
    let extraction = pipeline.extract().await.context("extraction phase")?;
    let sink = Sink::new(
        &settings.indexer.misc.log_folder,
        &extraction.base_contract,
        settings.indexer.block_range.min_block,
        settings.indexer.block_range.max_block,
    )?;
    sink.write_trace(&extraction.rows)?;
    sink.write_contracts(&extraction.contracts_dapp)?;

    if settings.phases.decoding {
        tracing::info!("starting decoding phase");
        let registry = pipeline.resolve_abis(&extraction).await;
        sink.write_registry(&registry)?;
        let log = pipeline.decode(&extraction, &registry, &chain);
        sink.write_streams(&log)?;

        if settings.phases.transformation {
            tracing::info!("starting transformation phase");
            let mut merged = log.merged();
            sort_rows(&mut merged);
            sink.write_ordered_log(&merged)?;
            if settings.indexer.misc.sensitive_events {
                tracing::info!(
                    "sensitive-event splitting is delegated to the downstream log construction"
                );
            }
        }

        tracing::info!(
            decoded_events = log.summary.decoded_events,
            undecoded_events = log.summary.undecoded_events,
            decoded_calls = log.summary.decoded_calls,
            undecoded_calls = log.summary.undecoded_calls,
            reverted_transactions = log.summary.reverted_transactions,
            "decoding summary"
        );
    }

    if !extraction.invalid_txs.is_empty() {
        tracing::warn!(
            count = extraction.invalid_txs.len(),
            hashes = ?extraction.invalid_txs,
            "transactions without a valid trace were skipped"
        );
    }
    if !extraction.unresolved_contracts.is_empty() {
        tracing::warn!(
            count = extraction.unresolved_contracts.len(),
            contracts = ?extraction.unresolved_contracts,
            "contracts whose transaction lists could not be fetched"
        );
    }
    tracing::info!(
        operations = extraction.rows.len(),
        contracts = extraction.contracts_dapp.len(),
        transactions = extraction.seen_txs.len(),
        "done with the data extraction"
    );
    Ok(())
}
