use blockscout_service_launcher::{
    launcher::ConfigSettings,
    tracing::{JaegerSettings, TracingSettings},
};
use serde::Deserialize;
use trace_indexer_logic::IndexerSettings;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub indexer: IndexerSettings,
    pub phases: PhasesSettings,
    pub tracing: TracingSettings,
    pub jaeger: JaegerSettings,
}

/// Which of the three phases this run executes. Later phases consume the
/// in-memory output of earlier ones, so they cannot run on their own.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PhasesSettings {
    pub extraction: bool,
    pub decoding: bool,
    pub transformation: bool,
}

impl Default for PhasesSettings {
    fn default() -> Self {
        Self {
            extraction: true,
            decoding: true,
            transformation: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            indexer: IndexerSettings::default(),
            phases: PhasesSettings::default(),
            tracing: TracingSettings::default(),
            jaeger: JaegerSettings::default(),
        }
    }
}

impl ConfigSettings for Settings {
    const SERVICE_NAME: &'static str = "TRACE_INDEXER";

    fn validate(&self) -> anyhow::Result<()> {
        self.indexer.validate()?;
        if self.phases.decoding && !self.phases.extraction {
            anyhow::bail!("the decoding phase requires the extraction phase in the same run");
        }
        if self.phases.transformation && !self.phases.decoding {
            anyhow::bail!("the transformation phase requires the decoding phase in the same run");
        }
        Ok(())
    }
}
