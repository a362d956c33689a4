use std::{
    fs::{create_dir_all, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Serialize;
use trace_indexer_logic::{
    abi::AbiRegistry,
    log_assembler::DecodedLog,
    types::{ContractSet, DecodedRow, TraceRow},
};

/// Materializes the four run artifacts under the configured log folder.
/// Files are keyed `<name>_<base_contract>_<min_block>_<max_block>` so
/// repeated runs over different ranges live side by side.
pub struct Sink {
    folder: PathBuf,
    run_key: String,
}

impl Sink {
    pub fn new(
        folder: &Path,
        base_contract: &str,
        min_block: u64,
        max_block: u64,
    ) -> anyhow::Result<Self> {
        create_dir_all(folder)
            .with_context(|| format!("cannot create output folder {}", folder.display()))?;
        Ok(Self {
            folder: folder.to_path_buf(),
            run_key: format!("{base_contract}_{min_block}_{max_block}"),
        })
    }

    pub fn write_trace(&self, rows: &[TraceRow]) -> anyhow::Result<()> {
        self.write_jsonl("trace_tree", rows)
    }

    pub fn write_contracts(&self, contracts: &ContractSet) -> anyhow::Result<()> {
        let path = self.path("contracts_dapp", "txt");
        let mut writer = BufWriter::new(
            File::create(&path).with_context(|| format!("cannot create {}", path.display()))?,
        );
        for address in contracts {
            writeln!(writer, "{address}")?;
        }
        writer.flush()?;
        tracing::info!(path = %path.display(), count = contracts.len(), "saved contract set");
        Ok(())
    }

    pub fn write_registry(&self, registry: &AbiRegistry) -> anyhow::Result<()> {
        let path = self.path("abi_registry", "json");
        let file =
            File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), &registry.snapshot())
            .context("abi registry serialization")?;
        tracing::info!(
            path = %path.display(),
            verified = registry.verified_count(),
            unverified = registry.unverified_count(),
            "saved abi registry snapshot"
        );
        Ok(())
    }

    pub fn write_streams(&self, log: &DecodedLog) -> anyhow::Result<()> {
        for (name, rows) in log.streams() {
            self.write_jsonl(name, rows)?;
        }
        Ok(())
    }

    pub fn write_ordered_log(&self, rows: &[DecodedRow]) -> anyhow::Result<()> {
        self.write_jsonl("event_log", rows)
    }

    fn write_jsonl<T: Serialize>(&self, name: &str, rows: &[T]) -> anyhow::Result<()> {
        let path = self.path(name, "jsonl");
        let file =
            File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            serde_json::to_writer(&mut writer, row)
                .with_context(|| format!("serialization of a {name} row"))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        tracing::info!(path = %path.display(), count = rows.len(), "saved {name}");
        Ok(())
    }

    fn path(&self, name: &str, extension: &str) -> PathBuf {
        self.folder
            .join(format!("{name}_{}.{extension}", self.run_key))
    }
}
