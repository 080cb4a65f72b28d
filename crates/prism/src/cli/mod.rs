//! Subcommands and the helpers they share.

pub mod chain;
pub mod config;
pub mod ingest;
pub mod invoke;
pub mod upload;

use clap::ValueEnum;
use prism_core::{Config, FileSystemStore, ObjectStore, ResultWriter};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Supported result formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object or array
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<OutputFormat> for prism_core::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => prism_core::OutputFormat::Json,
            OutputFormat::Jsonl => prism_core::OutputFormat::JsonLines,
        }
    }
}

/// Load the config at `path`, or defaults when the file doesn't exist.
pub fn load_config(path: &Path) -> prism_core::Result<Config> {
    if path.exists() {
        Ok(Config::load_from(path)?)
    } else {
        Ok(Config::default())
    }
}

/// The directory-backed store under `[storage] root`.
pub fn open_store(config: &Config) -> Arc<dyn ObjectStore> {
    let root = config.storage_root();
    tracing::debug!("Using object store at {:?}", root);
    Arc::new(FileSystemStore::new(root))
}

/// A result writer targeting `output`, or stdout when unset.
pub fn result_writer(
    output: Option<&Path>,
    format: OutputFormat,
    pretty: bool,
) -> anyhow::Result<ResultWriter<Box<dyn Write>>> {
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    Ok(ResultWriter::new(sink, format.into(), pretty))
}
