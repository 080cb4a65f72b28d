//! The `prism ingest` command: accept a labelled base64 image the way
//! clients submit one, and optionally follow it through the chain.

use clap::Args;
use prism_core::router::read_payload;
use prism_core::{Config, IngestHandler, ObjectStore, Pipeline, StageResult};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use super::OutputFormat;

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Destination bucket
    pub bucket: String,

    /// Payload file with `language` and `image` ("-" or omitted reads stdin)
    #[arg(short, long)]
    pub payload: Option<PathBuf>,

    /// Run the configured chain on the ingested image
    #[arg(long)]
    pub chain: bool,

    /// Output file for the results (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Result format
    #[arg(short, long, value_enum, default_value = "jsonl")]
    pub format: OutputFormat,
}

/// Ingest `payload`, then run the chain from the new key when asked.
///
/// The ingest result always comes first.
async fn ingest(
    bucket: &str,
    payload: &Value,
    chain: bool,
    config: &Config,
    store: Arc<dyn ObjectStore>,
) -> Vec<StageResult> {
    let result = IngestHandler::from_config(config, store.clone())
        .handle(bucket, payload)
        .await;

    let next = match (&result.output_location, chain) {
        (Some(location), true) => Some(location.clone()),
        _ => None,
    };
    let mut results = vec![result];
    if let Some(location) = next {
        let pipeline = Pipeline::from_config(config, store);
        results.extend(pipeline.run_chain(&location.bucket, &location.key).await);
    }
    results
}

/// Execute the ingest command.
pub async fn execute(args: IngestArgs, config: &Config) -> anyhow::Result<()> {
    let payload = read_payload(args.payload.as_deref(), std::io::stdin().lock())?;

    let results = ingest(
        &args.bucket,
        &payload,
        args.chain,
        config,
        super::open_store(config),
    )
    .await;

    let mut writer =
        super::result_writer(args.output.as_deref(), args.format, config.output.pretty)?;
    writer.write_all(&results)?;
    writer.flush()?;

    if let Some(failed) = results.iter().find(|r| !r.success) {
        anyhow::bail!(
            "Ingest stopped: {}",
            failed.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
