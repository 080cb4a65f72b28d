//! The `prism chain` command: follow an object through every stage.

use clap::Args;
use prism_core::{Config, Pipeline};
use std::path::PathBuf;

use super::OutputFormat;

/// Arguments for the `chain` command.
#[derive(Args, Debug)]
pub struct ChainArgs {
    /// Bucket holding the starting object
    pub bucket: String,

    /// Key of the starting object (e.g. input/photo.jpg)
    pub key: String,

    /// Output file for the results (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Result format
    #[arg(short, long, value_enum, default_value = "jsonl")]
    pub format: OutputFormat,
}

/// Execute the chain command.
pub async fn execute(args: ChainArgs, config: &Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config, super::open_store(config));
    tracing::info!(
        "Running {} from {}/{}",
        pipeline.stage_names().join(" → "),
        args.bucket,
        args.key
    );

    let results = pipeline.run_chain(&args.bucket, &args.key).await;
    if results.is_empty() {
        anyhow::bail!("No stage listens on key '{}'", args.key);
    }

    let mut writer =
        super::result_writer(args.output.as_deref(), args.format, config.output.pretty)?;
    writer.write_all(&results)?;
    writer.flush()?;

    if let Some(failed) = results.iter().find(|r| !r.success) {
        anyhow::bail!(
            "Chain stopped after {} stage(s): {}",
            results.len(),
            failed.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    if let Some(last) = results.last().and_then(|r| r.output_location.as_ref()) {
        tracing::info!("Final output at {}", last);
    }
    Ok(())
}
