//! The `prism invoke` command: run one stage on one trigger payload.

use clap::Args;
use prism_core::router::read_payload;
use prism_core::{Config, StageHandler, StageKind};
use std::path::PathBuf;

use super::OutputFormat;

/// Arguments for the `invoke` command.
#[derive(Args, Debug)]
pub struct InvokeArgs {
    /// Stage to run (rotate, resize, zoom, greyscale)
    #[arg(short, long)]
    pub stage: StageKind,

    /// Trigger payload file ("-" or omitted reads stdin)
    #[arg(short, long)]
    pub payload: Option<PathBuf>,

    /// Output file for the result (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Result format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Keep base64 image data in the printed result
    #[arg(long)]
    pub include_image_data: bool,

    /// Write inline output image bytes to this file
    #[arg(long)]
    pub save_image: Option<PathBuf>,
}

/// Execute the invoke command.
pub async fn execute(args: InvokeArgs, config: &Config) -> anyhow::Result<()> {
    let payload = read_payload(args.payload.as_deref(), std::io::stdin().lock())?;
    let handler = StageHandler::for_kind(args.stage, config, super::open_store(config));

    let result = handler.handle(&payload).await;

    if let (Some(path), Some(bytes)) = (&args.save_image, &result.output_bytes) {
        tokio::fs::write(path, bytes).await?;
        tracing::info!("Output image written to {:?}", path);
    }

    let mut writer = super::result_writer(args.output.as_deref(), args.format, config.output.pretty)?
        .include_image_data(args.include_image_data);
    writer.write(&result)?;
    writer.flush()?;

    match result.error_message {
        Some(message) if !result.success => anyhow::bail!("{} failed: {}", args.stage, message),
        _ => Ok(()),
    }
}
