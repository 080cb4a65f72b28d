//! The `prism upload` command: put a local image into the store.

use clap::Args;
use prism_core::store::content_type_for_key;
use prism_core::{Config, ObjectStore, StageKind};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Arguments for the `upload` command.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Destination bucket
    pub bucket: String,

    /// Image file to upload
    pub file: PathBuf,

    /// Object key (defaults to the rotate stage's input prefix + file name)
    #[arg(short, long)]
    pub key: Option<String>,

    /// Content type (defaults to one guessed from the key)
    #[arg(long)]
    pub content_type: Option<String>,
}

/// What was stored, printed as JSON.
#[derive(Debug, Serialize)]
struct Uploaded<'a> {
    bucket: &'a str,
    key: &'a str,
    size: usize,
    content_type: &'a str,
}

/// Key an uploaded file lands under when none is given.
fn default_key(config: &Config, file: &Path) -> anyhow::Result<String> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Cannot derive an object key from {:?}", file))?;
    Ok(format!(
        "{}{}",
        config.stage_route(StageKind::Rotate).input_prefix,
        name
    ))
}

/// Execute the upload command.
pub async fn execute(args: UploadArgs, config: &Config) -> anyhow::Result<()> {
    let key = match args.key {
        Some(key) => key,
        None => default_key(config, &args.file)?,
    };
    let content_type = args
        .content_type
        .unwrap_or_else(|| content_type_for_key(&key).to_string());

    let bytes = tokio::fs::read(&args.file).await?;
    let size = bytes.len();
    super::open_store(config)
        .put(&args.bucket, &key, bytes, &content_type)
        .await?;
    tracing::info!("Uploaded {:?} to {}/{}", args.file, args.bucket, key);

    let uploaded = Uploaded {
        bucket: &args.bucket,
        key: &key,
        size,
        content_type: &content_type,
    };
    println!("{}", serde_json::to_string(&uploaded)?);
    Ok(())
}
