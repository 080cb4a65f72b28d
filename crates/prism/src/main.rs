//! Prism CLI - local host for the Prism staged image pipeline.
//!
//! Stages normally run behind an object store that triggers them on write.
//! The CLI hosts them against a directory-backed store instead, so a stage
//! can be invoked with a raw trigger payload, or a whole chain followed from
//! an uploaded image.
//!
//! # Usage
//!
//! ```bash
//! # Put an image under input/ in the "photos" bucket
//! prism upload photos ./cat.jpg
//!
//! # Or send it the way clients do, as a labelled base64 payload
//! echo '{"language":"rust","image":"..."}' | prism ingest photos
//!
//! # Follow it through rotate → resize → greyscale
//! prism chain photos input/cat.jpg
//!
//! # Invoke one stage with a trigger payload
//! echo '{"s3_bucket":"photos","s3_key":"stage1/cat.jpg"}' | prism invoke --stage zoom
//!
//! # View configuration
//! prism config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Prism - staged image processing: rotate, resize or zoom, greyscale.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "PRISM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Invoke a single stage with a trigger payload
    Invoke(cli::invoke::InvokeArgs),

    /// Ingest a base64 image payload under the chain's input prefix
    Ingest(cli::ingest::IngestArgs),

    /// Put an image into the local store
    Upload(cli::upload::UploadArgs),

    /// Follow an object through the configured stage chain
    Chain(cli::chain::ChainArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(prism_core::Config::default_path);
    let config = match cli::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `prism config path`."
            );
            prism_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Prism v{}", prism_core::VERSION);

    match cli.command {
        Commands::Invoke(args) => cli::invoke::execute(args, &config).await,
        Commands::Ingest(args) => cli::ingest::execute(args, &config).await,
        Commands::Upload(args) => cli::upload::execute(args, &config).await,
        Commands::Chain(args) => cli::chain::execute(args, &config).await,
        Commands::Config(args) => cli::config::execute(args, &config, &config_path).await,
    }
}
