//! The `prism config` command for configuration management.

use clap::{Args, Subcommand};
use prism_core::Config;
use std::path::Path;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
///
/// `config` is the configuration already loaded from `path`.
pub async fn execute(args: ConfigArgs, config: &Config, path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, Config::default().to_toml()?).await?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(force: bool) -> ConfigArgs {
        ConfigArgs {
            command: ConfigCommand::Init { force },
        }
    }

    #[tokio::test]
    async fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        execute(init(false), &Config::default(), &path).await.unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.transform.jpeg_quality, 90);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# mine\n").unwrap();

        assert!(execute(init(false), &Config::default(), &path).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");

        execute(init(true), &Config::default(), &path).await.unwrap();
        assert!(Config::load_from(&path).is_ok());
    }
}
