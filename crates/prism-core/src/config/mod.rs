//! Configuration management for Prism.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default` with the values the deployed
//! pipeline used.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::stage::StageKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Prism.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Object store settings
    pub storage: StorageConfig,

    /// Per-stage addressing
    pub stages: StagesConfig,

    /// Transform parameters
    pub transform: TransformConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Chained pipeline settings
    pub pipeline: PipelineConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Resolved addressing for one stage, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRoute {
    pub input_prefix: String,
    pub output_prefix: String,
    pub output_bucket: Option<String>,
    pub preserve_content_type: bool,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.prism.prism/config.toml
    /// - Linux: ~/.config/prism/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\prism\config\config.toml
    ///
    /// Falls back to ~/.prism/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "prism", "prism")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".prism").join("config.toml")
            })
    }

    /// Get the resolved filesystem store root (with ~ expansion).
    pub fn storage_root(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.storage.root);
        PathBuf::from(expanded.into_owned())
    }

    /// Resolve a stage's addressing, filling unset fields from its defaults.
    pub fn stage_route(&self, kind: StageKind) -> StageRoute {
        let stage = self.stages.get(kind);
        StageRoute {
            input_prefix: stage
                .input_prefix
                .clone()
                .unwrap_or_else(|| kind.default_input_prefix().to_string()),
            output_prefix: stage
                .output_prefix
                .clone()
                .unwrap_or_else(|| kind.default_output_prefix().to_string()),
            output_bucket: stage
                .output_bucket
                .clone()
                .filter(|bucket| !bucket.is_empty()),
            preserve_content_type: stage.preserve_content_type,
        }
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transform.resize_factor, 1.5);
        assert_eq!(config.transform.zoom_fraction, 0.5);
        assert_eq!(config.limits.max_input_mb, 50);
        assert_eq!(
            config.pipeline.chain,
            vec![StageKind::Rotate, StageKind::Resize, StageKind::Greyscale]
        );
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[stages.rotate]"));
        assert!(toml.contains("[transform]"));
        assert!(toml.contains("output_prefix = \"stage1/\""));
    }

    #[test]
    fn test_default_routes_chain_by_prefix() {
        let config = Config::default();
        let rotate = config.stage_route(StageKind::Rotate);
        let resize = config.stage_route(StageKind::Resize);
        let greyscale = config.stage_route(StageKind::Greyscale);

        assert_eq!(rotate.input_prefix, "input/");
        assert_eq!(rotate.output_prefix, resize.input_prefix);
        assert_eq!(resize.output_prefix, greyscale.input_prefix);
        assert_eq!(greyscale.output_prefix, "output/");
        assert_eq!(rotate.output_bucket, None);
    }

    #[test]
    fn test_partial_stage_table_keeps_default_prefixes() {
        let config = Config::from_toml(
            r#"
            [stages.zoom]
            output_bucket = "final-images"
            "#,
        )
        .unwrap();

        let zoom = config.stage_route(StageKind::Zoom);
        assert_eq!(zoom.input_prefix, "stage1/");
        assert_eq!(zoom.output_prefix, "stage2/");
        assert_eq!(zoom.output_bucket.as_deref(), Some("final-images"));
    }

    #[test]
    fn test_empty_output_bucket_means_source_bucket() {
        let config = Config::from_toml(
            r#"
            [stages.rotate]
            output_bucket = ""
            "#,
        )
        .unwrap();
        assert_eq!(config.stage_route(StageKind::Rotate).output_bucket, None);
    }

    #[test]
    fn test_chain_parses_stage_names() {
        let config = Config::from_toml(
            r#"
            [pipeline]
            chain = ["rotate", "zoom", "greyscale"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.pipeline.chain,
            vec![StageKind::Rotate, StageKind::Zoom, StageKind::Greyscale]
        );
    }

    #[test]
    fn test_unknown_stage_in_chain_fails_to_parse() {
        let err = Config::from_toml(
            r#"
            [pipeline]
            chain = ["rotate", "sharpen"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
