//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.transform.resize_factor > 0.0 && self.transform.resize_factor.is_finite()) {
            return Err(ConfigError::ValidationError(
                "transform.resize_factor must be a positive number".into(),
            ));
        }
        if !(self.transform.zoom_fraction > 0.0 && self.transform.zoom_fraction <= 1.0) {
            return Err(ConfigError::ValidationError(
                "transform.zoom_fraction must be in (0.0, 1.0]".into(),
            ));
        }
        if self.transform.jpeg_quality == 0 || self.transform.jpeg_quality > 100 {
            return Err(ConfigError::ValidationError(
                "transform.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.limits.max_input_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_input_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }

        let mut listened = HashSet::new();
        for kind in &self.pipeline.chain {
            let route = self.stage_route(*kind);
            if route.output_prefix.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "stages.{kind}.output_prefix must not be empty"
                )));
            }
            if route.output_prefix == route.input_prefix && route.output_bucket.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "stages.{kind} writes to its own input prefix '{}'",
                    route.input_prefix
                )));
            }
            if !listened.insert(route.input_prefix.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "pipeline.chain has two stages listening on '{}'",
                    route.input_prefix
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageKind;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_resize_factor() {
        let mut config = Config::default();
        config.transform.resize_factor = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("resize_factor"));
    }

    #[test]
    fn test_validate_rejects_zoom_fraction_out_of_range() {
        let mut config = Config::default();
        config.transform.zoom_fraction = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("zoom_fraction"));

        config.transform.zoom_fraction = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_invalid_quality() {
        let mut config = Config::default();
        config.transform.jpeg_quality = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jpeg_quality"));
    }

    #[test]
    fn test_validate_rejects_self_triggering_stage() {
        let mut config = Config::default();
        config.stages.rotate.output_prefix = Some("input/".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("own input prefix"));
    }

    #[test]
    fn test_validate_allows_same_prefix_in_another_bucket() {
        let mut config = Config::default();
        config.stages.rotate.output_prefix = Some("input/".into());
        config.stages.rotate.output_bucket = Some("other-bucket".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_competing_listeners() {
        let mut config = Config::default();
        config.pipeline.chain = vec![StageKind::Rotate, StageKind::Resize, StageKind::Zoom];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("two stages listening"));
    }
}
