//! Fluent, validating builder for `VectorizeConfig`.
//!
//! Mirrors the shape of a typical trace-configuration builder: each setter
//! validates its argument immediately, and `build()` performs a final
//! cross-field validation pass. Validation failures here are distinct from
//! `CoreError::InvalidConfiguration` — they're caught before a
//! `VectorizeConfig` even exists, so there is nothing yet for the pipeline to
//! reject.

use crate::config::{EdgeOverlayConfig, EdgeVariant, QualityPreset, VectorizeConfig};

/// Error produced while building a `VectorizeConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigBuilderError {
    InvalidParameter(String),
}

impl std::fmt::Display for ConfigBuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigBuilderError::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
        }
    }
}

impl std::error::Error for ConfigBuilderError {}

pub type ConfigBuilderResult<T> = Result<T, ConfigBuilderError>;

/// Builder pattern for constructing `VectorizeConfig` instances with
/// validation at each step.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: VectorizeConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self { config: VectorizeConfig::default() }
    }
}

impl ConfigBuilder {
    /// Starts from a quality preset rather than the bare defaults.
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self { config: preset.apply() }
    }

    pub fn max_dimension(mut self, value: u32) -> ConfigBuilderResult<Self> {
        if value == 0 {
            return Err(ConfigBuilderError::InvalidParameter(
                "max_dimension must be positive".into(),
            ));
        }
        self.config.max_dimension = Some(value);
        Ok(self)
    }

    pub fn blur_radius(mut self, value: f32) -> ConfigBuilderResult<Self> {
        if !(0.0..=10.0).contains(&value) {
            return Err(ConfigBuilderError::InvalidParameter(format!(
                "blur_radius {value} out of range [0.0, 10.0]"
            )));
        }
        self.config.blur_radius = value;
        Ok(self)
    }

    pub fn contrast_boost(mut self, value: f32) -> ConfigBuilderResult<Self> {
        if !(0.5..=2.0).contains(&value) {
            return Err(ConfigBuilderError::InvalidParameter(format!(
                "contrast_boost {value} out of range [0.5, 2.0]"
            )));
        }
        self.config.contrast_boost = value;
        Ok(self)
    }

    pub fn num_colors(mut self, value: u32) -> ConfigBuilderResult<Self> {
        if !(2..=256).contains(&value) {
            return Err(ConfigBuilderError::InvalidParameter(format!(
                "num_colors {value} out of range [2, 256]"
            )));
        }
        self.config.num_colors = value;
        Ok(self)
    }

    pub fn use_lab(mut self, value: bool) -> Self {
        self.config.use_lab = value;
        self
    }

    pub fn max_iterations(mut self, value: u32) -> ConfigBuilderResult<Self> {
        if value == 0 {
            return Err(ConfigBuilderError::InvalidParameter(
                "max_iterations must be positive".into(),
            ));
        }
        self.config.max_iterations = value;
        Ok(self)
    }

    pub fn seed(mut self, value: u64) -> Self {
        self.config.seed = value;
        self
    }

    pub fn edge_variant(mut self, value: EdgeVariant) -> Self {
        self.config.edge_variant = value;
        self
    }

    pub fn edge_thresholds(mut self, low: u8, high: u8) -> ConfigBuilderResult<Self> {
        if low > high {
            return Err(ConfigBuilderError::InvalidParameter(format!(
                "low threshold {low} must not exceed high threshold {high}"
            )));
        }
        self.config.edge_low_threshold = low;
        self.config.edge_high_threshold = high;
        Ok(self)
    }

    pub fn edge_overlay(mut self, overlay: EdgeOverlayConfig) -> Self {
        self.config.edge_overlay = Some(overlay);
        self
    }

    pub fn min_region_pixels(mut self, value: u64) -> Self {
        self.config.min_region_pixels = Some(value);
        self
    }

    pub fn max_regions(mut self, value: usize) -> ConfigBuilderResult<Self> {
        if value == 0 {
            return Err(ConfigBuilderError::InvalidParameter(
                "max_regions must be positive".into(),
            ));
        }
        self.config.max_regions = value;
        Ok(self)
    }

    pub fn simplify_tolerance(mut self, value: f64) -> ConfigBuilderResult<Self> {
        if value < 0.0 {
            return Err(ConfigBuilderError::InvalidParameter(
                "simplify_tolerance must be non-negative".into(),
            ));
        }
        self.config.simplify_tolerance = value;
        Ok(self)
    }

    pub fn corner_angle_threshold(mut self, value: f32) -> ConfigBuilderResult<Self> {
        if !(0.0..=180.0).contains(&value) {
            return Err(ConfigBuilderError::InvalidParameter(format!(
                "corner_angle_threshold {value} out of range [0.0, 180.0]"
            )));
        }
        self.config.corner_angle_threshold = value;
        Ok(self)
    }

    /// Final cross-field validation pass, then hands back the built config.
    pub fn build(self) -> ConfigBuilderResult<VectorizeConfig> {
        if self.config.edge_low_threshold > self.config.edge_high_threshold {
            return Err(ConfigBuilderError::InvalidParameter(
                "edge low threshold exceeds high threshold".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_from_preset_allows_overrides() {
        let config = ConfigBuilder::from_preset(QualityPreset::Fast)
            .seed(42)
            .num_colors(8)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.num_colors, 8);
        assert_eq!(config.seed, 42);
        // simplify_tolerance from the preset is preserved.
        assert_eq!(config.simplify_tolerance, 3.0);
    }

    #[test]
    fn rejects_num_colors_out_of_range() {
        let err = ConfigBuilder::default().num_colors(1);
        assert!(err.is_err());
        let err = ConfigBuilder::default().num_colors(300);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_inverted_edge_thresholds() {
        let err = ConfigBuilder::default().edge_thresholds(90, 30);
        assert!(err.is_err());
    }

    #[test]
    fn default_builder_builds_default_config() {
        let config = ConfigBuilder::default().build().unwrap();
        assert_eq!(config, VectorizeConfig::default());
    }
}
