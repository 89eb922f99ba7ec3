//! Configuration types for the vectorization pipeline.

use serde::{Deserialize, Serialize};

/// A quality preset sets `num_colors` and `simplify_tolerance` together, the
/// way a caller who doesn't want to tune ten knobs individually would expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityPreset {
    Fast,
    Balanced,
    High,
    Ultra,
}

impl QualityPreset {
    /// Produces the base config for this preset. Per-field overrides (CLI
    /// flags, a caller-supplied partial config) are applied on top of this.
    pub fn apply(self) -> VectorizeConfig {
        let mut config = VectorizeConfig::default();
        match self {
            QualityPreset::Fast => {
                config.num_colors = 16;
                config.simplify_tolerance = 3.0;
                config.edge_variant = EdgeVariant::None;
            }
            QualityPreset::Balanced => {
                config.num_colors = 32;
                config.simplify_tolerance = 2.0;
                config.edge_variant = EdgeVariant::Sobel;
            }
            QualityPreset::High => {
                config.num_colors = 64;
                config.simplify_tolerance = 1.5;
                config.edge_variant = EdgeVariant::Canny;
            }
            QualityPreset::Ultra => {
                config.num_colors = 128;
                config.simplify_tolerance = 1.0;
                config.edge_variant = EdgeVariant::AiEnhanced;
            }
        }
        config
    }
}

/// Which edge detector implementation to run in stage 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeVariant {
    /// Skip edge detection entirely; no overlay is possible.
    None,
    /// Single-threshold Sobel magnitude. Baseline, required for conformance.
    Sobel,
    /// Sobel + non-maximum suppression + hysteresis.
    Canny,
    /// Multi-scale Sobel combined by pixelwise maximum, then hysteresis.
    /// Historically named for a neural backend; no ML inference is required.
    AiEnhanced,
}

/// Optional edge-mask overlay drawn as a final stroked path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeOverlayConfig {
    pub stroke_width: f32,
    pub opacity: f32,
}

impl Default for EdgeOverlayConfig {
    fn default() -> Self {
        Self { stroke_width: 0.5, opacity: 1.0 }
    }
}

/// Full configuration for a `vectorize()` call.
///
/// `Serialize`/`Deserialize` so a caller can load this from JSON; see
/// `ConfigBuilder` in `config_builder` for a validating, fluent alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizeConfig {
    // --- Preprocessor ---
    /// If the larger input side exceeds this, downscale preserving aspect
    /// ratio. `None` means no cap.
    pub max_dimension: Option<u32>,
    /// Gaussian blur radius in pixels, applied before quantization.
    pub blur_radius: f32,
    /// Linear contrast stretch factor around 128, range `[0.5, 2.0]`.
    pub contrast_boost: f32,

    // --- Quantizer ---
    /// Number of palette colors, `K in [2, 256]`.
    pub num_colors: u32,
    /// Cluster in CIE L*a*b* (true) or linear RGB (false, faster).
    pub use_lab: bool,
    /// Maximum k-means iterations.
    pub max_iterations: u32,
    /// RNG seed for k-means++ centroid seeding, for reproducibility.
    pub seed: u64,

    // --- Edge detector ---
    pub edge_variant: EdgeVariant,
    pub edge_low_threshold: u8,
    pub edge_high_threshold: u8,
    /// If set, a final stroked `<path>` overlays the detected edges.
    pub edge_overlay: Option<EdgeOverlayConfig>,

    // --- Region extractor ---
    /// Minimum pixel count for a connected component to survive filtering.
    /// `None` means use the default `max(8, 0.0001 * width * height)`.
    pub min_region_pixels: Option<u64>,
    /// Connected-component budget; exceeding it raises `min_region_pixels`
    /// adaptively and re-runs extraction, reporting `CoreWarning::RegionBudgetExceeded`.
    pub max_regions: usize,

    // --- Simplifier ---
    /// Douglas-Peucker tolerance, in pixels.
    pub simplify_tolerance: f64,
    /// Turning-angle threshold, in degrees, above which a retained point is
    /// rendered as a corner (`LineTo`) rather than curve-fitted.
    pub corner_angle_threshold: f32,
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        Self {
            max_dimension: None,
            blur_radius: 0.5,
            contrast_boost: 1.0,
            num_colors: 32,
            use_lab: true,
            max_iterations: 10,
            seed: 0,
            edge_variant: EdgeVariant::Sobel,
            edge_low_threshold: 30,
            edge_high_threshold: 90,
            edge_overlay: None,
            min_region_pixels: None,
            max_regions: 100_000,
            simplify_tolerance: 1.0,
            corner_angle_threshold: 60.0,
        }
    }
}

impl VectorizeConfig {
    /// The default `min_region_pixels`, derived from image size the way
    /// `max(8, 0.0001 * width * height)` is defined in the spec.
    pub fn effective_min_region_pixels(&self, width: u32, height: u32) -> u64 {
        self.min_region_pixels.unwrap_or_else(|| {
            let area = width as u64 * height as u64;
            (area / 10_000).max(8)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_the_documented_table() {
        assert_eq!(QualityPreset::Fast.apply().num_colors, 16);
        assert_eq!(QualityPreset::Fast.apply().edge_variant, EdgeVariant::None);
        assert_eq!(QualityPreset::Balanced.apply().num_colors, 32);
        assert_eq!(QualityPreset::High.apply().num_colors, 64);
        assert_eq!(QualityPreset::Ultra.apply().num_colors, 128);
        assert_eq!(QualityPreset::Ultra.apply().edge_variant, EdgeVariant::AiEnhanced);
    }

    #[test]
    fn min_region_pixels_has_a_floor_of_eight() {
        let config = VectorizeConfig::default();
        assert_eq!(config.effective_min_region_pixels(10, 10), 8);
        assert_eq!(config.effective_min_region_pixels(2000, 2000), 400);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = QualityPreset::High.apply();
        let json = serde_json::to_string(&config).unwrap();
        let back: VectorizeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
