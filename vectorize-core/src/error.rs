//! Error and warning types returned by the vectorization pipeline.

use thiserror::Error;

/// Error type for the public `vectorize` entry point and every pipeline stage.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("failed to decode input image: {message}")]
    DecodeFailed { message: String },

    #[error("invalid image dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("resource limit exceeded: {message}")]
    ResourceExhausted { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal invariant violation ({code}): {message}")]
    Internal { code: &'static str, message: String },
}

impl CoreError {
    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::DecodeFailed { message: message.into() }
    }

    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions { width, height, reason: reason.into() }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration { message: message.into() }
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted { message: message.into() }
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::Internal { code, message: message.into() }
    }
}

impl From<image::ImageError> for CoreError {
    fn from(err: image::ImageError) -> Self {
        CoreError::decode_failed(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// A non-fatal condition surfaced alongside a successful `vectorize()` call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreWarning {
    /// More connected components were found than `max_regions`; the extractor
    /// raised `min_region_pixels` adaptively and re-ran region extraction.
    #[error(
        "region budget exceeded: found more than {max_regions} regions, \
         min_region_pixels raised from {original_min} to {adjusted_min}"
    )]
    RegionBudgetExceeded {
        max_regions: usize,
        original_min: u64,
        adjusted_min: u64,
    },
}

/// Successful output of `vectorize()`: the SVG document plus any warnings
/// collected along the way. Warnings never affect the SVG bytes themselves.
#[derive(Debug, Clone)]
pub struct VectorizeOutput {
    pub svg: String,
    pub warnings: Vec<CoreWarning>,
}
