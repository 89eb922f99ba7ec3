//! Perceptual raster-to-SVG vectorization: quantize an image into a small
//! palette, extract connected regions of each color, and emit a filled-path
//! SVG document.
//!
//! The five pipeline stages live in their own modules and are wired together
//! in [`pipeline`]. [`pipeline::vectorize`] is the simplest entry point;
//! [`pipeline::Pipeline`] is for callers that want to reuse a thread pool or
//! cancel an in-flight run.

pub mod cancel;
pub mod color;
pub mod config;
pub mod config_builder;
pub mod edges;
pub mod error;
pub mod execution;
pub mod pipeline;
pub mod preprocessing;
pub mod quantize;
pub mod regions;
pub mod simplify;
pub mod svg;
pub mod types;

pub use cancel::CancellationToken;
pub use config::{EdgeOverlayConfig, EdgeVariant, QualityPreset, VectorizeConfig};
pub use config_builder::{ConfigBuilder, ConfigBuilderError};
pub use error::{CoreError, CoreResult, CoreWarning, VectorizeOutput};
pub use execution::{PipelineFactory, ThreadPoolConfig};
pub use pipeline::{vectorize, Pipeline};
