//! Orchestrates the five pipeline stages behind the public `vectorize` entry
//! point.

use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::config::VectorizeConfig;
use crate::edges::{self, EdgeDetector};
use crate::error::{CoreResult, VectorizeOutput};
use crate::execution::PipelineFactory;
use crate::preprocessing;
use crate::quantize::{KMeansQuantizer, Quantizer};
use crate::regions;
use crate::simplify;
use crate::svg;
use crate::types::FittedRegion;

/// Owns the thread pool and the stage implementations selected for a given
/// `edge_variant`, so repeated `run` calls don't re-dispatch on the enum or
/// rebuild a thread pool every time.
pub struct Pipeline {
    factory: PipelineFactory,
    quantizer: Box<dyn Quantizer>,
    detector: Option<Box<dyn EdgeDetector>>,
}

impl Pipeline {
    pub fn new(factory: PipelineFactory, config: &VectorizeConfig) -> Self {
        Self {
            factory,
            quantizer: Box::new(KMeansQuantizer),
            detector: edges::build_detector(config.edge_variant),
        }
    }

    pub fn factory(&self) -> &PipelineFactory {
        &self.factory
    }

    /// Runs the full pipeline against already-decoded configuration,
    /// checking `cancel` between every stage.
    pub fn run(
        &self,
        bytes: &[u8],
        config: &VectorizeConfig,
        cancel: &CancellationToken,
    ) -> CoreResult<VectorizeOutput> {
        cancel.check()?;
        let image = preprocessing::preprocess(bytes, config)?;

        cancel.check()?;
        let (palette, indices) =
            self.factory.install(|| self.quantizer.quantize(&image, config))?;

        cancel.check()?;
        let edge_mask = match &self.detector {
            Some(detector) => Some(detector.detect(&image, config)?),
            None => None,
        };

        cancel.check()?;
        let (regions, warning) = regions::extract_regions(&indices, config, cancel)?;

        cancel.check()?;
        let fitted: Vec<FittedRegion> = self.factory.install(|| {
            regions
                .par_iter()
                .map(|region| simplify::fit_region(region, config, &palette))
                .collect()
        });

        let overlay = match (&config.edge_overlay, &edge_mask) {
            (Some(overlay_cfg), Some(mask)) => Some((mask, overlay_cfg)),
            _ => None,
        };
        let svg = svg::assemble(image.width(), image.height(), &fitted, overlay);

        Ok(VectorizeOutput { svg, warnings: warning.into_iter().collect() })
    }
}

/// Convenience entry point: builds a default thread pool and a fresh
/// cancellation token internally. Callers that need to cancel mid-run or
/// reuse a thread pool across many calls should build a `Pipeline` directly.
pub fn vectorize(bytes: &[u8], config: &VectorizeConfig) -> CoreResult<VectorizeOutput> {
    let factory = PipelineFactory::default();
    let pipeline = Pipeline::new(factory, config);
    pipeline.run(bytes, config, &CancellationToken::new())
}
