//! Stage 3: optional edge detection, used to drive the SVG overlay stroke.

use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::color::luminance;
use crate::config::{EdgeVariant, VectorizeConfig};
use crate::error::{CoreError, CoreResult};
use crate::types::{EdgeMask, Image};

const MIN_SIDE: u32 = 3;

/// Produces a binary edge mask from a preprocessed image.
///
/// Implementations are selected once, at pipeline construction time, based
/// on `VectorizeConfig::edge_variant` — not re-dispatched on every call.
pub trait EdgeDetector: Send + Sync {
    fn detect(&self, image: &Image, config: &VectorizeConfig) -> CoreResult<EdgeMask>;
}

fn validate(image: &Image, config: &VectorizeConfig) -> CoreResult<()> {
    if image.width() < MIN_SIDE || image.height() < MIN_SIDE {
        return Err(CoreError::invalid_dimensions(
            image.width(),
            image.height(),
            format!("edge detection requires at least {MIN_SIDE}x{MIN_SIDE}"),
        ));
    }
    if config.edge_low_threshold > config.edge_high_threshold {
        return Err(CoreError::invalid_configuration(format!(
            "edge_low_threshold {} exceeds edge_high_threshold {}",
            config.edge_low_threshold, config.edge_high_threshold
        )));
    }
    Ok(())
}

fn to_grayscale(image: &Image) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([luminance(image.pixel(x, y)).round() as u8])
    })
}

fn sobel_magnitude(gray: &GrayImage) -> Vec<f32> {
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);
    gx.pixels()
        .zip(gy.pixels())
        .map(|(px, py)| {
            let x = px.0[0] as f32;
            let y = py.0[0] as f32;
            (x * x + y * y).sqrt()
        })
        .collect()
}

/// Connects weak-magnitude pixels to the mask only if they are 8-connected
/// (transitively) to a strong-magnitude pixel, the way Canny's second stage
/// works.
fn hysteresis(magnitude: &[f32], width: u32, height: u32, low: f32, high: f32) -> EdgeMask {
    let w = width as usize;
    let h = height as usize;
    let mut out = vec![0u8; w * h];
    let mut stack: Vec<usize> = Vec::new();

    for (i, &m) in magnitude.iter().enumerate() {
        if m >= high {
            out[i] = 255;
            stack.push(i);
        }
    }

    while let Some(idx) = stack.pop() {
        let x = (idx % w) as i32;
        let y = (idx / w) as i32;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx as usize >= w || ny as usize >= h {
                    continue;
                }
                let nidx = ny as usize * w + nx as usize;
                if out[nidx] == 0 && magnitude[nidx] >= low {
                    out[nidx] = 255;
                    stack.push(nidx);
                }
            }
        }
    }

    EdgeMask::new(width, height, out)
}

/// Single-threshold Sobel magnitude: anything at or above `edge_high_threshold`
/// (scaled to the gradient magnitude's natural range) is an edge.
#[derive(Debug, Default, Clone, Copy)]
pub struct SobelDetector;

impl EdgeDetector for SobelDetector {
    fn detect(&self, image: &Image, config: &VectorizeConfig) -> CoreResult<EdgeMask> {
        validate(image, config)?;
        let gray = to_grayscale(image);
        let magnitude = sobel_magnitude(&gray);
        let threshold = config.edge_high_threshold as f32;
        let out: Vec<u8> = magnitude
            .iter()
            .map(|&m| if m >= threshold { 255 } else { 0 })
            .collect();
        Ok(EdgeMask::new(image.width(), image.height(), out))
    }
}

/// Sobel magnitude, non-maximum suppression, and hysteresis thresholding via
/// `imageproc::edges::canny`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CannyDetector;

impl EdgeDetector for CannyDetector {
    fn detect(&self, image: &Image, config: &VectorizeConfig) -> CoreResult<EdgeMask> {
        validate(image, config)?;
        let gray = to_grayscale(image);
        let edges = imageproc::edges::canny(
            &gray,
            config.edge_low_threshold as f32,
            config.edge_high_threshold as f32,
        );
        let data: Vec<u8> = edges.pixels().map(|p| p.0[0]).collect();
        Ok(EdgeMask::new(image.width(), image.height(), data))
    }
}

/// Multi-scale Sobel (original resolution and lightly blurred) combined by
/// pixelwise maximum, then hysteresis thresholding. Named for a since-retired
/// neural backend; no model inference happens here.
#[derive(Debug, Default, Clone, Copy)]
pub struct AiEnhancedDetector;

impl EdgeDetector for AiEnhancedDetector {
    fn detect(&self, image: &Image, config: &VectorizeConfig) -> CoreResult<EdgeMask> {
        validate(image, config)?;
        let gray = to_grayscale(image);
        let blurred = image::imageops::blur(&gray, 1.5);

        let fine = sobel_magnitude(&gray);
        let coarse = sobel_magnitude(&blurred);

        let combined: Vec<f32> = fine
            .iter()
            .zip(coarse.iter())
            .map(|(&a, &b)| a.max(b))
            .collect();

        Ok(hysteresis(
            &combined,
            image.width(),
            image.height(),
            config.edge_low_threshold as f32,
            config.edge_high_threshold as f32,
        ))
    }
}

/// Builds the configured detector, or `None` for `EdgeVariant::None`.
pub fn build_detector(variant: EdgeVariant) -> Option<Box<dyn EdgeDetector>> {
    match variant {
        EdgeVariant::None => None,
        EdgeVariant::Sobel => Some(Box::new(SobelDetector)),
        EdgeVariant::Canny => Some(Box::new(CannyDetector)),
        EdgeVariant::AiEnhanced => Some(Box::new(AiEnhancedDetector)),
    }
}
