//! Stage 2: perceptual color quantization via k-means.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::color::{lab_to_rgb, linear_to_rgb, luminance, rgb_to_lab, rgb_to_linear};
use crate::config::VectorizeConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{Image, IndexMap, LabColor, Palette, PaletteColor};

const CONVERGENCE_THRESHOLD_SQ: f32 = 1e-3 * 1e-3;
const MIN_COLORS: u32 = 2;
const MAX_COLORS: u32 = 256;

/// Maps an image to a small palette plus a per-pixel index into it.
///
/// Implementations are selected once at pipeline construction time, the way
/// `crate::edges::EdgeDetector` is, rather than dispatched per call.
pub trait Quantizer: Send + Sync {
    fn quantize(&self, image: &Image, config: &VectorizeConfig) -> CoreResult<(Palette, IndexMap)>;
}

/// K-means clustering seeded with k-means++, run in CIE L*a*b* or linear RGB
/// depending on `VectorizeConfig::use_lab`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KMeansQuantizer;

impl Quantizer for KMeansQuantizer {
    fn quantize(&self, image: &Image, config: &VectorizeConfig) -> CoreResult<(Palette, IndexMap)> {
        if !(MIN_COLORS..=MAX_COLORS).contains(&config.num_colors) {
            return Err(CoreError::invalid_configuration(format!(
                "num_colors {} out of range [{MIN_COLORS}, {MAX_COLORS}]",
                config.num_colors
            )));
        }

        let width = image.width();
        let height = image.height();
        let pixel_count = width as usize * height as usize;
        let k = (config.num_colors as usize).min(pixel_count.max(1));

        let features: Vec<[f32; 3]> = (0..pixel_count)
            .into_par_iter()
            .map(|i| {
                let x = (i % width as usize) as u32;
                let y = (i / width as usize) as u32;
                to_feature(image.pixel(x, y), config.use_lab)
            })
            .collect();

        let mut rng = SmallRng::seed_from_u64(config.seed);
        let mut centroids = seed_plus_plus(&features, k, &mut rng);

        let mut assignments = vec![0usize; pixel_count];
        for _ in 0..config.max_iterations {
            assignments
                .par_iter_mut()
                .zip(features.par_iter())
                .for_each(|(slot, feat)| *slot = nearest_centroid(feat, &centroids));

            let sums = assignments
                .par_iter()
                .zip(features.par_iter())
                .fold(
                    || vec![(0.0f64, 0.0f64, 0.0f64, 0u64); k],
                    |mut acc, (&idx, feat)| {
                        acc[idx].0 += feat[0] as f64;
                        acc[idx].1 += feat[1] as f64;
                        acc[idx].2 += feat[2] as f64;
                        acc[idx].3 += 1;
                        acc
                    },
                )
                .reduce(
                    || vec![(0.0f64, 0.0f64, 0.0f64, 0u64); k],
                    |mut a, b| {
                        for i in 0..k {
                            a[i].0 += b[i].0;
                            a[i].1 += b[i].1;
                            a[i].2 += b[i].2;
                            a[i].3 += b[i].3;
                        }
                        a
                    },
                );

            let mut max_shift_sq = 0.0f32;
            for (i, (sl, sa, sb, count)) in sums.into_iter().enumerate() {
                if count == 0 {
                    // Empty cluster: keep the previous centroid rather than reseeding.
                    continue;
                }
                let new_centroid = [
                    (sl / count as f64) as f32,
                    (sa / count as f64) as f32,
                    (sb / count as f64) as f32,
                ];
                let shift_sq = squared_distance(&centroids[i], &new_centroid);
                max_shift_sq = max_shift_sq.max(shift_sq);
                centroids[i] = new_centroid;
            }

            if max_shift_sq < CONVERGENCE_THRESHOLD_SQ {
                break;
            }
        }

        // Final assignment pass against the converged centroids.
        assignments
            .par_iter_mut()
            .zip(features.par_iter())
            .for_each(|(slot, feat)| *slot = nearest_centroid(feat, &centroids));

        let palette_colors: Vec<PaletteColor> = centroids
            .iter()
            .map(|&c| from_feature(c, config.use_lab))
            .collect();

        // Sort the palette dark-to-light; remap assignments through the
        // resulting permutation so `IndexMap` entries stay valid.
        let mut order: Vec<usize> = (0..palette_colors.len()).collect();
        order.sort_by(|&a, &b| {
            luminance(palette_colors[a].rgb)
                .partial_cmp(&luminance(palette_colors[b].rgb))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        let mut old_to_new = vec![0u16; order.len()];
        for (new_idx, &old_idx) in order.iter().enumerate() {
            old_to_new[old_idx] = new_idx as u16;
        }

        let sorted_colors = order.iter().map(|&i| palette_colors[i]).collect();
        let indices: Vec<u16> = assignments.iter().map(|&a| old_to_new[a]).collect();

        Ok((
            Palette { colors: sorted_colors },
            IndexMap::new(width, height, indices),
        ))
    }
}

fn to_feature(rgb: [u8; 3], use_lab: bool) -> [f32; 3] {
    if use_lab {
        let lab = rgb_to_lab(rgb);
        [lab.l, lab.a, lab.b]
    } else {
        rgb_to_linear(rgb)
    }
}

fn from_feature(feature: [f32; 3], use_lab: bool) -> PaletteColor {
    if use_lab {
        let lab = LabColor { l: feature[0], a: feature[1], b: feature[2] };
        PaletteColor { rgb: lab_to_rgb(lab), lab }
    } else {
        let rgb = linear_to_rgb(feature);
        PaletteColor { rgb, lab: rgb_to_lab(rgb) }
    }
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0 * d0 + d1 * d1 + d2 * d2
}

/// Returns the index of the nearest centroid, with exact ties broken in
/// favor of the lower index.
fn nearest_centroid(feature: &[f32; 3], centroids: &[[f32; 3]]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f32::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(feature, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

/// k-means++ seeding: first centroid uniform at random, each subsequent one
/// drawn with probability proportional to its squared distance to the
/// nearest centroid chosen so far.
fn seed_plus_plus(features: &[[f32; 3]], k: usize, rng: &mut SmallRng) -> Vec<[f32; 3]> {
    if features.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut centroids = Vec::with_capacity(k);
    let first = rng.gen_range(0..features.len());
    centroids.push(features[first]);

    let mut min_dist_sq: Vec<f32> = features
        .iter()
        .map(|f| squared_distance(f, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = min_dist_sq.iter().map(|&d| d as f64).sum();
        let next_idx = if total <= 0.0 {
            // All remaining points coincide with an existing centroid; pick
            // arbitrarily but deterministically.
            rng.gen_range(0..features.len())
        } else {
            let target = rng.gen_range(0.0..total);
            let mut cumulative = 0.0f64;
            let mut chosen = features.len() - 1;
            for (i, &d) in min_dist_sq.iter().enumerate() {
                cumulative += d as f64;
                if cumulative >= target {
                    chosen = i;
                    break;
                }
            }
            chosen
        };

        let new_centroid = features[next_idx];
        for (i, feat) in features.iter().enumerate() {
            let d = squared_distance(feat, &new_centroid);
            if d < min_dist_sq[i] {
                min_dist_sq[i] = d;
            }
        }
        centroids.push(new_centroid);
    }

    centroids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(width: u32, height: u32, rgb: [u8; 3]) -> Image {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width * height) {
            data.extend_from_slice(&rgb);
        }
        Image::new(width, height, data)
    }

    #[test]
    fn rejects_num_colors_out_of_range() {
        let image = solid_image(4, 4, [255, 0, 0]);
        let config = VectorizeConfig { num_colors: 1, ..VectorizeConfig::default() };
        let result = KMeansQuantizer.quantize(&image, &config);
        assert!(matches!(result, Err(CoreError::InvalidConfiguration { .. })));
    }

    #[test]
    fn solid_color_image_converges_to_one_effective_color() {
        let image = solid_image(8, 8, [10, 200, 30]);
        let config = VectorizeConfig { num_colors: 4, seed: 7, ..VectorizeConfig::default() };
        let (palette, indices) = KMeansQuantizer.quantize(&image, &config).unwrap();
        let used: std::collections::HashSet<u16> = indices.as_slice().iter().copied().collect();
        assert_eq!(used.len(), 1);
        let idx = *used.iter().next().unwrap();
        let rgb = palette.colors[idx as usize].rgb;
        for (c, expected) in rgb.iter().zip([10u8, 200, 30]) {
            assert!((*c as i32 - expected as i32).abs() <= 3);
        }
    }

    #[test]
    fn palette_is_sorted_dark_to_light() {
        let mut data = Vec::new();
        for _ in 0..32 {
            data.extend_from_slice(&[0, 0, 0]);
        }
        for _ in 0..32 {
            data.extend_from_slice(&[255, 255, 255]);
        }
        let image = Image::new(8, 8, data);
        let config = VectorizeConfig { num_colors: 2, seed: 3, ..VectorizeConfig::default() };
        let (palette, _) = KMeansQuantizer.quantize(&image, &config).unwrap();
        assert_eq!(palette.len(), 2);
        assert!(luminance(palette.colors[0].rgb) <= luminance(palette.colors[1].rgb));
    }

    #[test]
    fn two_color_checkerboard_produces_two_clusters() {
        let width = 8u32;
        let height = 8u32;
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let rgb = if (x + y) % 2 == 0 { [20u8, 20, 200] } else { [220u8, 220, 20] };
                data.extend_from_slice(&rgb);
            }
        }
        let image = Image::new(width, height, data);
        let config = VectorizeConfig {
            num_colors: 2,
            seed: 11,
            use_lab: false,
            ..VectorizeConfig::default()
        };
        let (palette, indices) = KMeansQuantizer.quantize(&image, &config).unwrap();
        assert_eq!(palette.len(), 2);
        let used: std::collections::HashSet<u16> = indices.as_slice().iter().copied().collect();
        assert_eq!(used.len(), 2);
    }
}
