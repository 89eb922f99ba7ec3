//! Stage 1: decode, normalize, and lightly clean up the input image.

use image::{DynamicImage, GenericImageView};

use crate::config::VectorizeConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::Image;

const MIN_SIDE: u32 = 3;

/// Decodes `bytes` (PNG or JPEG, format auto-detected) and runs the
/// preprocessor: alpha compositing onto opaque white, optional downscale,
/// Gaussian blur, and a linear contrast stretch.
pub fn preprocess(bytes: &[u8], config: &VectorizeConfig) -> CoreResult<Image> {
    let decoded = image::load_from_memory(bytes).map_err(|e| {
        CoreError::decode_failed(format!("could not decode image: {e}"))
    })?;

    let (width, height) = decoded.dimensions();
    validate_dimensions(width, height)?;

    let rgb = composite_onto_white(decoded);
    let resized = match config.max_dimension {
        Some(max_dim) => resize_to_fit(rgb, max_dim),
        None => rgb,
    };

    let blurred = if config.blur_radius > 0.0 {
        image::imageops::blur(&resized, config.blur_radius)
    } else {
        resized
    };

    let contrasted = apply_contrast_boost(blurred, config.contrast_boost);

    let (w, h) = contrasted.dimensions();
    validate_dimensions(w, h)?;

    Ok(Image::new(w, h, contrasted.into_raw()))
}

fn validate_dimensions(width: u32, height: u32) -> CoreResult<()> {
    if width < MIN_SIDE || height < MIN_SIDE {
        return Err(CoreError::invalid_dimensions(
            width,
            height,
            format!("both sides must be at least {MIN_SIDE}x{MIN_SIDE}"),
        ));
    }
    Ok(())
}

/// Composites any alpha channel onto opaque white and drops it, producing a
/// plain RGB8 buffer.
fn composite_onto_white(image: DynamicImage) -> image::RgbImage {
    let rgba = image.to_rgba8();
    image::RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        let alpha = p.0[3] as f32 / 255.0;
        let blend = |channel: u8| -> u8 {
            (channel as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8
        };
        image::Rgb([blend(p.0[0]), blend(p.0[1]), blend(p.0[2])])
    })
}

/// Downscales preserving aspect ratio if the larger side exceeds `max_dimension`.
fn resize_to_fit(image: image::RgbImage, max_dimension: u32) -> image::RgbImage {
    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return image;
    }

    let scale = if width > height {
        max_dimension as f32 / width as f32
    } else {
        max_dimension as f32 / height as f32
    };

    let new_width = ((width as f32 * scale).round() as u32).max(1);
    let new_height = ((height as f32 * scale).round() as u32).max(1);

    image::imageops::resize(
        &image,
        new_width,
        new_height,
        image::imageops::FilterType::Lanczos3,
    )
}

/// Linear contrast stretch around the mid-gray point, `factor` in `[0.5, 2.0]`.
fn apply_contrast_boost(mut image: image::RgbImage, factor: f32) -> image::RgbImage {
    if (factor - 1.0).abs() < f32::EPSILON {
        return image;
    }
    for pixel in image.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let centered = *channel as f32 - 128.0;
            *channel = (centered * factor + 128.0).clamp(0.0, 255.0) as u8;
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img.clone())
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decodes_and_composites_alpha() {
        let mut img: image::RgbaImage = ImageBuffer::new(10, 10);
        for p in img.pixels_mut() {
            *p = Rgba([255, 0, 0, 128]);
        }
        let bytes = encode_png(&img);
        let config = VectorizeConfig { blur_radius: 0.0, ..VectorizeConfig::default() };
        let image = preprocess(&bytes, &config).unwrap();
        assert_eq!((image.width(), image.height()), (10, 10));
        // Half-alpha red over white should land roughly mid-way between red and white.
        let pixel = image.pixel(0, 0);
        assert!(pixel[0] > 200);
        assert!(pixel[1] > 100 && pixel[1] < 200);
    }

    #[test]
    fn rejects_too_small_dimensions() {
        let img: image::RgbaImage = ImageBuffer::new(2, 2);
        let bytes = encode_png(&img);
        let config = VectorizeConfig::default();
        let result = preprocess(&bytes, &config);
        assert!(matches!(result, Err(CoreError::InvalidDimensions { .. })));
    }

    #[test]
    fn rejects_garbage_bytes() {
        let bytes: Vec<u8> = (0..12).collect();
        let config = VectorizeConfig::default();
        let result = preprocess(&bytes, &config);
        assert!(matches!(result, Err(CoreError::DecodeFailed { .. })));
    }

    #[test]
    fn downscales_to_max_dimension() {
        let img: image::RgbaImage = ImageBuffer::from_fn(200, 100, |_, _| Rgba([0, 0, 0, 255]));
        let bytes = encode_png(&img);
        let config = VectorizeConfig {
            max_dimension: Some(100),
            blur_radius: 0.0,
            ..VectorizeConfig::default()
        };
        let image = preprocess(&bytes, &config).unwrap();
        assert_eq!(image.width(), 100);
        assert_eq!(image.height(), 50);
    }

    #[test]
    fn contrast_boost_pushes_values_away_from_midgray() {
        let img: image::RgbaImage = ImageBuffer::from_fn(4, 4, |_, _| Rgba([180, 180, 180, 255]));
        let bytes = encode_png(&img);
        let config = VectorizeConfig {
            blur_radius: 0.0,
            contrast_boost: 2.0,
            ..VectorizeConfig::default()
        };
        let image = preprocess(&bytes, &config).unwrap();
        assert_eq!(image.pixel(0, 0), [232, 232, 232]);
    }
}
