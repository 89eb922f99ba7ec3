//! sRGB <-> CIE L*a*b* color space conversion, D65 white point.
//!
//! The forward transform (sRGB -> linear -> XYZ -> Lab) and its inverse are
//! both needed: quantization clusters in Lab, then the resulting centroids
//! have to come back out as sRGB for the palette.

use nalgebra::{Matrix3, Vector3};

use crate::types::LabColor;

const D65_XN: f32 = 0.95047;
const D65_YN: f32 = 1.00000;
const D65_ZN: f32 = 1.08883;

fn srgb_to_linear(c: f32) -> f32 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c > 0.0031308 {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * c
    }
}

fn xyz_matrix() -> Matrix3<f32> {
    // Observer = 2 degrees, Illuminant = D65.
    Matrix3::new(
        0.4124564, 0.3575761, 0.1804375, 0.2126729, 0.7151522, 0.0721750, 0.0193339, 0.1191920,
        0.9503041,
    )
}

fn lab_f(t: f32) -> f32 {
    let delta: f32 = 6.0 / 29.0;
    if t > delta.powi(3) {
        t.cbrt()
    } else {
        t / (3.0 * delta.powi(2)) + 4.0 / 29.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    let delta: f32 = 6.0 / 29.0;
    if t > delta {
        t.powi(3)
    } else {
        3.0 * delta.powi(2) * (t - 4.0 / 29.0)
    }
}

/// Converts an sRGB 8-bit triple to CIE L*a*b*.
pub fn rgb_to_lab(rgb: [u8; 3]) -> LabColor {
    let linear: Vector3<f32> = Vector3::new(
        srgb_to_linear(rgb[0] as f32 / 255.0),
        srgb_to_linear(rgb[1] as f32 / 255.0),
        srgb_to_linear(rgb[2] as f32 / 255.0),
    );
    let xyz = xyz_matrix() * linear;

    let fx = lab_f(xyz[0] / D65_XN);
    let fy = lab_f(xyz[1] / D65_YN);
    let fz = lab_f(xyz[2] / D65_ZN);

    LabColor {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// Converts CIE L*a*b* back to an sRGB 8-bit triple, clamping out-of-gamut results.
pub fn lab_to_rgb(lab: LabColor) -> [u8; 3] {
    let fy = (lab.l + 16.0) / 116.0;
    let fx = fy + lab.a / 500.0;
    let fz = fy - lab.b / 200.0;

    let xyz = Vector3::new(
        lab_f_inv(fx) * D65_XN,
        lab_f_inv(fy) * D65_YN,
        lab_f_inv(fz) * D65_ZN,
    );

    let inv = xyz_matrix()
        .try_inverse()
        .expect("sRGB/XYZ matrix is non-singular by construction");
    let linear = inv * xyz;

    let to_u8 = |c: f32| (linear_to_srgb(c).clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_u8(linear[0]), to_u8(linear[1]), to_u8(linear[2])]
}

/// Converts an sRGB 8-bit triple to linear RGB in `[0, 1]`, for the
/// `use_lab = false` fast path.
pub fn rgb_to_linear(rgb: [u8; 3]) -> [f32; 3] {
    [
        srgb_to_linear(rgb[0] as f32 / 255.0),
        srgb_to_linear(rgb[1] as f32 / 255.0),
        srgb_to_linear(rgb[2] as f32 / 255.0),
    ]
}

/// Converts linear RGB in `[0, 1]` back to sRGB 8-bit, clamping.
pub fn linear_to_rgb(linear: [f32; 3]) -> [u8; 3] {
    let to_u8 = |c: f32| (linear_to_srgb(c).clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_u8(linear[0]), to_u8(linear[1]), to_u8(linear[2])]
}

/// Rec. 709 relative luminance of an sRGB 8-bit triple, used to sort the
/// final palette dark-to-light and as the grayscale input to edge detection.
pub fn luminance(rgb: [u8; 3]) -> f32 {
    0.2126 * rgb[0] as f32 + 0.7152 * rgb[1] as f32 + 0.0722 * rgb[2] as f32
}
