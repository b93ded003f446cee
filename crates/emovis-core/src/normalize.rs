//! Face crop normalization.
//!
//! Every face entering the pipeline is reduced to a single-channel 48×48
//! image before landmarks or classification are computed.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use ndarray::{Array2, Array3, ArrayViewD, Ix2, Ix3};
use thiserror::Error;

/// Side length of the normalized face image.
pub const FACE_SIZE: u32 = 48;

// ITU-R BT.601 luma weights, matching the usual BGR→gray conversion.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("image must have 2 or 3 dimensions, got {0}")]
    InvalidDimensions(usize),
    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(usize),
    #[error("image is empty ({width}x{height})")]
    Empty { width: usize, height: usize },
}

/// Normalize a raw face array to a 48×48 grayscale image.
///
/// Accepts `H×W` grayscale or `H×W×C` color in BGR(A) channel order. Color
/// input is converted to luma; the result is always resized with bilinear
/// filtering.
pub fn normalize(image: ArrayViewD<'_, u8>) -> Result<GrayImage, NormalizeError> {
    let gray = to_grayscale(image)?;
    Ok(image::imageops::resize(
        &gray,
        FACE_SIZE,
        FACE_SIZE,
        FilterType::Triangle,
    ))
}

/// Normalize a decoded image file.
pub fn normalize_dynamic(image: &DynamicImage) -> Result<GrayImage, NormalizeError> {
    if image.color().channel_count() == 1 {
        let luma = image.to_luma8();
        let (w, h) = luma.dimensions();
        let array = Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
            luma.get_pixel(x as u32, y as u32).0[0]
        });
        return normalize(array.view().into_dyn());
    }

    let rgb = image.to_rgb8();
    let (w, h) = rgb.dimensions();
    // Store as BGR so decoded files and camera frames share one code path.
    let array = Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
        rgb.get_pixel(x as u32, y as u32).0[2 - c]
    });
    normalize(array.view().into_dyn())
}

/// A normalized face as `0..=255` floats, indexed `[row, col]`.
pub fn to_pixels(face: &GrayImage) -> Array2<f32> {
    let (w, h) = face.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        face.get_pixel(x as u32, y as u32).0[0] as f32
    })
}

fn to_grayscale(image: ArrayViewD<'_, u8>) -> Result<GrayImage, NormalizeError> {
    match image.ndim() {
        2 => {
            let view = image
                .into_dimensionality::<Ix2>()
                .map_err(|_| NormalizeError::InvalidDimensions(2))?;
            let (h, w) = view.dim();
            check_not_empty(w, h)?;
            Ok(GrayImage::from_fn(w as u32, h as u32, |x, y| {
                Luma([view[[y as usize, x as usize]]])
            }))
        }
        3 => {
            let view = image
                .into_dimensionality::<Ix3>()
                .map_err(|_| NormalizeError::InvalidDimensions(3))?;
            let (h, w, c) = view.dim();
            if !matches!(c, 1 | 3 | 4) {
                return Err(NormalizeError::UnsupportedChannels(c));
            }
            check_not_empty(w, h)?;
            Ok(GrayImage::from_fn(w as u32, h as u32, |x, y| {
                let (x, y) = (x as usize, y as usize);
                if c == 1 {
                    return Luma([view[[y, x, 0]]]);
                }
                let b = view[[y, x, 0]] as f32;
                let g = view[[y, x, 1]] as f32;
                let r = view[[y, x, 2]] as f32;
                let luma = LUMA_R * r + LUMA_G * g + LUMA_B * b;
                Luma([luma.round().clamp(0.0, 255.0) as u8])
            }))
        }
        n => Err(NormalizeError::InvalidDimensions(n)),
    }
}

fn check_not_empty(width: usize, height: usize) -> Result<(), NormalizeError> {
    if width == 0 || height == 0 {
        return Err(NormalizeError::Empty { width, height });
    }
    Ok(())
}
