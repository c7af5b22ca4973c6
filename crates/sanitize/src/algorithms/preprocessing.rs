use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    binary::BinaryMask,
    error::{Result, SanitizeError},
};

/// Real-valued luminance image.
pub type Grayscale = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Smallest width and height any strategy accepts.
pub const MIN_DIMENSION: u32 = 8;

const OTSU_BINS: usize = 256;
const ADAPTIVE_MIN_BLOCK: u32 = 35;
const ADAPTIVE_OFFSET: f32 = 10.0;

pub fn validate_dimensions(image: &RgbImage) -> Result<()> {
    let (width, height) = image.dimensions();
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(SanitizeError::InvalidInput {
            width,
            height,
            min: MIN_DIMENSION,
        });
    }
    Ok(())
}

/// `0.299 R + 0.587 G + 0.114 B` per pixel.
pub fn to_grayscale(image: &RgbImage) -> Grayscale {
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Luma([0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32])
    })
}

/// Quantize luminance for the `imageproc` filters that only take 8-bit input.
pub fn to_luma8(gray: &Grayscale) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([gray.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
    })
}

/// Whether glyph ink is darker or lighter than the paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    DarkOnLight,
    LightOnDark,
}

impl Polarity {
    pub fn is_dark_text(self) -> bool {
        self == Self::DarkOnLight
    }

    #[inline]
    fn is_ink(self, value: f32, threshold: f32) -> bool {
        match self {
            Self::DarkOnLight => value < threshold,
            Self::LightOnDark => value > threshold,
        }
    }
}

/// Compare the four corner pixels against the central third. Corners at
/// least as bright as the centre mean dark text.
pub fn detect_polarity(gray: &Grayscale) -> Result<Polarity> {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return Err(SanitizeError::InvalidInput {
            width: w,
            height: h,
            min: MIN_DIMENSION,
        });
    }

    let corner_mean = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)]
        .iter()
        .map(|&(x, y)| gray.get_pixel(x, y)[0] as f64)
        .sum::<f64>()
        / 4.0;

    let (x0, x1) = (w / 3, 2 * w / 3);
    let (y0, y1) = (h / 3, 2 * h / 3);
    let mut sum = 0.0f64;
    for y in y0..y1 {
        for x in x0..x1 {
            sum += gray.get_pixel(x, y)[0] as f64;
        }
    }
    let center_mean = sum / ((x1 - x0) * (y1 - y0)) as f64;

    Ok(if corner_mean >= center_mean {
        Polarity::DarkOnLight
    } else {
        Polarity::LightOnDark
    })
}

/// Otsu's threshold over a 256-bin histogram spanning the image's own
/// intensity range. The returned value is the centre of the last bin of the
/// lower class.
pub fn otsu_threshold(gray: &Grayscale) -> Result<f32> {
    let (min, max) = gray
        .pixels()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if !(max > min) {
        return Err(SanitizeError::AlgorithmFault(format!(
            "Otsu threshold undefined for constant image (value {min})"
        )));
    }

    let bin_width = (max - min) as f64 / OTSU_BINS as f64;
    let mut hist = [0f64; OTSU_BINS];
    for p in gray.pixels() {
        let idx = (((p[0] - min) as f64 / bin_width) as usize).min(OTSU_BINS - 1);
        hist[idx] += 1.0;
    }
    let centers: Vec<f64> = (0..OTSU_BINS)
        .map(|i| min as f64 + bin_width * (i as f64 + 0.5))
        .collect();

    // Cumulative class weights and means from both ends.
    let mut weight_lo = [0f64; OTSU_BINS];
    let mut mean_lo = [0f64; OTSU_BINS];
    let (mut w, mut s) = (0.0, 0.0);
    for i in 0..OTSU_BINS {
        w += hist[i];
        s += hist[i] * centers[i];
        weight_lo[i] = w;
        mean_lo[i] = if w > 0.0 { s / w } else { 0.0 };
    }
    let mut weight_hi = [0f64; OTSU_BINS];
    let mut mean_hi = [0f64; OTSU_BINS];
    let (mut w, mut s) = (0.0, 0.0);
    for i in (0..OTSU_BINS).rev() {
        w += hist[i];
        s += hist[i] * centers[i];
        weight_hi[i] = w;
        mean_hi[i] = if w > 0.0 { s / w } else { 0.0 };
    }

    let mut best = (0usize, f64::NEG_INFINITY);
    for i in 0..OTSU_BINS - 1 {
        let diff = mean_lo[i] - mean_hi[i + 1];
        let variance = weight_lo[i] * weight_hi[i + 1] * diff * diff;
        if variance > best.1 {
            best = (i, variance);
        }
    }
    Ok(centers[best.0] as f32)
}

/// How the binarization threshold is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Thresholding {
    /// One Otsu threshold for the whole image.
    #[default]
    Global,
    /// Gaussian-weighted local mean minus a fixed offset.
    Adaptive,
}

/// Odd block size for local thresholding: `max(35, min(w, h) / 10)`.
pub fn adaptive_block_size(width: u32, height: u32) -> u32 {
    let block = ADAPTIVE_MIN_BLOCK.max(width.min(height) / 10);
    if block % 2 == 0 { block + 1 } else { block }
}

/// Foreground mask of the ink pixels.
pub fn binarize(gray: &Grayscale, polarity: Polarity, thresholding: Thresholding) -> Result<BinaryMask> {
    let (w, h) = gray.dimensions();
    match thresholding {
        Thresholding::Global => {
            let threshold = otsu_threshold(gray)?;
            debug!(threshold, ?polarity, "global binarization");
            Ok(BinaryMask::from_fn(w, h, |x, y| {
                polarity.is_ink(gray.get_pixel(x, y)[0], threshold)
            }))
        }
        Thresholding::Adaptive => {
            let block = adaptive_block_size(w, h);
            let sigma = (block - 1) as f32 / 6.0;
            let local = imageproc::filter::gaussian_blur_f32(&to_luma8(gray), sigma);
            debug!(block, sigma, ?polarity, "adaptive binarization");
            Ok(BinaryMask::from_fn(w, h, |x, y| {
                let threshold = local.get_pixel(x, y)[0] as f32 - ADAPTIVE_OFFSET;
                polarity.is_ink(gray.get_pixel(x, y)[0], threshold)
            }))
        }
    }
}

/// Validate, convert, detect polarity and binarize in one go. Every strategy
/// derives its own mask through here; nothing is shared between calls.
pub fn foreground_mask(image: &RgbImage, thresholding: Thresholding) -> Result<BinaryMask> {
    validate_dimensions(image)?;
    let gray = to_grayscale(image);
    let polarity = detect_polarity(&gray)?;
    binarize(&gray, polarity, thresholding)
}
