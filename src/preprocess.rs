//! Image variant generation.
//!
//! Each tile is OCR'd several times, once per variant. The variants target
//! different failure modes (low contrast, blur, speckle noise, uneven
//! lighting, broken strokes) so that at least one of them is legible.

use image::{imageops, DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use thiserror::Error;

use crate::config::PreprocessConfig;

/// Weight of the centre pixel in the 3x3 smoothing kernel; neighbours weigh 1.
const SMOOTH_CENTER_WEIGHT: u32 = 5;
const SMOOTH_TOTAL_WEIGHT: u32 = SMOOTH_CENTER_WEIGHT + 8;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("{kind} variant needs a non-empty image, got {width}x{height}")]
    EmptyImage {
        kind: VariantKind,
        width: u32,
        height: u32,
    },
}

/// The transforms applied to each tile, in the order they are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Original,
    Grayscale,
    Contrast,
    Sharpened,
    Denoised,
    Binary,
    AdaptiveThreshold,
    Closed,
}

impl VariantKind {
    pub const ALL: [VariantKind; 8] = [
        VariantKind::Original,
        VariantKind::Grayscale,
        VariantKind::Contrast,
        VariantKind::Sharpened,
        VariantKind::Denoised,
        VariantKind::Binary,
        VariantKind::AdaptiveThreshold,
        VariantKind::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Original => "original",
            VariantKind::Grayscale => "grayscale",
            VariantKind::Contrast => "contrast",
            VariantKind::Sharpened => "sharpened",
            VariantKind::Denoised => "denoised",
            VariantKind::Binary => "binary",
            VariantKind::AdaptiveThreshold => "adaptive-threshold",
            VariantKind::Closed => "closed",
        }
    }
}

impl std::fmt::Display for VariantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One transformed copy of a tile image.
#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub kind: VariantKind,
    pub image: DynamicImage,
}

impl ImageVariant {
    pub fn new(kind: VariantKind, image: DynamicImage) -> Self {
        Self { kind, image }
    }
}

/// Builds the variant set for a tile.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Lazily produce every variant of `source`.
    ///
    /// Variants whose transform fails are skipped. The original and grayscale
    /// variants cannot fail, so the sequence is never shorter than two.
    pub fn variants<'a>(&'a self, source: &DynamicImage) -> impl Iterator<Item = ImageVariant> + 'a {
        let rgb = DynamicImage::ImageRgb8(source.to_rgb8());
        let gray = source.to_luma8();

        VariantKind::ALL
            .into_iter()
            .filter_map(move |kind| match self.build(kind, &rgb, &gray) {
                Ok(image) => Some(ImageVariant::new(kind, image)),
                Err(e) => {
                    tracing::debug!("Skipping {} variant: {}", kind, e);
                    None
                }
            })
    }

    /// Build a single variant.
    pub fn build(
        &self,
        kind: VariantKind,
        rgb: &DynamicImage,
        gray: &GrayImage,
    ) -> Result<DynamicImage, PreprocessError> {
        let (width, height) = gray.dimensions();
        let empty = width == 0 || height == 0;
        if empty && !matches!(kind, VariantKind::Original | VariantKind::Grayscale) {
            return Err(PreprocessError::EmptyImage {
                kind,
                width,
                height,
            });
        }

        let cfg = &self.config;
        let image = match kind {
            VariantKind::Original => rgb.clone(),
            VariantKind::Grayscale => DynamicImage::ImageLuma8(gray.clone()),
            VariantKind::Contrast => {
                DynamicImage::ImageLuma8(enhance_contrast(gray, cfg.contrast_factor))
            }
            VariantKind::Sharpened => {
                let contrast = enhance_contrast(gray, cfg.contrast_factor);
                DynamicImage::ImageLuma8(enhance_sharpness(&contrast, cfg.sharpness_factor))
            }
            VariantKind::Denoised => DynamicImage::ImageLuma8(imageproc::filter::median_filter(
                gray,
                cfg.median_radius,
                cfg.median_radius,
            )),
            VariantKind::Binary => DynamicImage::ImageLuma8(binary_threshold(gray, cfg.binary_cutoff)),
            VariantKind::AdaptiveThreshold => DynamicImage::ImageLuma8(
                imageproc::contrast::adaptive_threshold(gray, cfg.adaptive_block_radius),
            ),
            VariantKind::Closed => DynamicImage::ImageLuma8(close_strokes(
                gray,
                cfg.binary_cutoff,
                cfg.closing_radius,
            )),
        };
        Ok(image)
    }
}

/// Stretch pixel values away from the image mean by `factor`.
pub fn enhance_contrast(gray: &GrayImage, factor: f32) -> GrayImage {
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return gray.clone();
    }
    let sum: u64 = pixels.iter().map(|&p| p as u64).sum();
    let mean = (sum as f32 / pixels.len() as f32).round();

    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        let value = mean + factor * (pixel[0] as f32 - mean);
        pixel[0] = value.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Push each interior pixel away from its smoothed neighbourhood by `factor`.
///
/// Border pixels are kept as-is.
pub fn enhance_sharpness(gray: &GrayImage, factor: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return gray.clone();
    }

    let mut out = gray.clone();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut weighted = 0u32;
            for dy in 0..3 {
                for dx in 0..3 {
                    weighted += gray.get_pixel(x + dx - 1, y + dy - 1)[0] as u32;
                }
            }
            let center = gray.get_pixel(x, y)[0] as u32;
            weighted += center * (SMOOTH_CENTER_WEIGHT - 1);

            let original = center as f32;
            let blurred = weighted as f32 / SMOOTH_TOTAL_WEIGHT as f32;
            let value = blurred + factor * (original - blurred);
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Pixels brighter than `cutoff` become white, everything else black.
pub fn binary_threshold(gray: &GrayImage, cutoff: u8) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > cutoff { 255 } else { 0 };
    }
    out
}

/// Close small gaps in dark strokes.
///
/// imageproc morphology treats white as foreground, so the binarised image
/// is inverted around the closing.
pub fn close_strokes(gray: &GrayImage, cutoff: u8, radius: u8) -> GrayImage {
    let mut strokes = binary_threshold(gray, cutoff);
    imageops::invert(&mut strokes);
    let mut closed = imageproc::morphology::close(&strokes, Norm::LInf, radius);
    imageops::invert(&mut closed);
    closed
}
