//! Image decode and normalization profiles applied before recognition.
//!
//! A profile is a named, ordered filter list: optional upscale, grayscale,
//! optional gamma, optional binarization (blur, adaptive threshold,
//! morphological close + open). Profiles are plain values so the benchmark can
//! name the profile each pass used in the report.

pub mod filters;

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageError};
use serde::Serialize;

/// Named presets selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileKind {
    /// Always upscale x2, grayscale.
    ScaledGray,
    /// Upscale x1.5 when the short side is under 1000 px, grayscale, gamma 1.2.
    GammaGray,
    /// Grayscale, light blur, adaptive threshold, close + open.
    Binarized,
}

impl ProfileKind {
    pub fn profile(self) -> NormalizationProfile {
        match self {
            ProfileKind::ScaledGray => NormalizationProfile::scaled_gray(),
            ProfileKind::GammaGray => NormalizationProfile::gamma_gray(),
            ProfileKind::Binarized => NormalizationProfile::binarized(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Upscale {
    None,
    Always { factor: f32 },
    /// Scale only when `min(width, height) < min_side`.
    BelowMinSide { min_side: u32, factor: f32 },
}

impl Upscale {
    /// Target dimensions, or `None` when the image is kept as is.
    pub fn target(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let factor = match *self {
            Upscale::None => return None,
            Upscale::Always { factor } => factor,
            Upscale::BelowMinSide { min_side, factor } => {
                if width.min(height) >= min_side {
                    return None;
                }
                factor
            }
        };
        let scaled = |v: u32| ((v as f32 * factor).round() as u32).max(1);
        Some((scaled(width), scaled(height)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Binarize {
    /// Gaussian blur before thresholding.
    pub blur_sigma: Option<f32>,
    /// Threshold window is `2 * block_radius + 1` pixels square.
    pub block_radius: u32,
    /// Subtracted from the local mean (mean-C thresholding).
    pub offset: i32,
    /// L-inf radius for the close and open passes; 0 skips them.
    pub kernel_radius: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationProfile {
    pub name: String,
    pub upscale: Upscale,
    pub gamma: Option<f32>,
    pub binarize: Option<Binarize>,
}

impl NormalizationProfile {
    pub fn scaled_gray() -> Self {
        Self {
            name: "scaled-gray".into(),
            upscale: Upscale::Always { factor: 2.0 },
            gamma: None,
            binarize: None,
        }
    }

    pub fn gamma_gray() -> Self {
        Self {
            name: "gamma-gray".into(),
            upscale: Upscale::BelowMinSide {
                min_side: 1000,
                factor: 1.5,
            },
            gamma: Some(1.2),
            binarize: None,
        }
    }

    pub fn binarized() -> Self {
        Self {
            name: "binarized".into(),
            upscale: Upscale::None,
            gamma: None,
            binarize: Some(Binarize {
                blur_sigma: Some(0.8),
                block_radius: 15,
                offset: 10,
                kernel_radius: 1,
            }),
        }
    }

    /// Run the filter chain on a decoded image.
    pub fn apply(&self, image: &DynamicImage) -> GrayImage {
        let mut gray = match self.upscale.target(image.width(), image.height()) {
            Some((w, h)) => image.resize_exact(w, h, FilterType::Triangle).to_luma8(),
            None => image.to_luma8(),
        };

        if let Some(gamma) = self.gamma {
            filters::apply_gamma(&mut gray, gamma);
        }

        if let Some(params) = self.binarize {
            gray = filters::binarize(&gray, &params);
        }

        gray
    }
}

/// Decode an image file; the codec is picked from the content and extension.
pub fn decode(path: &Path) -> Result<DynamicImage, ImageError> {
    image::open(path)
}

/// Write a normalized bitmap into `dir` under `file_name`.
pub fn write_artifact(bitmap: &GrayImage, dir: &Path, file_name: &str) -> Result<PathBuf, ImageError> {
    let out = dir.join(file_name);
    bitmap.save(&out)?;
    Ok(out)
}
