//! Pixel filters used by normalization profiles.

use image::{imageops, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;

use super::Binarize;

/// Gamma transfer table: `255 * (v / 255) ^ (1 / gamma)`.
/// Gamma above 1.0 lifts mid-tones; 0 and 255 are fixed points.
pub fn gamma_lut(gamma: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if gamma <= 0.0 {
        for (v, slot) in lut.iter_mut().enumerate() {
            *slot = v as u8;
        }
        return lut;
    }
    let inv = 1.0 / gamma;
    for (v, slot) in lut.iter_mut().enumerate() {
        let normalized = v as f32 / 255.0;
        *slot = (255.0 * normalized.powf(inv)).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

pub fn apply_gamma(image: &mut GrayImage, gamma: f32) {
    let lut = gamma_lut(gamma);
    for pixel in image.pixels_mut() {
        pixel[0] = lut[pixel[0] as usize];
    }
}

/// Mean-C adaptive threshold. A pixel becomes 255 when it is brighter than the
/// mean of its window minus `offset`, else 0. Windows are clipped at borders.
pub fn adaptive_threshold(image: &GrayImage, block_radius: u32, offset: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    // Summed-area table with a zero row/column in front.
    let stride = width as usize + 1;
    let mut integral = vec![0u64; stride * (height as usize + 1)];
    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += image.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let y0 = y.saturating_sub(block_radius) as usize;
        let y1 = (y + block_radius).min(height - 1) as usize + 1;
        for x in 0..width {
            let x0 = x.saturating_sub(block_radius) as usize;
            let x1 = (x + block_radius).min(width - 1) as usize + 1;

            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let count = ((x1 - x0) * (y1 - y0)) as i64;
            let value = image.get_pixel(x, y)[0] as i64;

            let level = if value * count > sum as i64 - offset as i64 * count {
                255
            } else {
                0
            };
            out.put_pixel(x, y, Luma([level]));
        }
    }
    out
}

/// Blur, threshold, then close and open to drop speckle.
pub fn binarize(image: &GrayImage, params: &Binarize) -> GrayImage {
    let blurred;
    let source = match params.blur_sigma {
        Some(sigma) if sigma > 0.0 => {
            blurred = imageops::blur(image, sigma);
            &blurred
        }
        _ => image,
    };

    let mut binary = adaptive_threshold(source, params.block_radius, params.offset);
    if params.kernel_radius > 0 {
        binary = morphology::close(&binary, Norm::LInf, params.kernel_radius);
        binary = morphology::open(&binary, Norm::LInf, params.kernel_radius);
    }
    binary
}
