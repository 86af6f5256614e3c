//! Binarization methods. Every output pixel is either 0 or 255.

use image::{GrayImage, Luma};

use super::filters::{box_kernel, convolve_separable, gaussian_kernel, Border};

const WHITE: u8 = 255;
const BLACK: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveWeighting {
    Gaussian,
    Mean,
}

/// A pixel is white iff it is brighter than its neighbourhood mean minus `c`.
///
/// `block_size` must already be validated as odd and at least 3.
pub fn adaptive_threshold(
    src: &GrayImage,
    block_size: u32,
    c: i32,
    weighting: AdaptiveWeighting,
) -> GrayImage {
    let kernel = match weighting {
        AdaptiveWeighting::Gaussian => gaussian_kernel(block_size),
        AdaptiveWeighting::Mean => box_kernel(block_size),
    };
    let means = convolve_separable(src, &kernel, Border::Replicate);
    let width = src.width();

    GrayImage::from_fn(src.width(), src.height(), |x, y| {
        let mean = means[(y * width + x) as usize].round().clamp(0.0, 255.0) as i64;
        let value = i64::from(src.get_pixel(x, y)[0]);
        Luma([if value - mean > -i64::from(c) { WHITE } else { BLACK }])
    })
}

/// Global threshold maximizing between-class variance of the histogram.
pub fn otsu_level(src: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in src.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let total = src.width() as f64 * src.height() as f64;
    if total == 0.0 {
        return 0;
    }

    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut best_level = 0u8;
    let mut best_variance = 0.0f64;
    let mut background_weight = 0.0f64;
    let mut background_sum = 0.0f64;

    for (level, &count) in histogram.iter().enumerate() {
        background_weight += count as f64;
        if background_weight == 0.0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0.0 {
            break;
        }

        background_sum += level as f64 * count as f64;
        let background_mean = background_sum / background_weight;
        let foreground_mean = (weighted_total - background_sum) / foreground_weight;
        let diff = background_mean - foreground_mean;
        let variance = background_weight * foreground_weight * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }

    best_level
}

pub fn otsu_threshold(src: &GrayImage) -> GrayImage {
    let level = otsu_level(src);
    simple_threshold(src, level)
}

/// A pixel is white iff it is strictly brighter than `cutoff`.
pub fn simple_threshold(src: &GrayImage, cutoff: u8) -> GrayImage {
    GrayImage::from_fn(src.width(), src.height(), |x, y| {
        Luma([if src.get_pixel(x, y)[0] > cutoff {
            WHITE
        } else {
            BLACK
        }])
    })
}
