//! Separable linear filters over single-channel images.

use image::{GrayImage, Luma};

/// How out-of-range coordinates are mapped back into the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Border {
    /// `gfedcb|abcdefgh|gfedcba`
    Reflect101,
    /// `aaaaaa|abcdefgh|hhhhhhh`
    Replicate,
}

impl Border {
    fn resolve(self, index: isize, len: isize) -> usize {
        if len == 1 {
            return 0;
        }
        match self {
            Border::Replicate => index.clamp(0, len - 1) as usize,
            Border::Reflect101 => {
                let mut i = index;
                while i < 0 || i >= len {
                    if i < 0 {
                        i = -i;
                    }
                    if i >= len {
                        i = 2 * len - 2 - i;
                    }
                }
                i as usize
            }
        }
    }
}

/// Sigma used for a Gaussian kernel when only its size is known.
pub(crate) fn sigma_for_kernel(size: u32) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian kernel of odd `size`.
///
/// Sizes up to 7 use the fixed binomial-style tables common to OCR tooling so
/// small blurs match reference output exactly.
pub(crate) fn gaussian_kernel(size: u32) -> Vec<f32> {
    match size {
        1 => return vec![1.0],
        3 => return vec![0.25, 0.5, 0.25],
        5 => return vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => {
            return vec![
                0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
            ]
        }
        _ => {}
    }

    let sigma = sigma_for_kernel(size);
    let scale = -0.5 / (sigma * sigma);
    let center = (size / 2) as f32;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let x = i as f32 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

pub(crate) fn box_kernel(size: u32) -> Vec<f32> {
    vec![1.0 / size as f32; size as usize]
}

/// Applies `kernel` along both axes and returns the unrounded result.
pub(crate) fn convolve_separable(src: &GrayImage, kernel: &[f32], border: Border) -> Vec<f32> {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let radius = (kernel.len() / 2) as isize;
    let pixels: Vec<f32> = src.as_raw().iter().map(|&v| v as f32).collect();

    let mut horizontal = vec![0.0f32; width * height];
    for y in 0..height {
        let row = &pixels[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = border.resolve(x as isize + k as isize - radius, width as isize);
                acc += weight * row[sx];
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut output = vec![0.0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = border.resolve(y as isize + k as isize - radius, height as isize);
                acc += weight * horizontal[sy * width + x];
            }
            output[y * width + x] = acc;
        }
    }

    output
}

pub(crate) fn to_gray(values: &[f32], width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let v = values[(y * width + x) as usize];
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

/// Gaussian blur with an odd square kernel.
pub fn gaussian_blur(src: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 {
        return src.clone();
    }
    let kernel = gaussian_kernel(kernel_size);
    let blurred = convolve_separable(src, &kernel, Border::Reflect101);
    to_gray(&blurred, src.width(), src.height())
}
