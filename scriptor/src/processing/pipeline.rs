use base64::Engine as _;
use image::{DynamicImage, GrayImage, ImageFormat};

use crate::error::{Result, ScriptorError};
use crate::models::{PreprocessingParams, ThresholdMethod};

use super::filters::gaussian_blur;
use super::threshold::{adaptive_threshold, otsu_threshold, simple_threshold, AdaptiveWeighting};

/// Binarize an image for recognition.
///
/// Steps, always in this order:
/// 1. Convert to 8-bit grayscale
/// 2. Gaussian blur (even kernel sizes are bumped to the next odd size)
/// 3. Threshold with the selected method
///
/// The output has the input's dimensions and only contains 0 and 255.
pub fn preprocess(image: &DynamicImage, params: &PreprocessingParams) -> Result<GrayImage> {
    params.validate()?;

    let gray = image.to_luma8();
    let blurred = gaussian_blur(&gray, params.effective_blur_kernel());

    let binary = match params.threshold_method {
        ThresholdMethod::AdaptiveGaussian => adaptive_threshold(
            &blurred,
            params.block_size,
            params.c_value,
            AdaptiveWeighting::Gaussian,
        ),
        ThresholdMethod::AdaptiveMean => adaptive_threshold(
            &blurred,
            params.block_size,
            params.c_value,
            AdaptiveWeighting::Mean,
        ),
        ThresholdMethod::Otsu => otsu_threshold(&blurred),
        ThresholdMethod::Simple => simple_threshold(&blurred, params.simple_thresh_value),
    };

    Ok(binary)
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| ScriptorError::Preprocessing(format!("Failed to encode image: {e}")))?;
    Ok(output)
}

/// Run the pipeline and return the result as a `data:image/png;base64,...` URL.
pub fn preview_data_url(image: &DynamicImage, params: &PreprocessingParams) -> Result<String> {
    let binary = preprocess(image, params)?;
    let png = encode_png(&DynamicImage::ImageLuma8(binary))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(png);
    Ok(format!("data:image/png;base64,{encoded}"))
}
