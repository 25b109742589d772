//! # Image Scaling Module
//!
//! Resamples grayscale images to an exact target size with a bilinear filter.

use image::imageops::{self, FilterType};
use image::GrayImage;
use tracing;

use super::types::{PreprocessingError, ScaledImageResult};

/// Resizes an image to exactly `size` = (width, height) using bilinear interpolation.
///
/// The aspect ratio is not preserved; the output always has the requested
/// dimensions, whatever the input size.
///
/// # Errors
///
/// Returns `PreprocessingError::InvalidConfig` if either target dimension is zero.
///
/// # Examples
///
/// ```
/// use image::GrayImage;
/// use mooney::preprocessing::resize_image;
///
/// let img = GrayImage::new(640, 480);
/// let scaled = resize_image(&img, (400, 400)).unwrap();
/// assert_eq!(scaled.new_dimensions, (400, 400));
/// ```
pub fn resize_image(
    image: &GrayImage,
    size: (u32, u32),
) -> Result<ScaledImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();
    let (width, height) = size;

    if width == 0 || height == 0 {
        return Err(PreprocessingError::InvalidConfig {
            field: "image_size",
            message: format!("target size {}x{} must be non-zero", width, height),
        });
    }

    let original_dimensions = image.dimensions();

    // Triangle is the bilinear filter in the image crate
    let resized = imageops::resize(image, width, height, FilterType::Triangle);

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "mooney_preprocessing",
        "Resize completed in {}ms: {}x{} -> {}x{}",
        processing_time.as_millis(),
        original_dimensions.0,
        original_dimensions.1,
        width,
        height
    );

    Ok(ScaledImageResult {
        new_dimensions: resized.dimensions(),
        image: resized,
        original_dimensions,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}
