//! # Grayscale Conversion Module
//!
//! Luminance-preserving RGB to grayscale conversion using the Rec. 601 weights
//! `0.299 R + 0.587 G + 0.114 B`.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::map::map_colors;
use tracing;

use super::types::{GrayscaleImageResult, ImageArray};

const RED_WEIGHT: f64 = 0.299;
const GREEN_WEIGHT: f64 = 0.587;
const BLUE_WEIGHT: f64 = 0.114;

/// Weighted luminance of one RGB sample, rounded to the nearest intensity.
pub fn luminance(pixel: Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    let value =
        RED_WEIGHT * f64::from(r) + GREEN_WEIGHT * f64::from(g) + BLUE_WEIGHT * f64::from(b);
    value.round().clamp(0.0, 255.0) as u8
}

/// Converts an RGB image to grayscale.
///
/// # Examples
///
/// ```
/// use image::{Rgb, RgbImage};
/// use mooney::preprocessing::convert_to_grayscale;
///
/// let rgb = RgbImage::from_pixel(4, 4, Rgb([200, 200, 200]));
/// let gray = convert_to_grayscale(&rgb);
/// assert_eq!(gray.image.get_pixel(0, 0)[0], 200);
/// ```
pub fn convert_to_grayscale(image: &RgbImage) -> GrayscaleImageResult {
    let start_time = std::time::Instant::now();

    let gray: GrayImage = map_colors(image, |pixel| Luma([luminance(pixel)]));

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "mooney_preprocessing",
        "Grayscale conversion completed in {}ms: dimensions={}x{}",
        processing_time.as_millis(),
        gray.width(),
        gray.height()
    );

    GrayscaleImageResult {
        image: gray,
        processing_time_ms: processing_time.as_millis() as u32,
    }
}

/// Returns the grayscale version of any input image, converting colour input.
pub fn to_gray(image: &ImageArray) -> GrayImage {
    match image {
        ImageArray::Gray(gray) => gray.clone(),
        ImageArray::Rgb(rgb) => convert_to_grayscale(rgb).image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_weights() {
        assert_eq!(luminance(Rgb([255, 0, 0])), 76); // 76.245
        assert_eq!(luminance(Rgb([0, 255, 0])), 150); // 149.685
        assert_eq!(luminance(Rgb([0, 0, 255])), 29); // 29.07
        assert_eq!(luminance(Rgb([255, 255, 255])), 255);
        assert_eq!(luminance(Rgb([0, 0, 0])), 0);
    }

    #[test]
    fn test_luminance_rounds_to_nearest() {
        // 0.299 * 10 + 0.587 * 20 + 0.114 * 30 = 18.15
        assert_eq!(luminance(Rgb([10, 20, 30])), 18);
        // 0.299 * 100 + 0.587 * 51 + 0.114 * 0 = 59.837
        assert_eq!(luminance(Rgb([100, 51, 0])), 60);
    }

    #[test]
    fn test_convert_to_grayscale_every_pixel() {
        let mut rgb = RgbImage::new(3, 2);
        for (x, y, pixel) in rgb.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 80) as u8, (y * 120) as u8, ((x + y) * 40) as u8]);
        }

        let result = convert_to_grayscale(&rgb);
        assert_eq!(result.image.dimensions(), (3, 2));

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let expected = (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8;
            assert_eq!(result.image.get_pixel(x, y)[0], expected);
        }
    }

    #[test]
    fn test_to_gray_passes_grayscale_through() {
        let gray = GrayImage::from_pixel(5, 5, Luma([42]));
        let out = to_gray(&ImageArray::Gray(gray.clone()));
        assert_eq!(out, gray);
    }
}
