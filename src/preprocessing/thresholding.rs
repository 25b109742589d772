//! # Image Thresholding Module
//!
//! Binary thresholding with Otsu's method, either with one cutoff for the
//! whole image or with a per-pixel cutoff computed over a disk-shaped
//! neighborhood.

use image::{GrayImage, Luma};
use imageproc::map::map_colors;
use imageproc::stats::histogram;
use tracing;

use super::color::to_gray;
use super::types::{
    ImageArray, PreprocessingError, ThresholdMethod, ThresholdValue, ThresholdedImageResult,
};

/// Binary value for pixels at or above their cutoff.
pub const ON: u8 = 255;
/// Binary value for pixels below their cutoff.
pub const OFF: u8 = 0;

/// Thresholds a grayscale image with the selected method.
///
/// Every pixel whose intensity is greater than or equal to its cutoff becomes
/// [`ON`], every other pixel becomes [`OFF`]. A uniform image never fails: its
/// cutoff is the single intensity present and every pixel is classified on.
///
/// # Errors
///
/// Returns `PreprocessingError::InvalidConfig` for a local method with a zero radius.
///
/// # Examples
///
/// ```
/// use image::{GrayImage, Luma};
/// use mooney::preprocessing::{apply_threshold, ThresholdMethod};
///
/// let mut img = GrayImage::new(10, 10);
/// for (x, _, pixel) in img.enumerate_pixels_mut() {
///     pixel[0] = if x < 5 { 25 } else { 225 };
/// }
/// let result = apply_threshold(&img, ThresholdMethod::Global).unwrap();
/// let cutoff = result.threshold.as_global().unwrap();
/// assert!(cutoff > 25 && cutoff <= 225);
/// ```
pub fn apply_threshold(
    image: &GrayImage,
    method: ThresholdMethod,
) -> Result<ThresholdedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    method.validate()?;

    let (binary, threshold) = match method {
        ThresholdMethod::Global => {
            let cutoff = global_otsu_threshold(image);
            let binary = map_colors(image, |pixel: Luma<u8>| Luma([binarize(pixel[0], cutoff)]));
            (binary, ThresholdValue::Global(cutoff))
        }
        ThresholdMethod::Local { radius } => {
            let cutoffs = local_otsu_thresholds(image, radius);
            let mut binary = GrayImage::new(image.width(), image.height());
            for ((out, pixel), cutoff) in binary
                .pixels_mut()
                .zip(image.pixels())
                .zip(cutoffs.pixels())
            {
                out[0] = binarize(pixel[0], cutoff[0]);
            }
            (binary, ThresholdValue::Local(cutoffs))
        }
    };

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "mooney_preprocessing",
        "Otsu thresholding completed in {}ms: method={}, threshold={:?}, dimensions={}x{}",
        processing_time.as_millis(),
        method,
        threshold.as_global(),
        image.width(),
        image.height()
    );

    Ok(ThresholdedImageResult {
        image: binary,
        threshold,
        method,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Thresholds any input image, converting colour input to grayscale first.
///
/// The pipeline converts to grayscale itself before thresholding; this entry
/// point exists for callers holding a raw colour array.
pub fn threshold_image(
    image: &ImageArray,
    method: ThresholdMethod,
) -> Result<ThresholdedImageResult, PreprocessingError> {
    match image {
        ImageArray::Gray(gray) => apply_threshold(gray, method),
        ImageArray::Rgb(_) => apply_threshold(&to_gray(image), method),
    }
}

/// Computes the global Otsu cutoff of a grayscale image.
pub fn global_otsu_threshold(image: &GrayImage) -> u8 {
    let channel_histogram = histogram(image);
    find_otsu_threshold(&channel_histogram.channels[0])
}

/// Computes the per-pixel Otsu cutoffs over a disk of `radius` pixels.
///
/// The neighborhood includes every pixel (dx, dy) with `dx² + dy² <= radius²`
/// that lies inside the image. The histogram slides along each row, so the
/// cost per pixel is proportional to the covered rows plus the histogram
/// width. An empty image yields an empty map.
pub fn local_otsu_thresholds(image: &GrayImage, radius: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    let r = i64::from(radius);
    let half_widths = disk_half_widths(radius);
    let samples = image.as_raw();
    let sample = |x: i64, y: i64| samples[(y * w + x) as usize] as usize;

    let mut cutoffs = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return cutoffs;
    }

    for y in 0..h {
        let mut hist = [0u32; 256];
        // Only rows inside the image; `half_widths` is indexed by `dy + r`
        let rows = (y - r).max(0)..=(y + r).min(h - 1);
        let half_at = |row: i64| half_widths[(row - y + r) as usize];

        // Neighborhood of the first pixel in the row
        for row in rows.clone() {
            for x in 0..=half_at(row).min(w - 1) {
                hist[sample(x, row)] += 1;
            }
        }
        cutoffs.put_pixel(0, y as u32, Luma([find_otsu_threshold(&hist)]));

        for x in 1..w {
            for row in rows.clone() {
                let half = half_at(row);
                let leaving = x - 1 - half;
                if leaving >= 0 {
                    hist[sample(leaving, row)] -= 1;
                }
                let entering = x + half;
                if entering < w {
                    hist[sample(entering, row)] += 1;
                }
            }
            cutoffs.put_pixel(x as u32, y as u32, Luma([find_otsu_threshold(&hist)]));
        }
    }

    cutoffs
}

/// Half-width of the disk on each row offset `-radius..=radius`.
fn disk_half_widths(radius: u32) -> Vec<i64> {
    let r = i64::from(radius);
    (-r..=r)
        .map(|dy| {
            let remaining = r * r - dy * dy;
            // Integer square root, exact for the sizes we handle
            let mut half = (remaining as f64).sqrt() as i64;
            while half * half > remaining {
                half -= 1;
            }
            while (half + 1) * (half + 1) <= remaining {
                half += 1;
            }
            half
        })
        .collect()
}

fn binarize(intensity: u8, cutoff: u8) -> u8 {
    if intensity >= cutoff {
        ON
    } else {
        OFF
    }
}

/// Finds the optimal threshold using Otsu's method by maximizing between-class variance.
///
/// Candidate cutoffs `t` split the histogram into intensities `< t` and `>= t`.
/// Only cutoffs that leave both classes non-empty are considered, so the
/// result always lies in `(min, max]` of the populated intensities. When a
/// run of consecutive cutoffs reaches the same maximum variance (an empty gap
/// between two modes) the middle of that run is returned.
///
/// An empty histogram yields 0; a histogram with a single populated intensity
/// yields that intensity.
pub fn find_otsu_threshold(histogram: &[u32; 256]) -> u8 {
    let Some(lowest) = histogram.iter().position(|&count| count > 0) else {
        return 0;
    };
    let highest = histogram
        .iter()
        .rposition(|&count| count > 0)
        .unwrap_or(lowest);

    if lowest == highest {
        return lowest as u8;
    }

    let (total, total_weighted) = histogram[lowest..=highest]
        .iter()
        .enumerate()
        .fold((0f64, 0f64), |(count, weighted), (offset, &n)| {
            let n = f64::from(n);
            (count + n, weighted + (lowest + offset) as f64 * n)
        });

    let mut background = 0f64;
    let mut background_weighted = 0f64;
    let mut max_variance = f64::MIN;
    let mut best_start = lowest + 1;
    let mut best_end = lowest + 1;

    for threshold in (lowest + 1)..=highest {
        let below = threshold - 1;
        let count = f64::from(histogram[below]);
        background += count;
        background_weighted += below as f64 * count;

        let foreground = total - background;
        let mean_background = background_weighted / background;
        let mean_foreground = (total_weighted - background_weighted) / foreground;

        let variance = background * foreground * (mean_background - mean_foreground).powi(2);

        if variance > max_variance {
            max_variance = variance;
            best_start = threshold;
            best_end = threshold;
        } else if variance == max_variance && best_end + 1 == threshold {
            best_end = threshold;
        }
    }

    ((best_start + best_end) / 2) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_region_image() -> GrayImage {
        let mut img = GrayImage::new(10, 10);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            pixel[0] = if x < 5 { 25 } else { 225 };
        }
        img
    }

    fn checkerboard(size: u32, block: u32) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            pixel[0] = if ((x / block) + (y / block)) % 2 == 0 { 0 } else { 255 };
        }
        img
    }

    #[test]
    fn test_apply_threshold_simple_image() {
        let img = two_region_image();
        let result = apply_threshold(&img, ThresholdMethod::Global)
            .expect("apply_threshold should succeed with valid grayscale image");

        let cutoff = result.threshold.as_global().expect("global threshold");
        assert!(cutoff > 25 && cutoff <= 225);
        assert_eq!(result.method, ThresholdMethod::Global);

        for (x, y, pixel) in result.image.enumerate_pixels() {
            let expected = if x < 5 { OFF } else { ON };
            assert_eq!(pixel[0], expected, "pixel ({}, {})", x, y);
        }
    }

    #[test]
    fn test_global_on_pixels_are_exactly_those_above_cutoff() {
        let mut img = GrayImage::new(32, 32);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            pixel[0] = ((x * 31 + y * 17 + x * y) % 256) as u8;
        }

        let result = apply_threshold(&img, ThresholdMethod::Global).unwrap();
        let cutoff = result.threshold.as_global().unwrap();

        let min = img.pixels().map(|p| p[0]).min().unwrap();
        let max = img.pixels().map(|p| p[0]).max().unwrap();
        assert!(cutoff >= min && cutoff <= max);

        for (x, y, pixel) in img.enumerate_pixels() {
            let on = result.image.get_pixel(x, y)[0] == ON;
            assert_eq!(on, pixel[0] >= cutoff);
        }
    }

    #[test]
    fn test_apply_threshold_uniform_image() {
        let img = GrayImage::from_pixel(10, 10, Luma([128]));

        let result = apply_threshold(&img, ThresholdMethod::Global)
            .expect("apply_threshold should succeed with uniform grayscale image");

        assert_eq!(result.threshold, ThresholdValue::Global(128));
        assert!(result.image.pixels().all(|p| p[0] == ON));
    }

    #[test]
    fn test_local_threshold_uniform_image() {
        let img = GrayImage::from_pixel(12, 9, Luma([77]));

        let result = apply_threshold(&img, ThresholdMethod::Local { radius: 3 })
            .expect("local thresholding should succeed with uniform image");

        let map = result.threshold.as_local().expect("local threshold map");
        assert!(map.pixels().all(|p| p[0] == 77));
        assert!(result.image.pixels().all(|p| p[0] == ON));
    }

    #[test]
    fn test_checkerboard_matches_pattern() {
        let img = checkerboard(200, 2);
        let result = apply_threshold(&img, ThresholdMethod::Global).unwrap();

        let cutoff = result.threshold.as_global().unwrap();
        assert!(cutoff > 0 && cutoff < 255);
        assert_eq!(result.image, img);
    }

    #[test]
    fn test_local_threshold_map_has_image_shape() {
        let img = checkerboard(23, 4);
        let result = apply_threshold(&img, ThresholdMethod::Local { radius: 5 }).unwrap();

        let map = result.threshold.as_local().unwrap();
        assert_eq!(map.dimensions(), img.dimensions());
        assert_eq!(result.image.dimensions(), img.dimensions());

        for (x, y, pixel) in img.enumerate_pixels() {
            let on = result.image.get_pixel(x, y)[0] == ON;
            assert_eq!(on, pixel[0] >= map.get_pixel(x, y)[0]);
        }
    }

    #[test]
    fn test_local_threshold_adapts_to_illumination() {
        // Dark half: 10 / 60 stripes, bright half: 150 / 200 stripes.
        // A single global cutoff would merge each half into one class.
        let mut img = GrayImage::new(40, 20);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let stripe = y % 2 == 0;
            pixel[0] = match (x < 20, stripe) {
                (true, true) => 10,
                (true, false) => 60,
                (false, true) => 150,
                (false, false) => 200,
            };
        }

        let result = apply_threshold(&img, ThresholdMethod::Local { radius: 3 }).unwrap();
        for (x, y) in [(5, 4), (5, 5), (35, 10), (35, 11)] {
            let expected = if y % 2 == 0 { OFF } else { ON };
            assert_eq!(result.image.get_pixel(x, y)[0], expected, "pixel ({}, {})", x, y);
        }
    }

    #[test]
    fn test_local_matches_brute_force_histogram() {
        let mut img = GrayImage::new(15, 11);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            pixel[0] = ((x * 37 + y * 91 + x * x) % 256) as u8;
        }
        let radius = 4;
        let map = local_otsu_thresholds(&img, radius);

        let r = radius as i64;
        for (x, y, cutoff) in map.enumerate_pixels() {
            let mut hist = [0u32; 256];
            for dy in -r..=r {
                for dx in -r..=r {
                    let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                    if dx * dx + dy * dy <= r * r
                        && nx >= 0
                        && ny >= 0
                        && nx < img.width() as i64
                        && ny < img.height() as i64
                    {
                        hist[img.get_pixel(nx as u32, ny as u32)[0] as usize] += 1;
                    }
                }
            }
            assert_eq!(cutoff[0], find_otsu_threshold(&hist), "pixel ({}, {})", x, y);
        }
    }

    #[test]
    fn test_local_rejects_zero_radius() {
        let img = GrayImage::new(4, 4);
        let result = apply_threshold(&img, ThresholdMethod::Local { radius: 0 });
        assert!(matches!(
            result,
            Err(PreprocessingError::InvalidConfig { field: "radius", .. })
        ));
    }

    #[test]
    fn test_threshold_image_converts_color_input() {
        let rgb = image::RgbImage::from_pixel(6, 6, image::Rgb([200, 200, 200]));
        let result = threshold_image(&ImageArray::Rgb(rgb), ThresholdMethod::Global).unwrap();
        assert_eq!(result.threshold, ThresholdValue::Global(200));
        assert!(result.image.pixels().all(|p| p[0] == ON));
    }

    #[test]
    fn test_find_otsu_threshold_basic() {
        let mut histogram = [0u32; 256];
        histogram[25] = 5000;
        histogram[225] = 5000;

        // Every cutoff in 26..=225 separates the classes equally well
        assert_eq!(find_otsu_threshold(&histogram), 125);
    }

    #[test]
    fn test_find_otsu_threshold_single_class() {
        let mut histogram = [0u32; 256];
        histogram[100] = 42;
        assert_eq!(find_otsu_threshold(&histogram), 100);
    }

    #[test]
    fn test_find_otsu_threshold_empty() {
        assert_eq!(find_otsu_threshold(&[0u32; 256]), 0);
    }

    #[test]
    fn test_find_otsu_threshold_unbalanced_modes() {
        let mut histogram = [0u32; 256];
        for value in 40..60 {
            histogram[value] = 100;
        }
        for value in 180..200 {
            histogram[value] = 30;
        }
        let threshold = find_otsu_threshold(&histogram);
        assert!((60..=180).contains(&threshold));
    }

    #[test]
    fn test_empty_image_thresholds_with_both_methods() {
        for img in [GrayImage::new(0, 5), GrayImage::new(5, 0), GrayImage::new(0, 0)] {
            let global = apply_threshold(&img, ThresholdMethod::Global).unwrap();
            assert_eq!(global.threshold, ThresholdValue::Global(0));
            assert_eq!(global.image.dimensions(), img.dimensions());

            let local = apply_threshold(&img, ThresholdMethod::Local { radius: 3 }).unwrap();
            let map = local.threshold.as_local().unwrap();
            assert_eq!(map.dimensions(), img.dimensions());
            assert_eq!(local.image.dimensions(), img.dimensions());
        }
    }

    #[test]
    fn test_radius_larger_than_image_uses_whole_image() {
        let img = two_region_image();
        let global = global_otsu_threshold(&img);
        let map = local_otsu_thresholds(&img, 2000);
        assert!(map.pixels().all(|p| p[0] == global));
    }

    #[test]
    fn test_disk_half_widths() {
        assert_eq!(disk_half_widths(1), vec![0, 1, 0]);
        assert_eq!(disk_half_widths(2), vec![0, 1, 2, 1, 0]);
        assert_eq!(disk_half_widths(3), vec![0, 2, 2, 3, 2, 2, 0]);
    }
}
