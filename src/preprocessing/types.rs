//! # Shared Types for Mooney Preprocessing
//!
//! This module contains the shared types, structs, and enums used across
//! the preprocessing sub-modules and the transformation pipeline.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Default neighborhood radius for local Otsu thresholding.
pub const DEFAULT_LOCAL_RADIUS: u32 = 50;

/// Errors that can occur during Mooney preprocessing operations.
#[derive(Debug, Clone)]
pub enum PreprocessingError {
    /// A transformation parameter is missing or out of range
    InvalidConfig {
        field: &'static str,
        message: String,
    },
    /// The pixel array has a dimensionality the pipeline cannot interpret
    InvalidShape { shape: Vec<usize> },
    /// The pixel buffer length does not match the declared shape
    ShapeMismatch { expected: usize, actual: usize },
    /// The destination directory could not be created
    DirectoryCreation { path: PathBuf, message: String },
    /// A stage image could not be written
    ImageWrite { path: PathBuf, message: String },
    /// Failed to load or decode a source image
    ImageLoad { path: PathBuf, message: String },
    /// A source directory could not be listed
    SourceRead { path: PathBuf, message: String },
    /// The batch manifest could not be written
    ManifestWrite { path: PathBuf, message: String },
    /// A pipeline stage failed
    Stage {
        stage: StageKind,
        source: Box<PreprocessingError>,
    },
}

impl PreprocessingError {
    /// Wraps this error with the pipeline stage that raised it.
    pub fn in_stage(self, stage: StageKind) -> Self {
        match self {
            // Keep the innermost stage, it is the one that actually failed.
            already @ PreprocessingError::Stage { .. } => already,
            other => PreprocessingError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns true for errors caused by the transformation configuration.
    pub fn is_config_error(&self) -> bool {
        match self {
            PreprocessingError::InvalidConfig { .. } => true,
            PreprocessingError::Stage { source, .. } => source.is_config_error(),
            _ => false,
        }
    }
}

impl fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreprocessingError::InvalidConfig { field, message } => {
                write!(f, "Invalid transformation config field '{}': {}", field, message)
            }
            PreprocessingError::InvalidShape { shape } => {
                write!(
                    f,
                    "Unsupported image shape {:?}. Expected [height, width] or [height, width, 3]",
                    shape
                )
            }
            PreprocessingError::ShapeMismatch { expected, actual } => {
                write!(
                    f,
                    "Pixel buffer holds {} samples but the shape requires {}",
                    actual, expected
                )
            }
            PreprocessingError::DirectoryCreation { path, message } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    message
                )
            }
            PreprocessingError::ImageWrite { path, message } => {
                write!(f, "Failed to write image {}: {}", path.display(), message)
            }
            PreprocessingError::ImageLoad { path, message } => {
                write!(f, "Failed to load image {}: {}", path.display(), message)
            }
            PreprocessingError::SourceRead { path, message } => {
                write!(f, "Failed to read source {}: {}", path.display(), message)
            }
            PreprocessingError::ManifestWrite { path, message } => {
                write!(f, "Failed to write manifest {}: {}", path.display(), message)
            }
            PreprocessingError::Stage { stage, source } => {
                write!(f, "{} stage failed: {}", stage, source)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PreprocessingError::Stage { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// The transformation stages, in the order the pipeline runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// RGB to luminance conversion (colour input only)
    Grayscale,
    /// Bilinear resample to the configured size (opt-in)
    Resize,
    /// Gaussian smoothing
    Smooth,
    /// Otsu binarization
    Threshold,
}

impl StageKind {
    /// All stages in execution order.
    pub const ORDER: [StageKind; 4] = [
        StageKind::Grayscale,
        StageKind::Resize,
        StageKind::Smooth,
        StageKind::Threshold,
    ];

    /// Filename suffix appended to the base name for this stage's output.
    pub fn suffix(&self) -> &'static str {
        match self {
            StageKind::Grayscale => "_g",
            StageKind::Resize => "_gr",
            StageKind::Smooth => "_s",
            StageKind::Threshold => "_m",
        }
    }

    /// Stable lowercase identifier used in logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Grayscale => "grayscale",
            StageKind::Resize => "resize",
            StageKind::Smooth => "smooth",
            StageKind::Threshold => "threshold",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An 8-bit input image, either grayscale or channel-last RGB.
///
/// Construct it from a raw buffer with [`ImageArray::from_shape`], which rejects
/// any dimensionality other than `[height, width]` or `[height, width, 3]`.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageArray {
    /// Two-dimensional intensity image
    Gray(GrayImage),
    /// Three-dimensional image with red, green and blue channels
    Rgb(RgbImage),
}

impl ImageArray {
    /// Builds an image from an array shape and a row-major sample buffer.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::InvalidShape` for unsupported shapes (including
    /// zero-sized axes) and `PreprocessingError::ShapeMismatch` when `data` does not
    /// hold exactly the number of samples the shape describes.
    pub fn from_shape(shape: &[usize], data: Vec<u8>) -> Result<Self, PreprocessingError> {
        let invalid = || PreprocessingError::InvalidShape {
            shape: shape.to_vec(),
        };

        let (height, width, channels) = match *shape {
            [height, width] => (height, width, 1),
            [height, width, 3] => (height, width, 3),
            _ => return Err(invalid()),
        };

        if height == 0 || width == 0 {
            return Err(invalid());
        }

        let width_u32 = u32::try_from(width).map_err(|_| invalid())?;
        let height_u32 = u32::try_from(height).map_err(|_| invalid())?;

        let expected = height
            .checked_mul(width)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(invalid)?;
        if data.len() != expected {
            return Err(PreprocessingError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let image = if channels == 1 {
            GrayImage::from_raw(width_u32, height_u32, data).map(ImageArray::Gray)
        } else {
            RgbImage::from_raw(width_u32, height_u32, data).map(ImageArray::Rgb)
        };

        image.ok_or(PreprocessingError::ShapeMismatch {
            expected,
            actual: expected,
        })
    }

    /// Adapts a decoded image. Alpha channels are dropped and wide samples are
    /// reduced to 8 bits.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => ImageArray::Gray(gray.clone()),
            DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_) => ImageArray::Gray(image.to_luma8()),
            DynamicImage::ImageRgb8(rgb) => ImageArray::Rgb(rgb.clone()),
            other => ImageArray::Rgb(other.to_rgb8()),
        }
    }

    /// Array shape: `[height, width]` or `[height, width, 3]`.
    pub fn shape(&self) -> Vec<usize> {
        let (width, height) = self.dimensions();
        match self {
            ImageArray::Gray(_) => vec![height as usize, width as usize],
            ImageArray::Rgb(_) => vec![height as usize, width as usize, 3],
        }
    }

    /// Number of array dimensions (2 for grayscale, 3 for colour).
    pub fn ndim(&self) -> usize {
        match self {
            ImageArray::Gray(_) => 2,
            ImageArray::Rgb(_) => 3,
        }
    }

    /// Whether this image still carries colour channels.
    pub fn is_color(&self) -> bool {
        matches!(self, ImageArray::Rgb(_))
    }

    /// Image dimensions as (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ImageArray::Gray(gray) => gray.dimensions(),
            ImageArray::Rgb(rgb) => rgb.dimensions(),
        }
    }
}

impl From<GrayImage> for ImageArray {
    fn from(image: GrayImage) -> Self {
        ImageArray::Gray(image)
    }
}

impl From<RgbImage> for ImageArray {
    fn from(image: RgbImage) -> Self {
        ImageArray::Rgb(image)
    }
}

/// Thresholding method selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// One Otsu cutoff for the whole image
    #[default]
    Global,
    /// Per-pixel Otsu cutoff over a disk of the given radius
    Local { radius: u32 },
}

impl ThresholdMethod {
    /// Identifier used in file manifests and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            ThresholdMethod::Global => "global_otsu",
            ThresholdMethod::Local { .. } => "local_otsu",
        }
    }

    /// Neighborhood radius for the local method.
    pub fn radius(&self) -> Option<u32> {
        match self {
            ThresholdMethod::Global => None,
            ThresholdMethod::Local { radius } => Some(*radius),
        }
    }

    /// Checks the method parameters.
    pub fn validate(&self) -> Result<(), PreprocessingError> {
        match self {
            ThresholdMethod::Local { radius: 0 } => Err(PreprocessingError::InvalidConfig {
                field: "radius",
                message: "local thresholding radius must be a positive integer".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdMethod::Global => f.write_str(self.name()),
            ThresholdMethod::Local { radius } => write!(f, "{}(radius={})", self.name(), radius),
        }
    }
}

impl FromStr for ThresholdMethod {
    type Err = PreprocessingError;

    /// Parses `global_otsu` / `global` and `local_otsu` / `local`. The local
    /// variant starts with [`DEFAULT_LOCAL_RADIUS`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global_otsu" | "global" => Ok(ThresholdMethod::Global),
            "local_otsu" | "local" => Ok(ThresholdMethod::Local {
                radius: DEFAULT_LOCAL_RADIUS,
            }),
            other => Err(PreprocessingError::InvalidConfig {
                field: "threshold_method",
                message: format!(
                    "unknown method '{}', expected 'global_otsu' or 'local_otsu'",
                    other
                ),
            }),
        }
    }
}

/// Threshold actually used to binarize an image.
#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdValue {
    /// Single cutoff applied to every pixel
    Global(u8),
    /// Per-pixel cutoffs, same dimensions as the thresholded image
    Local(GrayImage),
}

impl ThresholdValue {
    /// The scalar cutoff, if this is a global threshold.
    pub fn as_global(&self) -> Option<u8> {
        match self {
            ThresholdValue::Global(value) => Some(*value),
            ThresholdValue::Local(_) => None,
        }
    }

    /// The cutoff map, if this is a local threshold.
    pub fn as_local(&self) -> Option<&GrayImage> {
        match self {
            ThresholdValue::Global(_) => None,
            ThresholdValue::Local(map) => Some(map),
        }
    }
}

/// Result of the grayscale conversion stage.
#[derive(Debug, Clone)]
pub struct GrayscaleImageResult {
    /// The luminance image
    pub image: GrayImage,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of a resize operation.
#[derive(Debug, Clone)]
pub struct ScaledImageResult {
    /// The resampled image
    pub image: GrayImage,
    /// Original image dimensions (width, height)
    pub original_dimensions: (u32, u32),
    /// New image dimensions (width, height)
    pub new_dimensions: (u32, u32),
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of Gaussian smoothing.
#[derive(Debug, Clone)]
pub struct DenoisedImageResult {
    /// The smoothed image
    pub image: GrayImage,
    /// Sigma value used for the Gaussian kernel
    pub sigma: f32,
    /// Kernel radius in pixels
    pub kernel_radius: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of image thresholding operation.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// The binary image, values 0 or 255
    pub image: GrayImage,
    /// Threshold used to binarize
    pub threshold: ThresholdValue,
    /// Method that produced the threshold
    pub method: ThresholdMethod,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_shape_gray() {
        let image = ImageArray::from_shape(&[2, 3], vec![0, 1, 2, 3, 4, 5])
            .expect("2D shape should be accepted");
        assert!(!image.is_color());
        assert_eq!(image.ndim(), 2);
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.shape(), vec![2, 3]);

        match image {
            ImageArray::Gray(gray) => {
                // Row-major: second row starts at index 3
                assert_eq!(gray.get_pixel(0, 1)[0], 3);
                assert_eq!(gray.get_pixel(2, 0)[0], 2);
            }
            ImageArray::Rgb(_) => panic!("expected grayscale image"),
        }
    }

    #[test]
    fn test_from_shape_rgb() {
        let image = ImageArray::from_shape(&[1, 2, 3], vec![10, 20, 30, 40, 50, 60])
            .expect("channel-last RGB shape should be accepted");
        assert!(image.is_color());
        assert_eq!(image.shape(), vec![1, 2, 3]);
    }

    #[test]
    fn test_from_shape_rejects_unsupported_dimensionality() {
        for shape in [vec![4], vec![2, 2, 4], vec![2, 2, 1], vec![1, 2, 2, 3]] {
            let samples = shape.iter().product();
            let result = ImageArray::from_shape(&shape, vec![0; samples]);
            assert!(
                matches!(result, Err(PreprocessingError::InvalidShape { .. })),
                "shape {:?} should be rejected",
                shape
            );
        }
    }

    #[test]
    fn test_from_shape_rejects_empty_axes() {
        let result = ImageArray::from_shape(&[0, 5], Vec::new());
        assert!(matches!(result, Err(PreprocessingError::InvalidShape { .. })));
    }

    #[test]
    fn test_from_shape_rejects_length_mismatch() {
        let result = ImageArray::from_shape(&[2, 2], vec![0; 5]);
        assert!(matches!(
            result,
            Err(PreprocessingError::ShapeMismatch {
                expected: 4,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_from_dynamic_drops_alpha() {
        let rgba = image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 200]));
        let array = ImageArray::from_dynamic(&DynamicImage::ImageRgba8(rgba));
        match array {
            ImageArray::Rgb(rgb) => assert_eq!(rgb.get_pixel(0, 0).0, [1, 2, 3]),
            ImageArray::Gray(_) => panic!("RGBA input should stay colour"),
        }
    }

    #[test]
    fn test_threshold_method_parsing() {
        assert_eq!(
            "global_otsu".parse::<ThresholdMethod>().unwrap(),
            ThresholdMethod::Global
        );
        assert_eq!(
            "LOCAL_OTSU".parse::<ThresholdMethod>().unwrap(),
            ThresholdMethod::Local {
                radius: DEFAULT_LOCAL_RADIUS
            }
        );
        assert!("median".parse::<ThresholdMethod>().is_err());
    }

    #[test]
    fn test_threshold_method_validation() {
        assert!(ThresholdMethod::Global.validate().is_ok());
        assert!(ThresholdMethod::Local { radius: 3 }.validate().is_ok());
        assert!(ThresholdMethod::Local { radius: 0 }.validate().is_err());
    }

    #[test]
    fn test_stage_suffixes() {
        let suffixes: Vec<&str> = StageKind::ORDER.iter().map(|s| s.suffix()).collect();
        assert_eq!(suffixes, vec!["_g", "_gr", "_s", "_m"]);
    }

    #[test]
    fn test_stage_error_keeps_innermost_stage() {
        let err = PreprocessingError::InvalidConfig {
            field: "sigma",
            message: "bad".to_string(),
        }
        .in_stage(StageKind::Smooth)
        .in_stage(StageKind::Threshold);

        match &err {
            PreprocessingError::Stage { stage, .. } => assert_eq!(*stage, StageKind::Smooth),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.is_config_error());
        assert!(err.to_string().starts_with("smooth stage failed"));
    }
}
