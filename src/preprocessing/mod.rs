//! # Image Preprocessing Module
//!
//! This module provides the image operations the Mooney pipeline chains together.
//!
//! The module is organized into focused sub-modules:
//! - `color`: RGB to grayscale conversion with Rec. 601 luminance weights
//! - `scaling`: Bilinear resize to an exact target size
//! - `filtering`: Gaussian smoothing with nearest-edge padding
//! - `thresholding`: Global and local binary thresholding using Otsu's method
//! - `types`: Shared types and error definitions

pub mod color;
pub mod filtering;
pub mod scaling;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{
    DenoisedImageResult, GrayscaleImageResult, ImageArray, PreprocessingError, ScaledImageResult,
    StageKind, ThresholdMethod, ThresholdValue, ThresholdedImageResult, DEFAULT_LOCAL_RADIUS,
};

// Re-export main functions from sub-modules
pub use color::{convert_to_grayscale, to_gray};
pub use filtering::smooth_image;
pub use scaling::resize_image;
pub use thresholding::{apply_threshold, threshold_image};
