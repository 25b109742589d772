//! # Transformation Configuration Module
//!
//! This module defines the validated parameters of a Mooney transformation:
//! target size, resize flag, smoothing strength and thresholding method.

use serde::Serialize;

use crate::preprocessing::{PreprocessingError, ThresholdMethod};

// Constants for transformation defaults
pub const DEFAULT_IMAGE_SIZE: (u32, u32) = (400, 400);
pub const DEFAULT_SMOOTH_SIGMA: f32 = 6.0;
pub const OUTPUT_EXTENSION: &str = "png";

/// Parameters applied to every image of a run.
///
/// Fields are private so a `TransformConfig` can only exist in a validated
/// state; use [`TransformConfig::new`] or [`TransformConfig::builder`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransformConfig {
    image_size: (u32, u32),
    resize: bool,
    smooth_sigma: f32,
    threshold_method: ThresholdMethod,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            resize: false,
            smooth_sigma: DEFAULT_SMOOTH_SIGMA,
            threshold_method: ThresholdMethod::Global,
        }
    }
}

impl TransformConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::InvalidConfig` naming the first offending field.
    pub fn new(
        image_size: (u32, u32),
        resize: bool,
        smooth_sigma: f32,
        threshold_method: ThresholdMethod,
    ) -> Result<Self, PreprocessingError> {
        let config = Self {
            image_size,
            resize,
            smooth_sigma,
            threshold_method,
        };
        config.validate()?;
        Ok(config)
    }

    /// Starts a builder from the default configuration.
    pub fn builder() -> TransformConfigBuilder {
        TransformConfigBuilder {
            config: Self::default(),
        }
    }

    /// Target (width, height) used by the resize stage.
    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    /// Whether the resize stage runs.
    pub fn resize(&self) -> bool {
        self.resize
    }

    /// Standard deviation of the smoothing kernel.
    pub fn smooth_sigma(&self) -> f32 {
        self.smooth_sigma
    }

    /// Thresholding method, with its radius for the local variant.
    pub fn threshold_method(&self) -> ThresholdMethod {
        self.threshold_method
    }

    /// Validate transformation configuration
    pub fn validate(&self) -> Result<(), PreprocessingError> {
        if !self.smooth_sigma.is_finite() || self.smooth_sigma <= 0.0 {
            return Err(PreprocessingError::InvalidConfig {
                field: "smooth_sigma",
                message: format!(
                    "smoothing sigma must be a positive number, got {}",
                    self.smooth_sigma
                ),
            });
        }

        let (width, height) = self.image_size;
        if width == 0 || height == 0 {
            return Err(PreprocessingError::InvalidConfig {
                field: "image_size",
                message: format!("image size {}x{} must be non-zero", width, height),
            });
        }

        self.threshold_method.validate()
    }
}

/// Builder for [`TransformConfig`], validated once in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct TransformConfigBuilder {
    config: TransformConfig,
}

impl TransformConfigBuilder {
    pub fn image_size(mut self, width: u32, height: u32) -> Self {
        self.config.image_size = (width, height);
        self
    }

    pub fn resize(mut self, resize: bool) -> Self {
        self.config.resize = resize;
        self
    }

    pub fn smooth_sigma(mut self, sigma: f32) -> Self {
        self.config.smooth_sigma = sigma;
        self
    }

    pub fn threshold_method(mut self, method: ThresholdMethod) -> Self {
        self.config.threshold_method = method;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<TransformConfig, PreprocessingError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
