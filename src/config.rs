//! # Unified Application Configuration
//!
//! This module consolidates the transformation parameters, batch settings and
//! logging settings into a single configuration object. It supports loading
//! from environment variables, validation, and a one-line summary for logs.
//!
//! Recognised variables:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `MOONEY_IMAGE_WIDTH` / `MOONEY_IMAGE_HEIGHT` | resize target | 400 / 400 |
//! | `MOONEY_RESIZE` | run the resize stage | `false` |
//! | `MOONEY_SMOOTH_SIGMA` | Gaussian sigma | 6.0 |
//! | `MOONEY_THRESHOLD_METHOD` | `global_otsu` or `local_otsu` | `global_otsu` |
//! | `MOONEY_LOCAL_RADIUS` | disk radius for `local_otsu` | 50 |
//! | `MOONEY_OUTPUT_DIR` | destination directory | `<image dir>/mooney` |
//! | `MOONEY_WRITE_MANIFEST` | write `mooney_manifest.json` | `true` |

use std::env;
use std::path::PathBuf;

use serde::Serialize;

use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use crate::preprocessing::{ThresholdMethod, DEFAULT_LOCAL_RADIUS};
use crate::transform_config::{TransformConfig, DEFAULT_IMAGE_SIZE, DEFAULT_SMOOTH_SIGMA};

/// Batch driver settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchConfig {
    /// Destination directory; `None` means `<image dir>/mooney`
    pub output_dir: Option<PathBuf>,
    /// Whether a JSON manifest is written after the batch
    pub write_manifest: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            write_manifest: true,
        }
    }
}

impl BatchConfig {
    /// Validate batch configuration
    pub fn validate(&self) -> AppResult<()> {
        if let Some(dir) = &self.output_dir {
            if dir.as_os_str().is_empty() {
                return Err(AppError::Config(
                    "Output directory cannot be an empty path".to_string(),
                ));
            }
            if dir.is_file() {
                return Err(AppError::Config(format!(
                    "Output directory {} is an existing file",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Transformation parameters
    pub transform: TransformConfig,
    /// Batch configuration
    pub batch: BatchConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let width: u32 = parse_var(&lookup, "MOONEY_IMAGE_WIDTH", DEFAULT_IMAGE_SIZE.0)?;
        let height: u32 = parse_var(&lookup, "MOONEY_IMAGE_HEIGHT", DEFAULT_IMAGE_SIZE.1)?;
        let resize = parse_bool(&lookup, "MOONEY_RESIZE", false)?;
        let sigma: f32 = parse_var(&lookup, "MOONEY_SMOOTH_SIGMA", DEFAULT_SMOOTH_SIGMA)?;

        let mut method: ThresholdMethod = match lookup("MOONEY_THRESHOLD_METHOD") {
            Some(name) => name.parse()?,
            None => ThresholdMethod::Global,
        };
        if let ThresholdMethod::Local { radius } = &mut method {
            *radius = parse_var(&lookup, "MOONEY_LOCAL_RADIUS", DEFAULT_LOCAL_RADIUS)?;
        }

        let transform = TransformConfig::builder()
            .image_size(width, height)
            .resize(resize)
            .smooth_sigma(sigma)
            .threshold_method(method)
            .build()?;

        let batch = BatchConfig {
            output_dir: lookup("MOONEY_OUTPUT_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            write_manifest: parse_bool(&lookup, "MOONEY_WRITE_MANIFEST", true)?,
        };

        Ok(Self {
            transform,
            batch,
            observability: ObservabilityConfig::from_vars(&lookup),
        })
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.transform.validate()?;
        self.batch.validate()?;
        self.observability.validate().map_err(AppError::Config)?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        let (width, height) = self.transform.image_size();
        format!(
            "Configuration: resize={}, image_size={}x{}, smooth_sigma={}, \
             threshold_method={}, output_dir={}, manifest={}, environment={}",
            self.transform.resize(),
            width,
            height,
            self.transform.smooth_sigma(),
            self.transform.threshold_method(),
            self.batch
                .output_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "<image dir>/mooney".to_string()),
            self.batch.write_manifest,
            self.observability.environment
        )
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> AppResult<T> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::Config(format!("{} must be a valid number, got '{}'", key, raw))
        }),
        None => Ok(default),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> AppResult<bool> {
    match lookup(key).map(|raw| raw.trim().to_lowercase()) {
        None => Ok(default),
        Some(raw) => match raw.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(AppError::Config(format!(
                "{} must be true or false, got '{}'",
                key, raw
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> AppResult<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = config_from(&[]).expect("defaults are valid");

        assert_eq!(config.transform, TransformConfig::default());
        assert_eq!(config.batch, BatchConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_transform_variables() {
        let config = config_from(&[
            ("MOONEY_IMAGE_WIDTH", "320"),
            ("MOONEY_IMAGE_HEIGHT", "240"),
            ("MOONEY_RESIZE", "true"),
            ("MOONEY_SMOOTH_SIGMA", "2.5"),
            ("MOONEY_THRESHOLD_METHOD", "local_otsu"),
            ("MOONEY_LOCAL_RADIUS", "15"),
        ])
        .unwrap();

        assert_eq!(config.transform.image_size(), (320, 240));
        assert!(config.transform.resize());
        assert_eq!(config.transform.smooth_sigma(), 2.5);
        assert_eq!(
            config.transform.threshold_method(),
            ThresholdMethod::Local { radius: 15 }
        );
    }

    #[test]
    fn test_local_method_default_radius() {
        let config = config_from(&[("MOONEY_THRESHOLD_METHOD", "local")]).unwrap();
        assert_eq!(
            config.transform.threshold_method().radius(),
            Some(DEFAULT_LOCAL_RADIUS)
        );
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            vec![("MOONEY_SMOOTH_SIGMA", "abc")],
            vec![("MOONEY_SMOOTH_SIGMA", "0")],
            vec![("MOONEY_IMAGE_WIDTH", "-3")],
            vec![("MOONEY_RESIZE", "maybe")],
            vec![("MOONEY_THRESHOLD_METHOD", "triangle")],
            vec![
                ("MOONEY_THRESHOLD_METHOD", "local_otsu"),
                ("MOONEY_LOCAL_RADIUS", "0"),
            ],
        ] {
            let err = config_from(&vars).unwrap_err();
            assert!(matches!(err, AppError::Config(_)), "{:?} gave {:?}", vars, err);
        }
    }

    #[test]
    fn test_batch_variables() {
        let config = config_from(&[
            ("MOONEY_OUTPUT_DIR", "/tmp/mooney-out"),
            ("MOONEY_WRITE_MANIFEST", "no"),
        ])
        .unwrap();

        assert_eq!(config.batch.output_dir, Some(PathBuf::from("/tmp/mooney-out")));
        assert!(!config.batch.write_manifest);
    }

    #[test]
    fn test_batch_config_rejects_empty_path() {
        let config = BatchConfig {
            output_dir: Some(PathBuf::new()),
            write_manifest: true,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_mentions_method() {
        let config = config_from(&[("MOONEY_THRESHOLD_METHOD", "local_otsu")]).unwrap();
        let summary = config.summary();
        assert!(summary.contains("local_otsu(radius=50)"));
        assert!(summary.contains("<image dir>/mooney"));
    }
}
