//! # Application Error Types
//!
//! This module defines the error types shared by the batch driver, the
//! configuration loader and the command line front end. Pipeline internals
//! report [`PreprocessingError`], which converts into [`AppError`] here.

use std::fmt;

use crate::preprocessing::PreprocessingError;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Invalid input images or arguments
    Validation(String),
    /// A transformation stage failed
    Processing(String),
    /// File system errors
    FileSystem(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Processing(msg) => write!(f, "[PROCESSING] {}", msg),
            AppError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<PreprocessingError> for AppError {
    fn from(err: PreprocessingError) -> Self {
        let message = err.to_string();
        match err {
            PreprocessingError::InvalidConfig { .. } => AppError::Config(message),
            PreprocessingError::DirectoryCreation { .. }
            | PreprocessingError::ImageWrite { .. }
            | PreprocessingError::SourceRead { .. }
            | PreprocessingError::ManifestWrite { .. } => AppError::FileSystem(message),
            PreprocessingError::ImageLoad { .. }
            | PreprocessingError::InvalidShape { .. }
            | PreprocessingError::ShapeMismatch { .. } => AppError::Validation(message),
            PreprocessingError::Stage { ref source, .. } if source.is_config_error() => {
                AppError::Config(message)
            }
            PreprocessingError::Stage { .. } => AppError::Processing(message),
        }
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log a failed image transformation with the stage that broke
    pub fn log_processing_error(
        error: &impl std::fmt::Display,
        operation: &str,
        image_name: &str,
        stage: Option<&str>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            image_name = %image_name,
            stage = ?stage,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "Image transformation failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "File system operation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(
        error: &impl std::fmt::Display,
        config_key: &str,
        operation: &str,
    ) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::StageKind;
    use std::path::PathBuf;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            AppError::Config("bad sigma".to_string()).to_string(),
            "[CONFIG] bad sigma"
        );
        assert_eq!(
            AppError::FileSystem("denied".to_string()).to_string(),
            "[FILESYSTEM] denied"
        );
    }

    #[test]
    fn test_preprocessing_error_mapping() {
        let config = PreprocessingError::InvalidConfig {
            field: "smooth_sigma",
            message: "must be positive".to_string(),
        };
        assert!(matches!(AppError::from(config.clone()), AppError::Config(_)));

        let dir = PreprocessingError::DirectoryCreation {
            path: PathBuf::from("/nope"),
            message: "permission denied".to_string(),
        };
        assert!(matches!(AppError::from(dir), AppError::FileSystem(_)));

        let shape = PreprocessingError::InvalidShape { shape: vec![1, 2, 3, 4] };
        assert!(matches!(AppError::from(shape), AppError::Validation(_)));

        let write = PreprocessingError::ImageWrite {
            path: PathBuf::from("out_m.png"),
            message: "disk full".to_string(),
        };
        let staged = write.in_stage(StageKind::Threshold);
        assert!(matches!(AppError::from(staged), AppError::Processing(_)));

        let staged_config = config.in_stage(StageKind::Smooth);
        assert!(matches!(AppError::from(staged_config), AppError::Config(_)));
    }
}
