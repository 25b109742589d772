//! Observability module for logging setup and pipeline metrics.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Metrics recording through the `metrics` facade
//!
//! No metrics exporter is installed here. Recording is a no-op until the
//! embedding application installs a recorder.

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::ObservabilityConfig;
use crate::preprocessing::{StageKind, ThresholdValue};

/// Targets used by the crate's log events, besides the module paths.
const LOG_TARGETS: [&str; 5] = [
    "mooney",
    "mooney_pipeline",
    "mooney_batch",
    "mooney_preprocessing",
    "mooney_persistence",
];

/// Initialize structured logging with tracing and configuration
///
/// `RUST_LOG` directives are honoured; the configured level is added for the
/// crate's own modules. Calling this twice is harmless, the second call only
/// reports that a subscriber already exists.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    let level = config.log_level.to_lowercase();
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{}={}", target, level).parse()?);
    }

    let initialized = if config.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()
    };

    if let Err(err) = initialized {
        tracing::debug!(error = %err, "Tracing subscriber already installed");
        return Ok(());
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        log_format = %config.log_format,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span covering the transformation of one image
pub fn image_span(image_name: &str) -> tracing::Span {
    tracing::info_span!("mooney_image", image = image_name, component = "pipeline")
}

/// Record the duration of one pipeline stage
pub fn record_stage_metrics(stage: StageKind, duration: Duration) {
    metrics::histogram!("mooney_stage_duration_seconds", "stage" => stage.as_str())
        .record(duration.as_secs_f64());
}

/// Record the outcome of one image transformation
pub fn record_image_metrics(success: bool, duration: Duration) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("mooney_images_total", "result" => result).increment(1);
    metrics::histogram!("mooney_image_duration_seconds").record(duration.as_secs_f64());
}

/// Record the threshold chosen for an image
///
/// Local thresholds are summarised by their mean cutoff.
pub fn record_threshold_metrics(threshold: &ThresholdValue) {
    let value = match threshold {
        ThresholdValue::Global(value) => f64::from(*value),
        ThresholdValue::Local(map) => {
            let count = map.as_raw().len();
            if count == 0 {
                return;
            }
            map.as_raw().iter().map(|&v| f64::from(v)).sum::<f64>() / count as f64
        }
    };
    metrics::histogram!("mooney_threshold_value").record(value);
}

/// Record a completed batch
pub fn record_batch_metrics(processed: usize, failed: usize, duration: Duration) {
    metrics::counter!("mooney_batches_total").increment(1);
    metrics::histogram!("mooney_batch_images").record((processed + failed) as f64);
    metrics::histogram!("mooney_batch_duration_seconds").record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_init_tracing_twice_is_ok() {
        let config = ObservabilityConfig::default();
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
    }

    #[test]
    fn test_init_tracing_rejects_invalid_config() {
        let config = ObservabilityConfig {
            log_level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(init_tracing(&config).is_err());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_stage_metrics(StageKind::Smooth, Duration::from_millis(3));
        record_image_metrics(true, Duration::from_millis(10));
        record_threshold_metrics(&ThresholdValue::Global(128));
        record_threshold_metrics(&ThresholdValue::Local(GrayImage::from_pixel(2, 2, Luma([10]))));
        record_threshold_metrics(&ThresholdValue::Local(GrayImage::new(0, 0)));
        record_batch_metrics(3, 1, Duration::from_secs(1));
    }
}
