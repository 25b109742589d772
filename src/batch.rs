//! # Local Batch Conversion
//!
//! Thin driver on top of the pipeline: takes a single image file or a
//! directory of images, runs every decodable image through
//! [`pipeline::run_with_observer`](crate::pipeline::run_with_observer), and
//! optionally records the outcome in `mooney_manifest.json`.
//!
//! One bad file never stops a batch. Decode and transformation failures are
//! logged, reported to the observer, and listed in the report.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use image::ImageFormat;
use serde::Serialize;

use crate::config::BatchConfig;
use crate::errors::error_logging;
use crate::observability;
use crate::persistence::{base_name, ensure_dir};
use crate::pipeline::{self, MooneyResult, MooneySummary, PipelineObserver, SourceInfo};
use crate::preprocessing::{ImageArray, PreprocessingError, StageKind};
use crate::transform_config::TransformConfig;

/// File name of the batch manifest inside the output directory.
pub const MANIFEST_FILE_NAME: &str = "mooney_manifest.json";

/// Name of the default output directory, created next to the sources.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "mooney";

/// An image the batch could not convert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub path: PathBuf,
    /// Stage that failed, `None` when the file could not be loaded
    pub stage: Option<StageKind>,
    pub error: String,
}

/// Outcome of [`convert_path`].
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub results: Vec<MooneyResult>,
    pub failures: Vec<BatchFailure>,
    /// Set when a manifest was written
    pub manifest_path: Option<PathBuf>,
    pub processing_time_ms: u64,
}

impl BatchReport {
    /// Number of images the batch looked at.
    pub fn total(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    /// True when at least one image was found and none converted.
    pub fn all_failed(&self) -> bool {
        self.results.is_empty() && !self.failures.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    generated_at: DateTime<Utc>,
    source: &'a Path,
    output_dir: &'a Path,
    config: &'a TransformConfig,
    images: Vec<MooneySummary>,
    failures: &'a [BatchFailure],
}

/// Default destination for `source`: a `mooney` directory next to the image,
/// or inside the directory when `source` is one. A bare file name with no
/// parent directory writes into the current directory itself.
pub fn default_output_dir(source: &Path) -> PathBuf {
    if source.is_dir() {
        return source.join(DEFAULT_OUTPUT_DIR_NAME);
    }
    match source.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => parent.join(DEFAULT_OUTPUT_DIR_NAME),
        None => PathBuf::from("."),
    }
}

/// Whether the extension of `path` names an image format the decoder knows.
pub fn is_image_file(path: &Path) -> bool {
    path.is_file() && ImageFormat::from_path(path).is_ok()
}

/// Image files directly inside `directory`, sorted by path.
///
/// # Errors
///
/// Returns `PreprocessingError::SourceRead` if the directory cannot be listed.
pub fn list_image_files(directory: &Path) -> Result<Vec<PathBuf>, PreprocessingError> {
    let read_error = |message: String| PreprocessingError::SourceRead {
        path: directory.to_path_buf(),
        message,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(directory).map_err(|e| read_error(e.to_string()))? {
        let path = entry.map_err(|e| read_error(e.to_string()))?.path();
        if is_image_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Decodes an image file into a pixel array.
pub fn load_image(path: &Path) -> Result<ImageArray, PreprocessingError> {
    let decoded = image::open(path).map_err(|e| PreprocessingError::ImageLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(ImageArray::from_dynamic(&decoded))
}

/// Converts a single image or every image in a directory.
///
/// The output directory is `batch.output_dir` when set, otherwise
/// [`default_output_dir`]. It is created before any image is processed.
///
/// # Errors
///
/// Only errors that affect the whole batch are returned: an invalid
/// configuration, a missing or unreadable source, or an output directory
/// that cannot be created. Per-image failures land in
/// [`BatchReport::failures`].
pub fn convert_path(
    source: &Path,
    batch: &BatchConfig,
    config: &TransformConfig,
    observer: &mut dyn PipelineObserver,
) -> Result<BatchReport, PreprocessingError> {
    let start_time = Instant::now();
    config.validate()?;

    let files = if source.is_dir() {
        list_image_files(source)?
    } else if source.is_file() {
        vec![source.to_path_buf()]
    } else {
        return Err(PreprocessingError::SourceRead {
            path: source.to_path_buf(),
            message: "no such file or directory".to_string(),
        });
    };

    let output_dir = batch
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(source));
    ensure_dir(&output_dir)?;

    tracing::info!(
        target: "mooney_batch",
        source = %source.display(),
        output_dir = %output_dir.display(),
        images = files.len(),
        "Starting batch conversion"
    );

    let mut results = Vec::with_capacity(files.len());
    let mut failures = Vec::new();

    for path in files {
        let info = SourceInfo::from_path(&path);
        let image_start = Instant::now();

        let image = match load_image(&path) {
            Ok(image) => image,
            Err(err) => {
                error_logging::log_filesystem_error(
                    &err,
                    "load_image",
                    Some(&path.display().to_string()),
                    fs::metadata(&path).ok().map(|m| m.len()),
                );
                observer.image_failed(&base_name(&info.name), &err);
                failures.push(BatchFailure {
                    path,
                    stage: None,
                    error: err.to_string(),
                });
                continue;
            }
        };

        match pipeline::run_with_observer(&image, &info, &output_dir, config, observer) {
            Ok(result) => results.push(result),
            Err(err) => {
                let stage = match &err {
                    PreprocessingError::Stage { stage, .. } => Some(*stage),
                    _ => None,
                };
                let name = base_name(&info.name);
                error_logging::log_processing_error(
                    &err,
                    "convert_image",
                    &name,
                    stage.map(|s| s.as_str()),
                    Some(image_start.elapsed()),
                );
                observer.image_failed(&name, &err);
                failures.push(BatchFailure {
                    path,
                    stage,
                    error: err.to_string(),
                });
            }
        }
    }

    let mut report = BatchReport {
        source: source.to_path_buf(),
        output_dir,
        results,
        failures,
        manifest_path: None,
        processing_time_ms: 0,
    };

    if batch.write_manifest {
        match write_manifest(&report, config) {
            Ok(path) => report.manifest_path = Some(path),
            Err(err) => error_logging::log_filesystem_error(
                &err,
                "write_manifest",
                Some(&report.output_dir.join(MANIFEST_FILE_NAME).display().to_string()),
                None,
            ),
        }
    }

    let elapsed = start_time.elapsed();
    report.processing_time_ms = elapsed.as_millis() as u64;
    observability::record_batch_metrics(report.results.len(), report.failures.len(), elapsed);
    observer.batch_finished(&report);

    Ok(report)
}

/// Writes `mooney_manifest.json` into the report's output directory.
pub fn write_manifest(
    report: &BatchReport,
    config: &TransformConfig,
) -> Result<PathBuf, PreprocessingError> {
    let path = report.output_dir.join(MANIFEST_FILE_NAME);
    let write_error = |message: String| PreprocessingError::ManifestWrite {
        path: path.clone(),
        message,
    };

    let manifest = Manifest {
        generated_at: Utc::now(),
        source: &report.source,
        output_dir: &report.output_dir,
        config,
        images: report.results.iter().map(MooneyResult::summary).collect(),
        failures: &report.failures,
    };

    let file = File::create(&path).map_err(|e| write_error(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &manifest).map_err(|e| write_error(e.to_string()))?;
    writer.flush().map_err(|e| write_error(e.to_string()))?;

    tracing::debug!(
        target: "mooney_batch",
        path = %path.display(),
        images = manifest.images.len(),
        "Manifest written"
    );

    Ok(path)
}
