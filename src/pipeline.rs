//! # Mooney Transformation Pipeline
//!
//! Runs one image through the fixed stage sequence
//! grayscale → resize → smooth → threshold, writing every intermediate image
//! to the destination directory before the next stage starts, and packages
//! the outcome as a [`MooneyResult`].
//!
//! Grayscale only runs for colour input and resize only when the
//! configuration asks for it. [`plan_stages`] resolves the list up front so
//! callers and observers know exactly which files a run will produce.
//!
//! Progress is reported through a [`PipelineObserver`]; the pipeline itself
//! never prints.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::GrayImage;
use serde::Serialize;

use crate::observability;
use crate::persistence::{base_name, ensure_dir, save_gray, stage_file_path};
use crate::preprocessing::{
    apply_threshold, convert_to_grayscale, resize_image, smooth_image, ImageArray,
    PreprocessingError, StageKind, ThresholdMethod, ThresholdValue,
};
use crate::transform_config::TransformConfig;

/// Receives progress events from the pipeline and the batch driver.
///
/// Every method has an empty default so implementors only override what
/// they care about.
pub trait PipelineObserver {
    /// An image is about to be transformed with the given stages
    fn image_started(&mut self, _name: &str, _stages: &[StageKind]) {}

    /// A stage finished and its output was written to `path`
    fn stage_completed(
        &mut self,
        _name: &str,
        _stage: StageKind,
        _path: &Path,
        _elapsed: Duration,
    ) {
    }

    /// The whole image was transformed
    fn image_finished(&mut self, _result: &MooneyResult) {}

    /// The image could not be loaded or transformed
    fn image_failed(&mut self, _name: &str, _error: &PreprocessingError) {}

    /// A batch run is over
    fn batch_finished(&mut self, _report: &crate::batch::BatchReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Observer that turns events into structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn image_started(&mut self, name: &str, stages: &[StageKind]) {
        let stages: Vec<&str> = stages.iter().map(StageKind::as_str).collect();
        tracing::info!(
            target: "mooney_pipeline",
            image = %name,
            stages = ?stages,
            "Transforming image"
        );
    }

    fn stage_completed(&mut self, name: &str, stage: StageKind, path: &Path, elapsed: Duration) {
        tracing::info!(
            target: "mooney_pipeline",
            image = %name,
            stage = %stage,
            path = %path.display(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage completed"
        );
    }

    fn image_finished(&mut self, result: &MooneyResult) {
        tracing::info!(
            target: "mooney_pipeline",
            image = %result.name,
            method = %result.threshold_method,
            files = result.written_files.len(),
            processing_time_ms = result.processing_time_ms,
            "Mooney image created"
        );
    }

    fn image_failed(&mut self, name: &str, error: &PreprocessingError) {
        tracing::warn!(target: "mooney_pipeline", image = %name, error = %error, "Image skipped");
    }

    fn batch_finished(&mut self, report: &crate::batch::BatchReport) {
        tracing::info!(
            target: "mooney_batch",
            processed = report.results.len(),
            failed = report.failures.len(),
            output_dir = %report.output_dir.display(),
            "Batch finished"
        );
    }
}

/// Where an image came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceInfo {
    /// Location of the source file
    pub path: PathBuf,
    /// File name used to derive output names
    pub name: String,
    /// Page the photo was taken from, if any
    pub url: Option<String>,
    /// External photo identifier, if any
    pub photo_id: Option<String>,
}

impl SourceInfo {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            url: None,
            photo_id: None,
        }
    }

    /// Uses the file name of `path` as the source name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(path, name)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_photo_id(mut self, photo_id: impl Into<String>) -> Self {
        self.photo_id = Some(photo_id.into());
        self
    }
}

/// An intermediate image written during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFile {
    pub stage: StageKind,
    pub path: PathBuf,
}

/// Outcome of transforming one image.
#[derive(Debug, Clone)]
pub struct MooneyResult {
    pub photo_id: Option<String>,
    /// Source name up to its first `.`
    pub name: String,
    /// Final binary image, values 0 or 255
    pub image: GrayImage,
    pub threshold: ThresholdValue,
    pub threshold_method: ThresholdMethod,
    pub resize: bool,
    pub smooth_sigma: f32,
    pub source_path: PathBuf,
    pub destination_dir: PathBuf,
    pub url: Option<String>,
    /// Files in the order they were written
    pub written_files: Vec<StageFile>,
    pub processing_time_ms: u64,
}

impl MooneyResult {
    /// Path written by `stage`, if it ran.
    pub fn file_for(&self, stage: StageKind) -> Option<&Path> {
        self.written_files
            .iter()
            .find(|file| file.stage == stage)
            .map(|file| file.path.as_path())
    }

    /// Serializable view without pixel data.
    pub fn summary(&self) -> MooneySummary {
        MooneySummary {
            photo_id: self.photo_id.clone(),
            name: self.name.clone(),
            dimensions: self.image.dimensions(),
            threshold: ThresholdSummary::from(&self.threshold),
            threshold_method: self.threshold_method.name().to_string(),
            radius: self.threshold_method.radius(),
            resize: self.resize,
            smooth_sigma: self.smooth_sigma,
            source_path: self.source_path.clone(),
            destination_dir: self.destination_dir.clone(),
            url: self.url.clone(),
            files: self.written_files.clone(),
            processing_time_ms: self.processing_time_ms,
        }
    }
}

/// Manifest entry for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MooneySummary {
    pub photo_id: Option<String>,
    pub name: String,
    pub dimensions: (u32, u32),
    pub threshold: ThresholdSummary,
    pub threshold_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<u32>,
    pub resize: bool,
    pub smooth_sigma: f32,
    pub source_path: PathBuf,
    pub destination_dir: PathBuf,
    pub url: Option<String>,
    pub files: Vec<StageFile>,
    pub processing_time_ms: u64,
}

/// Threshold as recorded in manifests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdSummary {
    Global { value: u8 },
    Local { min: u8, max: u8, mean: f64 },
}

impl From<&ThresholdValue> for ThresholdSummary {
    fn from(threshold: &ThresholdValue) -> Self {
        match threshold {
            ThresholdValue::Global(value) => ThresholdSummary::Global { value: *value },
            ThresholdValue::Local(map) => {
                let samples = map.as_raw();
                let min = samples.iter().copied().min().unwrap_or(0);
                let max = samples.iter().copied().max().unwrap_or(0);
                let mean = if samples.is_empty() {
                    0.0
                } else {
                    samples.iter().map(|&v| f64::from(v)).sum::<f64>() / samples.len() as f64
                };
                ThresholdSummary::Local { min, max, mean }
            }
        }
    }
}

/// Output of a single stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub image: GrayImage,
    /// Set by the threshold stage only
    pub threshold: Option<ThresholdValue>,
}

/// Whether `stage` runs for this input and configuration.
pub fn stage_applies(stage: StageKind, image: &ImageArray, config: &TransformConfig) -> bool {
    match stage {
        StageKind::Grayscale => image.is_color(),
        StageKind::Resize => config.resize(),
        StageKind::Smooth | StageKind::Threshold => true,
    }
}

/// The stages a run will execute, in order.
pub fn plan_stages(image: &ImageArray, config: &TransformConfig) -> Vec<StageKind> {
    StageKind::ORDER
        .into_iter()
        .filter(|&stage| stage_applies(stage, image, config))
        .collect()
}

/// Executes one stage.
///
/// `previous` is the output of the preceding stage; when it is `None` the
/// source image is used. Grayscale only converts a colour source and rejects
/// single-channel input, including a `previous` image. Every stage after
/// grayscale needs a single-channel input, so colour input that skipped the
/// grayscale stage is a shape error.
pub fn apply_stage(
    stage: StageKind,
    source: &ImageArray,
    previous: Option<&GrayImage>,
    config: &TransformConfig,
) -> Result<StageOutput, PreprocessingError> {
    match stage {
        StageKind::Grayscale => match (previous, source) {
            (None, ImageArray::Rgb(rgb)) => Ok(StageOutput {
                image: convert_to_grayscale(rgb).image,
                threshold: None,
            }),
            // Grayscale is always first and only applies to colour input
            (Some(gray), _) => Err(PreprocessingError::InvalidShape {
                shape: vec![gray.height() as usize, gray.width() as usize],
            }),
            (None, ImageArray::Gray(_)) => Err(PreprocessingError::InvalidShape {
                shape: source.shape(),
            }),
        },
        StageKind::Resize => Ok(StageOutput {
            image: resize_image(gray_input(source, previous)?, config.image_size())?.image,
            threshold: None,
        }),
        StageKind::Smooth => Ok(StageOutput {
            image: smooth_image(gray_input(source, previous)?, config.smooth_sigma())?.image,
            threshold: None,
        }),
        StageKind::Threshold => {
            let result = apply_threshold(gray_input(source, previous)?, config.threshold_method())?;
            Ok(StageOutput {
                image: result.image,
                threshold: Some(result.threshold),
            })
        }
    }
}

fn gray_input<'a>(
    source: &'a ImageArray,
    previous: Option<&'a GrayImage>,
) -> Result<&'a GrayImage, PreprocessingError> {
    match (previous, source) {
        (Some(gray), _) => Ok(gray),
        (None, ImageArray::Gray(gray)) => Ok(gray),
        (None, ImageArray::Rgb(_)) => Err(PreprocessingError::InvalidShape {
            shape: source.shape(),
        }),
    }
}

/// Transforms one image without progress reporting.
///
/// See [`run_with_observer`].
pub fn run(
    image: &ImageArray,
    source: &SourceInfo,
    destination_dir: &Path,
    config: &TransformConfig,
) -> Result<MooneyResult, PreprocessingError> {
    run_with_observer(image, source, destination_dir, config, &mut NoopObserver)
}

/// Transforms one image into a Mooney image.
///
/// The configuration is validated and the destination directory created
/// before any stage runs. Each stage's output is written as
/// `<base>_<suffix>.png` before the next stage starts. A failing stage aborts
/// the run and is reported as [`PreprocessingError::Stage`].
///
/// # Errors
///
/// * `InvalidConfig` if the configuration is invalid
/// * `DirectoryCreation` if `destination_dir` cannot be created
/// * `Stage` wrapping the failure of an individual stage
pub fn run_with_observer(
    image: &ImageArray,
    source: &SourceInfo,
    destination_dir: &Path,
    config: &TransformConfig,
    observer: &mut dyn PipelineObserver,
) -> Result<MooneyResult, PreprocessingError> {
    let start_time = Instant::now();
    let name = base_name(&source.name);
    let span = observability::image_span(&name);
    let _guard = span.enter();

    let outcome = execute(image, source, &name, destination_dir, config, observer, start_time);
    observability::record_image_metrics(outcome.is_ok(), start_time.elapsed());
    outcome
}

fn execute(
    image: &ImageArray,
    source: &SourceInfo,
    name: &str,
    destination_dir: &Path,
    config: &TransformConfig,
    observer: &mut dyn PipelineObserver,
    start_time: Instant,
) -> Result<MooneyResult, PreprocessingError> {
    config.validate()?;
    ensure_dir(destination_dir)?;

    let stages = plan_stages(image, config);
    observer.image_started(name, &stages);

    tracing::debug!(
        target: "mooney_pipeline",
        "Starting transformation of {}: shape={:?}, stages={}, destination={}",
        name,
        image.shape(),
        stages.len(),
        destination_dir.display()
    );

    let mut current: Option<GrayImage> = None;
    let mut threshold: Option<ThresholdValue> = None;
    let mut written_files = Vec::with_capacity(stages.len());

    for stage in stages {
        let stage_start = Instant::now();

        let output = apply_stage(stage, image, current.as_ref(), config)
            .map_err(|e| e.in_stage(stage))?;
        let path = stage_file_path(destination_dir, name, stage);
        save_gray(&output.image, &path).map_err(|e| e.in_stage(stage))?;

        let elapsed = stage_start.elapsed();
        observability::record_stage_metrics(stage, elapsed);
        tracing::debug!(
            target: "mooney_pipeline",
            "Stage {} completed in {}ms: dimensions={}x{}",
            stage,
            elapsed.as_millis(),
            output.image.width(),
            output.image.height()
        );
        observer.stage_completed(name, stage, &path, elapsed);

        if output.threshold.is_some() {
            threshold = output.threshold;
        }
        written_files.push(StageFile { stage, path });
        current = Some(output.image);
    }

    let (binary, threshold) = match (current, threshold) {
        (Some(binary), Some(threshold)) => (binary, threshold),
        // The threshold stage always applies, so this only trips on a broken plan.
        _ => {
            return Err(PreprocessingError::InvalidShape {
                shape: image.shape(),
            }
            .in_stage(StageKind::Threshold))
        }
    };

    observability::record_threshold_metrics(&threshold);

    let result = MooneyResult {
        photo_id: source.photo_id.clone(),
        name: name.to_string(),
        image: binary,
        threshold,
        threshold_method: config.threshold_method(),
        resize: config.resize(),
        smooth_sigma: config.smooth_sigma(),
        source_path: source.path.clone(),
        destination_dir: destination_dir.to_path_buf(),
        url: source.url.clone(),
        written_files,
        processing_time_ms: start_time.elapsed().as_millis() as u64,
    };

    observer.image_finished(&result);
    Ok(result)
}
