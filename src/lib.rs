//! # Mooney
//!
//! Turns ordinary photographs into Mooney images: two-tone silhouettes made
//! by converting to grayscale, optionally resizing, blurring with a large
//! Gaussian kernel and binarizing with Otsu's method, either with one global
//! cutoff or with a cutoff computed over a disk around every pixel.
//!
//! Every intermediate image is written next to the final one, so a run over
//! `cat.jpg` leaves `cat_g.png`, `cat_s.png` and `cat_m.png` (plus
//! `cat_gr.png` when resizing) in the destination directory.
//!
//! ```no_run
//! use std::path::Path;
//! use mooney::{pipeline, ImageArray, SourceInfo, TransformConfig};
//!
//! let decoded = image::open("cat.jpg")?;
//! let result = pipeline::run(
//!     &ImageArray::from_dynamic(&decoded),
//!     &SourceInfo::from_path("cat.jpg"),
//!     Path::new("mooney"),
//!     &TransformConfig::default(),
//! )?;
//! println!("threshold: {:?}", result.threshold);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod batch;
pub mod config;
pub mod errors;
pub mod observability;
pub mod observability_config;
pub mod persistence;
pub mod pipeline;
pub mod preprocessing;
pub mod transform_config;

// Re-export types for easier access
pub use batch::{convert_path, BatchFailure, BatchReport};
pub use config::{AppConfig, BatchConfig};
pub use errors::{AppError, AppResult};
pub use pipeline::{
    MooneyResult, MooneySummary, NoopObserver, PipelineObserver, SourceInfo, TracingObserver,
};
pub use preprocessing::{
    threshold_image, ImageArray, PreprocessingError, StageKind, ThresholdMethod, ThresholdValue,
};
pub use transform_config::TransformConfig;
