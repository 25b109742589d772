//! # Stage Image Persistence
//!
//! Directory creation and PNG writing for the intermediate images of a
//! pipeline run, plus the file naming scheme downstream tooling relies on:
//! `<basename>_g.png`, `<basename>_gr.png`, `<basename>_s.png`, `<basename>_m.png`.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder};

use crate::preprocessing::{PreprocessingError, StageKind};
use crate::transform_config::OUTPUT_EXTENSION;

/// Creates `path` and any missing parents. Succeeds if the directory already exists.
///
/// # Errors
///
/// Returns `PreprocessingError::DirectoryCreation`. Permission problems get an
/// explanatory message rather than the raw OS error.
pub fn ensure_dir(path: &Path) -> Result<(), PreprocessingError> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            Err(PreprocessingError::DirectoryCreation {
                path: path.to_path_buf(),
                message: format!(
                    "permission denied. Please adapt permissions to create {} \
                     or choose a different directory",
                    path.display()
                ),
            })
        }
        Err(err) if path.exists() && !path.is_dir() => Err(PreprocessingError::DirectoryCreation {
            path: path.to_path_buf(),
            message: format!("a file with this name already exists ({})", err),
        }),
        Err(err) => Err(PreprocessingError::DirectoryCreation {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

/// Derives the base name of a source file: everything before the first `.`.
///
/// Falls back to the file stem for names that start with a dot.
pub fn base_name(source_name: &str) -> String {
    let file_name = Path::new(source_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string());

    match file_name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => Path::new(&file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or(file_name),
    }
}

/// Full path of the file a stage writes for `base_name` inside `directory`.
pub fn stage_file_path(directory: &Path, base_name: &str, stage: StageKind) -> PathBuf {
    directory.join(format!("{}{}.{}", base_name, stage.suffix(), OUTPUT_EXTENSION))
}

/// Writes a grayscale image as PNG, creating the parent directory if needed.
///
/// The file handle is flushed and closed before returning.
pub fn save_gray(image: &GrayImage, path: &Path) -> Result<(), PreprocessingError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let write_error = |message: String| PreprocessingError::ImageWrite {
        path: path.to_path_buf(),
        message,
    };

    let file = File::create(path).map_err(|e| write_error(e.to_string()))?;
    let mut writer = BufWriter::new(file);

    PngEncoder::new(&mut writer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| write_error(e.to_string()))?;

    writer.flush().map_err(|e| write_error(e.to_string()))?;

    tracing::trace!(
        target: "mooney_persistence",
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "Stage image written"
    );

    Ok(())
}
