use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use tracing::info;

use mooney::errors::error_logging;
use mooney::{batch, observability, AppConfig, ThresholdMethod, TracingObserver, TransformConfig};

#[derive(FromArgs)]
/// Convert photographs into Mooney images
struct Cli {
    /// image file or directory of images
    #[argh(positional)]
    path: PathBuf,

    /// destination directory (default: <image dir>/mooney)
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// resize images before smoothing
    #[argh(switch)]
    resize: bool,

    /// resize target width
    #[argh(option)]
    width: Option<u32>,

    /// resize target height
    #[argh(option)]
    height: Option<u32>,

    /// standard deviation of the Gaussian blur
    #[argh(option, short = 's')]
    sigma: Option<f32>,

    /// thresholding method: global_otsu or local_otsu
    #[argh(option, short = 'm')]
    method: Option<String>,

    /// neighborhood radius for local_otsu
    #[argh(option, short = 'r')]
    radius: Option<u32>,

    /// do not write mooney_manifest.json
    #[argh(switch)]
    no_manifest: bool,
}

/// Apply command line overrides on top of the environment configuration
fn apply_overrides(cli: &Cli, config: &mut AppConfig) -> Result<()> {
    let current = config.transform;
    let (width, height) = current.image_size();

    let mut method = match &cli.method {
        Some(name) => name
            .parse::<ThresholdMethod>()
            .with_context(|| format!("Invalid --method '{}'", name))?,
        None => current.threshold_method(),
    };
    if let (ThresholdMethod::Local { radius }, Some(cli_radius)) = (&mut method, cli.radius) {
        *radius = cli_radius;
    }

    config.transform = TransformConfig::builder()
        .image_size(cli.width.unwrap_or(width), cli.height.unwrap_or(height))
        .resize(cli.resize || current.resize())
        .smooth_sigma(cli.sigma.unwrap_or(current.smooth_sigma()))
        .threshold_method(method)
        .build()
        .context("Invalid transformation parameters")?;

    if let Some(output) = &cli.output {
        config.batch.output_dir = Some(output.clone());
    }
    if cli.no_manifest {
        config.batch.write_manifest = false;
    }

    Ok(())
}

fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let cli: Cli = argh::from_env();

    let mut config = AppConfig::from_env().map_err(|e| {
        error_logging::log_config_error(&e, "MOONEY_*", "load_configuration");
        anyhow::anyhow!(e)
    })?;
    apply_overrides(&cli, &mut config)?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    observability::init_tracing(&config.observability)?;
    info!("{}", config.summary());

    let report = batch::convert_path(
        &cli.path,
        &config.batch,
        &config.transform,
        &mut TracingObserver,
    )
    .with_context(|| format!("Failed to convert {}", cli.path.display()))?;

    for result in &report.results {
        println!(
            "{} -> {}",
            result.source_path.display(),
            result
                .file_for(mooney::StageKind::Threshold)
                .map(|path| path.display().to_string())
                .unwrap_or_default()
        );
    }
    for failure in &report.failures {
        eprintln!("skipped {}: {}", failure.path.display(), failure.error);
    }

    info!(
        converted = report.results.len(),
        failed = report.failures.len(),
        output_dir = %report.output_dir.display(),
        manifest = ?report.manifest_path,
        "Done"
    );

    if report.total() == 0 {
        anyhow::bail!("No images found at {}", cli.path.display());
    }
    if report.all_failed() {
        anyhow::bail!("None of the {} images could be converted", report.failures.len());
    }

    Ok(())
}
