use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use tessexec::{FailureKind, RecognitionOptions, Tesseract, TesseractConfig, TesseractError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "webp", "pnm"];

#[derive(Debug, Parser)]
#[command(author, version, about = "Recognize every image in a directory tree")]
struct Args {
    /// Input directory containing images
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for recognized text
    #[arg(short, long)]
    output: PathBuf,

    /// JSON engine configuration (binary_path, timeout_secs, tessdata_dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON recognition options applied to every image
    #[arg(long)]
    options: Option<PathBuf>,

    /// Language code, repeatable
    #[arg(short, long = "lang")]
    langs: Vec<String>,

    /// Retry timed out images once with this timeout in seconds
    #[arg(long)]
    retry_timeout: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageReport {
    source: String,
    output: Option<String>,
    character_count: usize,
    error: Option<String>,
    failure: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BatchManifest {
    engine_version: String,
    total_images: usize,
    recognized: usize,
    empty: usize,
    failed: usize,
    images: Vec<ImageReport>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting batch OCR");
    info!("Input directory: {:?}", args.input);
    info!("Output directory: {:?}", args.output);

    let config = match &args.config {
        Some(path) => TesseractConfig::load(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))?,
        None => TesseractConfig::default(),
    };
    let tesseract = Tesseract::from_config(&config)?;
    let retry = retry_engine(&tesseract, args.retry_timeout).context("Invalid --retry-timeout")?;

    let mut options = match &args.options {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read options file: {:?}", path))?;
            serde_json::from_str::<RecognitionOptions>(&raw)
                .with_context(|| "Failed to parse options JSON")?
        }
        None => RecognitionOptions::default(),
    };
    options.languages.extend(args.langs.iter().cloned());

    let engine_version = tesseract
        .version()
        .context("tesseract is not usable; check --config or PATH")?;
    info!("Using {}", engine_version);

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory: {:?}", args.output))?;

    let images = find_images(&args.input);
    info!("Found {} images", images.len());

    if images.is_empty() {
        anyhow::bail!("No images found in {:?}", args.input);
    }

    let mut reports = Vec::with_capacity(images.len());

    for (idx, image) in images.iter().enumerate() {
        info!("Processing {}/{}: {:?}", idx + 1, images.len(), image);

        let mut result = tesseract.recognize(image.as_path(), &options);

        let timed_out = matches!(&result, Err(e) if e.is_timeout());
        if let (true, Some(patient)) = (timed_out, &retry) {
            warn!(
                "Timed out on {:?}, retrying with {:?}",
                image,
                patient.process_timeout()
            );
            result = patient.recognize(image.as_path(), &options);
        }

        reports.push(write_report(image, &args.input, &args.output, result)?);
    }

    let manifest = BatchManifest {
        engine_version,
        total_images: reports.len(),
        recognized: reports.iter().filter(|r| r.output.is_some()).count(),
        empty: reports
            .iter()
            .filter(|r| r.failure.as_deref() == Some("empty"))
            .count(),
        failed: reports
            .iter()
            .filter(|r| r.error.is_some() && r.failure.as_deref() != Some("empty"))
            .count(),
        images: reports,
    };

    let manifest_path = args.output.join("manifest.json");
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("Failed to write manifest: {:?}", manifest_path))?;

    info!("Batch complete!");
    info!("Summary:");
    info!("  - Images: {}", manifest.total_images);
    info!("  - Recognized: {}", manifest.recognized);
    info!("  - Empty: {}", manifest.empty);
    info!("  - Failed: {}", manifest.failed);
    info!("Manifest saved to: {:?}", manifest_path);

    Ok(())
}

/// Copy of `tesseract` with the retry timeout, if one was asked for.
fn retry_engine(tesseract: &Tesseract, secs: Option<f64>) -> Result<Option<Tesseract>> {
    let Some(secs) = secs else {
        return Ok(None);
    };
    let mut patient = tesseract.clone();
    patient.set_process_timeout_secs(secs)?;
    Ok(Some(patient))
}

fn find_images(root: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        })
        .collect();
    images.sort();
    images
}

fn write_report(
    image: &Path,
    input_root: &Path,
    output_root: &Path,
    result: Result<String, TesseractError>,
) -> Result<ImageReport> {
    let relative = image.strip_prefix(input_root).unwrap_or(image);
    let source = relative.display().to_string();

    match result {
        Ok(text) => {
            let text_path = output_root.join(relative).with_extension("txt");
            if let Some(parent) = text_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&text_path, &text)
                .with_context(|| format!("Failed to write text: {:?}", text_path))?;

            Ok(ImageReport {
                source,
                output: Some(text_path.display().to_string()),
                character_count: text.chars().count(),
                error: None,
                failure: None,
            })
        }
        Err(e) => {
            warn!("Failed to recognize {:?}: {}", image, e);
            let failure = match &e {
                TesseractError::EmptyResult { .. } => "empty".to_string(),
                TesseractError::Timeout { .. } => "timeout".to_string(),
                other => match other.failure_kind() {
                    Some(FailureKind::Other) | None => "error".to_string(),
                    Some(kind) => kind.to_string(),
                },
            };

            Ok(ImageReport {
                source,
                output: None,
                character_count: 0,
                error: Some(e.to_string()),
                failure: Some(failure),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retry_engine_rejects_bad_timeout() {
        let tesseract = Tesseract::new();
        assert!(retry_engine(&tesseract, Some(0.0)).is_err());
        assert!(retry_engine(&tesseract, Some(-3.0)).is_err());
        assert!(retry_engine(&tesseract, Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_retry_engine_copies_engine() {
        let mut tesseract = Tesseract::new();
        tesseract.set_binary_path("/opt/tesseract/bin/tesseract");

        let patient = retry_engine(&tesseract, Some(2.5)).unwrap().unwrap();
        assert_eq!(patient.process_timeout(), Duration::from_millis(2500));
        assert_eq!(patient.binary_path(), tesseract.binary_path());
        assert_eq!(tesseract.process_timeout(), Duration::from_secs(20));

        assert!(retry_engine(&tesseract, None).unwrap().is_none());
    }
}
