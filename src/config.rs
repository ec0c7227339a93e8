use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TesseractError};

pub const DEFAULT_BINARY: &str = "tesseract";
pub const DEFAULT_TIMEOUT_SECS: f64 = 20.0;

/// How to reach the engine. Loadable from JSON; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Program name or path; bare names are looked up on `PATH`.
    pub binary_path: PathBuf,
    /// Per-invocation limit in seconds. Fractions are allowed.
    pub timeout_secs: f64,
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from(DEFAULT_BINARY),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            tessdata_dir: None,
        }
    }
}

impl TesseractConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            TesseractError::Parse(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        timeout_from_secs(self.timeout_secs)?;
        if let Some(dir) = &self.tessdata_dir {
            check_tessdata_dir(dir)?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Result<Duration> {
        timeout_from_secs(self.timeout_secs)
    }
}

impl fmt::Display for TesseractConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "binary={} timeout={}s tessdata={}",
            self.binary_path.display(),
            self.timeout_secs,
            self.tessdata_dir
                .as_deref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        )
    }
}

pub(crate) fn timeout_from_secs(secs: f64) -> Result<Duration> {
    if !(secs > 0.0) {
        return Err(TesseractError::Argument(format!(
            "timeout must be a positive number of seconds, got {}",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| TesseractError::Argument(format!("invalid timeout {}: {}", secs, e)))
}

pub(crate) fn check_tessdata_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(TesseractError::Argument(format!(
            "The provided tess-data-dir ( {} ) does not exist or is not a valid directory",
            dir.display()
        )));
    }
    Ok(())
}
