//! Error types for tesseract invocations.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Refinement of a failed execution, derived from the tool's stderr.
///
/// See [`crate::process::classify`] for how a kind is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The requested language data could not be loaded.
    UnsupportedLanguage,
    /// The DPI is out of range or the engine had to estimate it.
    InvalidDpi,
    /// A `-c key=value` override was rejected.
    InvalidConfiguration,
    /// Anything else.
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnsupportedLanguage => "unsupported language",
            Self::InvalidDpi => "invalid dpi",
            Self::InvalidConfiguration => "invalid configuration",
            Self::Other => "execution failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum TesseractError {
    /// Bad caller input: a missing file, an invalid directory, an out of range value.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Lookup of a parameter that was never set.
    #[error("The key ( {0} ) does not exist")]
    NotFound(String),

    /// The tool's output did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The tool ran cleanly but printed nothing but whitespace.
    #[error("Command ( {command} ) has executed but produced no output")]
    EmptyResult { command: String },

    /// The binary could not be started at all.
    #[error("Failed to spawn ( {program} ): {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The child outlived the configured timeout and was killed.
    #[error("Command ( {command} ) exceeded the timeout of {:.3}s", .timeout.as_secs_f64())]
    Timeout { command: String, timeout: Duration },

    /// Non-zero exit or anything on stderr.
    #[error("{kind}: command ( {command} ) has produced the error ( {stderr} )")]
    ExecutionFailed {
        kind: FailureKind,
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TesseractError {
    /// The classified kind, if this is an execution failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::ExecutionFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Resolved command line for errors raised by an invocation.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::EmptyResult { command }
            | Self::Timeout { command, .. }
            | Self::ExecutionFailed { command, .. } => Some(command.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TesseractError>;
