//! Run the `tesseract` OCR command-line tool from Rust.
//!
//! [`Tesseract`] builds the command line from [`RecognitionOptions`], spawns
//! the binary with a timeout, and maps failures onto [`TesseractError`].

pub mod config;
pub mod error;
pub mod image_source;
pub mod options;
pub mod params;
pub mod process;
pub mod tesseract;

// Re-export commonly used types
pub use config::TesseractConfig;
pub use error::{FailureKind, Result, TesseractError};
pub use image_source::{ImageSource, ResolvedImage};
pub use options::{EngineMode, PageSegMode, RecognitionOptions};
pub use params::ParameterBag;
pub use tesseract::Tesseract;
