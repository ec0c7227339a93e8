//! Image inputs accepted by [`crate::Tesseract::recognize`].
//!
//! The engine only reads files, so every source is turned into a path once,
//! up front. Sources that are not already files go through a temporary PNG
//! that is removed when the [`ResolvedImage`] is released or dropped.

use image::{DynamicImage, ImageFormat};
use reqwest::blocking::Client;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, TesseractError};

/// Prefix of every temporary image file.
pub const TEMP_FILE_PREFIX: &str = "tessimg-";

#[derive(Debug, Clone)]
pub enum ImageSource {
    /// An image already on disk. Used as-is and never deleted.
    Path(PathBuf),
    /// A remote image, downloaded before recognition.
    Url(String),
    /// Encoded image data in any format the `image` crate can decode.
    Bytes(Vec<u8>),
    /// A decoded bitmap.
    Bitmap(DynamicImage),
}

impl ImageSource {
    /// Interpret a user-supplied location: `http(s)://` is a URL, anything else a path.
    pub fn from_location(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(location.to_string())
        } else {
            Self::Path(PathBuf::from(location))
        }
    }

    /// Produce a file the engine can read.
    pub fn resolve(self) -> Result<ResolvedImage> {
        self.resolve_with(None)
    }

    /// Like [`resolve`](Self::resolve), fetching URLs through `client` when given.
    pub fn resolve_with(self, client: Option<&Client>) -> Result<ResolvedImage> {
        match self {
            Self::Path(path) => {
                if !path.is_file() {
                    return Err(TesseractError::Argument(format!(
                        "The provided image ( {} ) does not exist or is not a file",
                        path.display()
                    )));
                }
                Ok(ResolvedImage { path, temp: None })
            }
            Self::Url(url) => {
                debug!("Fetching image from {}", url);
                let response = match client {
                    Some(client) => client.get(&url).send()?,
                    None => reqwest::blocking::get(&url)?,
                };
                let bytes = response.error_for_status()?.bytes()?;
                Self::Bytes(bytes.to_vec()).resolve_with(client)
            }
            Self::Bytes(bytes) => {
                Self::Bitmap(image::load_from_memory(&bytes)?).resolve_with(client)
            }
            Self::Bitmap(bitmap) => write_temp_png(bitmap),
        }
    }
}

fn write_temp_png(bitmap: DynamicImage) -> Result<ResolvedImage> {
    // The PNG encoder has no float support.
    let bitmap = match bitmap {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgba8(bitmap.to_rgba8())
        }
        other => other,
    };

    let temp = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .suffix(".png")
        .tempfile()?;
    bitmap.save_with_format(temp.path(), ImageFormat::Png)?;
    debug!("Wrote temporary image {:?}", temp.path());

    Ok(ResolvedImage {
        path: temp.path().to_path_buf(),
        temp: Some(temp),
    })
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for ImageSource {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(bitmap: DynamicImage) -> Self {
        Self::Bitmap(bitmap)
    }
}

/// An on-disk image, possibly owned temporarily.
#[derive(Debug)]
pub struct ResolvedImage {
    path: PathBuf,
    temp: Option<NamedTempFile>,
}

impl ResolvedImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Delete the temporary file now, logging instead of failing.
    pub fn release(self) {
        if let Some(temp) = self.temp {
            if let Err(e) = temp.close() {
                warn!("Failed to remove temporary image {:?}: {}", self.path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba32FImage};
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    fn white_bitmap() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([255, 255, 255])))
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        white_bitmap()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_from_location() {
        assert!(matches!(
            ImageSource::from_location("https://example.com/a.png"),
            ImageSource::Url(_)
        ));
        assert!(matches!(
            ImageSource::from_location("HTTP://example.com/a.png"),
            ImageSource::Url(_)
        ));
        assert!(matches!(
            ImageSource::from_location("scans/page-1.png"),
            ImageSource::Path(p) if p == Path::new("scans/page-1.png")
        ));
    }

    #[test]
    fn test_existing_path_is_used_directly() {
        let file = NamedTempFile::new().unwrap();
        let resolved = ImageSource::from(file.path()).resolve().unwrap();

        assert_eq!(resolved.path(), file.path());
        assert!(!resolved.is_temporary());

        resolved.release();
        assert!(file.path().exists());
    }

    #[test]
    fn test_missing_path() {
        let err = ImageSource::Path(PathBuf::from("/no/such/image.png"))
            .resolve()
            .unwrap_err();
        assert!(matches!(err, TesseractError::Argument(_)));
    }

    #[test]
    fn test_bitmap_becomes_temporary_png() {
        let resolved = ImageSource::from(white_bitmap()).resolve().unwrap();
        let path = resolved.path().to_path_buf();

        assert!(resolved.is_temporary());
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "png");
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(TEMP_FILE_PREFIX));

        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (40, 20));

        resolved.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_bytes_are_decoded() {
        let resolved = ImageSource::from(png_bytes()).resolve().unwrap();
        let path = resolved.path().to_path_buf();
        assert!(path.exists());

        drop(resolved);
        assert!(!path.exists());
    }

    #[test]
    fn test_float_bitmap_is_converted() {
        let bitmap = DynamicImage::ImageRgba32F(Rgba32FImage::new(8, 8));
        let resolved = ImageSource::from(bitmap).resolve().unwrap();
        assert!(resolved.path().exists());
    }

    #[test]
    fn test_undecodable_bytes() {
        let err = ImageSource::from(b"wrong-image-data".as_slice())
            .resolve()
            .unwrap_err();
        assert!(matches!(err, TesseractError::Image(_)));
    }
}
