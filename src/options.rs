use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, TesseractError};
use crate::params::ParameterBag;

/// Page segmentation mode (`--psm`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum PageSegMode {
    OsdOnly = 0,
    AutoWithOsd = 1,
    AutoOnly = 2,
    Auto = 3,
    SingleColumn = 4,
    SingleBlockVertical = 5,
    SingleBlock = 6,
    SingleLine = 7,
    SingleWord = 8,
    CircleWord = 9,
    SingleChar = 10,
    SparseText = 11,
    SparseTextWithOsd = 12,
    RawLine = 13,
}

impl PageSegMode {
    const ALL: [Self; 14] = [
        Self::OsdOnly,
        Self::AutoWithOsd,
        Self::AutoOnly,
        Self::Auto,
        Self::SingleColumn,
        Self::SingleBlockVertical,
        Self::SingleBlock,
        Self::SingleLine,
        Self::SingleWord,
        Self::CircleWord,
        Self::SingleChar,
        Self::SparseText,
        Self::SparseTextWithOsd,
        Self::RawLine,
    ];
}

impl TryFrom<u8> for PageSegMode {
    type Error = TesseractError;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| {
                TesseractError::Argument(format!("page segmentation mode must be 0-13, got {}", value))
            })
    }
}

impl From<PageSegMode> for u8 {
    fn from(mode: PageSegMode) -> Self {
        mode as u8
    }
}

impl fmt::Display for PageSegMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// OCR engine mode (`--oem`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum EngineMode {
    Legacy = 0,
    Lstm = 1,
    LegacyWithLstm = 2,
    Default = 3,
}

impl TryFrom<u8> for EngineMode {
    type Error = TesseractError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Legacy),
            1 => Ok(Self::Lstm),
            2 => Ok(Self::LegacyWithLstm),
            3 => Ok(Self::Default),
            other => Err(TesseractError::Argument(format!(
                "engine mode must be 0-3, got {}",
                other
            ))),
        }
    }
}

impl From<EngineMode> for u8 {
    fn from(mode: EngineMode) -> Self {
        mode as u8
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Everything that shapes a single recognition call.
///
/// Unset fields add nothing to the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionOptions {
    pub languages: Vec<String>,
    pub psm: Option<PageSegMode>,
    pub oem: Option<EngineMode>,
    /// Passed through as-is; `0` counts as unset.
    pub dpi: Option<u32>,
    pub user_words: Option<PathBuf>,
    pub user_patterns: Option<PathBuf>,
    /// Ask the engine for a PDF on stdout instead of plain text.
    pub output_pdf: bool,
    pub parameters: Option<ParameterBag>,
}

impl RecognitionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.languages.push(lang.into());
        self
    }

    pub fn languages<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages.extend(langs.into_iter().map(Into::into));
        self
    }

    pub fn psm(mut self, psm: PageSegMode) -> Self {
        self.psm = Some(psm);
        self
    }

    pub fn oem(mut self, oem: EngineMode) -> Self {
        self.oem = Some(oem);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    pub fn user_words(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_words = Some(path.into());
        self
    }

    pub fn user_patterns(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_patterns = Some(path.into());
        self
    }

    pub fn output_pdf(mut self, enabled: bool) -> Self {
        self.output_pdf = enabled;
        self
    }

    pub fn parameters(mut self, bag: ParameterBag) -> Self {
        self.parameters = Some(bag);
        self
    }

    /// Add one `-c` override, creating the bag if needed.
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .get_or_insert_with(ParameterBag::new)
            .set(key, value);
        self
    }

    /// Build the recognition arguments for `image`, without the program name.
    ///
    /// Fails before anything is spawned if a words or patterns file is missing.
    pub fn to_arguments(&self, image: &Path) -> Result<Vec<OsString>> {
        let mut args: Vec<OsString> = vec![image.into(), "stdout".into()];

        if !self.languages.is_empty() {
            args.push("-l".into());
            args.push(self.languages.join("+").into());
        }

        if let Some(psm) = self.psm {
            args.push("--psm".into());
            args.push(psm.to_string().into());
        }

        if let Some(oem) = self.oem {
            args.push("--oem".into());
            args.push(oem.to_string().into());
        }

        if let Some(dpi) = self.dpi.filter(|dpi| *dpi > 0) {
            args.push("--dpi".into());
            args.push(dpi.to_string().into());
        }

        if let Some(words) = &self.user_words {
            args.push("--user-words".into());
            args.push(existing_file("words-file", words)?.into());
        }

        if let Some(patterns) = &self.user_patterns {
            args.push("--user-patterns".into());
            args.push(existing_file("patterns-file", patterns)?.into());
        }

        if self.output_pdf {
            args.push("pdf".into());
        }

        if let Some(bag) = &self.parameters {
            args.extend(bag.to_arguments().into_iter().map(OsString::from));
        }

        Ok(args)
    }
}

fn existing_file<'a>(what: &str, path: &'a Path) -> Result<&'a Path> {
    if !path.exists() {
        return Err(TesseractError::Argument(format!(
            "The provided {} ( {} ) does not exist",
            what,
            path.display()
        )));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_mode_ranges() {
        assert_eq!(PageSegMode::try_from(0).unwrap(), PageSegMode::OsdOnly);
        assert_eq!(PageSegMode::try_from(6).unwrap(), PageSegMode::SingleBlock);
        assert_eq!(PageSegMode::try_from(13).unwrap(), PageSegMode::RawLine);
        assert!(PageSegMode::try_from(14).is_err());

        assert_eq!(EngineMode::try_from(1).unwrap(), EngineMode::Lstm);
        assert!(EngineMode::try_from(4).is_err());
    }

    #[test]
    fn test_modes_deserialize_from_numbers() {
        let options: RecognitionOptions =
            serde_json::from_str(r#"{"psm": 7, "oem": 1, "languages": ["eng"]}"#).unwrap();
        assert_eq!(options.psm, Some(PageSegMode::SingleLine));
        assert_eq!(options.oem, Some(EngineMode::Lstm));

        let bad = serde_json::from_str::<RecognitionOptions>(r#"{"psm": 42}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_defaults_emit_only_image_and_stdout() {
        let args = RecognitionOptions::new()
            .to_arguments(Path::new("page.png"))
            .unwrap();
        assert_eq!(strings(args), vec!["page.png", "stdout"]);
    }

    #[test]
    fn test_full_argument_order() {
        let words = NamedTempFile::new().unwrap();
        let patterns = NamedTempFile::new().unwrap();

        let options = RecognitionOptions::new()
            .languages(["eng", "deu"])
            .psm(PageSegMode::SingleBlock)
            .oem(EngineMode::Lstm)
            .dpi(300)
            .user_words(words.path())
            .user_patterns(patterns.path())
            .output_pdf(true)
            .parameter("tessedit_char_whitelist", "abc");

        let args = strings(options.to_arguments(Path::new("in.png")).unwrap());
        let words = words.path().to_string_lossy().into_owned();
        let patterns = patterns.path().to_string_lossy().into_owned();

        assert_eq!(
            args,
            vec![
                "in.png",
                "stdout",
                "-l",
                "eng+deu",
                "--psm",
                "6",
                "--oem",
                "1",
                "--dpi",
                "300",
                "--user-words",
                words.as_str(),
                "--user-patterns",
                patterns.as_str(),
                "pdf",
                "-c",
                "tessedit_char_whitelist=abc",
            ]
        );
    }

    #[test]
    fn test_zero_dpi_is_omitted() {
        let args = strings(
            RecognitionOptions::new()
                .dpi(0)
                .to_arguments(Path::new("a.png"))
                .unwrap(),
        );
        assert!(!args.contains(&"--dpi".to_string()));
    }

    #[test]
    fn test_missing_words_file() {
        let options = RecognitionOptions::new().user_words("/definitely/not/here.words");
        let err = options.to_arguments(Path::new("a.png")).unwrap_err();
        assert!(matches!(err, TesseractError::Argument(msg) if msg.contains("words-file")));
    }

    #[test]
    fn test_missing_patterns_file() {
        let options = RecognitionOptions::new().user_patterns("/definitely/not/here.patterns");
        assert!(matches!(
            options.to_arguments(Path::new("a.png")),
            Err(TesseractError::Argument(_))
        ));
    }
}
