use regex::Regex;
use reqwest::blocking::Client;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{
    check_tessdata_dir, timeout_from_secs, TesseractConfig, DEFAULT_BINARY, DEFAULT_TIMEOUT_SECS,
};
use crate::error::{Result, TesseractError};
use crate::image_source::ImageSource;
use crate::options::RecognitionOptions;
use crate::process::{self, ExecutionResult};

/// Handle on a tesseract binary.
///
/// Every call spawns its own child process, so a shared `&Tesseract` can be
/// used from many threads at once. Changing the configuration needs `&mut`;
/// wrap it in a lock if it must change while other threads recognize.
#[derive(Debug, Clone)]
pub struct Tesseract {
    binary_path: PathBuf,
    timeout: Duration,
    tessdata_dir: Option<PathBuf>,
    /// Used for URL sources; a one-off client otherwise.
    http_client: Option<Client>,
}

impl Default for Tesseract {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from(DEFAULT_BINARY),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            tessdata_dir: None,
            http_client: None,
        }
    }
}

impl Tesseract {
    /// `tesseract` from `PATH`, 20 second timeout, engine-default tessdata.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TesseractConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            binary_path: config.binary_path.clone(),
            timeout: config.timeout()?,
            tessdata_dir: config.tessdata_dir.clone(),
            http_client: None,
        })
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn set_binary_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.binary_path = path.into();
        self
    }

    pub fn process_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_process_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    pub fn set_process_timeout_secs(&mut self, secs: f64) -> Result<&mut Self> {
        self.timeout = timeout_from_secs(secs)?;
        Ok(self)
    }

    pub fn tessdata_dir(&self) -> Option<&Path> {
        self.tessdata_dir.as_deref()
    }

    /// Point the engine at another language data directory.
    ///
    /// The directory must exist now; nothing is spawned to check it.
    pub fn set_tessdata_dir(&mut self, dir: impl Into<PathBuf>) -> Result<&mut Self> {
        let dir = dir.into();
        check_tessdata_dir(&dir)?;
        self.tessdata_dir = Some(dir);
        Ok(self)
    }

    pub fn reset_tessdata_dir(&mut self) -> &mut Self {
        self.tessdata_dir = None;
        self
    }

    /// Fetch URL sources with `client`, e.g. one with its own timeout or proxy.
    pub fn set_http_client(&mut self, client: Client) -> &mut Self {
        self.http_client = Some(client);
        self
    }

    /// First line of `tesseract --version`, e.g. `tesseract 5.3.0`.
    pub fn version(&self) -> Result<String> {
        let result = self.execute(vec!["--version".into()])?;
        let stdout = result.stdout_text();

        stdout
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| TesseractError::Parse("Couldn't extract the version line".to_string()))
    }

    /// Just the number from [`version`](Self::version), e.g. `5.3.0`.
    pub fn version_number(&self) -> Result<String> {
        let line = self.version()?;
        version_regex()
            .captures(&line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| TesseractError::Parse(format!("No version number in ( {} )", line)))
    }

    /// Language codes installed in the active tessdata directory.
    pub fn supported_languages(&self) -> Result<Vec<String>> {
        let result = self.execute(vec!["--list-langs".into()])?;
        let stdout = result.stdout_text();

        // The first non-blank line is a header like
        // `List of available languages in "/usr/share/tessdata/" (3):`.
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .skip(1)
            .map(str::to_string)
            .collect())
    }

    /// Recognize text in `source`.
    ///
    /// Fails with [`TesseractError::Parse`] if the output is not UTF-8, which
    /// is always the case with `output_pdf`; use [`recognize_raw`](Self::recognize_raw)
    /// for that.
    pub fn recognize(
        &self,
        source: impl Into<ImageSource>,
        options: &RecognitionOptions,
    ) -> Result<String> {
        let bytes = self.recognize_raw(source, options)?;
        String::from_utf8(bytes)
            .map_err(|e| TesseractError::Parse(format!("Output is not valid UTF-8: {}", e)))
    }

    /// Recognize `source` and return stdout untouched.
    pub fn recognize_raw(
        &self,
        source: impl Into<ImageSource>,
        options: &RecognitionOptions,
    ) -> Result<Vec<u8>> {
        let image = source.into().resolve_with(self.http_client.as_ref())?;
        let result = self.recognize_file(image.path(), options);
        image.release();
        result
    }

    /// Recognize an image that is already on disk.
    pub fn recognize_file(&self, image: &Path, options: &RecognitionOptions) -> Result<Vec<u8>> {
        let args = options.to_arguments(image)?;
        info!("Recognizing {:?}", image);

        let result = self.execute(args)?;
        info!("Recognized {:?}: {} bytes", image, result.stdout.len());
        Ok(result.stdout)
    }

    fn execute(&self, args: Vec<OsString>) -> Result<ExecutionResult> {
        let argv = self.command(args);
        debug!("Timeout {:?}", self.timeout);
        process::run(&argv, self.timeout)
    }

    fn command(&self, args: Vec<OsString>) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(args.len() + 3);
        argv.push(self.binary_path.clone().into_os_string());

        if let Some(dir) = &self.tessdata_dir {
            argv.push("--tessdata-dir".into());
            argv.push(dir.clone().into_os_string());
        }

        argv.extend(args);
        argv
    }
}

fn version_regex() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| {
        Regex::new(r"v?(\d+(?:\.\d+)+(?:-[0-9A-Za-z.-]+)?)").expect("version pattern is valid")
    })
}
