use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tessexec::{
    EngineMode, ImageSource, PageSegMode, ParameterBag, RecognitionOptions, Tesseract,
    TesseractConfig,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Run tesseract OCR from the command line")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct EngineArgs {
    /// JSON file with binary_path, timeout_secs and tessdata_dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path to the tesseract binary (default: tesseract on PATH)
    #[arg(long, global = true)]
    binary: Option<PathBuf>,
    /// Process timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<f64>,
    /// Directory holding *.traineddata files
    #[arg(long, global = true)]
    tessdata_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the engine version line
    Version,
    /// List installed languages
    Langs,
    /// Recognize text in an image
    Recognize(RecognizeArgs),
}

#[derive(Debug, Args)]
struct RecognizeArgs {
    /// Image path, http(s) URL, or - to read image bytes from stdin
    image: String,
    /// JSON file with recognition options; flags below override it
    #[arg(long)]
    options: Option<PathBuf>,
    /// Language code, repeatable (joined with +)
    #[arg(short, long = "lang")]
    langs: Vec<String>,
    /// Page segmentation mode (0-13)
    #[arg(long, value_parser = parse_psm)]
    psm: Option<PageSegMode>,
    /// OCR engine mode (0-3)
    #[arg(long, value_parser = parse_oem)]
    oem: Option<EngineMode>,
    #[arg(long)]
    dpi: Option<u32>,
    #[arg(long)]
    user_words: Option<PathBuf>,
    #[arg(long)]
    user_patterns: Option<PathBuf>,
    /// Emit a searchable PDF instead of text
    #[arg(long)]
    pdf: bool,
    /// Engine variable override as key=value, repeatable
    #[arg(short = 'c', long = "set", value_parser = parse_pair)]
    set: Vec<(String, String)>,
    /// Write output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_psm(s: &str) -> std::result::Result<PageSegMode, String> {
    let value: u8 = s.parse().map_err(|e| format!("{}", e))?;
    PageSegMode::try_from(value).map_err(|e| e.to_string())
}

fn parse_oem(s: &str) -> std::result::Result<EngineMode, String> {
    let value: u8 = s.parse().map_err(|e| format!("{}", e))?;
    EngineMode::try_from(value).map_err(|e| e.to_string())
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    ParameterBag::parse_pair(s).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries OCR output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let tesseract = build_engine(&cli.engine)?;

    match cli.command {
        Commands::Version => {
            println!("{}", tesseract.version()?);
            Ok(())
        }
        Commands::Langs => {
            for lang in tesseract.supported_languages()? {
                println!("{}", lang);
            }
            Ok(())
        }
        Commands::Recognize(args) => recognize_command(&tesseract, args),
    }
}

fn build_engine(args: &EngineArgs) -> Result<Tesseract> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            TesseractConfig::load(path)
                .with_context(|| format!("Failed to load config file: {:?}", path))?
        }
        None => TesseractConfig::default(),
    };

    if let Some(binary) = &args.binary {
        config.binary_path = binary.clone();
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(dir) = &args.tessdata_dir {
        config.tessdata_dir = Some(dir.clone());
    }

    info!("Engine: {}", config);
    Tesseract::from_config(&config).context("Invalid engine configuration")
}

fn recognize_command(tesseract: &Tesseract, args: RecognizeArgs) -> Result<()> {
    let mut options = match &args.options {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read options file: {:?}", path))?;
            serde_json::from_str::<RecognitionOptions>(&raw)
                .with_context(|| "Failed to parse options JSON")?
        }
        None => RecognitionOptions::default(),
    };

    options.languages.extend(args.langs);
    options.psm = args.psm.or(options.psm);
    options.oem = args.oem.or(options.oem);
    options.dpi = args.dpi.or(options.dpi);
    options.user_words = args.user_words.or(options.user_words);
    options.user_patterns = args.user_patterns.or(options.user_patterns);
    options.output_pdf |= args.pdf;
    for (key, value) in args.set {
        options = options.parameter(key, value);
    }

    let source = if args.image == "-" {
        let mut bytes = Vec::new();
        io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read image from stdin")?;
        ImageSource::Bytes(bytes)
    } else {
        ImageSource::from_location(&args.image)
    };

    let output = tesseract
        .recognize_raw(source, &options)
        .with_context(|| format!("Recognition failed for {}", args.image))?;

    match &args.output {
        Some(path) => {
            fs::write(path, &output)
                .with_context(|| format!("Failed to write output: {:?}", path))?;
            info!("Output saved to: {:?}", path);
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&output)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
