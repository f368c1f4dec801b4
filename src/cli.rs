//! Command-line surface.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;

use crate::config::{self, Mode, PipelineConfig, ReportMode};
use crate::imaging::ProfileKind;
use crate::ocr::{EngineMode, EngineSettings, PageSegMode, RecognizeParams};

const DIRECTORY_PROMPT: &str = "Input the directory of images to process: ";

#[derive(Debug, Parser)]
#[command(name = "batch-ocr", version, about = "Extract text from a directory of images into a CSV report")]
pub struct Cli {
    /// Directory of images to process. Asked for interactively when omitted.
    pub dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Mode::Benchmark)]
    pub mode: Mode,

    /// Pool size. Defaults to max(2, available hardware threads).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    #[arg(long, default_value = config::DEFAULT_REPORT)]
    pub report: PathBuf,

    /// Write rows as workers finish instead of after the pool joins.
    #[arg(long)]
    pub stream_report: bool,

    /// Save every normalized bitmap under the output directory.
    #[arg(long)]
    pub save_normalized: bool,

    /// Where normalized bitmaps go. Defaults to `<DIR>/output`.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ProfileKind::ScaledGray)]
    pub sequential_profile: ProfileKind,

    #[arg(long, value_enum, default_value_t = ProfileKind::GammaGray)]
    pub pooled_profile: ProfileKind,

    /// Recognition language; `+` joins several.
    #[arg(long, default_value = "eng")]
    pub lang: String,

    #[arg(long, value_enum, default_value_t = EngineMode::LstmOnly)]
    pub engine_mode: EngineMode,

    /// Page segmentation mode.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=13))]
    pub psm: u8,

    /// Resolution hint passed to the engine.
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u32).range(1..))]
    pub dpi: u32,

    /// Tesseract executable.
    #[arg(long, default_value = "tesseract")]
    pub tesseract: PathBuf,

    /// Overrides the engine's tessdata directory.
    #[arg(long)]
    pub tessdata: Option<PathBuf>,

    /// Also write the run summary as JSON.
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Emit log lines as JSON.
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Build the run configuration for `source_dir`.
    pub fn to_config(&self, source_dir: PathBuf) -> PipelineConfig {
        let mut config = PipelineConfig::new(source_dir);
        config.mode = self.mode;
        config.report_mode = if self.stream_report {
            ReportMode::Streaming
        } else {
            ReportMode::Batch
        };
        if let Some(workers) = self.workers {
            config.workers = usize::try_from(workers).unwrap_or(usize::MAX);
        }
        config.report_path = self.report.clone();
        if self.save_normalized {
            config.artifact_dir = Some(
                self.output_dir
                    .clone()
                    .unwrap_or_else(|| PipelineConfig::default_artifact_dir(&config.source_dir)),
            );
        }
        config.sequential_profile = self.sequential_profile.profile();
        config.pooled_profile = self.pooled_profile.profile();
        config.engine = EngineSettings {
            language: self.lang.clone(),
            mode: self.engine_mode,
            params: RecognizeParams {
                segmentation: PageSegMode::new(self.psm).unwrap_or_default(),
                source_dpi: self.dpi,
                ..RecognizeParams::default()
            },
        };
        config.summary_path = self.summary_json.clone();
        config
    }
}

/// Ask for the source directory on `output` and read one line from `input`.
pub fn prompt_directory<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<PathBuf> {
    output.write_all(DIRECTORY_PROMPT.as_bytes())?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(PathBuf::from(line.trim()))
}
