//! Tesseract command-line engine.
//! Each recognize call writes the bitmap to a per-session scratch PNG and runs
//! `tesseract <png> stdout ...`, reading the UTF-8 text from stdout.
//! `init` probes the binary (`--version`) and the language list once per session.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use image::GrayImage;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::{EngineMode, OcrEngine, OcrError, OcrSession, RecognizeParams};

/// Engine backed by an installed `tesseract` executable.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    tessdata: Option<PathBuf>,
}

impl TesseractCli {
    /// `binary`: executable name or path (e.g. "tesseract").
    /// `tessdata`: optional traineddata directory (`--tessdata-dir`).
    pub fn new(binary: impl Into<PathBuf>, tessdata: Option<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            tessdata,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(dir) = &self.tessdata {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    fn run(&self, cmd: &mut Command) -> Result<Output, OcrError> {
        cmd.output().map_err(|e| {
            OcrError::Unavailable(format!("failed to run {}: {e}", self.binary.display()))
        })
    }

    fn installed_languages(&self) -> Result<Vec<String>, OcrError> {
        let output = self.run(self.command().arg("--list-langs"))?;
        if !output.status.success() {
            return Err(OcrError::Unavailable(format!(
                "--list-langs exited with {}",
                output.status
            )));
        }
        // Older releases print the list on stderr.
        let mut listing = String::from_utf8_lossy(&output.stdout).into_owned();
        listing.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(parse_language_list(&listing))
    }
}

/// Skip the "List of available languages ..." banner, keep one name per line.
fn parse_language_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}

impl OcrEngine for TesseractCli {
    fn init(&self, language: &str, mode: EngineMode) -> Result<Box<dyn OcrSession>, OcrError> {
        let version = self.run(self.command().arg("--version"))?;
        if !version.status.success() {
            return Err(OcrError::Unavailable(format!(
                "{} --version exited with {}",
                self.binary.display(),
                version.status
            )));
        }

        // Multi-language specs look like "eng+deu"; every part must exist.
        let installed = self.installed_languages()?;
        if let Some(missing) = language
            .split('+')
            .find(|lang| !installed.iter().any(|have| have == lang))
        {
            return Err(OcrError::LanguageMissing(missing.to_string()));
        }

        let scratch = tempfile::Builder::new()
            .prefix("batch-ocr-")
            .tempdir()
            .map_err(|e| OcrError::Unavailable(format!("scratch dir: {e}")))?;

        info!(
            binary = %self.binary.display(),
            language,
            oem = mode.oem(),
            "tesseract_session_ready"
        );

        Ok(Box::new(TesseractSession {
            engine: self.clone(),
            language: language.to_string(),
            mode,
            params: RecognizeParams::default(),
            scratch,
        }))
    }
}

struct TesseractSession {
    engine: TesseractCli,
    language: String,
    mode: EngineMode,
    params: RecognizeParams,
    scratch: TempDir,
}

impl TesseractSession {
    fn page_path(&self) -> PathBuf {
        self.scratch.path().join("page.png")
    }

    fn build_command(&self, input: &Path) -> Command {
        let mut cmd = self.engine.command();
        cmd.arg(input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--oem")
            .arg(self.mode.oem().to_string())
            .arg("--psm")
            .arg(self.params.segmentation.value().to_string())
            .arg("--dpi")
            .arg(self.params.source_dpi.to_string())
            .arg("-c")
            .arg("page_separator=");
        for (key, value) in &self.params.options {
            cmd.arg("-c").arg(format!("{key}={value}"));
        }
        cmd
    }
}

impl OcrSession for TesseractSession {
    fn configure(&mut self, params: &RecognizeParams) -> Result<(), OcrError> {
        if let Some((key, _)) = params
            .options
            .iter()
            .find(|(key, _)| key.is_empty() || key.contains('='))
        {
            return Err(OcrError::Configure(format!("bad option name '{key}'")));
        }
        if params.source_dpi == 0 {
            return Err(OcrError::Configure("source dpi must be positive".into()));
        }
        self.params = params.clone();
        debug!(psm = params.segmentation.value(), dpi = params.source_dpi, "tesseract_configured");
        Ok(())
    }

    fn recognize(&mut self, bitmap: &GrayImage) -> Option<String> {
        let input = self.page_path();
        if let Err(e) = bitmap.save(&input) {
            warn!(error = %e, "tesseract_input_write_failed");
            return None;
        }

        let output = match self.build_command(&input).output() {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "tesseract_spawn_failed");
                return None;
            }
        };
        if !output.status.success() {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "tesseract_recognize_failed"
            );
            return None;
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Some(text.trim_end_matches(['\n', '\r', '\x0c']).to_string())
    }
}
