//! OCR engine interface.
//!
//! An `OcrEngine` is shared by every worker and only hands out sessions.
//! A session is created on the worker thread that uses it and never leaves
//! that thread, so `OcrSession` carries no `Send` bound.

pub mod tesseract;

use image::GrayImage;
use serde::Serialize;
use thiserror::Error;

pub use tesseract::TesseractCli;

/// Text written in place of a recognition result when the engine yields none.
pub const SENTINEL_TEXT: &str = "OCR Failure";

/// Recognition backend selection passed to `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EngineMode {
    Legacy,
    LstmOnly,
    Combined,
    Default,
}

impl EngineMode {
    /// Numeric engine mode understood by tesseract (`--oem`).
    pub fn oem(self) -> u8 {
        match self {
            EngineMode::Legacy => 0,
            EngineMode::LstmOnly => 1,
            EngineMode::Combined => 2,
            EngineMode::Default => 3,
        }
    }
}

/// Page segmentation mode (`--psm`), 0..=13. Auto (3) by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSegMode(u8);

impl PageSegMode {
    pub const AUTO: PageSegMode = PageSegMode(3);

    pub fn new(value: u8) -> Option<Self> {
        (value <= 13).then_some(PageSegMode(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for PageSegMode {
    fn default() -> Self {
        Self::AUTO
    }
}

/// Parameters applied by `configure` and used by every recognize call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizeParams {
    pub segmentation: PageSegMode,
    pub source_dpi: u32,
    pub options: Vec<(String, String)>,
}

impl Default for RecognizeParams {
    fn default() -> Self {
        Self {
            segmentation: PageSegMode::AUTO,
            source_dpi: 300,
            options: vec![("preserve_interword_spaces".into(), "1".into())],
        }
    }
}

/// Engine settings shared by the sequential and pooled passes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSettings {
    pub language: String,
    pub mode: EngineMode,
    pub params: RecognizeParams,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            language: "eng".into(),
            mode: EngineMode::LstmOnly,
            params: RecognizeParams::default(),
        }
    }
}

impl EngineSettings {
    /// `init` followed by `configure`; either failing means no session.
    pub fn open_session(&self, engine: &dyn OcrEngine) -> Result<Box<dyn OcrSession>, OcrError> {
        let mut session = engine.init(&self.language, self.mode)?;
        session.configure(&self.params)?;
        Ok(session)
    }
}

/// Session factory, shared across worker threads.
pub trait OcrEngine: Send + Sync {
    fn init(&self, language: &str, mode: EngineMode) -> Result<Box<dyn OcrSession>, OcrError>;
}

/// One initialized engine instance, owned by a single thread.
pub trait OcrSession {
    fn configure(&mut self, params: &RecognizeParams) -> Result<(), OcrError>;

    /// Recognized text, or `None` when the engine produced nothing usable.
    fn recognize(&mut self, bitmap: &GrayImage) -> Option<String>;
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),
    #[error("language '{0}' is not installed")]
    LanguageMissing(String),
    #[error("engine configuration rejected: {0}")]
    Configure(String),
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedEngine;
    use super::*;

    #[test]
    fn page_seg_mode_bounds() {
        assert_eq!(PageSegMode::new(13).map(PageSegMode::value), Some(13));
        assert!(PageSegMode::new(14).is_none());
        assert_eq!(PageSegMode::default(), PageSegMode::AUTO);
    }

    #[test]
    fn default_params_preserve_interword_spaces() {
        let params = RecognizeParams::default();
        assert_eq!(params.source_dpi, 300);
        assert!(params
            .options
            .iter()
            .any(|(k, v)| k == "preserve_interword_spaces" && v == "1"));
    }

    #[test]
    fn open_session_surfaces_init_failure() {
        let engine = ScriptedEngine::by_size().failing_first(1);
        let settings = EngineSettings::default();
        assert!(matches!(
            settings.open_session(&engine),
            Err(OcrError::LanguageMissing(_))
        ));
        assert!(settings.open_session(&engine).is_ok());
    }

    #[test]
    fn engine_mode_maps_to_oem() {
        assert_eq!(EngineMode::LstmOnly.oem(), 1);
        assert_eq!(EngineMode::Default.oem(), 3);
    }
}
