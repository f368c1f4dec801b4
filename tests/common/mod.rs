//! Shared fixtures for the end-to-end tests: an in-process engine and
//! helpers for building image directories and reading reports back.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use batch_ocr::ocr::{EngineMode, OcrEngine, OcrError, OcrSession, RecognizeParams};
use batch_ocr::report::UTF8_BOM;
use image::{GrayImage, Luma};

type Script = dyn Fn(&GrayImage) -> Option<String> + Send + Sync;

/// Engine that answers from a closure. Languages other than the ones it
/// was built with fail `init`.
pub struct FakeEngine {
    script: Arc<Script>,
    languages: Vec<String>,
    pub inits: AtomicUsize,
}

impl FakeEngine {
    pub fn new(script: impl Fn(&GrayImage) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            languages: vec!["eng".to_string()],
            inits: AtomicUsize::new(0),
        }
    }

    /// Bright first pixel reads as `text`; dark yields nothing.
    pub fn bright_reads(text: &'static str) -> Self {
        Self::new(move |img| (img.get_pixel(0, 0)[0] > 128).then(|| text.to_string()))
    }

    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }
}

impl OcrEngine for FakeEngine {
    fn init(&self, language: &str, _mode: EngineMode) -> Result<Box<dyn OcrSession>, OcrError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if !self.languages.iter().any(|l| l == language) {
            return Err(OcrError::LanguageMissing(language.to_string()));
        }
        Ok(Box::new(FakeSession {
            script: Arc::clone(&self.script),
        }))
    }
}

struct FakeSession {
    script: Arc<Script>,
}

impl OcrSession for FakeSession {
    fn configure(&mut self, _params: &RecognizeParams) -> Result<(), OcrError> {
        Ok(())
    }

    fn recognize(&mut self, bitmap: &GrayImage) -> Option<String> {
        (self.script)(bitmap)
    }
}

pub fn write_png(dir: &Path, name: &str, level: u8) -> PathBuf {
    let path = dir.join(name);
    GrayImage::from_pixel(8, 8, Luma([level])).save(&path).unwrap();
    path
}

/// Black `a.png`, white `b.png`, undecodable `c.png`.
pub fn abc_fixture(dir: &Path) {
    write_png(dir, "a.png", 0);
    write_png(dir, "b.png", 255);
    std::fs::write(dir.join("c.png"), b"definitely not a png").unwrap();
}

/// All rows after the header, BOM stripped. Data rows have four fields,
/// summary rows two.
pub fn read_report(path: &Path) -> Vec<Vec<String>> {
    let content = std::fs::read(path).unwrap();
    assert!(content.starts_with(UTF8_BOM), "report must start with a BOM");
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(&content[UTF8_BOM.len()..]);
    let header = reader.headers().unwrap().clone();
    assert_eq!(
        header.iter().collect::<Vec<_>>(),
        vec!["ID", "Filename", "ExtractedText", "ProcessingTime(ms)"]
    );
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

pub fn data_rows(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    rows.iter().filter(|r| r.len() == 4).cloned().collect()
}

pub fn summary_rows(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    rows.iter().filter(|r| r.len() == 2).cloned().collect()
}
