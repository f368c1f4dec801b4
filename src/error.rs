//! Pipeline error taxonomy.
//! Everything here is fatal for a run and surfaces before any worker starts,
//! except report writes, which can also fail after the pool joined.
//! Per-worker engine faults live in `ocr::OcrError` and are never escalated.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source directory {path} is not accessible: {source}")]
    SourceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open report file {path}: {source}")]
    ReportOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report write failed: {0}")]
    ReportWrite(#[from] csv::Error),

    #[error("cannot write summary: {0}")]
    Summary(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// True for errors raised before any OCR work was attempted.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            PipelineError::SourceDir { .. }
                | PipelineError::NotADirectory(_)
                | PipelineError::OutputDir { .. }
                | PipelineError::ReportOpen { .. }
                | PipelineError::InvalidConfig(_)
        )
    }
}
