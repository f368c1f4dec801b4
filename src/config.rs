//! Run configuration. Built from the command line; there is no config file.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::PipelineError;
use crate::imaging::NormalizationProfile;
use crate::ocr::EngineSettings;
use crate::pool::PoolConfig;

/// Default pool never goes below this many workers.
pub const MIN_DEFAULT_WORKERS: usize = 2;

/// Default report location, relative to the working directory.
pub const DEFAULT_REPORT: &str = "output.csv";

/// Name of the artifact directory created inside the source directory.
pub const ARTIFACT_DIR_NAME: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Sequential pass, pooled pass, comparison rows in the report.
    Benchmark,
    /// Pooled pass only.
    RunOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportMode {
    /// Rows written after the pool joined.
    Batch,
    /// Rows written by workers as items complete.
    Streaming,
}

/// `max(2, available hardware threads)`.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_DEFAULT_WORKERS)
        .max(MIN_DEFAULT_WORKERS)
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_dir: PathBuf,
    pub mode: Mode,
    pub report_mode: ReportMode,
    pub workers: usize,
    pub report_path: PathBuf,
    /// Where normalized bitmaps go; `None` disables writing them.
    pub artifact_dir: Option<PathBuf>,
    pub sequential_profile: NormalizationProfile,
    pub pooled_profile: NormalizationProfile,
    pub engine: EngineSettings,
    pub summary_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Defaults: benchmark mode, batch report, default pool size.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            mode: Mode::Benchmark,
            report_mode: ReportMode::Batch,
            workers: default_workers(),
            report_path: PathBuf::from(DEFAULT_REPORT),
            artifact_dir: None,
            sequential_profile: NormalizationProfile::scaled_gray(),
            pooled_profile: NormalizationProfile::gamma_gray(),
            engine: EngineSettings::default(),
            summary_path: None,
        }
    }

    /// `<source>/output`, the default artifact location.
    pub fn default_artifact_dir(source_dir: &Path) -> PathBuf {
        source_dir.join(ARTIFACT_DIR_NAME)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.workers == 0 {
            return Err(PipelineError::InvalidConfig(
                "worker count must be at least 1".into(),
            ));
        }
        if self.engine.language.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("language must not be empty".into()));
        }
        if self.source_dir.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig("source directory is empty".into()));
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            engine: self.engine.clone(),
            profile: self.pooled_profile.clone(),
            artifact_dir: self.artifact_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_workers_at_least_two() {
        assert!(default_workers() >= MIN_DEFAULT_WORKERS);
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = PipelineConfig::new("/tmp/images");
        config.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn pool_config_carries_pooled_profile() {
        let mut config = PipelineConfig::new("/tmp/images");
        config.workers = 3;
        config.artifact_dir = Some(PipelineConfig::default_artifact_dir(&config.source_dir));
        let pool = config.pool_config();
        assert_eq!(pool.workers, 3);
        assert_eq!(pool.profile.name, "gamma-gray");
        assert_eq!(pool.artifact_dir, Some(PathBuf::from("/tmp/images/output")));
    }
}
