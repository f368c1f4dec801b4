//! Sequential vs pooled comparison over the same file list.
//!
//! Both passes open their sessions through the same `EngineSettings`, so the
//! engine and recognize parameters match. Each pass has its own named
//! normalization profile, and both names go into the report.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::imaging::NormalizationProfile;
use crate::metrics::MetricsRegistry;
use crate::ocr::{EngineSettings, OcrEngine, OcrError};
use crate::pool::{PoolRun, WorkerPool};
use crate::queue::WorkItem;
use crate::worker::{process_image, ResultSink};

/// Totals of one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunTotals {
    pub profile: String,
    pub workers: usize,
    /// Files that produced a row.
    pub files: usize,
    /// Sum of per-file processing time.
    pub cumulative_ms: u64,
    pub wall_ms: u64,
}

impl RunTotals {
    pub fn from_pool(run: &PoolRun, profile: &NormalizationProfile) -> Self {
        Self {
            profile: profile.name.clone(),
            workers: run.workers,
            files: run.results.len(),
            cumulative_ms: run.results.cumulative_ms(),
            wall_ms: run.wall.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    /// `None` when the sequential session could not be opened.
    pub sequential: Option<RunTotals>,
    pub pooled: RunTotals,
}

impl BenchmarkSummary {
    /// `(sequential_total / pooled_total) * 100` over cumulative times.
    pub fn speedup_pct(&self) -> Option<f64> {
        let sequential = self.sequential.as_ref()?;
        if self.pooled.cumulative_ms == 0 {
            return None;
        }
        Some(sequential.cumulative_ms as f64 / self.pooled.cumulative_ms as f64 * 100.0)
    }

    /// Same ratio over wall-clock time.
    pub fn wall_speedup_pct(&self) -> Option<f64> {
        let sequential = self.sequential.as_ref()?;
        if self.pooled.wall_ms == 0 {
            return None;
        }
        Some(sequential.wall_ms as f64 / self.pooled.wall_ms as f64 * 100.0)
    }
}

/// One session, one thread, files in list order.
pub struct SequentialRunner<'a> {
    engine: &'a dyn OcrEngine,
    settings: &'a EngineSettings,
    profile: &'a NormalizationProfile,
    metrics: &'a Arc<MetricsRegistry>,
}

impl<'a> SequentialRunner<'a> {
    pub fn new(
        engine: &'a dyn OcrEngine,
        settings: &'a EngineSettings,
        profile: &'a NormalizationProfile,
        metrics: &'a Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            engine,
            settings,
            profile,
            metrics,
        }
    }

    /// Run every item; decode failures are skipped, recognition failures
    /// still count toward the total.
    pub fn run(&self, items: &[WorkItem]) -> Result<RunTotals, OcrError> {
        let started = Instant::now();
        let mut session = self.settings.open_session(self.engine)?;
        info!(items = items.len(), profile = %self.profile.name, "sequential_started");

        let mut files = 0;
        let mut cumulative_ms = 0;
        for path in items {
            match process_image(session.as_mut(), path, self.profile, None, self.metrics) {
                Ok(processed) => {
                    files += 1;
                    cumulative_ms += processed.elapsed_ms;
                    info!(
                        file = %processed.filename,
                        elapsed_ms = processed.elapsed_ms,
                        "sequential_item_done"
                    );
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "decode_failed");
                }
            }
        }

        let totals = RunTotals {
            profile: self.profile.name.clone(),
            workers: 1,
            files,
            cumulative_ms,
            wall_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            files,
            cumulative_ms,
            wall_ms = totals.wall_ms,
            "sequential_finished"
        );
        Ok(totals)
    }
}

/// Result of a full comparison.
pub struct Comparison {
    pub summary: BenchmarkSummary,
    pub pooled: PoolRun,
}

/// Runs the sequential pass, then the pooled pass.
pub struct Comparator<'a> {
    pool: &'a WorkerPool,
    engine: &'a dyn OcrEngine,
    sequential_profile: &'a NormalizationProfile,
    metrics: &'a Arc<MetricsRegistry>,
}

impl<'a> Comparator<'a> {
    pub fn new(
        pool: &'a WorkerPool,
        engine: &'a dyn OcrEngine,
        sequential_profile: &'a NormalizationProfile,
        metrics: &'a Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            pool,
            engine,
            sequential_profile,
            metrics,
        }
    }

    pub fn run(&self, items: &[WorkItem], sink: ResultSink) -> Comparison {
        let settings = &self.pool.config().engine;
        let runner = SequentialRunner::new(self.engine, settings, self.sequential_profile, self.metrics);
        let sequential = match runner.run(items) {
            Ok(totals) => Some(totals),
            Err(e) => {
                warn!(error = %e, "sequential_init_failed");
                None
            }
        };

        let pooled = self.pool.run(items, sink);
        let summary = BenchmarkSummary {
            sequential,
            pooled: RunTotals::from_pool(&pooled, &self.pool.config().profile),
        };

        match summary.speedup_pct() {
            Some(pct) => info!(
                speedup_pct = pct,
                wall_speedup_pct = summary.wall_speedup_pct().unwrap_or(0.0),
                "benchmark_complete"
            ),
            None => info!("benchmark_complete_without_ratio"),
        }

        Comparison { summary, pooled }
    }
}
