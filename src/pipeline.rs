//! One configurable pipeline for both entry modes.
//!
//! Order of a run: validate → scan → create artifact dir → create report →
//! passes → rows and summary → flush → optional JSON summary. Every step up
//! to and including report creation is fatal and happens before any worker
//! starts.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::benchmark::{BenchmarkSummary, Comparator, RunTotals};
use crate::config::{Mode, PipelineConfig, ReportMode};
use crate::error::PipelineError;
use crate::metrics::{MetricSummary, MetricsRegistry};
use crate::ocr::OcrEngine;
use crate::pool::WorkerPool;
use crate::report::ReportWriter;
use crate::scanner;
use crate::worker::ResultSink;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub run_id: String,
    pub mode: Mode,
    pub report_mode: ReportMode,
    pub workers: usize,
    pub files_found: usize,
    pub rows_written: usize,
    pub decode_failures: usize,
    pub recognize_failures: usize,
    pub withdrawn_workers: usize,
    pub lost_workers: usize,
    pub unprocessed: Vec<PathBuf>,
    pub pooled: RunTotals,
    pub benchmark: Option<BenchmarkSummary>,
    pub report_path: PathBuf,
    pub metrics: HashMap<String, MetricSummary>,
}

pub struct Pipeline {
    config: PipelineConfig,
    engine: Arc<dyn OcrEngine>,
    metrics: Arc<MetricsRegistry>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            config,
            engine,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn run(&self) -> Result<PipelineSummary, PipelineError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("pipeline", run_id = %run_id);
        let _enter = span.enter();
        let config = &self.config;

        config.validate()?;
        let items = scanner::scan(&config.source_dir)?;

        if let Some(dir) = &config.artifact_dir {
            std::fs::create_dir_all(dir).map_err(|source| PipelineError::OutputDir {
                path: dir.clone(),
                source,
            })?;
            info!(dir = %dir.display(), "artifact_dir_ready");
        }

        let report = ReportWriter::create(&config.report_path)?.into_shared();
        info!(
            mode = ?config.mode,
            report_mode = ?config.report_mode,
            workers = config.workers,
            files = items.len(),
            report = %config.report_path.display(),
            "pipeline_started"
        );

        let sink = match config.report_mode {
            ReportMode::Batch => ResultSink::Buffered,
            ReportMode::Streaming => ResultSink::Streaming(Arc::clone(&report)),
        };
        let pool = WorkerPool::new(
            config.pool_config(),
            Arc::clone(&self.engine),
            Arc::clone(&self.metrics),
        );

        let (pooled, benchmark) = match config.mode {
            Mode::Benchmark => {
                let comparison = Comparator::new(
                    &pool,
                    self.engine.as_ref(),
                    &config.sequential_profile,
                    &self.metrics,
                )
                .run(&items, sink);
                (comparison.pooled, Some(comparison.summary))
            }
            Mode::RunOnce => (pool.run(&items, sink), None),
        };

        let rows_written = {
            let mut report = report.lock();
            if config.report_mode == ReportMode::Batch {
                report.write_records(&pooled.results)?;
            }
            if let Some(summary) = &benchmark {
                report.write_summary(summary)?;
            }
            report.flush()?;
            report.rows()
        };

        if !pooled.unprocessed.is_empty() {
            warn!(count = pooled.unprocessed.len(), "run_left_items_unprocessed");
        }
        self.metrics.log_summary();

        let summary = PipelineSummary {
            run_id,
            mode: config.mode,
            report_mode: config.report_mode,
            workers: pooled.workers,
            files_found: items.len(),
            rows_written,
            decode_failures: pooled.decode_failures,
            recognize_failures: pooled.recognize_failures,
            withdrawn_workers: pooled.withdrawn,
            lost_workers: pooled.lost,
            unprocessed: pooled.unprocessed.clone(),
            pooled: RunTotals::from_pool(&pooled, &config.pooled_profile),
            benchmark,
            report_path: config.report_path.clone(),
            metrics: self.metrics.summary(),
        };

        if let Some(path) = &config.summary_path {
            write_summary_json(path, &summary)?;
        }

        info!(
            rows = summary.rows_written,
            decode_failures = summary.decode_failures,
            "pipeline_complete"
        );
        Ok(summary)
    }
}

fn write_summary_json(path: &Path, summary: &PipelineSummary) -> Result<(), PipelineError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    info!(path = %path.display(), "summary_written");
    Ok(())
}
