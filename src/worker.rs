//! Worker unit: owns one OCR session, drains the shared queue, and produces
//! records into a private buffer (or straight into a shared streaming report).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::ImageError;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::imaging::{self, NormalizationProfile};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::ocr::{EngineSettings, OcrEngine, OcrSession, SENTINEL_TEXT};
use crate::queue::WorkQueue;
use crate::report::SharedReport;
use crate::scanner::display_name;

/// One report row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcrRecord {
    pub id: u64,
    pub filename: String,
    pub text: String,
    pub elapsed_ms: u64,
}

/// A finished item that has not been given an id yet.
#[derive(Debug, Clone)]
pub struct Processed {
    pub filename: String,
    pub text: String,
    pub elapsed_ms: u64,
    /// False when the sentinel text stands in for the engine output.
    pub recognized: bool,
}

impl Processed {
    pub fn into_record(self, id: u64) -> OcrRecord {
        OcrRecord {
            id,
            filename: self.filename,
            text: self.text,
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// Decode, normalize, optionally save the normalized bitmap, recognize.
/// The elapsed time covers decode through recognition. A decode failure is
/// returned to the caller; a recognition failure yields the sentinel text.
pub fn process_image(
    session: &mut dyn OcrSession,
    path: &Path,
    profile: &NormalizationProfile,
    artifact_dir: Option<&Path>,
    metrics: &Arc<MetricsRegistry>,
) -> Result<Processed, ImageError> {
    let start = Instant::now();
    let filename = display_name(path);

    let span = metrics.span(metric_names::DECODE);
    let decoded = imaging::decode(path)?;
    span.finish();

    let span = metrics.span(metric_names::NORMALIZE);
    let bitmap = profile.apply(&decoded);
    span.finish();

    if let Some(dir) = artifact_dir {
        if let Err(e) = imaging::write_artifact(&bitmap, dir, &filename) {
            warn!(file = %filename, dir = %dir.display(), error = %e, "artifact_write_failed");
        }
    }

    let span = metrics.span(metric_names::RECOGNIZE);
    let output = session.recognize(&bitmap);
    span.finish();

    let elapsed = start.elapsed();
    metrics.record(metric_names::ITEM, elapsed.as_micros() as f64);

    let recognized = output.is_some();
    if !recognized {
        warn!(file = %filename, "recognize_failed");
    }
    Ok(Processed {
        filename,
        text: output.unwrap_or_else(|| SENTINEL_TEXT.to_string()),
        elapsed_ms: elapsed.as_millis() as u64,
        recognized,
    })
}

/// Where a worker puts finished records.
#[derive(Clone)]
pub enum ResultSink {
    /// Keep records in the worker's private buffer until the pool joins.
    Buffered,
    /// Also write each row immediately; the id is taken under the report lock
    /// so the file stays in id order.
    Streaming(SharedReport),
}

/// Read-only settings shared by every worker of a pool.
pub struct WorkerSettings {
    pub engine: EngineSettings,
    pub profile: NormalizationProfile,
    pub artifact_dir: Option<PathBuf>,
    pub sink: ResultSink,
}

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Saw the closed, empty queue.
    Drained,
    /// Could not open an engine session; took no items.
    InitFailed(String),
}

#[derive(Debug)]
pub struct WorkerOutcome {
    pub index: usize,
    pub exit: WorkerExit,
    pub records: Vec<OcrRecord>,
    pub decode_failures: usize,
    pub recognize_failures: usize,
}

pub struct WorkerUnit {
    index: usize,
    queue: Arc<WorkQueue>,
    engine: Arc<dyn OcrEngine>,
    settings: Arc<WorkerSettings>,
    metrics: Arc<MetricsRegistry>,
}

impl WorkerUnit {
    pub fn new(
        index: usize,
        queue: Arc<WorkQueue>,
        engine: Arc<dyn OcrEngine>,
        settings: Arc<WorkerSettings>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            index,
            queue,
            engine,
            settings,
            metrics,
        }
    }

    /// Worker body. The session is opened before the first dequeue, so a
    /// worker that fails to start never holds an item.
    pub fn run(self) -> WorkerOutcome {
        let index = self.index;
        let mut outcome = WorkerOutcome {
            index,
            exit: WorkerExit::Drained,
            records: Vec::new(),
            decode_failures: 0,
            recognize_failures: 0,
        };

        let mut session = match self.settings.engine.open_session(self.engine.as_ref()) {
            Ok(session) => session,
            Err(e) => {
                error!(worker = index, error = %e, "worker_init_failed");
                outcome.exit = WorkerExit::InitFailed(e.to_string());
                return outcome;
            }
        };
        info!(worker = index, "worker_started");

        loop {
            let wait = self.metrics.span(metric_names::QUEUE_WAIT);
            let next = self.queue.next();
            wait.finish();

            let Some(path) = next else {
                break;
            };
            self.handle(session.as_mut(), &path, &mut outcome);
        }

        info!(
            worker = index,
            records = outcome.records.len(),
            decode_failures = outcome.decode_failures,
            "worker_exiting"
        );
        // Session released here, on its own thread.
        drop(session);
        outcome
    }

    fn handle(&self, session: &mut dyn OcrSession, path: &Path, outcome: &mut WorkerOutcome) {
        let settings = &self.settings;
        let processed = match process_image(
            session,
            path,
            &settings.profile,
            settings.artifact_dir.as_deref(),
            &self.metrics,
        ) {
            Ok(processed) => processed,
            Err(e) => {
                warn!(worker = self.index, file = %path.display(), error = %e, "decode_failed");
                outcome.decode_failures += 1;
                return;
            }
        };
        if !processed.recognized {
            outcome.recognize_failures += 1;
        }

        let record = match &settings.sink {
            ResultSink::Buffered => processed.into_record(self.queue.next_id()),
            ResultSink::Streaming(report) => {
                let mut report = report.lock();
                let record = processed.into_record(self.queue.next_id());
                if let Err(e) = report.write_record(&record) {
                    error!(worker = self.index, id = record.id, error = %e, "report_row_failed");
                }
                record
            }
        };

        info!(
            worker = self.index,
            id = record.id,
            file = %record.filename,
            elapsed_ms = record.elapsed_ms,
            "item_done"
        );
        debug!(worker = self.index, chars = record.text.len(), "item_text");
        outcome.records.push(record);
    }
}
