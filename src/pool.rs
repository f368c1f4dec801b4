//! Worker pool: a fixed set of worker threads against one shared queue.
//!
//! A run creates fresh shared state, starts the workers, starts the producer
//! on its own thread, joins everything and merges the per-worker buffers.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::aggregate::ResultSet;
use crate::metrics::MetricsRegistry;
use crate::imaging::NormalizationProfile;
use crate::ocr::{EngineSettings, OcrEngine};
use crate::queue::{WorkItem, WorkQueue};
use crate::scanner;
use crate::worker::{ResultSink, WorkerExit, WorkerSettings, WorkerUnit};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub engine: EngineSettings,
    pub profile: NormalizationProfile,
    pub artifact_dir: Option<PathBuf>,
}

/// Everything a pooled run produced.
#[derive(Debug)]
pub struct PoolRun {
    pub results: ResultSet,
    pub wall: Duration,
    pub workers: usize,
    /// Workers that never opened a session.
    pub withdrawn: usize,
    /// Workers whose thread panicked or could not be spawned.
    pub lost: usize,
    pub decode_failures: usize,
    pub recognize_failures: usize,
    /// Items still queued after the join, because no worker was left to take them.
    pub unprocessed: Vec<WorkItem>,
}

pub struct WorkerPool {
    config: PoolConfig,
    engine: Arc<dyn OcrEngine>,
    metrics: Arc<MetricsRegistry>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, engine: Arc<dyn OcrEngine>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            config,
            engine,
            metrics,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Process `items` once through the pool and wait for every worker.
    pub fn run(&self, items: &[WorkItem], sink: ResultSink) -> PoolRun {
        let started = Instant::now();
        let workers = self.config.workers.max(1);
        let queue = Arc::new(WorkQueue::new());
        let settings = Arc::new(WorkerSettings {
            engine: self.config.engine.clone(),
            profile: self.config.profile.clone(),
            artifact_dir: self.config.artifact_dir.clone(),
            sink,
        });

        info!(
            workers,
            items = items.len(),
            profile = %self.config.profile.name,
            "pool_starting"
        );

        let mut handles: Vec<(usize, JoinHandle<_>)> = Vec::with_capacity(workers);
        let mut lost = 0;
        for index in 1..=workers {
            let unit = WorkerUnit::new(
                index,
                Arc::clone(&queue),
                Arc::clone(&self.engine),
                Arc::clone(&settings),
                Arc::clone(&self.metrics),
            );
            match std::thread::Builder::new()
                .name(format!("ocr-worker-{index}"))
                .spawn(move || unit.run())
            {
                Ok(handle) => handles.push((index, handle)),
                Err(e) => {
                    error!(worker = index, error = %e, "worker_spawn_failed");
                    lost += 1;
                }
            }
        }
        drop(settings);

        let producer = {
            let queue = Arc::clone(&queue);
            let items = items.to_vec();
            std::thread::Builder::new()
                .name("scanner".into())
                .spawn(move || scanner::feed(items, &queue, workers))
        };
        match producer {
            Ok(handle) => {
                if handle.join().is_err() {
                    error!("producer_panicked");
                    queue.close(workers);
                }
            }
            Err(e) => {
                // Feed inline rather than strand the workers.
                warn!(error = %e, "producer_spawn_failed");
                scanner::feed(items.to_vec(), &queue, workers);
            }
        }

        let mut buffers = Vec::with_capacity(handles.len());
        let mut withdrawn = 0;
        let mut decode_failures = 0;
        let mut recognize_failures = 0;
        for (index, handle) in handles {
            match handle.join() {
                Ok(outcome) => {
                    if let WorkerExit::InitFailed(reason) = &outcome.exit {
                        warn!(worker = index, reason = %reason, "worker_withdrew");
                        withdrawn += 1;
                    }
                    decode_failures += outcome.decode_failures;
                    recognize_failures += outcome.recognize_failures;
                    buffers.push(outcome.records);
                }
                Err(_) => {
                    error!(worker = index, "worker_panicked");
                    lost += 1;
                }
            }
        }

        let unprocessed = queue.drain();
        if !unprocessed.is_empty() {
            error!(
                count = unprocessed.len(),
                "items_unprocessed_no_live_workers"
            );
        }

        let results = ResultSet::merge(buffers);
        let wall = started.elapsed();
        info!(
            records = results.len(),
            withdrawn,
            lost,
            decode_failures,
            wall_ms = wall.as_millis() as u64,
            "pool_joined"
        );

        PoolRun {
            results,
            wall,
            workers,
            withdrawn,
            lost,
            decode_failures,
            recognize_failures,
            unprocessed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::testing::ScriptedEngine;
    use crate::ocr::SENTINEL_TEXT;
    use crate::report::ReportWriter;
    use image::{GrayImage, Luma};
    use std::collections::HashSet;
    use std::path::Path;
    use tempfile::tempdir;

    fn pool(workers: usize, engine: ScriptedEngine) -> WorkerPool {
        WorkerPool::new(
            PoolConfig {
                workers,
                engine: EngineSettings::default(),
                profile: NormalizationProfile::gamma_gray(),
                artifact_dir: None,
            },
            Arc::new(engine),
            Arc::new(MetricsRegistry::new()),
        )
    }

    fn images(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("img{i:03}.png"));
                GrayImage::from_pixel(4 + i as u32, 4, Luma([255]))
                    .save(&path)
                    .unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn every_item_processed_once_with_contiguous_ids() {
        let dir = tempdir().unwrap();
        let items = images(dir.path(), 40);
        let run = pool(4, ScriptedEngine::by_size()).run(&items, ResultSink::Buffered);

        assert_eq!(run.results.len(), 40);
        assert!(run.results.is_contiguous());
        let names: HashSet<_> = run.results.iter().map(|r| r.filename.clone()).collect();
        assert_eq!(names.len(), 40);
        assert!(run.unprocessed.is_empty());
        assert_eq!(run.withdrawn, 0);
    }

    #[test]
    fn empty_input_terminates() {
        let run = pool(3, ScriptedEngine::by_size()).run(&[], ResultSink::Buffered);
        assert!(run.results.is_empty());
        assert_eq!(run.workers, 3);
    }

    #[test]
    fn fewer_items_than_workers_terminates() {
        let dir = tempdir().unwrap();
        let items = images(dir.path(), 2);
        let run = pool(8, ScriptedEngine::by_size()).run(&items, ResultSink::Buffered);
        assert_eq!(run.results.len(), 2);
    }

    #[test]
    fn withdrawn_workers_leave_work_to_the_rest() {
        let dir = tempdir().unwrap();
        let items = images(dir.path(), 12);
        let engine = ScriptedEngine::by_size().failing_first(2);
        let run = pool(3, engine).run(&items, ResultSink::Buffered);

        assert_eq!(run.withdrawn, 2);
        assert_eq!(run.results.len(), 12);
        assert!(run.results.is_contiguous());
        assert!(run.unprocessed.is_empty());
    }

    #[test]
    fn all_workers_withdrawn_reports_unprocessed() {
        let dir = tempdir().unwrap();
        let items = images(dir.path(), 5);
        let engine = ScriptedEngine::by_size().failing_first(2);
        let run = pool(2, engine).run(&items, ResultSink::Buffered);

        assert_eq!(run.withdrawn, 2);
        assert!(run.results.is_empty());
        assert_eq!(run.unprocessed.len(), 5);
    }

    #[test]
    fn decode_and_recognize_failures_are_counted() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        GrayImage::from_pixel(6, 6, Luma([0])).save(&a).unwrap();
        let b = dir.path().join("b.png");
        GrayImage::from_pixel(6, 6, Luma([255])).save(&b).unwrap();
        let c = dir.path().join("c.png");
        std::fs::write(&c, b"not an image").unwrap();

        let engine = ScriptedEngine::new(|img| {
            (img.get_pixel(0, 0)[0] > 128).then(|| "HELLO".to_string())
        });
        let run = pool(2, engine).run(&[a, b, c], ResultSink::Buffered);

        assert_eq!(run.results.len(), 2);
        assert_eq!(run.decode_failures, 1);
        assert_eq!(run.recognize_failures, 1);
        let mut rows: Vec<(String, String)> = run
            .results
            .iter()
            .map(|r| (r.filename.clone(), r.text.clone()))
            .collect();
        rows.sort();
        assert_eq!(
            rows,
            vec![
                ("a.png".to_string(), SENTINEL_TEXT.to_string()),
                ("b.png".to_string(), "HELLO".to_string()),
            ]
        );
    }

    #[test]
    fn streaming_sink_writes_rows_in_id_order() {
        let dir = tempdir().unwrap();
        let items = images(dir.path(), 20);
        let report_path = dir.path().join("stream.csv");
        let shared = ReportWriter::create(&report_path).unwrap().into_shared();

        let run = pool(4, ScriptedEngine::by_size())
            .run(&items, ResultSink::Streaming(Arc::clone(&shared)));
        shared.lock().flush().unwrap();
        assert_eq!(shared.lock().rows(), 20);

        let content = std::fs::read(&report_path).unwrap();
        let mut reader = csv::Reader::from_reader(&content[3..]);
        let ids: Vec<u64> = reader
            .records()
            .map(|r| r.unwrap()[0].parse().unwrap())
            .collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
        assert_eq!(run.results.len(), 20);
    }
}
