//! batch-ocr: extract text from a directory of images with a pool of OCR
//! workers, write a CSV report, and optionally compare against a
//! single-threaded pass.

pub mod aggregate;
pub mod benchmark;
pub mod cli;
pub mod config;
pub mod error;
pub mod imaging;
pub mod metrics;
pub mod ocr;
pub mod pipeline;
pub mod pool;
pub mod queue;
pub mod report;
pub mod scanner;
pub mod worker;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use ocr::{OcrEngine, TesseractCli};
use pipeline::Pipeline;

pub use error::PipelineError;
pub use pipeline::PipelineSummary;

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("batch_ocr=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true);
    // A subscriber may already be installed when embedded; keep it.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Binary entry point.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    info!(version = env!("CARGO_PKG_VERSION"), "batch_ocr_starting");

    let source_dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => {
            let stdin = std::io::stdin();
            match cli::prompt_directory(&mut stdin.lock(), &mut std::io::stdout()) {
                Ok(dir) => dir,
                Err(e) => {
                    error!(error = %e, "directory_prompt_failed");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    let config = cli.to_config(source_dir);
    let engine: Arc<dyn OcrEngine> = Arc::new(TesseractCli::new(cli.tesseract.clone(), cli.tessdata.clone()));

    match Pipeline::new(config, engine).run() {
        Ok(summary) => {
            if let Some(benchmark) = &summary.benchmark {
                match benchmark.speedup_pct() {
                    Some(pct) => println!("Pooled speedup: {pct:.2}%"),
                    None => println!("Pooled speedup: n/a"),
                }
            }
            if !summary.unprocessed.is_empty() {
                println!("{} file(s) were left unprocessed", summary.unprocessed.len());
            }
            println!(
                "All done! {} row(s) written to {}",
                summary.rows_written,
                summary.report_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, startup = e.is_startup(), "pipeline_failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
