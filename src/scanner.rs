//! Scanner: enumerates eligible image files and feeds them to the work queue.
//! Enumeration happens once per run so the sequential and pooled passes of a
//! benchmark see the same file set; `feed` replays that list into the queue.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::queue::{WorkItem, WorkQueue};

/// Extensions accepted by the scanner, lowercase.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Case-insensitive extension check.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// List eligible regular files in `dir`, in filesystem enumeration order.
/// Not recursive. A missing or unreadable directory is a startup error.
pub fn scan(dir: &Path) -> Result<Vec<WorkItem>, PipelineError> {
    let metadata = std::fs::metadata(dir).map_err(|source| PipelineError::SourceDir {
        path: dir.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(PipelineError::NotADirectory(dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(dir).map_err(|source| PipelineError::SourceDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "directory_entry_unreadable");
                continue;
            }
        };
        let path = entry.path();
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file || !is_image_file(&path) {
            debug!(path = %path.display(), "scan_skip");
            continue;
        }
        items.push(path);
    }

    info!(dir = %dir.display(), files = items.len(), "scan_complete");
    Ok(items)
}

/// Producer side: push every item (one wake token each), then close the
/// queue with one extra token per worker. Runs even when `items` is empty.
pub fn feed(items: Vec<WorkItem>, queue: &WorkQueue, workers: usize) {
    let count = items.len();
    for item in items {
        debug!(path = %item.display(), "enqueued");
        queue.push(item);
    }
    queue.close(workers);
    info!(items = count, workers, "producer_done");
}

/// File name component used in reports and artifact paths.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
