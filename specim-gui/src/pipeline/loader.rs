//! File loading worker.
//!
//! Reads a spectrum image in a background thread and reports progress and
//! the result over the application channel.

use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::Instant;

use specim_io::{FileKind, RawOptions};

use crate::message::AppMessage;
use crate::session::Dataset;

/// Main entry point for file loading in a background thread.
///
/// Raw files need `raw` for their shape and calibration.
pub fn load_file_worker(path: &Path, tx: &Sender<AppMessage>, raw: Option<RawOptions>) {
    let start = Instant::now();
    let kind = FileKind::from_path(path);
    let _ = tx.send(AppMessage::LoadProgress(
        0.1,
        format!("Reading {kind:?} file..."),
    ));

    let image = match specim_io::load(path, raw.as_ref()) {
        Ok(image) => image,
        Err(e) => {
            log::error!("failed to load {}: {e}", path.display());
            let _ = tx.send(AppMessage::LoadError(e.to_string()));
            return;
        }
    };

    let (rows, cols, channels) = image.dim();
    let _ = tx.send(AppMessage::LoadProgress(
        0.9,
        format!("Loaded {rows}x{cols}x{channels} cube"),
    ));

    let _ = tx.send(AppMessage::LoadComplete(
        Box::new(Dataset::from(image)),
        start.elapsed(),
    ));
}
