//! Application message types for async communication.
//!
//! Messages are sent from background worker threads to the main UI thread
//! via channels to report progress, completion, and errors.

use std::time::Duration;

use crate::session::Dataset;

/// Messages sent from background workers to the UI thread.
pub enum AppMessage {
    /// File loading progress update.
    LoadProgress(f32, String),

    /// File loading completed successfully.
    ///
    /// Contains the loaded dataset and the time taken to load it.
    LoadComplete(Box<Dataset>, Duration),

    /// File loading failed.
    LoadError(String),
}
