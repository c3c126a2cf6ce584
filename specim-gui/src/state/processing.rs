//! Processing state for background operations.

/// Tracks the state of background loading and the last status message.
pub struct ProcessingState {
    /// Whether a file is currently being loaded.
    pub is_loading: bool,
    /// Progress value from 0.0 to 1.0.
    pub progress: f32,
    /// User-facing status message.
    pub status_text: String,
    /// Whether the status message reports an error.
    pub is_error: bool,
}

impl ProcessingState {
    /// Show an informational message.
    pub fn info(&mut self, text: impl Into<String>) {
        self.status_text = text.into();
        self.is_error = false;
    }

    /// Show an error message.
    pub fn error(&mut self, text: impl Into<String>) {
        self.status_text = text.into();
        self.is_error = true;
    }
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            is_loading: false,
            progress: 0.0,
            status_text: "Ready".to_string(),
            is_error: false,
        }
    }
}
