//! Error types for specim-core.

use thiserror::Error;

/// Result type alias for specim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for spectrum-image operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Array shapes do not agree.
    #[error("shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Energy axis is empty.
    #[error("energy axis is empty")]
    EmptyAxis,

    /// Energy axis holds a non-finite value.
    #[error("energy axis contains a non-finite value at index {0}")]
    NonFiniteAxis(usize),

    /// Energy window has no overlap with the data.
    #[error("invalid energy window: [{start}, {end}]")]
    InvalidWindow { start: f64, end: f64 },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Selection contains no pixels or channels.
    #[error("empty selection: {0}")]
    EmptySelection(String),

    /// Least-squares fit could not be performed.
    #[error("fit failed: {0}")]
    FitFailed(String),
}
