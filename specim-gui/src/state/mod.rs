//! Application state modules.

mod processing;
mod ui;

pub use processing::ProcessingState;
pub use ui::{RangeSlider, RoiDrag, SpanDrag, UiState};
