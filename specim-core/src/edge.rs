//! Edge records: a label with background and integration windows.

use crate::axis::EnergyAxis;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An ordered energy interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnergyWindow {
    /// Lower bound in energy units.
    pub start: f64,
    /// Upper bound in energy units.
    pub end: f64,
}

impl EnergyWindow {
    /// Create a window; the bounds are reordered if needed.
    #[must_use]
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Width of the window.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `value` lies inside the window.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.start && value <= self.end
    }

    /// Clamp the window to the extent of an axis.
    #[must_use]
    pub fn clamp_to(&self, axis: &EnergyAxis) -> Self {
        let lo = axis.min();
        let hi = axis.max();
        Self::new(self.start.clamp(lo, hi), self.end.clamp(lo, hi))
    }
}

impl From<(f64, f64)> for EnergyWindow {
    fn from((a, b): (f64, f64)) -> Self {
        Self::new(a, b)
    }
}

impl std::fmt::Display for EnergyWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.2}, {:.2}]", self.start, self.end)
    }
}

/// A core-loss edge: where to fit the background and where to integrate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Edge {
    /// Display label, e.g. "Ti L2,3".
    pub label: String,
    /// Pre-edge window used to fit the background.
    pub background: Option<EnergyWindow>,
    /// Window over which the subtracted signal is integrated.
    pub integration: Option<EnergyWindow>,
}

impl Edge {
    /// Create an edge with no windows set.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            background: None,
            integration: None,
        }
    }

    /// Edge whose windows span the whole axis.
    #[must_use]
    pub fn full_range(axis: &EnergyAxis) -> Self {
        Self::new(" ")
            .with_background(axis.full_window())
            .with_integration(axis.full_window())
    }

    /// Set the background window.
    #[must_use]
    pub fn with_background(mut self, window: impl Into<EnergyWindow>) -> Self {
        self.background = Some(window.into());
        self
    }

    /// Set the integration window.
    #[must_use]
    pub fn with_integration(mut self, window: impl Into<EnergyWindow>) -> Self {
        self.integration = Some(window.into());
        self
    }

    /// Background window, or the full axis when unset.
    #[must_use]
    pub fn background_or_full(&self, axis: &EnergyAxis) -> EnergyWindow {
        self.background.unwrap_or_else(|| axis.full_window())
    }

    /// Integration window, or the full axis when unset.
    #[must_use]
    pub fn integration_or_full(&self, axis: &EnergyAxis) -> EnergyWindow {
        self.integration.unwrap_or_else(|| axis.full_window())
    }
}
