//! Energy axis with numpy-compatible index lookups.

use std::ops::Range;

use crate::edge::EnergyWindow;
use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A 1D calibrated energy axis (energy loss or incident energy).
///
/// Values are non-decreasing, which is how spectrometers and HyperSpy
/// calibrations lay them out and what the lookups rely on.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnergyAxis {
    values: Vec<f64>,
}

impl EnergyAxis {
    /// Create an axis from explicit values.
    ///
    /// # Errors
    /// Returns an error if the axis is empty, holds a non-finite value or
    /// decreases anywhere.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::EmptyAxis);
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::NonFiniteAxis(i));
        }
        let axis = Self { values };
        if !axis.is_ascending() {
            return Err(Error::InvalidParameter(format!(
                "energy axis must be ascending ({} .. {})",
                axis.first(),
                axis.last()
            )));
        }
        Ok(axis)
    }

    /// Build an axis from an `offset + i * scale` calibration.
    ///
    /// Values are rounded to 4 decimals, matching how calibrated axes are
    /// reported by acquisition software.
    ///
    /// # Errors
    /// Returns an error if `size` is zero, the calibration is not finite or
    /// the calibrated values decrease.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_calibration(offset: f64, scale: f64, size: usize) -> Result<Self> {
        if !offset.is_finite() || !scale.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "calibration offset={offset} scale={scale}"
            )));
        }
        let values = (0..size)
            .map(|i| round4(offset + i as f64 * scale))
            .collect();
        Self::new(values)
    }

    /// Axis values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a constructed axis.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First value.
    #[must_use]
    pub fn first(&self) -> f64 {
        self.values[0]
    }

    /// Last value.
    #[must_use]
    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Minimum value.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Maximum value.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Channel spacing taken from the first two values.
    #[must_use]
    pub fn dispersion(&self) -> f64 {
        if self.values.len() < 2 {
            1.0
        } else {
            self.values[1] - self.values[0]
        }
    }

    /// Whether the values are non-decreasing.
    #[must_use]
    pub fn is_ascending(&self) -> bool {
        self.values.windows(2).all(|w| w[0] <= w[1])
    }

    /// Full range of the axis as a window.
    #[must_use]
    pub fn full_window(&self) -> EnergyWindow {
        EnergyWindow::new(self.first(), self.last())
    }

    /// Left insertion index of `value` (numpy `searchsorted`, side="left").
    #[must_use]
    pub fn search_sorted(&self, value: f64) -> usize {
        self.values.partition_point(|&v| v < value)
    }

    /// Index of the value closest to `value`.
    #[must_use]
    pub fn nearest_index(&self, value: f64) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, &v) in self.values.iter().enumerate() {
            let dist = (v - value).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        best
    }

    /// Channel range covered by `window`.
    ///
    /// An empty range is widened by one channel so that a zero-width
    /// selection still picks the channel under the cursor.
    #[must_use]
    pub fn index_range(&self, window: EnergyWindow) -> Range<usize> {
        let n = self.values.len();
        let start = self.search_sorted(window.start).min(n);
        let mut end = self.search_sorted(window.end).min(n);
        if end <= start {
            end = (start + 1).min(n);
        }
        let start = start.min(end.saturating_sub(1));
        start..end
    }

    /// Sub-axis for a channel range.
    ///
    /// # Errors
    /// Returns an error if the range is empty or out of bounds.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start >= range.end || range.end > self.values.len() {
            return Err(Error::EmptySelection(format!(
                "axis slice {range:?} of {} channels",
                self.values.len()
            )));
        }
        Self::new(self.values[range].to_vec())
    }
}

fn round4(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn axis() -> EnergyAxis {
        EnergyAxis::new(vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_nan() {
        assert!(matches!(EnergyAxis::new(vec![]), Err(Error::EmptyAxis)));
        assert!(matches!(
            EnergyAxis::new(vec![0.0, f64::NAN]),
            Err(Error::NonFiniteAxis(1))
        ));
    }

    #[test]
    fn test_rejects_descending() {
        assert!(matches!(
            EnergyAxis::new(vec![0.0, 2.0, 1.0]),
            Err(Error::InvalidParameter(_))
        ));
        assert!(EnergyAxis::from_calibration(10.0, -0.5, 4).is_err());
        // Repeated values are still ordered.
        assert!(EnergyAxis::new(vec![1.0, 1.0, 2.0]).unwrap().is_ascending());
    }

    #[test]
    fn test_search_sorted_left() {
        let a = axis();
        assert_eq!(a.search_sorted(-1.0), 0);
        assert_eq!(a.search_sorted(2.0), 2);
        assert_eq!(a.search_sorted(2.5), 3);
        assert_eq!(a.search_sorted(10.0), 5);
    }

    #[test]
    fn test_nearest_index() {
        let a = axis();
        assert_eq!(a.nearest_index(2.4), 2);
        assert_eq!(a.nearest_index(2.6), 3);
        assert_eq!(a.nearest_index(-5.0), 0);
    }

    #[test]
    fn test_index_range_widens_empty() {
        let a = axis();
        assert_eq!(a.index_range(EnergyWindow::new(1.0, 3.0)), 1..3);
        assert_eq!(a.index_range(EnergyWindow::new(2.0, 2.0)), 2..3);
        assert_eq!(a.index_range(EnergyWindow::new(9.0, 10.0)), 4..5);
    }

    #[test]
    fn test_from_calibration_rounds() {
        let a = EnergyAxis::from_calibration(-10.0, 0.1, 4).unwrap();
        assert_eq!(a.len(), 4);
        assert_relative_eq!(a.values()[3], -9.7);
        assert_relative_eq!(a.dispersion(), 0.1, epsilon = 1e-9);
    }
}
