//! Rectangular regions of interest and their index mapping.

use std::ops::Range;

use crate::axis::EnergyAxis;
use crate::edge::EnergyWindow;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rectangle in data coordinates.
///
/// `x` runs along image columns and `y` along image rows. Corners may be
/// given in any order.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Roi {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

impl Roi {
    /// Create a rectangle from its extents, ordering each pair.
    #[must_use]
    pub fn new(x0: f64, x1: f64, y0: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            x1: x0.max(x1),
            y0: y0.min(y1),
            y1: y0.max(y1),
        }
    }

    /// Rectangle from two opposite corners.
    #[must_use]
    pub fn from_corners(a: [f64; 2], b: [f64; 2]) -> Self {
        Self::new(a[0], b[0], a[1], b[1])
    }

    /// Horizontal extent as a window.
    #[must_use]
    pub fn x_window(&self) -> EnergyWindow {
        EnergyWindow::new(self.x0, self.x1)
    }

    /// Vertical extent as a window.
    #[must_use]
    pub fn y_window(&self) -> EnergyWindow {
        EnergyWindow::new(self.y0, self.y1)
    }

    /// Index range of the horizontal extent on a calibrated axis.
    ///
    /// A rectangle narrower than one sample still selects one index.
    #[must_use]
    pub fn x_range(&self, axis: &EnergyAxis) -> Range<usize> {
        axis.index_range(self.x_window())
    }

    /// Index range of the vertical extent on a calibrated axis.
    #[must_use]
    pub fn y_range(&self, axis: &EnergyAxis) -> Range<usize> {
        axis.index_range(self.y_window())
    }

    /// Row and column ranges when coordinates are pixel positions.
    ///
    /// Pixel `i` covers `[i, i + 1)`; any pixel the rectangle touches is
    /// included, and at least one pixel is always selected.
    #[must_use]
    pub fn pixel_ranges(&self, rows: usize, cols: usize) -> (Range<usize>, Range<usize>) {
        (
            pixel_range(self.y0, self.y1, rows),
            pixel_range(self.x0, self.x1, cols),
        )
    }

    /// Whether a data-space point lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixel_range(lo: f64, hi: f64, n: usize) -> Range<usize> {
    if n == 0 {
        return 0..0;
    }
    let start = (lo.floor().max(0.0) as usize).min(n - 1);
    let end = (hi.ceil().max(0.0) as usize).clamp(start + 1, n);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_corners() {
        let roi = Roi::from_corners([5.0, 1.0], [2.0, 4.0]);
        assert_eq!(roi, Roi::new(2.0, 5.0, 1.0, 4.0));
        assert!(roi.contains(3.0, 2.0));
    }

    #[test]
    fn test_axis_range_widens() {
        let einc = EnergyAxis::new(vec![530.0, 531.0, 532.0, 533.0]).unwrap();
        let roi = Roi::new(531.0, 531.0, 0.0, 1.0);
        assert_eq!(roi.x_range(&einc), 1..2);
        let roi = Roi::new(530.5, 532.5, 0.0, 1.0);
        assert_eq!(roi.x_range(&einc), 1..3);
    }

    #[test]
    fn test_pixel_ranges() {
        let roi = Roi::new(0.4, 2.2, 1.0, 1.0);
        let (rows, cols) = roi.pixel_ranges(4, 3);
        assert_eq!(cols, 0..3);
        assert_eq!(rows, 1..2);

        let outside = Roi::new(10.0, 12.0, -3.0, -1.0);
        let (rows, cols) = outside.pixel_ranges(4, 3);
        assert_eq!(cols, 2..3);
        assert_eq!(rows, 0..1);
    }
}
