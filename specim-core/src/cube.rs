//! Spectrum-image cube indexed by `(row, column, channel)`.

use std::ops::Range;

use ndarray::{s, Array1, Array2, Array3, ArrayView1, Axis};

use crate::axis::EnergyAxis;
use crate::edge::EnergyWindow;
use crate::error::{Error, Result};

/// A 3D intensity cube with its energy-loss axis.
///
/// Data is stored as `data[[row, col, channel]]`. Rows and columns are
/// spatial pixels for an EELS spectrum image, or `(1, incident energy)`
/// for a RIXS map.
#[derive(Debug, Clone)]
pub struct SpectrumImage {
    data: Array3<f64>,
    energy: EnergyAxis,
    adf: Option<Array2<f64>>,
    pixel_scale: Option<f64>,
}

impl SpectrumImage {
    /// Create a spectrum image.
    ///
    /// # Errors
    /// Returns an error if the channel count differs from the axis length.
    pub fn new(data: Array3<f64>, energy: EnergyAxis) -> Result<Self> {
        let (rows, cols, channels) = data.dim();
        if channels != energy.len() {
            return Err(Error::ShapeMismatch {
                what: "spectrum image channels",
                expected: vec![rows, cols, energy.len()],
                found: vec![rows, cols, channels],
            });
        }
        if rows == 0 || cols == 0 {
            return Err(Error::EmptySelection("spectrum image has no pixels".into()));
        }
        Ok(Self {
            data,
            energy,
            adf: None,
            pixel_scale: None,
        })
    }

    /// Attach a dark-field image acquired with the cube.
    ///
    /// # Errors
    /// Returns an error if the image shape differs from the spatial shape.
    pub fn with_adf(mut self, adf: Array2<f64>) -> Result<Self> {
        let (rows, cols, _) = self.data.dim();
        if adf.dim() != (rows, cols) {
            return Err(Error::ShapeMismatch {
                what: "ADF image",
                expected: vec![rows, cols],
                found: adf.shape().to_vec(),
            });
        }
        self.adf = Some(adf);
        Ok(self)
    }

    /// Set the spatial calibration (length units per pixel).
    #[must_use]
    pub fn with_pixel_scale(mut self, scale: f64) -> Self {
        self.pixel_scale = Some(scale);
        self
    }

    /// Replace NaN intensities by zero.
    pub fn replace_nan(&mut self) {
        self.data.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });
    }

    /// Intensity cube.
    #[must_use]
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Mutable intensity cube.
    pub fn data_mut(&mut self) -> &mut Array3<f64> {
        &mut self.data
    }

    /// Energy-loss axis.
    #[must_use]
    pub fn energy(&self) -> &EnergyAxis {
        &self.energy
    }

    /// Dark-field image, if any.
    #[must_use]
    pub fn adf(&self) -> Option<&Array2<f64>> {
        self.adf.as_ref()
    }

    /// Spatial calibration, if known.
    #[must_use]
    pub fn pixel_scale(&self) -> Option<f64> {
        self.pixel_scale
    }

    /// `(rows, cols, channels)`.
    #[must_use]
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.dim().0
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.data.dim().1
    }

    /// Number of energy channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// Split into cube, axis and dark-field image.
    #[must_use]
    pub fn into_parts(self) -> (Array3<f64>, EnergyAxis, Option<Array2<f64>>) {
        (self.data, self.energy, self.adf)
    }

    /// Spectrum at a single pixel.
    #[must_use]
    pub fn spectrum(&self, row: usize, col: usize) -> Option<ArrayView1<'_, f64>> {
        let (rows, cols, _) = self.data.dim();
        if row < rows && col < cols {
            Some(self.data.slice(s![row, col, ..]))
        } else {
            None
        }
    }

    /// Mean spectrum over a rectangular pixel selection.
    ///
    /// Ranges are clamped to the cube extent.
    ///
    /// # Errors
    /// Returns an error if the clamped selection is empty.
    pub fn mean_spectrum(&self, rows: Range<usize>, cols: Range<usize>) -> Result<Array1<f64>> {
        let (n_rows, n_cols, _) = self.data.dim();
        let r0 = rows.start.min(n_rows);
        let r1 = rows.end.min(n_rows);
        let c0 = cols.start.min(n_cols);
        let c1 = cols.end.min(n_cols);
        if r0 >= r1 || c0 >= c1 {
            return Err(Error::EmptySelection(format!(
                "rows {r0}..{r1}, cols {c0}..{c1}"
            )));
        }
        let block = self.data.slice(s![r0..r1, c0..c1, ..]);
        let flat = block
            .to_shape(((r1 - r0) * (c1 - c0), self.channels()))
            .map_err(|e| Error::InvalidParameter(e.to_string()))?;
        flat.mean_axis(Axis(0))
            .ok_or_else(|| Error::EmptySelection("mean spectrum".into()))
    }

    /// Mean spectrum over every pixel.
    #[must_use]
    pub fn total_spectrum(&self) -> Array1<f64> {
        // Cube is never empty, so the selection is valid.
        self.mean_spectrum(0..self.rows(), 0..self.cols())
            .unwrap_or_else(|_| Array1::zeros(self.channels()))
    }

    /// Image of the mean intensity over a channel range.
    #[must_use]
    pub fn integrate_channels(&self, channels: Range<usize>) -> Array2<f64> {
        integrate_cube(&self.data, channels)
    }

    /// Image of the mean intensity inside an energy window.
    #[must_use]
    pub fn integrate(&self, window: EnergyWindow) -> Array2<f64> {
        self.integrate_channels(self.energy.index_range(window))
    }

    /// Replace the cube and axis, keeping the dark-field image.
    ///
    /// # Errors
    /// Returns an error if the new cube does not match the axis or the
    /// spatial shape changed.
    pub fn with_data(&self, data: Array3<f64>, energy: EnergyAxis) -> Result<Self> {
        let mut next = Self::new(data, energy)?;
        next.pixel_scale = self.pixel_scale;
        if let Some(adf) = &self.adf {
            next = next.with_adf(adf.clone())?;
        }
        Ok(next)
    }
}

/// Mean over a channel range of any `(rows, cols, channels)` cube.
///
/// The range is clamped to the channel count; an empty range after
/// clamping is widened by one channel.
#[must_use]
pub fn integrate_cube(data: &Array3<f64>, channels: Range<usize>) -> Array2<f64> {
    let (rows, cols, n) = data.dim();
    if n == 0 {
        return Array2::zeros((rows, cols));
    }
    let start = channels.start.min(n - 1);
    let end = channels.end.clamp(start + 1, n);
    data.slice(s![.., .., start..end])
        .mean_axis(Axis(2))
        .unwrap_or_else(|| Array2::zeros((rows, cols)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube() -> SpectrumImage {
        let data = Array3::from_shape_fn((2, 3, 4), |(r, c, e)| (r * 100 + c * 10 + e) as f64);
        let axis = EnergyAxis::new(vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        SpectrumImage::new(data, axis).unwrap()
    }

    #[test]
    fn test_shape_validation() {
        let data = Array3::<f64>::zeros((2, 2, 3));
        let axis = EnergyAxis::new(vec![0.0, 1.0]).unwrap();
        assert!(SpectrumImage::new(data, axis).is_err());
    }

    #[test]
    fn test_adf_shape_validation() {
        let si = cube();
        assert!(si.clone().with_adf(Array2::zeros((2, 3))).is_ok());
        assert!(si.with_adf(Array2::zeros((3, 2))).is_err());
    }

    #[test]
    fn test_mean_spectrum() {
        let si = cube();
        let spec = si.mean_spectrum(0..2, 1..2).unwrap();
        // mean of rows 0 and 1 at column 1: (10 + 110) / 2 = 60 at channel 0
        assert_relative_eq!(spec[0], 60.0);
        assert_relative_eq!(spec[3], 63.0);
        assert!(si.mean_spectrum(5..6, 0..1).is_err());
    }

    #[test]
    fn test_integrate_window() {
        let si = cube();
        let img = si.integrate(EnergyWindow::new(1.0, 3.0));
        assert_eq!(img.dim(), (2, 3));
        // channels 1 and 2 at pixel (0, 0): (1 + 2) / 2
        assert_relative_eq!(img[[0, 0]], 1.5);
    }

    #[test]
    fn test_integrate_widens_empty_range() {
        let si = cube();
        let img = si.integrate_channels(2..2);
        assert_relative_eq!(img[[1, 2]], 122.0);
    }

    #[test]
    fn test_replace_nan() {
        let mut si = cube();
        si.data_mut()[[0, 0, 0]] = f64::NAN;
        si.replace_nan();
        assert_relative_eq!(si.data()[[0, 0, 0]], 0.0);
    }
}
