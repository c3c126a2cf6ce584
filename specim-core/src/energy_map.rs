//! RIXS energy maps: intensity over incident energy and energy loss.

use ndarray::{Array1, Array2, Array3, Axis};

use crate::axis::EnergyAxis;
use crate::cube::SpectrumImage;
use crate::error::{Error, Result};
use crate::roi::Roi;

/// Intensity as a function of incident energy and energy loss.
///
/// Internally the map is a one-row spectrum image whose columns are the
/// incident energies, so every cube operation applies unchanged.
#[derive(Debug, Clone)]
pub struct EnergyMap {
    cube: SpectrumImage,
    incident: EnergyAxis,
}

impl EnergyMap {
    /// Build a map from a `(incident, loss)` intensity array.
    ///
    /// NaN intensities are replaced by zero.
    ///
    /// # Errors
    /// Returns an error if the array shape does not match the two axes or
    /// the optional ADF image is not `(1, incident)` or `(incident,)`-sized.
    pub fn new(
        lp: Array2<f64>,
        loss: EnergyAxis,
        incident: EnergyAxis,
        adf: Option<Array2<f64>>,
    ) -> Result<Self> {
        let (n_inc, n_loss) = lp.dim();
        if n_inc != incident.len() || n_loss != loss.len() {
            return Err(Error::ShapeMismatch {
                what: "energy map",
                expected: vec![incident.len(), loss.len()],
                found: vec![n_inc, n_loss],
            });
        }
        let data = lp
            .into_shape_with_order((1, n_inc, n_loss))
            .map_err(|e| Error::InvalidParameter(e.to_string()))?;
        let mut cube = SpectrumImage::new(data, loss)?;
        cube.replace_nan();
        if let Some(adf) = adf {
            let adf = if adf.dim() == (n_inc, 1) {
                adf.reversed_axes()
            } else {
                adf
            };
            cube = cube.with_adf(adf)?;
        }
        Ok(Self { cube, incident })
    }

    /// Rebuild a map from a processed cube with the same incident axis.
    ///
    /// # Errors
    /// Returns an error if the cube is not a single row of `incident`
    /// spectra.
    pub fn from_cube(cube: SpectrumImage, incident: EnergyAxis) -> Result<Self> {
        let (rows, cols, channels) = cube.dim();
        if rows != 1 || cols != incident.len() {
            return Err(Error::ShapeMismatch {
                what: "energy map cube",
                expected: vec![1, incident.len(), channels],
                found: vec![rows, cols, channels],
            });
        }
        Ok(Self { cube, incident })
    }

    /// The map as a `(1, incident, loss)` spectrum image.
    #[must_use]
    pub fn cube(&self) -> &SpectrumImage {
        &self.cube
    }

    /// Consume the map, returning its cube.
    #[must_use]
    pub fn into_cube(self) -> SpectrumImage {
        self.cube
    }

    /// Energy-loss axis.
    #[must_use]
    pub fn loss(&self) -> &EnergyAxis {
        self.cube.energy()
    }

    /// Incident-energy axis.
    #[must_use]
    pub fn incident(&self) -> &EnergyAxis {
        &self.incident
    }

    /// Intensity as `(incident, loss)`.
    #[must_use]
    pub fn intensity(&self) -> Array2<f64> {
        self.cube.data().index_axis(Axis(0), 0).to_owned()
    }

    /// Inelastic image `(loss, incident)` for display.
    #[must_use]
    pub fn inelastic_image(&self) -> Array2<f64> {
        self.intensity().reversed_axes()
    }

    /// Mean spectrum over the whole map.
    #[must_use]
    pub fn mean_spectrum(&self) -> Array1<f64> {
        self.cube.total_spectrum()
    }

    /// Mean loss spectrum over the incident energies covered by `roi.x`.
    ///
    /// # Errors
    /// Returns an error if the selection is empty.
    pub fn roi_spectrum(&self, roi: &Roi) -> Result<Array1<f64>> {
        let cols = roi.x_range(&self.incident);
        self.cube.mean_spectrum(0..1, cols)
    }

    /// Replace the intensity with an already-shaped `(1, incident, loss)` cube.
    ///
    /// # Errors
    /// Returns an error if the shape changed along the incident axis.
    pub fn with_data(&self, data: Array3<f64>, loss: EnergyAxis) -> Result<Self> {
        Self::from_cube(self.cube.with_data(data, loss)?, self.incident.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn map() -> EnergyMap {
        let lp = Array2::from_shape_fn((3, 4), |(i, e)| (i * 10 + e) as f64);
        EnergyMap::new(
            lp,
            EnergyAxis::new(vec![-1.0, 0.0, 1.0, 2.0]).unwrap(),
            EnergyAxis::new(vec![530.0, 531.0, 532.0]).unwrap(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_shape_checked() {
        let lp = Array2::<f64>::zeros((4, 3));
        let result = EnergyMap::new(
            lp,
            EnergyAxis::new(vec![0.0, 1.0, 2.0, 3.0]).unwrap(),
            EnergyAxis::new(vec![0.0, 1.0, 2.0]).unwrap(),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_nan_replaced() {
        let mut lp = Array2::<f64>::ones((2, 2));
        lp[[1, 0]] = f64::NAN;
        let m = EnergyMap::new(
            lp,
            EnergyAxis::new(vec![0.0, 1.0]).unwrap(),
            EnergyAxis::new(vec![0.0, 1.0]).unwrap(),
            None,
        )
        .unwrap();
        assert_relative_eq!(m.intensity()[[1, 0]], 0.0);
    }

    #[test]
    fn test_inelastic_image_is_transposed() {
        let m = map();
        let img = m.inelastic_image();
        assert_eq!(img.dim(), (4, 3));
        assert_relative_eq!(img[[3, 2]], 23.0);
        assert_eq!(m.cube().dim(), (1, 3, 4));
    }

    #[test]
    fn test_roi_spectrum_over_incident_range() {
        let m = map();
        let spec = m.roi_spectrum(&Roi::new(530.5, 532.5, -1.0, 2.0)).unwrap();
        // incident indices 1..3 -> mean of rows 1 and 2
        assert_relative_eq!(spec[0], 15.0);
        let single = m.roi_spectrum(&Roi::new(531.0, 531.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(single[2], 12.0);
    }
}
