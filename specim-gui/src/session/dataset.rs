//! Datasets the browser can show.

use ndarray::{Array1, Array2, Array3};
use specim_core::{EnergyAxis, EnergyMap, Result, Roi, SpectrumImage};

/// A RIXS energy map or an EELS spectrum image.
#[derive(Debug, Clone)]
pub enum Dataset {
    /// Intensity over incident energy and energy loss.
    EnergyMap(EnergyMap),
    /// Spatial spectrum image.
    SpectrumImage(SpectrumImage),
}

impl From<EnergyMap> for Dataset {
    fn from(map: EnergyMap) -> Self {
        Self::EnergyMap(map)
    }
}

impl From<SpectrumImage> for Dataset {
    fn from(image: SpectrumImage) -> Self {
        Self::SpectrumImage(image)
    }
}

impl Dataset {
    /// Underlying `(rows, cols, channels)` cube.
    #[must_use]
    pub fn cube(&self) -> &SpectrumImage {
        match self {
            Self::EnergyMap(map) => map.cube(),
            Self::SpectrumImage(image) => image,
        }
    }

    /// Energy-loss axis.
    #[must_use]
    pub fn loss(&self) -> &EnergyAxis {
        self.cube().energy()
    }

    /// Whether this is an energy map.
    #[must_use]
    pub fn is_energy_map(&self) -> bool {
        matches!(self, Self::EnergyMap(_))
    }

    /// Image shown in the selection panel, rows bottom to top.
    ///
    /// Energy maps show the inelastic image `(loss, incident)`; spectrum
    /// images show their ADF image, or the mean over all channels.
    #[must_use]
    pub fn display_image(&self) -> Array2<f64> {
        match self {
            Self::EnergyMap(map) => map.inelastic_image(),
            Self::SpectrumImage(image) => image
                .adf()
                .cloned()
                .unwrap_or_else(|| image.integrate_channels(0..image.channels())),
        }
    }

    /// Data extent of the display image as `[x0, x1, y0, y1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn image_extent(&self) -> [f64; 4] {
        match self {
            Self::EnergyMap(map) => [
                map.incident().first(),
                map.incident().last(),
                map.loss().first(),
                map.loss().last(),
            ],
            Self::SpectrumImage(image) => [0.0, image.cols() as f64, 0.0, image.rows() as f64],
        }
    }

    /// Axis labels of the display image.
    #[must_use]
    pub fn image_labels(&self) -> (&'static str, &'static str) {
        match self {
            Self::EnergyMap(_) => ("Incident energy (eV)", "Energy loss (eV)"),
            Self::SpectrumImage(_) => ("x (px)", "y (px)"),
        }
    }

    /// Mean spectrum over the whole dataset.
    #[must_use]
    pub fn mean_spectrum(&self) -> Array1<f64> {
        self.cube().total_spectrum()
    }

    /// Mean spectrum inside a rectangle drawn on the display image.
    ///
    /// # Errors
    /// Returns an error if the rectangle selects nothing.
    pub fn roi_spectrum(&self, roi: &Roi) -> Result<Array1<f64>> {
        match self {
            Self::EnergyMap(map) => map.roi_spectrum(roi),
            Self::SpectrumImage(image) => {
                let (rows, cols) = roi.pixel_ranges(image.rows(), image.cols());
                image.mean_spectrum(rows, cols)
            }
        }
    }

    /// Energy-loss window a rectangle spans, if the image has an energy axis.
    #[must_use]
    pub fn roi_loss_window(&self, roi: &Roi) -> Option<(f64, f64)> {
        match self {
            Self::EnergyMap(_) => Some((roi.y0, roi.y1)),
            Self::SpectrumImage(_) => None,
        }
    }

    /// Same dataset with a new cube, dark-field image and loss axis.
    ///
    /// # Errors
    /// Returns an error if the new cube no longer fits the dataset shape.
    pub fn with_cube(
        &self,
        data: Array3<f64>,
        adf: Option<Array2<f64>>,
        loss: EnergyAxis,
    ) -> Result<Self> {
        let current = self.cube();
        let mut image = SpectrumImage::new(data, loss)?;
        if let Some(scale) = current.pixel_scale() {
            image = image.with_pixel_scale(scale);
        }
        if let Some(adf) = adf {
            image = image.with_adf(adf)?;
        }
        Ok(match self {
            Self::EnergyMap(map) => {
                Self::EnergyMap(EnergyMap::from_cube(image, map.incident().clone())?)
            }
            Self::SpectrumImage(_) => Self::SpectrumImage(image),
        })
    }
}
