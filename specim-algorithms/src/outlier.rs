//! Spike removal for spectrum images.
//!
//! Cosmic rays and hot pixels show up as isolated channels far above the
//! rest of the spectrum. A spectrum is only examined when its standard
//! deviation exceeds its median; spikes are then replaced by the median.

use ndarray::{Array3, ArrayViewMut1, Axis};
use rayon::prelude::*;
use specim_core::stats::{median, std};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outlier removal settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutlierConfig {
    /// Channels above `median + threshold_multiplier * std` are spikes.
    pub threshold_multiplier: f64,
    /// Also replace the two channels adjacent to each spike.
    pub remove_neighbors: bool,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            threshold_multiplier: 5.0,
            remove_neighbors: true,
        }
    }
}

impl OutlierConfig {
    /// Set the threshold multiplier.
    #[must_use]
    pub fn with_threshold(mut self, threshold_multiplier: f64) -> Self {
        self.threshold_multiplier = threshold_multiplier;
        self
    }

    /// Toggle neighbour replacement.
    #[must_use]
    pub fn with_neighbors(mut self, remove_neighbors: bool) -> Self {
        self.remove_neighbors = remove_neighbors;
        self
    }
}

/// Summary of a cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutlierReport {
    /// Spectra in which at least one channel was replaced.
    pub spectra_cleaned: usize,
    /// Channels replaced in total.
    pub channels_replaced: usize,
}

impl std::ops::Add for OutlierReport {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            spectra_cleaned: self.spectra_cleaned + rhs.spectra_cleaned,
            channels_replaced: self.channels_replaced + rhs.channels_replaced,
        }
    }
}

/// Clean one spectrum in place, returning the number of replaced channels.
pub fn clean_spectrum(spectrum: &mut ArrayViewMut1<'_, f64>, config: &OutlierConfig) -> usize {
    let values = spectrum.to_vec();
    let med = median(&values);
    let sd = std(&values);
    if sd <= med {
        return 0;
    }
    let threshold = med + config.threshold_multiplier * sd;
    let n = values.len();
    let mut replace = vec![false; n];
    for (i, &v) in values.iter().enumerate() {
        if v > threshold {
            replace[i] = true;
            if config.remove_neighbors {
                if i > 0 {
                    replace[i - 1] = true;
                }
                if i + 1 < n {
                    replace[i + 1] = true;
                }
            }
        }
    }
    let mut count = 0;
    for (value, hit) in spectrum.iter_mut().zip(&replace) {
        if *hit {
            *value = med;
            count += 1;
        }
    }
    count
}

/// Remove spikes from every spectrum of a `(rows, cols, channels)` cube.
#[must_use]
pub fn remove_outliers(cube: &Array3<f64>, config: &OutlierConfig) -> (Array3<f64>, OutlierReport) {
    let mut cleaned = cube.clone();
    let report = cleaned
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .map(|(r, mut row)| {
            let mut report = OutlierReport::default();
            for (c, mut spectrum) in row.outer_iter_mut().enumerate() {
                let replaced = clean_spectrum(&mut spectrum, config);
                if replaced > 0 {
                    log::debug!("pixel ({r}, {c}): replaced {replaced} channels");
                    report.spectra_cleaned += 1;
                    report.channels_replaced += replaced;
                }
            }
            report
        })
        .reduce(OutlierReport::default, |a, b| a + b);
    log::info!(
        "outlier removal: {} spectra cleaned, {} channels replaced",
        report.spectra_cleaned,
        report.channels_replaced
    );
    (cleaned, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    #[test]
    fn test_spike_replaced_with_neighbours() {
        let mut spec = Array1::from_elem(50, 1.0);
        spec[20] = 1000.0;
        let replaced = clean_spectrum(&mut spec.view_mut(), &OutlierConfig::default());
        assert_eq!(replaced, 3);
        assert_relative_eq!(spec[19], 1.0);
        assert_relative_eq!(spec[20], 1.0);
        assert_relative_eq!(spec[21], 1.0);
    }

    #[test]
    fn test_spike_at_first_channel_is_clamped() {
        let mut spec = Array1::from_elem(50, 1.0);
        spec[0] = 1000.0;
        spec[1] = 2.0;
        spec[2] = 3.0;
        let replaced = clean_spectrum(&mut spec.view_mut(), &OutlierConfig::default());
        assert_eq!(replaced, 2);
        assert_relative_eq!(spec[0], 1.0);
        assert_relative_eq!(spec[1], 1.0);
        assert_relative_eq!(spec[2], 3.0);
    }

    #[test]
    fn test_spike_at_end_is_clamped() {
        let mut spec = Array1::from_elem(50, 1.0);
        spec[49] = 1000.0;
        spec[48] = 2.0;
        spec[47] = 3.0;
        let replaced = clean_spectrum(&mut spec.view_mut(), &OutlierConfig::default());
        assert_eq!(replaced, 2);
        assert_relative_eq!(spec[49], 1.0);
        assert_relative_eq!(spec[48], 1.0);
        assert_relative_eq!(spec[47], 3.0);
    }

    #[test]
    fn test_edge_spikes_in_cube() {
        let mut cube = Array3::from_elem((1, 2, 40), 1.0);
        cube[[0, 0, 0]] = 800.0;
        cube[[0, 1, 39]] = 800.0;
        let (clean, report) = remove_outliers(&cube, &OutlierConfig::default());
        assert_eq!(report.spectra_cleaned, 2);
        assert_eq!(report.channels_replaced, 4);
        assert_relative_eq!(clean[[0, 0, 0]], 1.0);
        assert_relative_eq!(clean[[0, 1, 39]], 1.0);
    }

    #[test]
    fn test_untouched_when_std_below_median() {
        // Bright spectrum with a modest bump: std stays below the median.
        let mut spec = Array1::from_elem(50, 100.0);
        spec[10] = 150.0;
        let before = spec.clone();
        assert_eq!(clean_spectrum(&mut spec.view_mut(), &OutlierConfig::default()), 0);
        assert_eq!(spec, before);
    }

    #[test]
    fn test_cube_report() {
        let mut cube = Array3::from_elem((2, 2, 30), 1.0);
        cube[[1, 0, 5]] = 500.0;
        let (clean, report) = remove_outliers(&cube, &OutlierConfig::default().with_neighbors(false));
        assert_eq!(report.spectra_cleaned, 1);
        assert_eq!(report.channels_replaced, 1);
        assert_relative_eq!(clean[[1, 0, 5]], 1.0);
    }
}
