//! Zero-loss peak fitting and sub-channel alignment.
//!
//! The zero-loss peak of every spectrum is fitted with a Gaussian or
//! Lorentzian inside a window around 0 eV. The fitted centres then drive an
//! FFT phase-ramp shift that moves every peak onto a common origin.

use std::sync::Arc;

use ndarray::{s, Array2, Array3, ArrayView1, Axis, Zip};
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};
use specim_core::stats::{argmax, argmin_abs_diff};
use specim_core::{EnergyAxis, Error, Result};

use crate::lsq::{levenberg_marquardt, LmConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Peak profile used for the zero-loss fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeakShape {
    /// Gaussian with FWHM-like width `gm`.
    #[default]
    Gaussian,
    /// Lorentzian with half width `gm`.
    Lorentzian,
}

impl PeakShape {
    /// Evaluate the profile with amplitude `a`, centre `e0` and width `gm`.
    #[must_use]
    pub fn evaluate(self, x: f64, a: f64, e0: f64, gm: f64) -> f64 {
        match self {
            Self::Gaussian => gaussian(x, a, e0, gm),
            Self::Lorentzian => lorentzian(x, a, e0, gm),
        }
    }
}

impl std::str::FromStr for PeakShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaussian" | "gauss" => Ok(Self::Gaussian),
            "lorentzian" | "lorentz" => Ok(Self::Lorentzian),
            other => Err(Error::InvalidParameter(format!("unknown peak shape '{other}'"))),
        }
    }
}

/// `a / (((x - e0) / gm)^2 + 1)`.
#[must_use]
pub fn lorentzian(x: f64, a: f64, e0: f64, gm: f64) -> f64 {
    let u = (x - e0) / gm;
    a / (u * u + 1.0)
}

/// `a * exp(-0.5 * ((x - e0) / sg)^2)` with `sg = gm / (2 ln 2)`.
#[must_use]
pub fn gaussian(x: f64, a: f64, e0: f64, gm: f64) -> f64 {
    let sg = gm / (2.0 * std::f64::consts::LN_2);
    let u = (x - e0) / sg;
    a * (-0.5 * u * u).exp()
}

/// Zero-loss fit settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZeroLossConfig {
    /// Peak profile.
    pub shape: PeakShape,
    /// Energy window `(lo, hi)` containing the peak.
    pub window: (f64, f64),
    /// Relative cost tolerance.
    pub ftol: f64,
    /// Iteration limit per spectrum.
    pub max_iterations: usize,
}

impl Default for ZeroLossConfig {
    fn default() -> Self {
        Self {
            shape: PeakShape::Gaussian,
            window: (-3.0, 3.0),
            ftol: 1e-5,
            max_iterations: 200,
        }
    }
}

impl ZeroLossConfig {
    /// Set the peak profile.
    #[must_use]
    pub fn with_shape(mut self, shape: PeakShape) -> Self {
        self.shape = shape;
        self
    }

    /// Set the tolerance.
    #[must_use]
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    /// Set the fit window in energy units.
    #[must_use]
    pub fn with_window(mut self, lo: f64, hi: f64) -> Self {
        self.window = (lo, hi);
        self
    }
}

/// Per-pixel fitted peak parameters.
#[derive(Debug, Clone)]
pub struct ZeroLossFit {
    /// Peak amplitude map.
    pub amplitude: Array2<f64>,
    /// Peak centre map, in energy units.
    pub centre: Array2<f64>,
    /// Peak width map.
    pub width: Array2<f64>,
}

/// Fit one spectrum restricted to the window energies.
fn fit_peak(
    energy: &[f64],
    spectrum: &[f64],
    dispersion: f64,
    config: &ZeroLossConfig,
) -> Result<(f64, f64, f64)> {
    if let Some(i) = spectrum.iter().position(|v| !v.is_finite()) {
        return Err(Error::FitFailed(format!(
            "non-finite sample at {} eV in the zero-loss window",
            energy[i]
        )));
    }
    let i_max = argmax(spectrum);
    let a0 = spectrum[i_max];
    let e0 = energy[i_max];
    let i_hm = argmin_abs_diff(spectrum, a0 / 2.0);
    let mut gm0 = (energy[i_max] - energy[i_hm]).abs();
    if gm0 == 0.0 {
        gm0 = dispersion.abs().max(f64::EPSILON);
    }

    let bounds = [
        ordered(a0 / 2.0, a0 * 2.0),
        (e0 - 2.0, e0 + 2.0),
        (gm0 / 2.0, gm0 * 2.0),
    ];
    let shape = config.shape;
    let lm = LmConfig::default()
        .with_ftol(config.ftol)
        .with_max_iterations(config.max_iterations);
    let result = levenberg_marquardt(
        |p| {
            energy
                .iter()
                .zip(spectrum)
                .map(|(&x, &y)| shape.evaluate(x, p[0], p[1], p[2]) - y)
                .collect()
        },
        &[a0, e0, gm0],
        &bounds,
        &lm,
    );
    Ok(match result {
        Ok(res) => (res.params[0], res.params[1], res.params[2]),
        Err(e) => {
            log::debug!("zero-loss fit fell back to initial guess: {e}");
            (a0, e0, gm0)
        }
    })
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Fit the zero-loss peak of every spectrum in a cube.
///
/// The window bounds map to their nearest channels; the fit uses the
/// half-open range between them.
///
/// # Errors
/// Returns an error if the cube and axis disagree, the window covers
/// fewer than three channels, or any spectrum holds a non-finite value
/// inside the window.
pub fn fit_zeroloss(
    cube: &Array3<f64>,
    axis: &EnergyAxis,
    config: &ZeroLossConfig,
) -> Result<ZeroLossFit> {
    let (rows, cols, channels) = cube.dim();
    if channels != axis.len() {
        return Err(Error::ShapeMismatch {
            what: "cube channels",
            expected: vec![rows, cols, axis.len()],
            found: vec![rows, cols, channels],
        });
    }
    let i0 = axis.nearest_index(config.window.0);
    let i1 = axis.nearest_index(config.window.1);
    if i1 < i0 + 3 {
        return Err(Error::InvalidWindow {
            start: config.window.0,
            end: config.window.1,
        });
    }
    let energy = &axis.values()[i0..i1];
    let dispersion = axis.dispersion();

    log::info!("fitting zero-loss peak over {} spectra", rows * cols);
    let params: Vec<(f64, f64, f64)> = (0..rows * cols)
        .into_par_iter()
        .map(|p| {
            let spec = cube.slice(s![p / cols, p % cols, i0..i1]).to_vec();
            fit_peak(energy, &spec, dispersion, config).map_err(|e| match e {
                Error::FitFailed(msg) => {
                    Error::FitFailed(format!("pixel ({}, {}): {msg}", p / cols, p % cols))
                }
                other => other,
            })
        })
        .collect::<Result<_>>()?;
    log::info!("zero-loss fit complete");

    let pick = |f: fn(&(f64, f64, f64)) -> f64| {
        Array2::from_shape_fn((rows, cols), |(r, c)| f(&params[r * cols + c]))
    };
    Ok(ZeroLossFit {
        amplitude: pick(|p| p.0),
        centre: pick(|p| p.1),
        width: pick(|p| p.2),
    })
}

/// Signed FFT frequency index for bin `k` of `n` (numpy `fftfreq * n`).
#[allow(clippy::cast_precision_loss)]
fn signed_frequency(k: usize, n: usize) -> f64 {
    if k <= (n - 1) / 2 {
        k as f64
    } else {
        k as f64 - n as f64
    }
}

/// Reusable forward/inverse plans for spectra of one length.
pub struct SpectrumShifter {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    len: usize,
}

impl SpectrumShifter {
    /// Plan transforms for spectra of `len` channels.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
            len,
        }
    }

    /// Shift a spectrum by `shift` channels (positive moves features to
    /// higher channel indices). Content wraps around circularly.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn shift(&self, spectrum: ArrayView1<'_, f64>, shift: f64) -> Vec<f64> {
        let n = self.len;
        if n == 0 {
            return Vec::new();
        }
        let mut buf: Vec<Complex<f64>> = spectrum.iter().map(|&v| Complex::new(v, 0.0)).collect();
        self.forward.process(&mut buf);
        let w = -2.0 * std::f64::consts::PI * shift / n as f64;
        for (k, x) in buf.iter_mut().enumerate() {
            *x *= Complex::from_polar(1.0, w * signed_frequency(k, n));
        }
        self.inverse.process(&mut buf);
        let scale = 1.0 / n as f64;
        buf.iter().map(|c| c.re * scale).collect()
    }
}

/// Channel range kept after shifting by `shifts` (in channels).
///
/// Channels that wrapped around are cropped: `lo = ceil(max)`,
/// `hi = floor(min)`, where a non-negative `hi` becomes `-1` and a negative
/// `lo` becomes `0`. The kept range is `[lo, n + hi)`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
pub fn crop_range(shifts: impl IntoIterator<Item = f64>, n: usize) -> std::ops::Range<usize> {
    let (mut lo_f, mut hi_f) = (f64::NEG_INFINITY, f64::INFINITY);
    for s in shifts {
        lo_f = lo_f.max(s);
        hi_f = hi_f.min(s);
    }
    if !lo_f.is_finite() || !hi_f.is_finite() {
        return 0..n.saturating_sub(1);
    }
    let mut lo = lo_f.ceil() as i64;
    let mut hi = hi_f.floor() as i64;
    if hi >= 0 {
        hi = -1;
    }
    if lo < 0 {
        lo = 0;
    }
    let end = (n as i64 + hi).max(0);
    let start = lo.min(end);
    (start as usize)..(end as usize)
}

/// Shift every spectrum by `shifts / dispersion` channels and crop the
/// wrapped channels.
///
/// `shifts` is in energy units, one value per pixel. Returns the shifted
/// cube and the matching energy axis.
///
/// # Errors
/// Returns an error on shape mismatches or if the crop leaves no channel.
pub fn shift_zeroloss(
    cube: &Array3<f64>,
    axis: &EnergyAxis,
    shifts: &Array2<f64>,
) -> Result<(Array3<f64>, EnergyAxis)> {
    let (rows, cols, channels) = cube.dim();
    if channels != axis.len() {
        return Err(Error::ShapeMismatch {
            what: "cube channels",
            expected: vec![rows, cols, axis.len()],
            found: vec![rows, cols, channels],
        });
    }
    if shifts.dim() != (rows, cols) {
        return Err(Error::ShapeMismatch {
            what: "shift map",
            expected: vec![rows, cols],
            found: shifts.shape().to_vec(),
        });
    }
    let dispersion = axis.dispersion();
    if dispersion == 0.0 {
        return Err(Error::InvalidParameter("zero dispersion".into()));
    }
    let shifts_ch = shifts.mapv(|s| s / dispersion);
    let range = crop_range(shifts_ch.iter().copied(), channels);
    if range.is_empty() {
        return Err(Error::EmptySelection(format!(
            "shift range leaves no channels of {channels}"
        )));
    }

    let shifter = SpectrumShifter::new(channels);
    let mut shifted = Array3::zeros((rows, cols, range.len()));
    Zip::from(shifted.lanes_mut(Axis(2)))
        .and(cube.lanes(Axis(2)))
        .and(&shifts_ch)
        .par_for_each(|mut out, spec, &s| {
            let moved = shifter.shift(spec, s);
            for (o, v) in out.iter_mut().zip(&moved[range.clone()]) {
                *o = *v;
            }
        });
    log::debug!("shifted {} spectra, kept channels {range:?}", rows * cols);
    Ok((shifted, axis.slice(range)?))
}

/// Fit the zero-loss peak and shift every spectrum so its centre lands on
/// 0 eV.
///
/// # Errors
/// Propagates fit and shift errors.
pub fn align_zeroloss(
    cube: &Array3<f64>,
    axis: &EnergyAxis,
    config: &ZeroLossConfig,
) -> Result<(Array3<f64>, EnergyAxis, ZeroLossFit)> {
    let fit = fit_zeroloss(cube, axis, config)?;
    let shifts = fit.centre.mapv(|c| -c);
    let (shifted, energy) = shift_zeroloss(cube, axis, &shifts)?;
    Ok((shifted, energy, fit))
}
