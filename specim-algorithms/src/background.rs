//! Pre-edge background models and their subtraction from spectrum images.
//!
//! A background is fitted inside a window before the edge onset and
//! extrapolated under the edge. Three models are supported:
//!
//! - **Power law** `A * E^-r`, the usual choice for core-loss EELS
//! - **Exponential** `A * exp(-r * E)`
//! - **Linear** `a + b * E`
//!
//! For every model the parameters are reported as `(amplitude, exponent)`;
//! for the linear model these are the intercept and the slope.
//!
//! Channels before the window start carry no background and are zero in
//! subtracted cubes.

use ndarray::{s, Array1, Array2, Array3, ArrayView1, Axis};
use rayon::prelude::*;
use specim_core::stats::percentile;
use specim_core::{EnergyAxis, EnergyWindow, Error, Result};

use crate::lsq::{levenberg_marquardt, linear_combination, linear_fit, LmConfig};
use crate::smoothing::gaussian_filter_spatial;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parametric background model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BackgroundModel {
    /// `A * E^-r`.
    #[default]
    PowerLaw,
    /// `A * exp(-r * E)`.
    Exponential,
    /// `a + b * E`.
    Linear,
}

impl BackgroundModel {
    /// All models, in display order.
    pub const ALL: [Self; 3] = [Self::PowerLaw, Self::Exponential, Self::Linear];

    /// Human-readable name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PowerLaw => "Power law",
            Self::Exponential => "Exponential",
            Self::Linear => "Linear",
        }
    }

    /// Short name used on the command line.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::PowerLaw => "pl",
            Self::Exponential => "exp",
            Self::Linear => "lin",
        }
    }

    /// Evaluate the model at `energy`.
    ///
    /// Non-finite values (a power law at `E <= 0`) evaluate to zero.
    #[must_use]
    pub fn evaluate(self, params: BackgroundParams, energy: f64) -> f64 {
        let v = match self {
            Self::PowerLaw => params.amplitude * energy.powf(-params.exponent),
            Self::Exponential => params.amplitude * (-params.exponent * energy).exp(),
            Self::Linear => params.amplitude + params.exponent * energy,
        };
        if v.is_finite() {
            v
        } else {
            0.0
        }
    }

    /// Shape of the model with unit amplitude.
    fn unit(self, exponent: f64, energy: f64) -> f64 {
        self.evaluate(
            BackgroundParams {
                amplitude: 1.0,
                exponent,
            },
            energy,
        )
    }

    fn is_logarithmic(self) -> bool {
        !matches!(self, Self::Linear)
    }
}

impl std::str::FromStr for BackgroundModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pl" | "power" | "powerlaw" | "power law" => Ok(Self::PowerLaw),
            "exp" | "exponential" => Ok(Self::Exponential),
            "lin" | "linear" => Ok(Self::Linear),
            other => Err(Error::InvalidParameter(format!(
                "unknown background model '{other}'"
            ))),
        }
    }
}

/// Fitted background parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BackgroundParams {
    /// `A` (or the intercept).
    pub amplitude: f64,
    /// `r` (or the slope).
    pub exponent: f64,
}

/// Options controlling background fits.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitOptions {
    /// Background model.
    pub model: BackgroundModel,
    /// Refit every pixel with a linear combination of two power laws.
    pub lc: bool,
    /// Percentiles of the exponent map used for the two LC exponents.
    pub lc_percentiles: (f64, f64),
    /// Fit on a spatially smoothed copy of the cube.
    pub lba: bool,
    /// Smoothing FWHM in pixels.
    pub lba_fwhm: f64,
    /// Fit in linearised space only.
    pub log: bool,
    /// Tolerance for nonlinear refinement.
    pub ftol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            model: BackgroundModel::PowerLaw,
            lc: false,
            lc_percentiles: (5.0, 95.0),
            lba: false,
            lba_fwhm: 5.0,
            log: false,
            ftol: 1e-5,
        }
    }
}

impl FitOptions {
    /// Select the background model.
    #[must_use]
    pub fn with_model(mut self, model: BackgroundModel) -> Self {
        self.model = model;
        self
    }

    /// Enable the linear combination refit.
    #[must_use]
    pub fn with_lc(mut self, lc: bool) -> Self {
        self.lc = lc;
        self
    }

    /// Set the LC percentiles.
    #[must_use]
    pub fn with_lc_percentiles(mut self, lo: f64, hi: f64) -> Self {
        self.lc_percentiles = (lo, hi);
        self
    }

    /// Enable local background averaging with the given FWHM.
    #[must_use]
    pub fn with_lba(mut self, lba: bool, fwhm: f64) -> Self {
        self.lba = lba;
        self.lba_fwhm = fwhm;
        self
    }

    /// Restrict fits to linearised space.
    #[must_use]
    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    /// Check the option combination.
    ///
    /// # Errors
    /// Returns an error for LC with the linear model or for out-of-range
    /// percentiles or FWHM.
    pub fn validate(&self) -> Result<()> {
        if self.lc && self.model == BackgroundModel::Linear {
            return Err(Error::InvalidParameter(
                "linear combination requires a power-law or exponential model".into(),
            ));
        }
        let (lo, hi) = self.lc_percentiles;
        let in_range = |q: f64| (0.0..=100.0).contains(&q);
        if self.lc && !(in_range(lo) && in_range(hi)) {
            return Err(Error::InvalidParameter(format!(
                "LC percentiles ({lo}, {hi}) outside [0, 100]"
            )));
        }
        if self.lba && !(self.lba_fwhm.is_finite() && self.lba_fwhm >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "LBA FWHM {} must be non-negative",
                self.lba_fwhm
            )));
        }
        Ok(())
    }
}

/// Result of a whole-cube subtraction.
#[derive(Debug, Clone)]
pub struct SubtractionResult {
    /// Background-subtracted cube; zero before the window start.
    pub subtracted: Array3<f64>,
    /// Fitted exponent per pixel (slope for the linear model).
    pub exponents: Array2<f64>,
    /// LC exponents `(r1, r2)` when the linear combination was used.
    pub lc_exponents: Option<(f64, f64)>,
}

/// Channels used for fitting plus the first background channel.
struct FitWindow {
    range: std::ops::Range<usize>,
    energies: Vec<f64>,
}

impl FitWindow {
    fn new(axis: &EnergyAxis, window: EnergyWindow) -> Result<Self> {
        let range = axis.index_range(window);
        if range.len() < 2 {
            return Err(Error::InvalidWindow {
                start: window.start,
                end: window.end,
            });
        }
        let energies = axis.values()[range.clone()].to_vec();
        Ok(Self { range, energies })
    }

    fn start(&self) -> usize {
        self.range.start
    }
}

/// Linearised fit of one model to `(energy, intensity)` samples.
fn fit_linearised(model: BackgroundModel, energy: &[f64], y: &[f64]) -> Result<BackgroundParams> {
    match model {
        BackgroundModel::Linear => {
            let (a, b) = linear_fit(energy, y)?;
            Ok(BackgroundParams {
                amplitude: a,
                exponent: b,
            })
        }
        BackgroundModel::PowerLaw | BackgroundModel::Exponential => {
            let mut xs = Vec::with_capacity(y.len());
            let mut ls = Vec::with_capacity(y.len());
            for (&e, &v) in energy.iter().zip(y) {
                if v > 0.0 && (model == BackgroundModel::Exponential || e > 0.0) {
                    xs.push(if model == BackgroundModel::PowerLaw {
                        e.ln()
                    } else {
                        e
                    });
                    ls.push(v.ln());
                }
            }
            let (intercept, slope) = linear_fit(&xs, &ls)?;
            Ok(BackgroundParams {
                amplitude: intercept.exp(),
                exponent: -slope,
            })
        }
    }
}

/// Nonlinear refinement seeded from the linearised fit.
fn fit_nonlinear(
    model: BackgroundModel,
    energy: &[f64],
    y: &[f64],
    ftol: f64,
) -> Result<BackgroundParams> {
    let seed = fit_linearised(model, energy, y)?;
    if !model.is_logarithmic() {
        return Ok(seed);
    }
    let res = levenberg_marquardt(
        |p| {
            let params = BackgroundParams {
                amplitude: p[0],
                exponent: p[1],
            };
            energy
                .iter()
                .zip(y)
                .map(|(&e, &v)| model.evaluate(params, e) - v)
                .collect()
        },
        &[seed.amplitude, seed.exponent],
        &[(f64::NEG_INFINITY, f64::INFINITY); 2],
        &LmConfig::default().with_ftol(ftol),
    )?;
    Ok(BackgroundParams {
        amplitude: res.params[0],
        exponent: res.params[1],
    })
}

/// Background curve over the full axis: zero before `start`.
fn background_curve(
    model: BackgroundModel,
    params: BackgroundParams,
    axis: &[f64],
    start: usize,
) -> Array1<f64> {
    Array1::from_iter(
        axis.iter()
            .enumerate()
            .map(|(i, &e)| if i < start { 0.0 } else { model.evaluate(params, e) }),
    )
}

/// Fit a single spectrum in linearised space.
///
/// Returns the background over the whole axis (zero before the window
/// start) and the fitted parameters.
///
/// # Errors
/// Returns an error if the window holds fewer than two channels or too few
/// positive samples for a logarithmic model.
pub fn fit_background(
    spectrum: ArrayView1<'_, f64>,
    axis: &EnergyAxis,
    window: EnergyWindow,
    options: &FitOptions,
) -> Result<(Array1<f64>, BackgroundParams)> {
    if spectrum.len() != axis.len() {
        return Err(Error::ShapeMismatch {
            what: "spectrum",
            expected: vec![axis.len()],
            found: vec![spectrum.len()],
        });
    }
    let fw = FitWindow::new(axis, window)?;
    let y = spectrum.slice(s![fw.range.clone()]).to_vec();
    let params = fit_linearised(options.model, &fw.energies, &y)?;
    Ok((
        background_curve(options.model, params, axis.values(), fw.start()),
        params,
    ))
}

fn check_cube(cube: &Array3<f64>, axis: &EnergyAxis) -> Result<()> {
    let (rows, cols, channels) = cube.dim();
    if channels != axis.len() {
        return Err(Error::ShapeMismatch {
            what: "cube channels",
            expected: vec![rows, cols, axis.len()],
            found: vec![rows, cols, channels],
        });
    }
    Ok(())
}

/// Subtract `background` from `spectrum` into `out`, zeroing channels
/// before `start`.
fn write_subtracted(
    out: &mut ndarray::ArrayViewMut1<'_, f64>,
    spectrum: ArrayView1<'_, f64>,
    start: usize,
    background: impl Fn(f64) -> f64,
    energies: &[f64],
) {
    for (i, o) in out.iter_mut().enumerate() {
        *o = if i < start {
            0.0
        } else {
            spectrum[i] - background(energies[i])
        };
    }
}

/// Subtract a background with a fixed exponent from every pixel.
///
/// Only the amplitude is fitted per pixel, by linear least squares over
/// the window: `A = sum(y * f) / sum(f * f)` with `f` the unit-amplitude
/// model. For the linear model the slope is fixed and the intercept is the
/// mean of `y - slope * E`.
///
/// # Errors
/// Returns an error if the cube and axis disagree or the window is empty.
pub fn subtract_background_fast(
    cube: &Array3<f64>,
    axis: &EnergyAxis,
    window: EnergyWindow,
    exponent: f64,
    options: &FitOptions,
) -> Result<Array3<f64>> {
    check_cube(cube, axis)?;
    let fw = FitWindow::new(axis, window)?;
    let model = options.model;
    let energies = axis.values();
    let unit: Vec<f64> = fw.energies.iter().map(|&e| model.unit(exponent, e)).collect();
    let norm: f64 = unit.iter().map(|f| f * f).sum();
    #[allow(clippy::cast_precision_loss)]
    let n_fit = fw.energies.len() as f64;

    let mut out = Array3::zeros(cube.dim());
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(cube.axis_iter(Axis(0)).into_par_iter())
        .for_each(|(mut out_row, in_row)| {
            for (mut out_spec, spec) in out_row.outer_iter_mut().zip(in_row.outer_iter()) {
                let y = spec.slice(s![fw.range.clone()]);
                let amplitude = match model {
                    BackgroundModel::Linear => {
                        y.iter()
                            .zip(&fw.energies)
                            .map(|(v, e)| v - exponent * e)
                            .sum::<f64>()
                            / n_fit
                    }
                    _ if norm > 0.0 => {
                        y.iter().zip(&unit).map(|(v, f)| v * f).sum::<f64>() / norm
                    }
                    _ => 0.0,
                };
                let params = BackgroundParams {
                    amplitude,
                    exponent,
                };
                write_subtracted(
                    &mut out_spec,
                    spec,
                    fw.start(),
                    |e| model.evaluate(params, e),
                    energies,
                );
            }
        });
    Ok(out)
}

/// Fit and subtract a background from every pixel.
///
/// With `lba` the fits run on a spatially smoothed copy while the
/// subtraction uses the raw data. With `lc` two exponents are taken as
/// percentiles of the fitted exponent map and each pixel is refit as a sum
/// of two fixed-exponent terms. Pixels whose fit fails are left without
/// background and counted in a warning.
///
/// # Errors
/// Returns an error for invalid options, a cube/axis mismatch, an empty
/// window, or when no pixel could be fitted for LC.
pub fn subtract_background(
    cube: &Array3<f64>,
    axis: &EnergyAxis,
    window: EnergyWindow,
    options: &FitOptions,
) -> Result<SubtractionResult> {
    options.validate()?;
    check_cube(cube, axis)?;
    let fw = FitWindow::new(axis, window)?;
    let model = options.model;
    let energies = axis.values();
    let (rows, cols, _) = cube.dim();

    let smoothed;
    let fit_source = if options.lba && options.lba_fwhm > 0.0 {
        smoothed = gaussian_filter_spatial(cube, options.lba_fwhm);
        &smoothed
    } else {
        cube
    };

    let fits: Vec<Option<BackgroundParams>> = (0..rows * cols)
        .into_par_iter()
        .map(|p| {
            let y = fit_source
                .slice(s![p / cols, p % cols, fw.range.clone()])
                .to_vec();
            let fit = if options.log {
                fit_linearised(model, &fw.energies, &y)
            } else {
                fit_nonlinear(model, &fw.energies, &y, options.ftol)
            };
            fit.ok()
        })
        .collect();

    let failed = fits.iter().filter(|f| f.is_none()).count();
    if failed > 0 {
        log::warn!(
            "background fit failed for {failed} of {} pixels",
            rows * cols
        );
    }

    let exponents = Array2::from_shape_fn((rows, cols), |(r, c)| {
        fits[r * cols + c].map_or(f64::NAN, |f| f.exponent)
    });

    let mut out = Array3::zeros(cube.dim());

    if options.lc {
        let valid: Vec<f64> = exponents.iter().copied().filter(|v| v.is_finite()).collect();
        if valid.is_empty() {
            return Err(Error::FitFailed("no pixel fit for linear combination".into()));
        }
        let r1 = percentile(&valid, options.lc_percentiles.0);
        let r2 = percentile(&valid, options.lc_percentiles.1);
        log::debug!("linear combination exponents r1={r1:.4} r2={r2:.4}");

        let b1: Vec<f64> = fw.energies.iter().map(|&e| model.unit(r1, e)).collect();
        let b2: Vec<f64> = fw.energies.iter().map(|&e| model.unit(r2, e)).collect();
        let basis = [b1, b2];

        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(r, mut out_row)| {
                for (c, mut out_spec) in out_row.outer_iter_mut().enumerate() {
                    let y = fit_source.slice(s![r, c, fw.range.clone()]).to_vec();
                    let coeffs = if (r1 - r2).abs() > 0.0 {
                        linear_combination(&basis, &y).ok()
                    } else {
                        None
                    };
                    let (a1, a2) = match coeffs {
                        Some(c) => (c[0], c[1]),
                        None => {
                            // Degenerate basis: fall back to a single term.
                            let norm: f64 = basis[0].iter().map(|f| f * f).sum();
                            let a = if norm > 0.0 {
                                y.iter().zip(&basis[0]).map(|(v, f)| v * f).sum::<f64>() / norm
                            } else {
                                0.0
                            };
                            (a, 0.0)
                        }
                    };
                    write_subtracted(
                        &mut out_spec,
                        cube.slice(s![r, c, ..]),
                        fw.start(),
                        |e| a1 * model.unit(r1, e) + a2 * model.unit(r2, e),
                        energies,
                    );
                }
            });

        return Ok(SubtractionResult {
            subtracted: out,
            exponents,
            lc_exponents: Some((r1, r2)),
        });
    }

    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(r, mut out_row)| {
            for (c, mut out_spec) in out_row.outer_iter_mut().enumerate() {
                let params = fits[r * cols + c].unwrap_or_default();
                write_subtracted(
                    &mut out_spec,
                    cube.slice(s![r, c, ..]),
                    fw.start(),
                    |e| model.evaluate(params, e),
                    energies,
                );
            }
        });

    Ok(SubtractionResult {
        subtracted: out,
        exponents,
        lc_exponents: None,
    })
}
