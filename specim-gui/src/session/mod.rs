//! Browser session state machine.
//!
//! A [`BrowserSession`] owns the dataset, the edge being analysed, the fit
//! options and everything derived from them: the ROI spectra, their
//! backgrounds, plot limits, the subtracted cube and the integrated image.
//! Window events map one-to-one onto methods here, and every method leaves
//! the derived state consistent before it returns. Nothing in this module
//! depends on the GUI toolkit.

mod dataset;
mod parse;

use std::ops::Range;

use ndarray::{s, Array1, Array2, Array3};
use specim_algorithms::{
    fit_background, pca_filter, pca_scree, remove_outliers, shear, subtract_background,
    subtract_background_fast, BackgroundModel, BackgroundParams, FitOptions, OutlierConfig,
    OutlierReport, ShearAxis,
};
use specim_core::cube::integrate_cube;
use specim_core::stats::min_max;
use specim_core::{Edge, EnergyAxis, EnergyWindow, Error, Result, Roi};

pub use dataset::Dataset;
pub use parse::{parse_number, parse_pair};

/// Spectrum panel: ROI 1 (primary) or ROI 2 (secondary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    /// First ROI, drawn with the primary button.
    Primary,
    /// Second ROI, drawn with the secondary button once enabled.
    Secondary,
}

impl Panel {
    fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }
}

#[derive(Debug, Clone)]
struct PanelState {
    roi: Option<Roi>,
    spectrum: Array1<f64>,
    background: Option<Array1<f64>>,
    params: Option<BackgroundParams>,
    x_limits: (f64, f64),
    y_limits: (f64, f64),
}

/// Interactive analysis state for one dataset.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    dataset: Dataset,
    edge: Edge,
    options: FitOptions,
    fit_active: bool,
    int_active: bool,
    roi2_enabled: bool,
    y_locked: bool,
    y_log: bool,
    view_window: EnergyWindow,
    view_range: Range<usize>,
    panels: [PanelState; 2],
    subtracted: Option<Array3<f64>>,
    exponent_map: Option<Array2<f64>>,
    lc_exponents: Option<(f64, f64)>,
    derived: Array2<f64>,
    last_error: Option<(Panel, String)>,
}

impl BrowserSession {
    /// Start a session on a dataset.
    ///
    /// Without an edge both windows span the whole axis and stay inactive.
    /// A background window given by the edge activates fitting, an
    /// integration window activates integration; missing windows default
    /// to the whole axis.
    #[must_use]
    pub fn new(dataset: Dataset, edge: Option<Edge>) -> Self {
        let loss = dataset.loss().clone();
        let full = loss.full_window();
        let (edge, fit_active, int_active) = match edge {
            None => (Edge::full_range(&loss), false, false),
            Some(mut edge) => {
                let fit_active = edge.background.is_some();
                let int_active = edge.integration.is_some();
                edge.background = Some(edge.background_or_full(&loss));
                edge.integration = Some(edge.integration_or_full(&loss));
                (edge, fit_active, int_active)
            }
        };
        let spectrum = dataset.mean_spectrum();
        let panel = PanelState {
            roi: None,
            spectrum,
            background: None,
            params: None,
            x_limits: (loss.min(), loss.max()),
            y_limits: (0.0, 1.0),
        };
        let mut session = Self {
            edge,
            options: FitOptions::default(),
            fit_active,
            int_active,
            roi2_enabled: false,
            y_locked: false,
            y_log: false,
            view_window: full,
            view_range: 0..loss.len(),
            panels: [panel.clone(), panel],
            subtracted: None,
            exponent_map: None,
            lc_exponents: None,
            derived: Array2::zeros((0, 0)),
            last_error: None,
            dataset,
        };
        if session.fit_active {
            session.update_background(Panel::Primary);
            session.update_background(Panel::Secondary);
        }
        session.update_derived();
        session.rescale_y();
        session
    }

    // ---- accessors ----

    /// The dataset being browsed.
    #[must_use]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Current edge; both windows are always set.
    #[must_use]
    pub fn edge(&self) -> &Edge {
        &self.edge
    }

    /// Background fit options.
    #[must_use]
    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// Whether a background window has been chosen.
    #[must_use]
    pub fn fit_active(&self) -> bool {
        self.fit_active
    }

    /// Whether an integration window has been chosen.
    #[must_use]
    pub fn int_active(&self) -> bool {
        self.int_active
    }

    /// Whether the second ROI is enabled.
    #[must_use]
    pub fn roi2_enabled(&self) -> bool {
        self.roi2_enabled
    }

    /// Whether the y limits are frozen.
    #[must_use]
    pub fn y_locked(&self) -> bool {
        self.y_locked
    }

    /// Whether spectra are shown on a log scale.
    #[must_use]
    pub fn y_log(&self) -> bool {
        self.y_log
    }

    /// Energy range shown in the spectrum panels.
    #[must_use]
    pub fn view_window(&self) -> EnergyWindow {
        self.view_window
    }

    /// ROI drawn for a panel.
    #[must_use]
    pub fn roi(&self, panel: Panel) -> Option<Roi> {
        self.panels[panel.index()].roi
    }

    /// Mean spectrum of a panel's ROI (the whole dataset before any ROI).
    #[must_use]
    pub fn spectrum(&self, panel: Panel) -> &Array1<f64> {
        &self.panels[panel.index()].spectrum
    }

    /// Fitted background of a panel, once fitting is active.
    #[must_use]
    pub fn background(&self, panel: Panel) -> Option<&Array1<f64>> {
        self.panels[panel.index()].background.as_ref()
    }

    /// Fitted background parameters of a panel.
    #[must_use]
    pub fn background_params(&self, panel: Panel) -> Option<BackgroundParams> {
        self.panels[panel.index()].params
    }

    /// Spectrum minus background from the start of the background window.
    #[must_use]
    pub fn subtracted_spectrum(&self, panel: Panel) -> Option<(Vec<f64>, Vec<f64>)> {
        let state = &self.panels[panel.index()];
        let background = state.background.as_ref()?;
        let loss = self.dataset.loss();
        let start = loss.search_sorted(self.edge.background_or_full(loss).start);
        let energies = loss.values()[start..].to_vec();
        let values = state
            .spectrum
            .slice(s![start..])
            .iter()
            .zip(background.slice(s![start..]))
            .map(|(s, b)| s - b)
            .collect();
        Some((energies, values))
    }

    /// Horizontal plot limits of a panel.
    #[must_use]
    pub fn x_limits(&self, panel: Panel) -> (f64, f64) {
        self.panels[panel.index()].x_limits
    }

    /// Vertical plot limits of a panel, in data units.
    #[must_use]
    pub fn y_limits(&self, panel: Panel) -> (f64, f64) {
        self.panels[panel.index()].y_limits
    }

    /// Image of the mean intensity inside the integration window.
    ///
    /// Uses the subtracted cube once a subtraction has run.
    #[must_use]
    pub fn derived_image(&self) -> &Array2<f64> {
        &self.derived
    }

    /// Background-subtracted cube from the last subtraction.
    #[must_use]
    pub fn subtracted(&self) -> Option<&Array3<f64>> {
        self.subtracted.as_ref()
    }

    /// Exponent map from the last full subtraction.
    #[must_use]
    pub fn exponent_map(&self) -> Option<&Array2<f64>> {
        self.exponent_map.as_ref()
    }

    /// LC exponents from the last full subtraction.
    #[must_use]
    pub fn lc_exponents(&self) -> Option<(f64, f64)> {
        self.lc_exponents
    }

    /// Message of the most recent failed background fit, until that panel
    /// fits again.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_ref().map(|(_, msg)| msg.as_str())
    }

    // ---- selection events ----

    /// Record a rectangle drawn on the image panel.
    ///
    /// Returns `Ok(false)` for ROI 2 while it is disabled. For energy maps
    /// the panel's x limits follow the rectangle's energy-loss extent.
    ///
    /// # Errors
    /// Returns an error if the rectangle selects no data.
    pub fn select_roi(&mut self, panel: Panel, roi: Roi) -> Result<bool> {
        if panel == Panel::Secondary && !self.roi2_enabled {
            return Ok(false);
        }
        let spectrum = self.dataset.roi_spectrum(&roi)?;
        let limits = self.dataset.roi_loss_window(&roi);
        let state = &mut self.panels[panel.index()];
        state.roi = Some(roi);
        state.spectrum = spectrum;
        if let Some(limits) = limits {
            state.x_limits = limits;
        }
        if self.fit_active {
            self.update_background(panel);
        }
        self.rescale_y();
        Ok(true)
    }

    /// Enable or disable the second ROI.
    pub fn set_roi2_enabled(&mut self, enabled: bool) {
        self.roi2_enabled = enabled;
        if enabled && self.fit_active {
            self.update_background(Panel::Secondary);
        }
        self.rescale_y();
    }

    /// Choose the background window and activate fitting.
    pub fn set_background_window(&mut self, window: EnergyWindow) {
        self.fit_active = true;
        self.edge.background = Some(window);
        self.update_background(Panel::Primary);
        self.update_background(Panel::Secondary);
        self.rescale_y();
    }

    /// Choose the integration window and activate integration.
    pub fn set_integration_window(&mut self, window: EnergyWindow) {
        self.int_active = true;
        self.edge.integration = Some(window);
        self.update_derived();
    }

    /// Set the displayed energy range; y limits are rescaled over it.
    pub fn set_view_window(&mut self, window: EnergyWindow) {
        self.view_window = window;
        self.view_range = self.dataset.loss().index_range(window);
        for state in &mut self.panels {
            state.x_limits = (window.start, window.end);
        }
        self.rescale_y();
    }

    /// Freeze or release the y limits.
    pub fn set_y_locked(&mut self, locked: bool) {
        self.y_locked = locked;
        self.rescale_y();
    }

    /// Toggle the logarithmic y scale.
    pub fn set_y_log(&mut self, log: bool) {
        self.y_log = log;
        self.rescale_y();
    }

    // ---- fit options ----

    /// Select the background model. LC is switched off for the linear model.
    pub fn set_fit_model(&mut self, model: BackgroundModel) {
        self.options.model = model;
        if model == BackgroundModel::Linear {
            self.options.lc = false;
        }
        self.refit();
    }

    /// Set the LC, LBA and log flags. LC is ignored for the linear model.
    pub fn set_fit_flags(&mut self, lc: bool, lba: bool, log: bool) {
        self.options.lc = lc && self.options.model != BackgroundModel::Linear;
        self.options.lba = lba;
        self.options.log = log;
    }

    /// Parse and apply the LC percentiles, e.g. `(5, 95)`.
    ///
    /// # Errors
    /// Returns an error, leaving the options unchanged, if the text is not
    /// a pair of percentiles in `[0, 100]`.
    pub fn set_lc_percentiles(&mut self, text: &str) -> Result<(f64, f64)> {
        let (lo, hi) = parse_pair(text)?;
        if !((0.0..=100.0).contains(&lo) && (0.0..=100.0).contains(&hi)) {
            return Err(Error::InvalidParameter(format!(
                "percentiles must lie in [0, 100], got ({lo}, {hi})"
            )));
        }
        self.options.lc_percentiles = (lo, hi);
        Ok((lo, hi))
    }

    /// Parse and apply the LBA smoothing FWHM in pixels.
    ///
    /// # Errors
    /// Returns an error, leaving the options unchanged, if the text is not
    /// a positive number.
    pub fn set_lba_fwhm(&mut self, text: &str) -> Result<f64> {
        let fwhm = parse_number(text)?;
        if fwhm <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "LBA FWHM must be positive, got {fwhm}"
            )));
        }
        self.options.lba_fwhm = fwhm;
        Ok(fwhm)
    }

    // ---- subtraction ----

    /// Subtract with the exponent fitted to ROI 1, per-pixel amplitude only.
    ///
    /// Returns `Ok(false)` unless both fitting and integration are active.
    ///
    /// # Errors
    /// Returns an error if no exponent could be fitted or the subtraction
    /// fails.
    pub fn fast_subtract(&mut self) -> Result<bool> {
        if !(self.fit_active && self.int_active) {
            return Ok(false);
        }
        if self.panels[0].params.is_none() {
            self.update_background(Panel::Primary);
        }
        let exponent = self.panels[0]
            .params
            .map(|p| p.exponent)
            .ok_or_else(|| Error::FitFailed("no background fitted for ROI 1".into()))?;
        let cube = self.dataset.cube();
        let window = self.edge.background_or_full(cube.energy());
        let subtracted =
            subtract_background_fast(cube.data(), cube.energy(), window, exponent, &self.options)?;
        log::info!("fast subtraction with exponent {exponent:.4}");
        self.subtracted = Some(subtracted);
        self.exponent_map = None;
        self.lc_exponents = None;
        self.update_derived();
        Ok(true)
    }

    /// Fit and subtract a background in every pixel.
    ///
    /// Returns `Ok(false)` unless both fitting and integration are active.
    ///
    /// # Errors
    /// Returns an error if the options are invalid or the subtraction fails.
    pub fn full_subtract(&mut self) -> Result<bool> {
        if !(self.fit_active && self.int_active) {
            return Ok(false);
        }
        let cube = self.dataset.cube();
        let window = self.edge.background_or_full(cube.energy());
        let result = subtract_background(cube.data(), cube.energy(), window, &self.options)?;
        if let Some((r1, r2)) = result.lc_exponents {
            log::info!("LC exponents {r1:.4}, {r2:.4}");
        }
        self.subtracted = Some(result.subtracted);
        self.exponent_map = Some(result.exponents);
        self.lc_exponents = result.lc_exponents;
        self.update_derived();
        Ok(true)
    }

    /// Drop the subtracted cube; the integrated image uses raw data again.
    pub fn clear_subtraction(&mut self) {
        self.subtracted = None;
        self.exponent_map = None;
        self.lc_exponents = None;
        self.update_derived();
    }

    // ---- cube tools ----

    /// Replace spikes in every spectrum.
    ///
    /// # Errors
    /// Returns an error if the cleaned cube cannot replace the current one.
    pub fn remove_outliers(&mut self, config: &OutlierConfig) -> Result<OutlierReport> {
        let cube = self.dataset.cube();
        let (cleaned, report) = remove_outliers(cube.data(), config);
        let adf = cube.adf().cloned();
        let loss = cube.energy().clone();
        self.replace_cube(cleaned, adf, loss)?;
        Ok(report)
    }

    /// Shear the cube (and ADF image) by `angle_deg` along `axis`.
    ///
    /// # Errors
    /// Returns an error if the sheared cube cannot replace the current one.
    pub fn shear(&mut self, angle_deg: f64, axis: ShearAxis) -> Result<()> {
        let cube = self.dataset.cube();
        let (data, adf) = shear(cube.data(), cube.adf(), angle_deg, axis);
        let loss = cube.energy().clone();
        self.replace_cube(data, adf, loss)
    }

    /// Explained-variance ratios of the current cube.
    ///
    /// # Errors
    /// Returns an error for a constant cube.
    pub fn pca_scree(&self, max_components: usize) -> Result<Vec<f64>> {
        pca_scree(self.dataset.cube().data(), max_components)
    }

    /// Replace the cube by its reconstruction from `n_components`.
    ///
    /// # Errors
    /// Returns an error for an invalid component count.
    pub fn pca_filter(&mut self, n_components: usize) -> Result<()> {
        let cube = self.dataset.cube();
        let result = pca_filter(cube.data(), n_components)?;
        let adf = cube.adf().cloned();
        let loss = cube.energy().clone();
        self.replace_cube(result.filtered, adf, loss)
    }

    fn replace_cube(
        &mut self,
        data: Array3<f64>,
        adf: Option<Array2<f64>>,
        loss: EnergyAxis,
    ) -> Result<()> {
        self.dataset = self.dataset.with_cube(data, adf, loss)?;
        self.subtracted = None;
        self.exponent_map = None;
        self.lc_exponents = None;
        for i in 0..self.panels.len() {
            let spectrum = match self.panels[i].roi {
                Some(roi) => self.dataset.roi_spectrum(&roi)?,
                None => self.dataset.mean_spectrum(),
            };
            self.panels[i].spectrum = spectrum;
        }
        self.refit();
        self.update_derived();
        Ok(())
    }

    // ---- derived state ----

    fn refit(&mut self) {
        if self.fit_active {
            self.update_background(Panel::Primary);
            self.update_background(Panel::Secondary);
        }
        self.rescale_y();
    }

    fn update_background(&mut self, panel: Panel) {
        let loss = self.dataset.loss();
        let window = self.edge.background_or_full(loss);
        let state = &mut self.panels[panel.index()];
        match fit_background(state.spectrum.view(), loss, window, &self.options) {
            Ok((background, params)) => {
                state.background = Some(background);
                state.params = Some(params);
                if self.last_error.as_ref().is_some_and(|(p, _)| *p == panel) {
                    self.last_error = None;
                }
            }
            Err(e) => {
                log::warn!("background fit for {panel:?} failed: {e}");
                state.background = None;
                state.params = None;
                self.last_error = Some((panel, e.to_string()));
            }
        }
    }

    fn update_derived(&mut self) {
        let cube = self.dataset.cube();
        let range = cube
            .energy()
            .index_range(self.edge.integration_or_full(cube.energy()));
        let source = self.subtracted.as_ref().unwrap_or_else(|| cube.data());
        self.derived = integrate_cube(source, range);
    }

    fn rescale_y(&mut self) {
        if self.y_locked {
            return;
        }
        let primary = self.compute_y_limits(Panel::Primary);
        self.panels[0].y_limits = primary;
        if self.roi2_enabled {
            let secondary = self.compute_y_limits(Panel::Secondary);
            self.panels[1].y_limits = secondary;
        }
    }

    /// Limits over the view window: `[min(0.9 min, 0), 1.1 max]` on a
    /// linear scale, with the minimum taken from the background while
    /// fitting; `[0.8 min, 1.2 max]` on a log scale.
    fn compute_y_limits(&self, panel: Panel) -> (f64, f64) {
        let state = &self.panels[panel.index()];
        let range = self.view_range.clone();
        let window = |a: &Array1<f64>| {
            let end = range.end.min(a.len());
            let start = range.start.min(end);
            a.slice(s![start..end]).to_vec()
        };
        let (lo, hi) = min_max(&window(&state.spectrum));
        if self.y_log {
            return (0.8 * lo, 1.2 * hi);
        }
        let mut min = (0.9 * lo).min(0.0);
        if self.fit_active {
            if let Some(background) = &state.background {
                let (bg_lo, _) = min_max(&window(background));
                min = (0.9 * bg_lo).min(0.0);
            }
        }
        (min, 1.1 * hi)
    }
}

#[cfg(test)]
mod tests;
