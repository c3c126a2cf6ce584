//! specim-python: PyO3 Python bindings for specim.
#![allow(
    clippy::doc_markdown,
    clippy::needless_pass_by_value,
    clippy::too_many_arguments,
    clippy::elidable_lifetime_names
)]
//!
//! Spectrum images cross the boundary as `(rows, cols, channels)` float64
//! numpy arrays with a separate energy vector. The browser entry points
//! block until the window is closed.

use ndarray::{Array2, Array3};
use numpy::{
    IntoPyArray, PyArray1, PyArray2, PyArray3, PyReadonlyArray1, PyReadonlyArray2,
    PyReadonlyArray3,
};
use pyo3::prelude::*;
use specim_algorithms::{
    BackgroundModel, FitOptions, OutlierConfig, PeakShape, ShearAxis, ZeroLossConfig,
};
use specim_core::{EnergyAxis, EnergyWindow, SpectrumImage};
use specim_gui::{BrowserMode, BrowserOptions, Dataset};

fn io_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyIOError::new_err(format!("{context}: {err}"))
}

fn value_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(format!("{context}: {err}"))
}

fn runtime_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyRuntimeError::new_err(format!("{context}: {err}"))
}

fn energy_axis(context: &str, energy: PyReadonlyArray1<'_, f64>) -> PyResult<EnergyAxis> {
    EnergyAxis::new(energy.as_array().to_vec()).map_err(|e| value_error(context, e))
}

fn browser_options(title: &str, mode: BrowserMode) -> BrowserOptions {
    BrowserOptions::default().with_title(title).with_mode(mode)
}

fn open_browser(
    py: Python<'_>,
    dataset: Dataset,
    edge: Option<specim_core::Edge>,
    options: &BrowserOptions,
) -> PyResult<()> {
    py.allow_threads(|| specim_gui::run_browser(dataset, edge, options))
        .map_err(|e| runtime_error("browser", e))
}

/// Python wrapper for an edge record.
#[pyclass(name = "Edge")]
#[derive(Clone)]
pub struct PyEdge {
    inner: specim_core::Edge,
}

#[pymethods]
impl PyEdge {
    #[new]
    #[pyo3(signature = (label, bsub=None, int=None))]
    fn new(label: String, bsub: Option<(f64, f64)>, int: Option<(f64, f64)>) -> Self {
        let mut inner = specim_core::Edge::new(label);
        inner.background = bsub.map(EnergyWindow::from);
        inner.integration = int.map(EnergyWindow::from);
        Self { inner }
    }

    #[getter]
    fn label(&self) -> &str {
        &self.inner.label
    }

    #[getter]
    fn bsub(&self) -> Option<(f64, f64)> {
        self.inner.background.map(|w| (w.start, w.end))
    }

    #[getter]
    fn int(&self) -> Option<(f64, f64)> {
        self.inner.integration.map(|w| (w.start, w.end))
    }

    fn __repr__(&self) -> String {
        let fmt = |w: Option<EnergyWindow>| w.map_or_else(|| "None".to_string(), |w| w.to_string());
        format!(
            "Edge(label={:?}, bsub={}, int={})",
            self.inner.label,
            fmt(self.inner.background),
            fmt(self.inner.integration)
        )
    }
}

/// Python wrapper for a RIXS energy map.
#[pyclass(name = "EnergyMap")]
#[derive(Clone)]
pub struct PyEnergyMap {
    inner: specim_core::EnergyMap,
}

#[pymethods]
impl PyEnergyMap {
    #[new]
    #[pyo3(signature = (lp, eloss, einc, adf=None))]
    fn new(
        lp: PyReadonlyArray2<'_, f64>,
        eloss: PyReadonlyArray1<'_, f64>,
        einc: PyReadonlyArray1<'_, f64>,
        adf: Option<PyReadonlyArray2<'_, f64>>,
    ) -> PyResult<Self> {
        let loss = energy_axis("EnergyMap: eloss", eloss)?;
        let incident = energy_axis("EnergyMap: einc", einc)?;
        let adf = adf.map(|a| a.as_array().to_owned());
        let inner = specim_core::EnergyMap::new(lp.as_array().to_owned(), loss, incident, adf)
            .map_err(|e| value_error("EnergyMap", e))?;
        Ok(Self { inner })
    }

    #[getter]
    fn lp<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.inner.intensity().into_pyarray(py)
    }

    #[getter]
    fn eloss<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        PyArray1::from_slice(py, self.inner.loss().values())
    }

    #[getter]
    fn einc<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        PyArray1::from_slice(py, self.inner.incident().values())
    }

    /// Open the ROI browser.
    ///
    /// Only one window can be opened per Python process: the windowing event
    /// loop cannot be recreated, so a later call raises `RuntimeError`.
    fn browser(&self, py: Python<'_>) -> PyResult<()> {
        let options = browser_options("Energy map", BrowserMode::Browse);
        open_browser(py, Dataset::from(self.inner.clone()), None, &options)
    }

    /// Open the background-fitting browser, optionally preset from an edge.
    ///
    /// Only one window can be opened per Python process: the windowing event
    /// loop cannot be recreated, so a later call raises `RuntimeError`.
    #[pyo3(signature = (edge=None))]
    fn fitbrowser(&self, py: Python<'_>, edge: Option<PyEdge>) -> PyResult<()> {
        let options = browser_options("Energy map fit", BrowserMode::Fit);
        open_browser(
            py,
            Dataset::from(self.inner.clone()),
            edge.map(|e| e.inner),
            &options,
        )
    }

    fn __repr__(&self) -> String {
        format!(
            "EnergyMap(incident={}, loss={})",
            self.inner.incident().len(),
            self.inner.loss().len()
        )
    }
}

/// Open the browser on a spectrum image.
///
/// Only one window can be opened per Python process: the windowing event
/// loop cannot be recreated, so a later call raises `RuntimeError`.
#[pyfunction]
#[pyo3(signature = (si, energy, edge=None, fit=false, adf=None))]
fn browse_si(
    py: Python<'_>,
    si: PyReadonlyArray3<'_, f64>,
    energy: PyReadonlyArray1<'_, f64>,
    edge: Option<PyEdge>,
    fit: bool,
    adf: Option<PyReadonlyArray2<'_, f64>>,
) -> PyResult<()> {
    let axis = energy_axis("browse_si: energy", energy)?;
    let mut image = SpectrumImage::new(si.as_array().to_owned(), axis)
        .map_err(|e| value_error("browse_si", e))?;
    if let Some(adf) = adf {
        image = image
            .with_adf(adf.as_array().to_owned())
            .map_err(|e| value_error("browse_si: adf", e))?;
    }
    let mode = if fit { BrowserMode::Fit } else { BrowserMode::Browse };
    let options = browser_options("Spectrum image", mode);
    open_browser(py, Dataset::from(image), edge.map(|e| e.inner), &options)
}

/// Load a HyperSpy file as `(si, energy)`.
#[pyfunction]
fn load_si<'py>(
    py: Python<'py>,
    path: &str,
) -> PyResult<(Bound<'py, PyArray3<f64>>, Bound<'py, PyArray1<f64>>)> {
    let image = specim_io::load(path, None).map_err(|e| io_error(&format!("load_si: {path}"), e))?;
    let (data, energy, _) = image.into_parts();
    let energy = PyArray1::from_slice(py, energy.values());
    Ok((data.into_pyarray(py), energy))
}

/// Replace spikes in every spectrum by the spectrum median.
#[pyfunction]
#[pyo3(signature = (si, threshold_multiplier=5.0, remove_neighbors=true))]
fn remove_outlier<'py>(
    py: Python<'py>,
    si: PyReadonlyArray3<'py, f64>,
    threshold_multiplier: f64,
    remove_neighbors: bool,
) -> Bound<'py, PyArray3<f64>> {
    let cube = si.as_array().to_owned();
    let config = OutlierConfig::default()
        .with_threshold(threshold_multiplier)
        .with_neighbors(remove_neighbors);
    let (cleaned, _) = py.allow_threads(|| specim_algorithms::remove_outliers(&cube, &config));
    cleaned.into_pyarray(py)
}

type Sheared<'py> = (Bound<'py, PyArray3<f64>>, Option<Bound<'py, PyArray2<f64>>>);

fn shear_si<'py>(
    py: Python<'py>,
    si: PyReadonlyArray3<'py, f64>,
    angle: f64,
    adf: Option<PyReadonlyArray2<'py, f64>>,
    axis: ShearAxis,
) -> Sheared<'py> {
    let cube = si.as_array().to_owned();
    let adf: Option<Array2<f64>> = adf.map(|a| a.as_array().to_owned());
    let (out, adf_out) =
        py.allow_threads(|| specim_algorithms::shear(&cube, adf.as_ref(), angle, axis));
    (out.into_pyarray(py), adf_out.map(|a| a.into_pyarray(py)))
}

/// Shear along x by `angle` degrees.
#[pyfunction]
#[pyo3(signature = (si, angle, adf=None))]
fn shear_x_si<'py>(
    py: Python<'py>,
    si: PyReadonlyArray3<'py, f64>,
    angle: f64,
    adf: Option<PyReadonlyArray2<'py, f64>>,
) -> Sheared<'py> {
    shear_si(py, si, angle, adf, ShearAxis::X)
}

/// Shear along y by `angle` degrees.
#[pyfunction]
#[pyo3(signature = (si, angle, adf=None))]
fn shear_y_si<'py>(
    py: Python<'py>,
    si: PyReadonlyArray3<'py, f64>,
    angle: f64,
    adf: Option<PyReadonlyArray2<'py, f64>>,
) -> Sheared<'py> {
    shear_si(py, si, angle, adf, ShearAxis::Y)
}

type PeakMaps<'py> = (
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray2<f64>>,
);

/// Fit the zero-loss peak per pixel; returns `(amplitude, centre, width)`.
#[pyfunction]
#[pyo3(signature = (si, energy, shape="gaussian", window=(-3.0, 3.0), ftol=1e-5))]
fn fit_zeroloss_si<'py>(
    py: Python<'py>,
    si: PyReadonlyArray3<'py, f64>,
    energy: PyReadonlyArray1<'py, f64>,
    shape: &str,
    window: (f64, f64),
    ftol: f64,
) -> PyResult<PeakMaps<'py>> {
    let axis = energy_axis("fit_zeroloss_si: energy", energy)?;
    let shape: PeakShape = shape
        .parse()
        .map_err(|e| value_error("fit_zeroloss_si: shape", e))?;
    let config = ZeroLossConfig::default()
        .with_shape(shape)
        .with_window(window.0, window.1)
        .with_ftol(ftol);
    let cube = si.as_array().to_owned();
    let fit = py
        .allow_threads(|| specim_algorithms::fit_zeroloss(&cube, &axis, &config))
        .map_err(|e| value_error("fit_zeroloss_si", e))?;
    Ok((
        fit.amplitude.into_pyarray(py),
        fit.centre.into_pyarray(py),
        fit.width.into_pyarray(py),
    ))
}

/// Shift every spectrum by its entry in `shifts` (energy units) and crop
/// the wrapped channels; returns `(si, energy)`.
#[pyfunction]
fn shift_zeroloss_si<'py>(
    py: Python<'py>,
    si: PyReadonlyArray3<'py, f64>,
    energy: PyReadonlyArray1<'py, f64>,
    shifts: PyReadonlyArray2<'py, f64>,
) -> PyResult<(Bound<'py, PyArray3<f64>>, Bound<'py, PyArray1<f64>>)> {
    let axis = energy_axis("shift_zeroloss_si: energy", energy)?;
    let cube = si.as_array().to_owned();
    let shifts = shifts.as_array().to_owned();
    let (shifted, axis) = py
        .allow_threads(|| specim_algorithms::shift_zeroloss(&cube, &axis, &shifts))
        .map_err(|e| value_error("shift_zeroloss_si", e))?;
    let energy = PyArray1::from_slice(py, axis.values());
    Ok((shifted.into_pyarray(py), energy))
}

/// Explained variance ratios of the leading components.
#[pyfunction]
#[pyo3(signature = (si, max_components=50))]
fn pca_show_scree(
    py: Python<'_>,
    si: PyReadonlyArray3<'_, f64>,
    max_components: usize,
) -> PyResult<Vec<f64>> {
    let cube: Array3<f64> = si.as_array().to_owned();
    py.allow_threads(|| specim_algorithms::pca_scree(&cube, max_components))
        .map_err(|e| value_error("pca_show_scree", e))
}

/// Low-rank reconstruction; returns `(filtered, scores)`.
#[pyfunction]
#[pyo3(signature = (si, n_components=10))]
fn pca_filter<'py>(
    py: Python<'py>,
    si: PyReadonlyArray3<'py, f64>,
    n_components: usize,
) -> PyResult<(Bound<'py, PyArray3<f64>>, Bound<'py, PyArray2<f64>>)> {
    let cube = si.as_array().to_owned();
    let result = py
        .allow_threads(|| specim_algorithms::pca_filter(&cube, n_components))
        .map_err(|e| value_error("pca_filter", e))?;
    Ok((result.filtered.into_pyarray(py), result.scores.into_pyarray(py)))
}

type Subtracted<'py> = (
    Bound<'py, PyArray3<f64>>,
    Bound<'py, PyArray2<f64>>,
    Option<(f64, f64)>,
);

/// Per-pixel background subtraction over the `bsub` window; returns
/// `(subtracted, exponents, lc_exponents)`.
#[pyfunction]
#[pyo3(signature = (
    si, energy, bsub, model="pl", lc=false, lc_percentiles=(5.0, 95.0),
    lba=false, fwhm=5.0, log=false, ftol=1e-5
))]
fn bgsub_si<'py>(
    py: Python<'py>,
    si: PyReadonlyArray3<'py, f64>,
    energy: PyReadonlyArray1<'py, f64>,
    bsub: (f64, f64),
    model: &str,
    lc: bool,
    lc_percentiles: (f64, f64),
    lba: bool,
    fwhm: f64,
    log: bool,
    ftol: f64,
) -> PyResult<Subtracted<'py>> {
    let axis = energy_axis("bgsub_si: energy", energy)?;
    let model: BackgroundModel = model
        .parse()
        .map_err(|e| value_error("bgsub_si: model", e))?;
    let mut options = FitOptions::default()
        .with_model(model)
        .with_lc(lc)
        .with_lc_percentiles(lc_percentiles.0, lc_percentiles.1)
        .with_lba(lba, fwhm)
        .with_log(log);
    options.ftol = ftol;
    let cube = si.as_array().to_owned();
    let window = EnergyWindow::from(bsub);
    let result = py
        .allow_threads(|| specim_algorithms::subtract_background(&cube, &axis, window, &options))
        .map_err(|e| value_error("bgsub_si", e))?;
    Ok((
        result.subtracted.into_pyarray(py),
        result.exponents.into_pyarray(py),
        result.lc_exponents,
    ))
}

/// Python module for specim.
#[pymodule]
fn specim(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyEdge>()?;
    m.add_class::<PyEnergyMap>()?;
    m.add_function(wrap_pyfunction!(browse_si, m)?)?;
    m.add_function(wrap_pyfunction!(load_si, m)?)?;
    m.add_function(wrap_pyfunction!(remove_outlier, m)?)?;
    m.add_function(wrap_pyfunction!(shear_x_si, m)?)?;
    m.add_function(wrap_pyfunction!(shear_y_si, m)?)?;
    m.add_function(wrap_pyfunction!(fit_zeroloss_si, m)?)?;
    m.add_function(wrap_pyfunction!(shift_zeroloss_si, m)?)?;
    m.add_function(wrap_pyfunction!(pca_show_scree, m)?)?;
    m.add_function(wrap_pyfunction!(pca_filter, m)?)?;
    m.add_function(wrap_pyfunction!(bgsub_si, m)?)?;
    Ok(())
}
