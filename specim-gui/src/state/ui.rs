//! UI state for panel visibility, text fields and tool parameters.

use specim_algorithms::ShearAxis;
use specim_core::{EnergyWindow, Roi};

use crate::session::BrowserSession;

/// Slider positions for one energy range.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeSlider {
    pub lo: f64,
    pub hi: f64,
}

impl RangeSlider {
    pub fn from_window(window: EnergyWindow) -> Self {
        Self {
            lo: window.start,
            hi: window.end,
        }
    }

    pub fn window(self) -> EnergyWindow {
        EnergyWindow::new(self.lo, self.hi)
    }
}

/// Raw-file import parameters entered before loading.
#[derive(Debug, Clone)]
pub struct RawImportState {
    /// Whether the raw import dialog is visible.
    pub show_dialog: bool,
    /// File waiting for its shape.
    pub pending: Option<std::path::PathBuf>,
    /// Shape as `RxCxE`.
    pub shape_text: String,
    /// Samples are 64-bit floats.
    pub f64_samples: bool,
    pub energy_offset: f64,
    pub dispersion: f64,
}

impl Default for RawImportState {
    fn default() -> Self {
        Self {
            show_dialog: false,
            pending: None,
            shape_text: String::new(),
            f64_samples: false,
            energy_offset: 0.0,
            dispersion: 1.0,
        }
    }
}

/// UI panel visibility and widget state.
pub struct UiState {
    pub view: RangeSlider,
    pub background: RangeSlider,
    pub integration: RangeSlider,
    /// LC percentile text, e.g. `(5, 95)`.
    pub lc_text: String,
    /// LBA FWHM text in pixels.
    pub lba_text: String,
    /// Whether the PCA window is visible.
    pub show_pca: bool,
    pub scree: Option<Vec<f64>>,
    pub scree_max: usize,
    pub pca_components: usize,
    pub shear_angle: f64,
    pub shear_axis: ShearAxis,
    pub outlier_threshold: f64,
    pub outlier_neighbors: bool,
    /// Rectangle drag on the image panel, with the panel it targets.
    pub roi_drag: Option<RoiDrag>,
    /// Span drag on a spectrum panel.
    pub span_drag: Option<SpanDrag>,
    pub raw: RawImportState,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            view: RangeSlider::default(),
            background: RangeSlider::default(),
            integration: RangeSlider::default(),
            lc_text: "(5, 95)".to_string(),
            lba_text: "5".to_string(),
            show_pca: false,
            scree: None,
            scree_max: 50,
            pca_components: 10,
            shear_angle: 0.0,
            shear_axis: ShearAxis::X,
            outlier_threshold: 5.0,
            outlier_neighbors: true,
            roi_drag: None,
            span_drag: None,
            raw: RawImportState::default(),
        }
    }
}

impl UiState {
    /// Copy window positions and option text from a session.
    pub fn sync_from(&mut self, session: &BrowserSession) {
        let loss = session.dataset().loss();
        self.view = RangeSlider::from_window(session.view_window());
        self.background = RangeSlider::from_window(session.edge().background_or_full(loss));
        self.integration = RangeSlider::from_window(session.edge().integration_or_full(loss));
        let (lo, hi) = session.options().lc_percentiles;
        self.lc_text = format!("({lo}, {hi})");
        self.lba_text = format!("{}", session.options().lba_fwhm);
        self.scree = None;
    }
}

/// Rectangle being dragged on the image panel.
#[derive(Debug, Clone, Copy)]
pub struct RoiDrag {
    pub secondary: bool,
    pub start: [f64; 2],
    pub current: [f64; 2],
}

impl RoiDrag {
    pub fn roi(&self) -> Roi {
        Roi::from_corners(self.start, self.current)
    }
}

/// Energy span being dragged on a spectrum panel.
///
/// Primary drags choose the background window, secondary drags the
/// integration window.
#[derive(Debug, Clone, Copy)]
pub struct SpanDrag {
    pub integration: bool,
    pub start: f64,
    pub current: f64,
}

impl SpanDrag {
    pub fn window(&self) -> EnergyWindow {
        EnergyWindow::new(self.start, self.current)
    }
}
