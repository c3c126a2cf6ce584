//! specim-gui: Interactive browser for EELS spectrum images and RIXS maps.
//!
//! The [`session`] module holds the toolkit-independent state machine;
//! everything else renders it with egui. [`run_browser`] opens a window on
//! an in-memory dataset, [`run_app`] starts the standalone application.

#![warn(missing_docs)]

mod app;
pub mod export;
mod message;
mod pipeline;
pub mod session;
mod state;
mod ui;
mod util;
mod viewer;

use std::path::PathBuf;

use anyhow::anyhow;
use eframe::egui;
use specim_core::Edge;

use app::SpecimApp;
pub use session::{BrowserSession, Dataset, Panel};
pub use viewer::Colormap;

/// Which controls the browser shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserMode {
    /// ROI selection and spectra only.
    #[default]
    Browse,
    /// Background fitting, integration and subtraction as well.
    Fit,
}

/// Window options for [`run_browser`] and [`run_app`].
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Window title.
    pub title: String,
    /// Control set.
    pub mode: BrowserMode,
    /// Initial window size in points.
    pub window_size: [f32; 2],
    /// Colormap of the image panels.
    pub colormap: Colormap,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            title: "Specim".to_string(),
            mode: BrowserMode::Browse,
            window_size: [1400.0, 850.0],
            colormap: Colormap::default(),
        }
    }
}

impl BrowserOptions {
    /// Select the control set.
    #[must_use]
    pub fn with_mode(mut self, mode: BrowserMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the window title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

fn launch(app: SpecimApp, options: &BrowserOptions) -> anyhow::Result<()> {
    let native = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size(options.window_size),
        ..Default::default()
    };
    eframe::run_native(
        &options.title,
        native,
        Box::new(|cc| {
            ui::theme::configure_style(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow!("{e}"))
}

/// Open a browser window on a dataset and block until it is closed.
///
/// `edge` preselects the background and integration windows; see
/// [`BrowserSession::new`].
///
/// # Errors
/// Returns an error if the window cannot be created, which includes any
/// call after the first in one process.
pub fn run_browser(
    dataset: Dataset,
    edge: Option<Edge>,
    options: &BrowserOptions,
) -> anyhow::Result<()> {
    let session = BrowserSession::new(dataset, edge);
    log::info!(
        "opening browser on {:?} cube",
        session.dataset().cube().dim()
    );
    launch(
        SpecimApp::new(Some(session), options.mode, options.colormap),
        options,
    )
}

/// Start the standalone application, optionally loading a file.
///
/// # Errors
/// Returns an error if the window cannot be created.
pub fn run_app(initial: Option<PathBuf>, options: &BrowserOptions) -> anyhow::Result<()> {
    let mut app = SpecimApp::new(None, options.mode, options.colormap);
    if let Some(path) = initial {
        app.load_file(path, None);
    }
    launch(app, options)
}
