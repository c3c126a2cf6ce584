//! Main application state and logic.
//!
//! Contains the `SpecimApp` struct which owns the browser session, the
//! cached textures and the channel used by the file loader.

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use eframe::egui;
use specim_io::RawOptions;

use crate::message::AppMessage;
use crate::pipeline::load_file_worker;
use crate::session::{BrowserSession, Dataset};
use crate::state::{ProcessingState, UiState};
use crate::viewer::{image_to_color, Colormap};
use crate::BrowserMode;

/// Main application state.
pub struct SpecimApp {
    /// Active session, once data is loaded.
    pub(crate) session: Option<BrowserSession>,
    /// Browse-only or fitting controls.
    pub(crate) mode: BrowserMode,
    /// File the session was loaded from.
    pub(crate) selected_file: Option<PathBuf>,

    pub(crate) ui_state: UiState,
    pub(crate) processing: ProcessingState,

    /// Message receiver for async operations.
    pub(crate) rx: Receiver<AppMessage>,
    /// Message sender for async operations.
    pub(crate) tx: Sender<AppMessage>,

    /// Texture of the selection image.
    pub(crate) image_texture: Option<egui::TextureHandle>,
    /// Texture of the integrated image (spectrum images only).
    pub(crate) derived_texture: Option<egui::TextureHandle>,
    /// Textures must be rebuilt on the next frame.
    pub(crate) textures_dirty: bool,
    pub(crate) colormap: Colormap,
    pub(crate) log_image: bool,
}

impl SpecimApp {
    /// Create the application, optionally with a session already open.
    pub fn new(session: Option<BrowserSession>, mode: BrowserMode, colormap: Colormap) -> Self {
        let (tx, rx) = channel();
        let mut ui_state = UiState::default();
        if let Some(session) = &session {
            ui_state.sync_from(session);
        }
        Self {
            session,
            mode,
            selected_file: None,
            ui_state,
            processing: ProcessingState::default(),
            rx,
            tx,
            image_texture: None,
            derived_texture: None,
            textures_dirty: true,
            colormap,
            log_image: false,
        }
    }

    /// Load a file asynchronously.
    pub fn load_file(&mut self, path: PathBuf, raw: Option<RawOptions>) {
        self.selected_file = Some(path.clone());
        self.processing.is_loading = true;
        self.processing.progress = 0.0;
        self.processing.info("Loading file...");

        let tx = self.tx.clone();
        thread::spawn(move || load_file_worker(path.as_path(), &tx, raw));
    }

    /// Replace the session with a freshly loaded dataset.
    pub(crate) fn open_dataset(&mut self, dataset: Dataset) {
        let session = BrowserSession::new(dataset, None);
        self.ui_state.sync_from(&session);
        self.session = Some(session);
        self.textures_dirty = true;
    }

    /// Run a session operation, reporting failures in the status bar.
    ///
    /// Returns `None` when there is no session or the operation failed.
    pub(crate) fn with_session<T>(
        &mut self,
        label: &str,
        op: impl FnOnce(&mut BrowserSession) -> specim_core::Result<T>,
    ) -> Option<T> {
        let session = self.session.as_mut()?;
        let result = op(session);
        self.textures_dirty = true;
        match result {
            Ok(value) => {
                if let Some(err) = session.last_error() {
                    log::debug!("{label}: last fit error {err}");
                }
                Some(value)
            }
            Err(e) => {
                log::warn!("{label} failed: {e}");
                self.processing.error(format!("{label}: {e}"));
                None
            }
        }
    }

    /// Rebuild textures after the data or colormap changed.
    pub(crate) fn refresh_textures(&mut self, ctx: &egui::Context) {
        if !self.textures_dirty {
            return;
        }
        self.textures_dirty = false;
        let Some(session) = &self.session else {
            self.image_texture = None;
            self.derived_texture = None;
            return;
        };
        let image = image_to_color(
            &session.dataset().display_image(),
            self.colormap,
            self.log_image,
        );
        self.image_texture = Some(ctx.load_texture("image", image, egui::TextureOptions::NEAREST));
        self.derived_texture = if session.dataset().is_energy_map() {
            None
        } else {
            let derived = image_to_color(session.derived_image(), self.colormap, false);
            Some(ctx.load_texture("derived", derived, egui::TextureOptions::NEAREST))
        };
    }

    /// Handle pending messages from async workers.
    pub fn handle_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                AppMessage::LoadProgress(p, s) => {
                    self.processing.progress = p;
                    self.processing.info(s);
                }
                AppMessage::LoadComplete(dataset, dur) => {
                    self.processing.is_loading = false;
                    self.processing.progress = 1.0;
                    let (rows, cols, channels) = dataset.cube().dim();
                    self.processing.info(format!(
                        "Loaded {rows}x{cols}x{channels} in {:.2}s",
                        dur.as_secs_f64()
                    ));
                    self.open_dataset(*dataset);
                }
                AppMessage::LoadError(e) => {
                    self.processing.is_loading = false;
                    self.processing.error(format!("Error: {e}"));
                }
            }
        }
    }
}

impl eframe::App for SpecimApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_messages();
        self.refresh_textures(ctx);
        self.render_side_panel(ctx);
        self.render_status_bar(ctx);
        self.render_spectrum_panel(ctx);
        self.render_central_panel(ctx);
        self.render_pca_window(ctx);
        self.render_raw_dialog(ctx);

        if self.processing.is_loading {
            ctx.request_repaint();
        }
    }
}
