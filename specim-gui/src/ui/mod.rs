//! UI rendering modules.
//!
//! Contains the UI rendering logic split into separate modules:
//! - `control_panel`: Left sidebar with controls, status bar, raw import
//! - `main_view`: Central panel with the selection and integrated images
//! - `spectrum_view`: ROI spectra with background and window selection
//! - `pca_window`: Scree plot and PCA filtering

mod control_panel;
mod main_view;
mod pca_window;
mod spectrum_view;
pub mod theme;
