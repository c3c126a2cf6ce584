//! specim-algorithms: Numeric utilities for spectrum images.
//!
//! This crate provides the batch operations behind the browser and the
//! command-line tool:
//! - **Background** - power-law, exponential and linear pre-edge fits,
//!   fast (fixed exponent) and full per-pixel subtraction, LC and LBA
//! - **Zero loss** - Gaussian/Lorentzian peak fits and FFT alignment
//! - **Outliers** - spike removal
//! - **Shear** - deskewing along x or y
//! - **PCA** - scree ratios and low-rank filtering
//!
#![warn(missing_docs)]

pub mod background;
pub mod lsq;
mod outlier;
mod pca;
mod shear;
pub mod smoothing;
pub mod zero_loss;

pub use background::{
    fit_background, subtract_background, subtract_background_fast, BackgroundModel,
    BackgroundParams, FitOptions, SubtractionResult,
};
pub use lsq::{levenberg_marquardt, LmConfig, LmResult};
pub use outlier::{clean_spectrum, remove_outliers, OutlierConfig, OutlierReport};
pub use pca::{pca_filter, pca_scree, PcaConfig, PcaFilterResult};
pub use shear::{shear, shear_image, shear_x, shear_y, ShearAxis};
pub use smoothing::gaussian_filter_spatial;
pub use zero_loss::{
    align_zeroloss, fit_zeroloss, shift_zeroloss, PeakShape, SpectrumShifter, ZeroLossConfig,
    ZeroLossFit,
};
