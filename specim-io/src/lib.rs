//! specim-io: File I/O for spectrum images.
//!
//! Headerless raw cubes are read through a memory map; HyperSpy-layout
//! HDF5 files are supported with the `hdf5` feature.
//!

mod error;
#[cfg(feature = "hdf5")]
pub mod hspy;
pub mod raw;

use std::path::Path;

pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hspy::{read_hspy, write_hspy, AxisInfo, HspyData};
pub use raw::{read_raw_cube, write_raw_cube, MappedCubeReader, RawDtype, RawLayout};

use specim_core::{EnergyAxis, SpectrumImage};

/// How to interpret a headerless raw cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawOptions {
    /// Shape and sample type.
    pub layout: RawLayout,
    /// Energy of the first channel.
    pub energy_offset: f64,
    /// Energy per channel.
    pub dispersion: f64,
}

impl RawOptions {
    /// Options for an `f32` cube with a unit energy calibration.
    #[must_use]
    pub fn new(shape: (usize, usize, usize)) -> Self {
        Self {
            layout: RawLayout {
                shape,
                dtype: RawDtype::F32,
            },
            energy_offset: 0.0,
            dispersion: 1.0,
        }
    }

    /// Set the sample type.
    #[must_use]
    pub fn with_dtype(mut self, dtype: RawDtype) -> Self {
        self.layout.dtype = dtype;
        self
    }

    /// Set the energy calibration.
    #[must_use]
    pub fn with_calibration(mut self, energy_offset: f64, dispersion: f64) -> Self {
        self.energy_offset = energy_offset;
        self.dispersion = dispersion;
        self
    }
}

/// On-disk format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// HyperSpy-layout HDF5 (`.hspy`, `.h5`, `.hdf5`).
    Hspy,
    /// Headerless little-endian samples (any other extension).
    Raw,
}

impl FileKind {
    /// Classify a path by its extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("hspy" | "h5" | "hdf5") => Self::Hspy,
            _ => Self::Raw,
        }
    }
}

/// Load a spectrum image.
///
/// HDF5 files carry their own calibration; raw files need `raw`.
///
/// # Errors
/// Returns an error if the file cannot be read, if a raw file is given
/// without options, or if HDF5 support is not compiled in.
pub fn load<P: AsRef<Path>>(path: P, raw: Option<&RawOptions>) -> Result<SpectrumImage> {
    let path = path.as_ref();
    match FileKind::from_path(path) {
        FileKind::Hspy => load_hspy(path),
        FileKind::Raw => {
            let options = raw.ok_or_else(|| {
                Error::Unsupported(format!(
                    "{}: raw cubes need a shape and energy calibration",
                    path.display()
                ))
            })?;
            let cube = read_raw_cube(path, &options.layout)?;
            let energy = EnergyAxis::from_calibration(
                options.energy_offset,
                options.dispersion,
                options.layout.shape.2,
            )?;
            let mut image = SpectrumImage::new(cube, energy)?;
            image.replace_nan();
            log::info!("read raw cube {}: shape {:?}", path.display(), image.dim());
            Ok(image)
        }
    }
}

#[cfg(feature = "hdf5")]
fn load_hspy(path: &Path) -> Result<SpectrumImage> {
    let mut image = read_hspy(path)?.image;
    image.replace_nan();
    Ok(image)
}

#[cfg(not(feature = "hdf5"))]
fn load_hspy(path: &Path) -> Result<SpectrumImage> {
    Err(Error::Unsupported(format!(
        "{}: built without HDF5 support",
        path.display()
    )))
}

/// Save a spectrum image, choosing the format from the extension.
///
/// Raw output stores `f32` samples and drops the calibration.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn save<P: AsRef<Path>>(path: P, image: &SpectrumImage) -> Result<()> {
    let path = path.as_ref();
    match FileKind::from_path(path) {
        FileKind::Hspy => save_hspy(path, image),
        FileKind::Raw => write_raw_cube(path, image.data(), RawDtype::F32),
    }
}

#[cfg(feature = "hdf5")]
fn save_hspy(path: &Path, image: &SpectrumImage) -> Result<()> {
    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum image");
    write_hspy(path, image, title)
}

#[cfg(not(feature = "hdf5"))]
fn save_hspy(path: &Path, _image: &SpectrumImage) -> Result<()> {
    Err(Error::Unsupported(format!(
        "{}: built without HDF5 support",
        path.display()
    )))
}
