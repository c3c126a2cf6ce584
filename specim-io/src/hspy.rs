//! HyperSpy-layout HDF5 (`.hspy`) spectrum images.
//!
//! The signal lives at `/Experiments/<title>/data`, with one group
//! `axis-<i>` per array dimension carrying `name`, `units`, `offset`,
//! `scale`, `size` and `navigate` attributes. The energy axis is the
//! first axis with `navigate = false`, or the last axis if none is marked.

use crate::{Error, Result};
use hdf5::types::VarLenUnicode;
use hdf5::{File, Group};
use ndarray::{Array3, ArrayD};
use specim_core::{EnergyAxis, SpectrumImage};
use std::path::Path;
use std::str::FromStr;

const FILE_FORMAT: &str = "HyperSpy";
const FILE_FORMAT_VERSION: &str = "3.1";

/// Calibration of one array dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisInfo {
    /// Axis name, e.g. "Energy loss".
    pub name: String,
    /// Units, e.g. "eV".
    pub units: String,
    /// Value of the first sample.
    pub offset: f64,
    /// Spacing between samples.
    pub scale: f64,
    /// Number of samples.
    pub size: usize,
    /// Navigation (spatial) rather than signal axis.
    pub navigate: bool,
}

/// A spectrum image read from a `.hspy` file.
#[derive(Debug, Clone)]
pub struct HspyData {
    /// Experiment title (the group name under `/Experiments`).
    pub title: String,
    /// Calibrated cube.
    pub image: SpectrumImage,
    /// Raw axis calibrations in array order.
    pub axes: Vec<AxisInfo>,
}

/// Read the first experiment of a `.hspy` file.
///
/// One- and two-dimensional signals are promoted to `(1, 1, n)` and
/// `(1, rows, n)` cubes.
///
/// # Errors
/// Returns an error if the file does not follow the HyperSpy layout.
pub fn read_hspy<P: AsRef<Path>>(path: P) -> Result<HspyData> {
    let file = File::open(&path)?;
    let experiments = file
        .group("Experiments")
        .map_err(|_| Error::InvalidFormat("missing /Experiments group".into()))?;
    let mut titles = experiments.member_names()?;
    titles.sort();
    let title = titles
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidFormat("no experiment in /Experiments".into()))?;
    let group = experiments.group(&title)?;

    let data: ArrayD<f64> = group.dataset("data")?.read_dyn::<f64>()?;
    let shape = data.shape().to_vec();
    let ndim = shape.len();
    if ndim == 0 || ndim > 3 {
        return Err(Error::InvalidFormat(format!(
            "expected a 1-3 dimensional signal, found shape {shape:?}"
        )));
    }

    let axes = (0..ndim)
        .map(|i| read_axis(&group, i, shape[i], i + 1 == ndim))
        .collect::<Result<Vec<_>>>()?;
    let signal = axes.iter().position(|a| !a.navigate).unwrap_or(ndim - 1);
    if signal != ndim - 1 {
        return Err(Error::InvalidFormat(format!(
            "signal axis {signal} is not the last array dimension"
        )));
    }

    let cube_shape = match ndim {
        1 => (1, 1, shape[0]),
        2 => (1, shape[0], shape[1]),
        _ => (shape[0], shape[1], shape[2]),
    };
    let cube: Array3<f64> = data
        .into_shape_with_order(cube_shape)
        .map_err(|e| Error::InvalidFormat(e.to_string()))?;

    let energy_axis = &axes[signal];
    let energy = EnergyAxis::from_calibration(
        round4(energy_axis.offset),
        round4(energy_axis.scale),
        energy_axis.size,
    )?;
    let mut image = SpectrumImage::new(cube, energy)?;
    // The x navigation axis is the one just before the signal.
    if let Some(nav) = signal.checked_sub(1).map(|i| &axes[i]) {
        image = image.with_pixel_scale(nav.scale);
    }
    log::info!(
        "read '{title}' from {}: shape {:?}",
        path.as_ref().display(),
        image.dim()
    );
    Ok(HspyData { title, image, axes })
}

fn read_axis(group: &Group, index: usize, len: usize, last: bool) -> Result<AxisInfo> {
    let name = format!("axis-{index}");
    let Ok(axis) = group.group(&name) else {
        return Ok(AxisInfo {
            name: String::new(),
            units: String::new(),
            offset: 0.0,
            scale: 1.0,
            size: len,
            navigate: !last,
        });
    };
    let size = read_attr_opt::<i64>(&axis, "size")?
        .and_then(|s| usize::try_from(s).ok())
        .unwrap_or(len);
    if size != len {
        return Err(Error::InvalidFormat(format!(
            "{name} size {size} does not match data dimension {len}"
        )));
    }
    Ok(AxisInfo {
        name: read_attr_opt_string(&axis, "name")?.unwrap_or_default(),
        units: read_attr_opt_string(&axis, "units")?.unwrap_or_default(),
        offset: read_attr_opt::<f64>(&axis, "offset")?.unwrap_or(0.0),
        scale: read_attr_opt::<f64>(&axis, "scale")?.unwrap_or(1.0),
        size,
        navigate: read_attr_opt::<bool>(&axis, "navigate")?.unwrap_or(!last),
    })
}

/// Write a spectrum image in the HyperSpy layout.
///
/// The energy axis is stored as an offset/scale calibration, so it should
/// be uniformly spaced.
///
/// # Errors
/// Returns an error if HDF5 I/O fails.
pub fn write_hspy<P: AsRef<Path>>(path: P, image: &SpectrumImage, title: &str) -> Result<()> {
    let file = File::create(path)?;
    set_attr_str(&file, "file_format", FILE_FORMAT)?;
    set_attr_str(&file, "file_format_version", FILE_FORMAT_VERSION)?;

    let experiments = file.create_group("Experiments")?;
    let group = experiments.create_group(title)?;
    let dataset = group
        .new_dataset::<f64>()
        .shape(image.dim())
        .create("data")?;
    dataset.write(image.data())?;

    let (rows, cols, channels) = image.dim();
    let scale = image.pixel_scale().unwrap_or(1.0);
    let energy = image.energy();
    let axes = [
        AxisInfo {
            name: "y".into(),
            units: String::new(),
            offset: 0.0,
            scale,
            size: rows,
            navigate: true,
        },
        AxisInfo {
            name: "x".into(),
            units: String::new(),
            offset: 0.0,
            scale,
            size: cols,
            navigate: true,
        },
        AxisInfo {
            name: "Energy loss".into(),
            units: "eV".into(),
            offset: energy.first(),
            scale: energy.dispersion(),
            size: channels,
            navigate: false,
        },
    ];
    for (i, axis) in axes.iter().enumerate() {
        write_axis(&group, i, axis)?;
    }
    Ok(())
}

#[allow(clippy::cast_possible_wrap)]
fn write_axis(group: &Group, index: usize, axis: &AxisInfo) -> Result<()> {
    let g = group.create_group(&format!("axis-{index}"))?;
    set_attr_str(&g, "name", &axis.name)?;
    set_attr_str(&g, "units", &axis.units)?;
    g.new_attr::<f64>().create("offset")?.write_scalar(&axis.offset)?;
    g.new_attr::<f64>().create("scale")?.write_scalar(&axis.scale)?;
    g.new_attr::<i64>()
        .create("size")?
        .write_scalar(&(axis.size as i64))?;
    g.new_attr::<bool>()
        .create("navigate")?
        .write_scalar(&axis.navigate)?;
    Ok(())
}

fn round4(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

fn set_attr_str(location: &hdf5::Location, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    location
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn read_attr_opt<T: hdf5::H5Type + Clone>(group: &Group, name: &str) -> Result<Option<T>> {
    match group.attr(name) {
        Ok(attr) => Ok(Some(attr.read_scalar::<T>()?)),
        Err(_) => Ok(None),
    }
}

fn read_attr_opt_string(group: &Group, name: &str) -> Result<Option<String>> {
    match group.attr(name) {
        Ok(attr) => {
            let value: VarLenUnicode = attr.read_scalar()?;
            Ok(Some(value.to_string()))
        }
        Err(_) => Ok(None),
    }
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hspy_roundtrip() {
        let energy = EnergyAxis::from_calibration(-2.0, 0.25, 8).unwrap();
        let data = Array3::from_shape_fn((2, 3, 8), |(r, c, e)| (r * 100 + c * 10 + e) as f64);
        let image = SpectrumImage::new(data.clone(), energy.clone())
            .unwrap()
            .with_pixel_scale(0.5);

        let file = NamedTempFile::new().unwrap();
        write_hspy(file.path(), &image, "EELS map").unwrap();
        let loaded = read_hspy(file.path()).unwrap();

        assert_eq!(loaded.title, "EELS map");
        assert_eq!(loaded.image.data(), &data);
        assert_eq!(loaded.image.energy(), &energy);
        assert_relative_eq!(loaded.image.pixel_scale().unwrap(), 0.5);
        assert_eq!(loaded.axes.len(), 3);
        assert!(!loaded.axes[2].navigate);
    }
}
