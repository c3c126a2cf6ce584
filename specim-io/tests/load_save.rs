#![allow(clippy::uninlined_format_args)]

use approx::assert_relative_eq;
use ndarray::Array3;
use specim_core::{EnergyAxis, SpectrumImage};
use specim_io::{load, save, write_raw_cube, Error, FileKind, RawDtype, RawOptions};
use std::path::Path;
use tempfile::TempDir;

fn sample() -> SpectrumImage {
    let energy = EnergyAxis::from_calibration(280.0, 0.5, 10).unwrap();
    let data = Array3::from_shape_fn((3, 2, 10), |(r, c, e)| (r + 2 * c) as f64 + 0.25 * e as f64);
    SpectrumImage::new(data, energy).unwrap()
}

#[test]
fn test_file_kind_from_extension() {
    assert_eq!(FileKind::from_path(Path::new("a/b.hspy")), FileKind::Hspy);
    assert_eq!(FileKind::from_path(Path::new("b.HDF5")), FileKind::Hspy);
    assert_eq!(FileKind::from_path(Path::new("b.raw")), FileKind::Raw);
    assert_eq!(FileKind::from_path(Path::new("cube")), FileKind::Raw);
}

#[test]
fn test_raw_load_applies_calibration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cube.raw");
    let image = sample();
    save(&path, &image).unwrap();

    let options = RawOptions::new((3, 2, 10)).with_calibration(280.0, 0.5);
    let loaded = load(&path, Some(&options)).unwrap();
    assert_eq!(loaded.dim(), (3, 2, 10));
    assert_relative_eq!(loaded.energy().first(), 280.0);
    assert_relative_eq!(loaded.energy().last(), 284.5);
    for (a, b) in loaded.data().iter().zip(image.data().iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-6);
    }
}

#[test]
fn test_raw_load_replaces_nan() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nan.bin");
    let mut cube = Array3::<f64>::ones((1, 2, 4));
    cube[[0, 1, 2]] = f64::NAN;
    write_raw_cube(&path, &cube, RawDtype::F64).unwrap();

    let options = RawOptions::new((1, 2, 4)).with_dtype(RawDtype::F64);
    let loaded = load(&path, Some(&options)).unwrap();
    assert_relative_eq!(loaded.data()[[0, 1, 2]], 0.0);
}

#[test]
fn test_raw_without_options_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cube.raw");
    save(&path, &sample()).unwrap();
    assert!(matches!(load(&path, None), Err(Error::Unsupported(_))));
}

#[cfg(feature = "hdf5")]
#[test]
fn test_hspy_save_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("map.hspy");
    let image = sample().with_pixel_scale(2.0);
    save(&path, &image).unwrap();

    let loaded = load(&path, None).unwrap();
    assert_eq!(loaded.data(), image.data());
    assert_eq!(loaded.energy(), image.energy());
    assert_relative_eq!(loaded.pixel_scale().unwrap(), 2.0);
}
