#![allow(clippy::uninlined_format_args)]

use approx::assert_relative_eq;
use ndarray::Array3;
use specim_core::{Edge, EnergyAxis, EnergyWindow, Roi, SpectrumImage};
use specim_gui::{BrowserSession, Dataset, Panel};
use specim_io::{RawDtype, RawOptions};
use tempfile::tempdir;

/// 3x3 spectrum image over 100..300 eV with exponents 2.5..3.3.
fn power_law_image() -> SpectrumImage {
    let energy = EnergyAxis::from_calibration(100.0, 1.0, 200).unwrap();
    let data = Array3::from_shape_fn((3, 3, 200), |(r, c, e)| {
        let exponent = 2.5 + 0.1 * (r * 3 + c) as f64;
        1e7 * (100.0 + e as f64).powf(-exponent)
    });
    SpectrumImage::new(data, energy).unwrap()
}

fn edge() -> Edge {
    Edge::new("synthetic")
        .with_background(EnergyWindow::new(120.0, 160.0))
        .with_integration(EnergyWindow::new(200.0, 280.0))
}

#[test]
fn test_pixel_roi_on_spectrum_image() {
    let mut session = BrowserSession::new(Dataset::from(power_law_image()), None);
    assert!(session
        .select_roi(Panel::Primary, Roi::new(0.0, 0.5, 0.0, 0.5))
        .unwrap());
    // Pixel (0, 0): 1e7 * 100^-2.5.
    assert_relative_eq!(
        session.spectrum(Panel::Primary)[0],
        100.0,
        max_relative = 1e-9
    );
    // Spatial ROIs leave the energy range alone.
    assert_eq!(session.x_limits(Panel::Primary), (100.0, 299.0));
}

#[test]
fn test_full_subtraction_with_linear_combination() {
    let mut session = BrowserSession::new(Dataset::from(power_law_image()), Some(edge()));
    session.set_fit_flags(true, false, false);
    assert!(session.full_subtract().unwrap());

    let exponents = session.exponent_map().unwrap();
    assert_relative_eq!(exponents[[1, 1]], 2.9, epsilon = 1e-4);

    let (r1, r2) = session.lc_exponents().unwrap();
    assert!(r1 < r2, "r1={} r2={}", r1, r2);
    assert!(r1 > 2.49 && r2 < 3.31, "r1={} r2={}", r1, r2);
    assert_eq!(session.derived_image().dim(), (3, 3));
}

#[test]
fn test_raw_file_to_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cube.raw");
    let data = Array3::from_shape_fn((2, 2, 5), |(r, c, e)| (r * 10 + c + e) as f64);
    specim_io::write_raw_cube(&path, &data, RawDtype::F32).unwrap();

    let options = RawOptions::new((2, 2, 5)).with_calibration(10.0, 0.5);
    let image = specim_io::load(&path, Some(&options)).unwrap();
    let session = BrowserSession::new(Dataset::from(image), None);

    assert_eq!(session.spectrum(Panel::Primary).len(), 5);
    assert_eq!(session.x_limits(Panel::Primary), (10.0, 12.0));
    // Integration defaults to the whole axis: mean over channels.
    assert_relative_eq!(session.derived_image()[[1, 1]], 13.0, epsilon = 1e-6);
}

#[test]
fn test_export_derived_image() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.tif");
    let mut session = BrowserSession::new(Dataset::from(power_law_image()), Some(edge()));
    assert!(session.fast_subtract().unwrap());
    specim_gui::export::write_tiff(&path, session.derived_image()).unwrap();
    assert!(path.exists());
}
