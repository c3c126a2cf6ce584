use approx::assert_relative_eq;
use ndarray::{Array2, Array3};
use specim_core::{Edge, EnergyAxis, EnergyMap, EnergyWindow, Roi, SpectrumImage};

#[test]
fn test_energy_map_roi_and_integration() {
    let loss = EnergyAxis::from_calibration(0.0, 0.5, 8).unwrap();
    let incident = EnergyAxis::new(vec![530.0, 531.0, 532.0, 533.0]).unwrap();
    let mut lp = Array2::from_shape_fn((4, 8), |(i, e)| (i * 10 + e) as f64);
    lp[[2, 3]] = f64::NAN;
    let map = EnergyMap::new(lp, loss, incident, None).unwrap();

    // NaN became zero and the inelastic image is (loss, incident).
    let image = map.inelastic_image();
    assert_eq!(image.dim(), (8, 4));
    assert_eq!(image[[3, 2]], 0.0);
    assert_eq!(image[[5, 1]], 15.0);

    // Incident 531..532 selects columns 1 and 2.
    let roi = Roi::new(531.0, 532.5, 0.0, 3.5);
    let spectrum = map.roi_spectrum(&roi).unwrap();
    assert_relative_eq!(spectrum[0], 15.0);
    // Column 2 channel 3 is the replaced NaN.
    assert_relative_eq!(spectrum[3], (13.0 + 0.0) / 2.0);
}

#[test]
fn test_edge_windows_drive_integration() {
    let energy = EnergyAxis::from_calibration(100.0, 1.0, 10).unwrap();
    let data = Array3::from_shape_fn((2, 3, 10), |(r, c, e)| (r + c) as f64 * e as f64);
    let image = SpectrumImage::new(data, energy).unwrap();

    let edge = Edge::new("test").with_integration(EnergyWindow::new(104.0, 106.0));
    let window = edge.integration_or_full(image.energy());
    let integrated = image.integrate(window);
    // Channels 4 and 5.
    assert_relative_eq!(integrated[[1, 2]], 3.0 * 4.5);

    // Missing background window falls back to the whole axis.
    let full = edge.background_or_full(image.energy());
    assert_eq!((full.start, full.end), (100.0, 109.0));

    // A zero-width window still selects the channel under it.
    let single = image.integrate(EnergyWindow::new(107.0, 107.0));
    assert_relative_eq!(single[[1, 1]], 2.0 * 7.0);
}

#[test]
fn test_pixel_roi_touches_partial_pixels() {
    let roi = Roi::from_corners([2.6, 0.2], [0.4, 1.1]);
    let (rows, cols) = roi.pixel_ranges(4, 5);
    assert_eq!(rows, 0..2);
    assert_eq!(cols, 0..3);
    assert!(roi.contains(1.0, 1.0));
    assert!(!roi.contains(3.0, 1.0));
}
