#![allow(clippy::uninlined_format_args)]
use approx::assert_relative_eq;
use ndarray::Array3;
use specim_algorithms::{
    fit_background, subtract_background, subtract_background_fast, BackgroundModel, FitOptions,
};
use specim_core::{EnergyAxis, EnergyWindow};

fn loss_axis() -> EnergyAxis {
    EnergyAxis::new((0..300).map(|i| 200.0 + 0.5 * f64::from(i)).collect()).unwrap()
}

/// Pure power-law cube with a different amplitude per pixel.
fn power_law_cube(axis: &EnergyAxis, exponent: f64) -> Array3<f64> {
    Array3::from_shape_fn((3, 4, axis.len()), |(r, c, e)| {
        let amp = 1e7 * (1.0 + r as f64 + 0.5 * c as f64);
        amp * axis.values()[e].powf(-exponent)
    })
}

#[test]
fn test_fast_subtraction_removes_power_law() {
    let axis = loss_axis();
    let cube = power_law_cube(&axis, 3.0);
    let window = EnergyWindow::new(220.0, 260.0);
    let out = subtract_background_fast(&cube, &axis, window, 3.0, &FitOptions::default()).unwrap();
    let start = axis.search_sorted(220.0);
    for ((r, c, e), v) in out.indexed_iter() {
        if e < start {
            assert_eq!(*v, 0.0, "pixel ({}, {}) channel {} before window", r, c, e);
        } else {
            assert!(v.abs() < 1e-9 * cube[[r, c, e]].max(1.0), "residual {}", v);
        }
    }
}

#[test]
fn test_full_subtraction_recovers_exponents() {
    let axis = loss_axis();
    let cube = power_law_cube(&axis, 2.7);
    let window = EnergyWindow::new(210.0, 280.0);
    let res = subtract_background(&cube, &axis, window, &FitOptions::default()).unwrap();
    for r in res.exponents.iter() {
        assert_relative_eq!(*r, 2.7, epsilon = 1e-6);
    }
    assert!(res.lc_exponents.is_none());
    let last = axis.len() - 1;
    assert!(res.subtracted[[2, 3, last]].abs() < 1e-6 * cube[[2, 3, last]]);
}

#[test]
fn test_log_fit_matches_nonlinear_on_clean_data() {
    let axis = loss_axis();
    let cube = power_law_cube(&axis, 3.2);
    let window = EnergyWindow::new(210.0, 280.0);
    let log = subtract_background(&cube, &axis, window, &FitOptions::default().with_log(true))
        .unwrap();
    let nl = subtract_background(&cube, &axis, window, &FitOptions::default()).unwrap();
    for (a, b) in log.exponents.iter().zip(nl.exponents.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-6);
    }
}

#[test]
fn test_exponential_model() {
    let axis = loss_axis();
    let cube = Array3::from_shape_fn((2, 2, axis.len()), |(_, _, e)| {
        50.0 * (-0.02 * axis.values()[e]).exp()
    });
    let opts = FitOptions::default().with_model(BackgroundModel::Exponential);
    let res = subtract_background(&cube, &axis, EnergyWindow::new(210.0, 300.0), &opts).unwrap();
    for r in res.exponents.iter() {
        assert_relative_eq!(*r, 0.02, epsilon = 1e-8);
    }
}

#[test]
fn test_linear_combination_reports_exponents() {
    let axis = loss_axis();
    let cube = Array3::from_shape_fn((4, 4, axis.len()), |(r, c, e)| {
        let exponent = 2.5 + 0.05 * (r * 4 + c) as f64;
        1e7 * axis.values()[e].powf(-exponent)
    });
    let opts = FitOptions::default().with_lc(true);
    let res = subtract_background(&cube, &axis, EnergyWindow::new(210.0, 280.0), &opts).unwrap();
    let (r1, r2) = res.lc_exponents.unwrap();
    assert!(r1 < r2, "r1={} r2={}", r1, r2);
    assert!(r1 > 2.5 && r2 < 3.25);
    assert!(res.subtracted.iter().all(|v| v.is_finite()));
}

#[test]
fn test_lba_on_uniform_cube_matches_plain_fit() {
    let axis = loss_axis();
    let cube = Array3::from_shape_fn((5, 5, axis.len()), |(_, _, e)| {
        3e6 * axis.values()[e].powf(-3.0)
    });
    let window = EnergyWindow::new(210.0, 280.0);
    let plain = subtract_background(&cube, &axis, window, &FitOptions::default()).unwrap();
    let lba = subtract_background(
        &cube,
        &axis,
        window,
        &FitOptions::default().with_lba(true, 3.0),
    )
    .unwrap();
    for (a, b) in plain.subtracted.iter().zip(lba.subtracted.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-6);
    }
}

#[test]
fn test_lc_with_linear_model_rejected() {
    let axis = loss_axis();
    let cube = power_law_cube(&axis, 3.0);
    let opts = FitOptions::default()
        .with_model(BackgroundModel::Linear)
        .with_lc(true);
    assert!(subtract_background(&cube, &axis, EnergyWindow::new(210.0, 280.0), &opts).is_err());
}

#[test]
fn test_single_spectrum_background_zero_before_window() {
    let axis = loss_axis();
    let cube = power_law_cube(&axis, 3.0);
    let spectrum = cube.slice(ndarray::s![0, 0, ..]);
    let (bg, params) = fit_background(
        spectrum,
        &axis,
        EnergyWindow::new(250.0, 280.0),
        &FitOptions::default(),
    )
    .unwrap();
    let start = axis.search_sorted(250.0);
    assert!(bg.iter().take(start).all(|v| *v == 0.0));
    assert_relative_eq!(params.exponent, 3.0, epsilon = 1e-9);
}
