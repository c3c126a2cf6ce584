use super::*;
use approx::assert_relative_eq;
use specim_core::EnergyMap;

/// Map with loss 100..=200 eV and three incident energies, each a pure
/// `E^-3` power law scaled by `i + 1`.
fn power_law_map() -> Dataset {
    let loss = EnergyAxis::from_calibration(100.0, 1.0, 101).unwrap();
    let incident = EnergyAxis::new(vec![500.0, 501.0, 502.0]).unwrap();
    let lp = Array2::from_shape_fn((3, 101), |(i, e)| {
        let energy = 100.0 + e as f64;
        1e6 * (i + 1) as f64 * energy.powi(-3)
    });
    Dataset::from(EnergyMap::new(lp, loss, incident, None).unwrap())
}

fn edge() -> Edge {
    Edge::new("test")
        .with_background(EnergyWindow::new(110.0, 140.0))
        .with_integration(EnergyWindow::new(150.0, 190.0))
}

#[test]
fn test_no_edge_starts_inactive_with_full_windows() {
    let session = BrowserSession::new(power_law_map(), None);
    assert!(!session.fit_active());
    assert!(!session.int_active());
    assert_eq!(
        session.edge().background,
        Some(EnergyWindow::new(100.0, 200.0))
    );
    assert!(session.background(Panel::Primary).is_none());
    assert_eq!(session.derived_image().dim(), (1, 3));
}

#[test]
fn test_partial_edge_activates_only_given_window() {
    let edge = Edge::new("bg only").with_background(EnergyWindow::new(110.0, 140.0));
    let session = BrowserSession::new(power_law_map(), Some(edge));
    assert!(session.fit_active());
    assert!(!session.int_active());
    assert_eq!(
        session.edge().integration,
        Some(EnergyWindow::new(100.0, 200.0))
    );
    let params = session.background_params(Panel::Primary).unwrap();
    assert_relative_eq!(params.exponent, 3.0, epsilon = 1e-9);
}

#[test]
fn test_initial_y_limits() {
    let mut session = BrowserSession::new(power_law_map(), None);
    // Mean spectrum is 2e6 * E^-3: 2.0 at 100 eV, 0.25 at 200 eV.
    let (lo, hi) = session.y_limits(Panel::Primary);
    assert_relative_eq!(lo, 0.0);
    assert_relative_eq!(hi, 2.2, epsilon = 1e-12);

    session.set_y_log(true);
    let (lo, hi) = session.y_limits(Panel::Primary);
    assert_relative_eq!(lo, 0.2, epsilon = 1e-12);
    assert_relative_eq!(hi, 2.4, epsilon = 1e-12);
}

#[test]
fn test_view_window_rescales_unless_locked() {
    let mut session = BrowserSession::new(power_law_map(), None);
    session.set_view_window(EnergyWindow::new(150.0, 200.0));
    assert_eq!(session.x_limits(Panel::Primary), (150.0, 200.0));
    let (_, hi) = session.y_limits(Panel::Primary);
    assert_relative_eq!(hi, 1.1 * 2e6 / 150f64.powi(3), epsilon = 1e-12);

    session.set_y_locked(true);
    session.set_view_window(EnergyWindow::new(100.0, 200.0));
    let (_, locked_hi) = session.y_limits(Panel::Primary);
    assert_relative_eq!(locked_hi, hi);

    session.set_y_locked(false);
    let (_, hi) = session.y_limits(Panel::Primary);
    assert_relative_eq!(hi, 2.2, epsilon = 1e-12);
}

#[test]
fn test_roi_selects_incident_columns_and_loss_limits() {
    let mut session = BrowserSession::new(power_law_map(), None);
    let roi = Roi::new(500.0, 501.0, 160.0, 120.0);
    assert!(session.select_roi(Panel::Primary, roi).unwrap());
    assert_eq!(session.x_limits(Panel::Primary), (120.0, 160.0));
    // Only the first incident column is covered.
    assert_relative_eq!(session.spectrum(Panel::Primary)[0], 1.0, epsilon = 1e-12);
}

#[test]
fn test_second_roi_ignored_until_enabled() {
    let mut session = BrowserSession::new(power_law_map(), None);
    let roi = Roi::new(501.5, 502.0, 100.0, 200.0);
    assert!(!session.select_roi(Panel::Secondary, roi).unwrap());
    assert!(session.roi(Panel::Secondary).is_none());

    session.set_roi2_enabled(true);
    assert!(session.select_roi(Panel::Secondary, roi).unwrap());
    assert_eq!(session.roi(Panel::Secondary), Some(roi));
    assert_relative_eq!(session.spectrum(Panel::Secondary)[0], 3.0, epsilon = 1e-12);
}

#[test]
fn test_zero_width_roi_still_selects_a_column() {
    let mut session = BrowserSession::new(power_law_map(), None);
    let roi = Roi::new(501.0, 501.0, 100.0, 200.0);
    assert!(session.select_roi(Panel::Primary, roi).unwrap());
    assert_relative_eq!(session.spectrum(Panel::Primary)[0], 2.0, epsilon = 1e-12);
}

#[test]
fn test_subtraction_requires_both_windows() {
    let mut session = BrowserSession::new(power_law_map(), None);
    assert!(!session.fast_subtract().unwrap());
    assert!(!session.full_subtract().unwrap());

    session.set_background_window(EnergyWindow::new(110.0, 140.0));
    assert!(session.fit_active());
    assert!(!session.fast_subtract().unwrap());

    session.set_integration_window(EnergyWindow::new(150.0, 190.0));
    assert!(session.fast_subtract().unwrap());
    assert!(session.subtracted().is_some());
}

#[test]
fn test_fast_subtraction_removes_power_law() {
    let mut session = BrowserSession::new(power_law_map(), Some(edge()));
    let raw = session.derived_image().clone();
    assert!(raw.iter().all(|&v| v > 0.1));

    assert!(session.fast_subtract().unwrap());
    for &v in session.derived_image() {
        assert!(v.abs() < 1e-9, "residual {v}");
    }
    let subtracted = session.subtracted().unwrap();
    // Channels before the background window carry no signal.
    assert_relative_eq!(subtracted[[0, 1, 5]], 0.0);

    session.clear_subtraction();
    assert_eq!(session.derived_image(), &raw);
}

#[test]
fn test_full_subtraction_reports_exponents() {
    let mut session = BrowserSession::new(power_law_map(), Some(edge()));
    assert!(session.full_subtract().unwrap());
    let exponents = session.exponent_map().unwrap();
    assert_eq!(exponents.dim(), (1, 3));
    for &r in exponents {
        assert_relative_eq!(r, 3.0, epsilon = 1e-6);
    }
    for &v in session.derived_image() {
        assert!(v.abs() < 1e-6, "residual {v}");
    }
}

#[test]
fn test_fit_curve_starts_at_background_window() {
    let session = BrowserSession::new(power_law_map(), Some(edge()));
    let (energies, values) = session.subtracted_spectrum(Panel::Primary).unwrap();
    assert_relative_eq!(energies[0], 110.0);
    assert_eq!(energies.len(), values.len());
    assert!(values.iter().all(|v| v.abs() < 1e-9));
}

#[test]
fn test_y_limits_follow_background_while_fitting() {
    let session = BrowserSession::new(power_law_map(), Some(edge()));
    // Background is zero before 110 eV, so the lower limit is zero.
    let (lo, hi) = session.y_limits(Panel::Primary);
    assert_relative_eq!(lo, 0.0);
    assert_relative_eq!(hi, 2.2, epsilon = 1e-12);
}

#[test]
fn test_linear_model_disables_lc() {
    let mut session = BrowserSession::new(power_law_map(), None);
    session.set_fit_flags(true, false, false);
    assert!(session.options().lc);

    session.set_fit_model(BackgroundModel::Linear);
    assert!(!session.options().lc);
    session.set_fit_flags(true, true, false);
    assert!(!session.options().lc);
    assert!(session.options().lba);
}

#[test]
fn test_text_fields_reject_bad_input() {
    let mut session = BrowserSession::new(power_law_map(), None);
    assert!(session.set_lc_percentiles("(5, 95, 3)").is_err());
    assert!(session.set_lc_percentiles("(-1, 50)").is_err());
    assert_eq!(session.options().lc_percentiles, (5.0, 95.0));
    assert_eq!(session.set_lc_percentiles("[10 90]").unwrap(), (10.0, 90.0));
    assert_eq!(session.options().lc_percentiles, (10.0, 90.0));

    assert!(session.set_lba_fwhm("0").is_err());
    assert!(session.set_lba_fwhm("3+4").is_err());
    assert_relative_eq!(session.options().lba_fwhm, 5.0);
    assert_relative_eq!(session.set_lba_fwhm("2.5").unwrap(), 2.5);
}

#[test]
fn test_failed_fit_is_recorded() {
    let loss = EnergyAxis::from_calibration(100.0, 1.0, 20).unwrap();
    let incident = EnergyAxis::new(vec![1.0, 2.0]).unwrap();
    let lp = Array2::from_elem((2, 20), -1.0);
    let dataset = Dataset::from(EnergyMap::new(lp, loss, incident, None).unwrap());
    let edge = Edge::new("neg").with_background(EnergyWindow::new(100.0, 110.0));
    let session = BrowserSession::new(dataset, Some(edge));
    assert!(session.background(Panel::Primary).is_none());
    assert!(session.last_error().is_some());
}

#[test]
fn test_successful_refit_clears_error() {
    // Negative counts below 110 eV, a power law above.
    let loss = EnergyAxis::from_calibration(100.0, 1.0, 60).unwrap();
    let incident = EnergyAxis::new(vec![1.0, 2.0]).unwrap();
    let lp = Array2::from_shape_fn((2, 60), |(_, e)| {
        let energy = 100.0 + e as f64;
        if energy < 110.0 {
            -1.0
        } else {
            1e6 * energy.powi(-3)
        }
    });
    let dataset = Dataset::from(EnergyMap::new(lp, loss, incident, None).unwrap());
    let edge = Edge::new("neg").with_background(EnergyWindow::new(100.0, 108.0));
    let mut session = BrowserSession::new(dataset, Some(edge));
    assert!(session.last_error().is_some());

    session.set_background_window(EnergyWindow::new(120.0, 140.0));
    assert!(session.background(Panel::Primary).is_some());
    assert!(session.last_error().is_none());
}

#[test]
fn test_tools_replace_cube_and_clear_subtraction() {
    let mut session = BrowserSession::new(power_law_map(), Some(edge()));
    assert!(session.fast_subtract().unwrap());

    let report = session.remove_outliers(&OutlierConfig::default()).unwrap();
    assert_eq!(report.channels_replaced, 0);
    assert!(session.subtracted().is_none());
    assert!(session.background(Panel::Primary).is_some());

    session.shear(0.0, ShearAxis::X).unwrap();
    assert_relative_eq!(session.spectrum(Panel::Primary)[0], 2.0, epsilon = 1e-9);

    let scree = session.pca_scree(10).unwrap();
    assert!(!scree.is_empty());
    assert!(scree.iter().sum::<f64>() <= 1.0 + 1e-9);
    assert!(session.pca_filter(0).is_err());
}
