use approx::assert_relative_eq;
use ndarray::{Array2, Array3};
use specim_algorithms::{
    pca_filter, pca_scree, remove_outliers, shear_image, shear_x, shear_y, OutlierConfig,
    ShearAxis,
};

#[test]
fn test_shear_x_one_pixel_per_row() {
    let cube = Array3::from_shape_fn((3, 5, 2), |(r, c, e)| (10 * r + c + 100 * e) as f64);
    let adf = Array2::from_shape_fn((3, 5), |(r, c)| (10 * r + c) as f64);
    let (out, adf_out) = shear_x(&cube, Some(&adf), 45.0);
    let adf_out = adf_out.unwrap();
    // row r samples column c + r
    for r in 0..3 {
        for c in 0..5 {
            let expected = if c + r < 5 { cube[[r, c + r, 1]] } else { 0.0 };
            assert_relative_eq!(out[[r, c, 1]], expected, epsilon = 1e-9);
            let expected = if c + r < 5 { adf[[r, c + r]] } else { 0.0 };
            assert_relative_eq!(adf_out[[r, c]], expected, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_shear_y_carries_adf_along() {
    let cube = Array3::from_shape_fn((5, 3, 2), |(r, c, e)| (10 * r + c + 100 * e) as f64);
    let adf = Array2::from_shape_fn((5, 3), |(r, c)| (1 + 10 * r + c) as f64);
    let (out, adf_out) = shear_y(&cube, Some(&adf), 45.0);
    let adf_out = adf_out.unwrap();
    // column c samples row r + c
    for r in 0..5 {
        for c in 0..3 {
            let inside = r + c < 5;
            let expected = if inside { cube[[r + c, c, 0]] } else { 0.0 };
            assert_relative_eq!(out[[r, c, 0]], expected, epsilon = 1e-9);
            let expected = if inside { adf[[r + c, c]] } else { 0.0 };
            assert_relative_eq!(adf_out[[r, c]], expected, epsilon = 1e-9);
        }
    }

    // A fractional angle interpolates the ADF the same way as each slice.
    let angle = 0.5_f64.atan().to_degrees();
    let slice = cube.slice(ndarray::s![.., .., 1]).to_owned();
    let (out, adf_out) = shear_y(&cube, Some(&slice), angle);
    let direct = shear_image(&slice, angle, ShearAxis::Y);
    assert_eq!(adf_out.unwrap(), direct);
    for ((r, c), v) in direct.indexed_iter() {
        assert_relative_eq!(out[[r, c, 1]], *v, epsilon = 1e-9);
    }
    // row 0, column 1 samples row 0.5
    assert_relative_eq!(direct[[0, 1]], 100.0 + 5.0 + 1.0, epsilon = 1e-9);
}

#[test]
fn test_outliers_then_pca_keeps_shape() {
    let mut cube = Array3::from_shape_fn((4, 4, 20), |(r, c, e)| {
        (1.0 + 0.1 * r as f64) * (-(e as f64) / 8.0).exp() + 0.05 * c as f64
    });
    cube[[2, 2, 7]] = 1e4;
    let (clean, report) = remove_outliers(&cube, &OutlierConfig::default());
    assert_eq!(report.spectra_cleaned, 1);
    assert!(clean[[2, 2, 7]] < 10.0);

    let ratios = pca_scree(&clean, 50).unwrap();
    assert_eq!(ratios.len(), 16.min(20));
    assert!(ratios[0] > 0.5);

    let res = pca_filter(&clean, 3).unwrap();
    assert_eq!(res.filtered.dim(), clean.dim());
    assert_eq!(res.scores.dim(), (20, 3));
}
