//! Spatial Gaussian smoothing of spectrum-image cubes.

use ndarray::{Array3, Zip};

/// Convert a full width at half maximum to a standard deviation.
#[must_use]
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt())
}

/// Normalised 1D Gaussian kernel truncated at 4 sigma.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return vec![1.0];
    }
    let radius = (4.0 * sigma + 0.5) as usize;
    let mut k: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-0.5 * x * x / (sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    k
}

/// Half-sample symmetric reflection (`d c b a | a b c d | d c b a`).
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn reflect(mut i: isize, n: usize) -> usize {
    let n = n as isize;
    if n == 1 {
        return 0;
    }
    let period = 2 * n;
    i = i.rem_euclid(period);
    if i >= n {
        i = period - 1 - i;
    }
    i as usize
}

/// Smooth each energy channel with a separable spatial Gaussian.
///
/// `fwhm` is in pixels. Edges are handled by reflection. The energy axis
/// is left untouched.
#[must_use]
pub fn gaussian_filter_spatial(cube: &Array3<f64>, fwhm: f64) -> Array3<f64> {
    let kernel = gaussian_kernel(fwhm_to_sigma(fwhm));
    if kernel.len() == 1 {
        return cube.clone();
    }
    let along_rows = convolve_axis(cube, &kernel, 0);
    convolve_axis(&along_rows, &kernel, 1)
}

#[allow(clippy::cast_possible_wrap)]
fn convolve_axis(src: &Array3<f64>, kernel: &[f64], axis: usize) -> Array3<f64> {
    let n = if axis == 0 { src.dim().0 } else { src.dim().1 };
    let radius = (kernel.len() / 2) as isize;
    let mut out = Array3::zeros(src.dim());
    Zip::indexed(&mut out).par_for_each(|(r, c, e), o| {
        let centre = (if axis == 0 { r } else { c }) as isize;
        let mut acc = 0.0;
        for (k, w) in kernel.iter().enumerate() {
            let j = reflect(centre + k as isize - radius, n);
            acc += w * if axis == 0 { src[[j, c, e]] } else { src[[r, j, e]] };
        }
        *o = acc;
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reflect_indices() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(9, 4), 1);
        assert_eq!(reflect(-3, 1), 0);
    }

    #[test]
    fn test_kernel_normalised() {
        let k = gaussian_kernel(1.5);
        assert_eq!(k.len(), 2 * 6 + 1);
        assert_relative_eq!(k.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(fwhm_to_sigma(2.354_820_045), 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_constant_cube_unchanged() {
        let cube = Array3::from_elem((5, 4, 3), 2.5);
        let smooth = gaussian_filter_spatial(&cube, 3.0);
        for v in &smooth {
            assert_relative_eq!(*v, 2.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_preserves_total_with_reflection() {
        let mut cube = Array3::zeros((7, 7, 1));
        cube[[3, 3, 0]] = 1.0;
        let smooth = gaussian_filter_spatial(&cube, 1.0);
        assert_relative_eq!(smooth.sum(), 1.0, epsilon = 1e-9);
        assert!(smooth[[3, 3, 0]] < 1.0);
        assert!(smooth[[3, 4, 0]] > 0.0);
    }
}
