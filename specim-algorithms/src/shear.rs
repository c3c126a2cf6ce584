//! Shear correction for spectrum images and their dark-field images.
//!
//! Scan distortion tilts features by a constant angle. The cube is
//! resampled with bilinear interpolation in the spatial plane; the energy
//! axis is carried along unchanged.

use ndarray::{Array2, Array3, Axis, Zip};

/// Direction of the shear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShearAxis {
    /// Columns slide along the row direction (`x` shear).
    X,
    /// Rows slide along the column direction (`y` shear).
    Y,
}

const EDGE_TOLERANCE: f64 = 1e-9;

/// Input sample position for output pixel `(r, c)`.
#[allow(clippy::cast_precision_loss)]
fn source(axis: ShearAxis, a: f64, r: usize, c: usize) -> (f64, f64) {
    let (rf, cf) = (r as f64, c as f64);
    match axis {
        ShearAxis::Y => (rf + a * cf, cf),
        ShearAxis::X => (rf, a * rf + cf),
    }
}

/// Bilinear weights for a position, or `None` outside `[0, n - 1]`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn interp(pos: f64, n: usize) -> Option<(usize, usize, f64)> {
    let max = (n - 1) as f64;
    if pos < -EDGE_TOLERANCE || pos > max + EDGE_TOLERANCE {
        return None;
    }
    let pos = pos.clamp(0.0, max);
    let i0 = pos.floor() as usize;
    let i1 = (i0 + 1).min(n - 1);
    Some((i0, i1, pos - i0 as f64))
}

/// Bilinear sample points and weights for output pixel `(r, c)`.
fn stencil(
    axis: ShearAxis,
    a: f64,
    r: usize,
    c: usize,
    rows: usize,
    cols: usize,
) -> Option<[(usize, usize, f64); 4]> {
    let (pr, pc) = source(axis, a, r, c);
    let (r0, r1, fr) = interp(pr, rows)?;
    let (c0, c1, fc) = interp(pc, cols)?;
    Some([
        (r0, c0, (1.0 - fr) * (1.0 - fc)),
        (r0, c1, (1.0 - fr) * fc),
        (r1, c0, fr * (1.0 - fc)),
        (r1, c1, fr * fc),
    ])
}

/// Shear a 2D image. Samples falling outside the input are zero.
#[must_use]
pub fn shear_image(image: &Array2<f64>, angle_deg: f64, axis: ShearAxis) -> Array2<f64> {
    if angle_deg == 0.0 {
        return image.clone();
    }
    let a = angle_deg.to_radians().tan();
    let (rows, cols) = image.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        stencil(axis, a, r, c, rows, cols).map_or(0.0, |pts| {
            pts.iter().map(|&(i, j, w)| w * image[[i, j]]).sum()
        })
    })
}

/// Shear every energy slice of a cube, and the ADF image if given.
///
/// An angle of zero returns copies of the inputs.
#[must_use]
pub fn shear(
    cube: &Array3<f64>,
    adf: Option<&Array2<f64>>,
    angle_deg: f64,
    axis: ShearAxis,
) -> (Array3<f64>, Option<Array2<f64>>) {
    let adf_out = adf.map(|img| shear_image(img, angle_deg, axis));
    if angle_deg == 0.0 {
        return (cube.clone(), adf_out);
    }
    let a = angle_deg.to_radians().tan();
    let (rows, cols, channels) = cube.dim();
    let mut out = Array3::zeros((rows, cols, channels));
    Zip::indexed(out.lanes_mut(Axis(2))).par_for_each(|(r, c), mut spectrum| {
        if let Some(pts) = stencil(axis, a, r, c, rows, cols) {
            for &(i, j, w) in &pts {
                if w == 0.0 {
                    continue;
                }
                spectrum.scaled_add(w, &cube.slice(ndarray::s![i, j, ..]));
            }
        }
    });
    log::debug!("sheared {rows}x{cols} cube by {angle_deg} deg along {axis:?}");
    (out, adf_out)
}

/// Shear along `x`: output `(r, c)` samples input `(r, tan(angle) * r + c)`.
#[must_use]
pub fn shear_x(
    cube: &Array3<f64>,
    adf: Option<&Array2<f64>>,
    angle_deg: f64,
) -> (Array3<f64>, Option<Array2<f64>>) {
    shear(cube, adf, angle_deg, ShearAxis::X)
}

/// Shear along `y`: output `(r, c)` samples input `(r + tan(angle) * c, c)`.
#[must_use]
pub fn shear_y(
    cube: &Array3<f64>,
    adf: Option<&Array2<f64>>,
    angle_deg: f64,
) -> (Array3<f64>, Option<Array2<f64>>) {
    shear(cube, adf, angle_deg, ShearAxis::Y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube() -> Array3<f64> {
        Array3::from_shape_fn((4, 4, 2), |(r, c, e)| (r * 4 + c) as f64 + 100.0 * e as f64)
    }

    #[test]
    fn test_zero_angle_is_identity() {
        let c = cube();
        let adf = Array2::from_elem((4, 4), 3.0);
        let (out, adf_out) = shear_y(&c, Some(&adf), 0.0);
        assert_eq!(out, c);
        assert_eq!(adf_out.unwrap(), adf);
    }

    #[test]
    fn test_45_degree_y_shear_moves_rows() {
        let c = cube();
        let (out, _) = shear_y(&c, None, 45.0);
        // output (r, c) = input (r + c, c)
        assert_relative_eq!(out[[0, 1, 0]], c[[1, 1, 0]], epsilon = 1e-9);
        assert_relative_eq!(out[[1, 2, 1]], c[[3, 2, 1]], epsilon = 1e-9);
        // out of range -> 0
        assert_relative_eq!(out[[2, 3, 0]], 0.0);
    }

    #[test]
    fn test_x_shear_interpolates() {
        let img = Array2::from_shape_fn((3, 3), |(_, c)| c as f64);
        let angle = 0.5_f64.atan().to_degrees();
        let out = shear_image(&img, angle, ShearAxis::X);
        // row 1 samples columns c + 0.5
        assert_relative_eq!(out[[1, 0]], 0.5, epsilon = 1e-9);
        assert_relative_eq!(out[[1, 1]], 1.5, epsilon = 1e-9);
        assert_relative_eq!(out[[1, 2]], 0.0);
        // row 0 is unchanged
        assert_relative_eq!(out[[0, 2]], 2.0, epsilon = 1e-9);
    }
}
