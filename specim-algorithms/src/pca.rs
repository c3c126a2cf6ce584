//! Principal component analysis for denoising spectrum images.
//!
//! The cube is unfolded into a `channels x pixels` matrix and scaled to
//! `[0, 1]` with its global minimum and peak-to-peak range. Channels are
//! treated as samples and pixels as features, so components live in pixel
//! space and their scores are spectra.
//!
//! Instead of a full SVD of the (usually very wide) data matrix, the
//! `channels x channels` Gram matrix is diagonalised. Its eigenvalues are
//! the squared singular values and its eigenvectors the left singular
//! vectors, which is all a reconstruction needs.

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, Array3};
use specim_core::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// PCA settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PcaConfig {
    /// Components kept by the filter.
    pub n_components: usize,
    /// Explained-variance ratios reported for the scree plot.
    pub scree_components: usize,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            n_components: 10,
            scree_components: 50,
        }
    }
}

impl PcaConfig {
    /// Set the number of kept components.
    #[must_use]
    pub fn with_components(mut self, n_components: usize) -> Self {
        self.n_components = n_components;
        self
    }
}

/// Filtered cube and component scores.
#[derive(Debug, Clone)]
pub struct PcaFilterResult {
    /// Reconstruction from the leading components, in original units.
    pub filtered: Array3<f64>,
    /// Scores, `channels x n_components`.
    pub scores: Array2<f64>,
}

struct Decomposition {
    /// Centred, normalised data (`channels x pixels`).
    centred: DMatrix<f64>,
    /// Per-pixel mean over channels, normalised units.
    mean: Vec<f64>,
    /// Eigenvalues of the Gram matrix, descending.
    eigenvalues: Vec<f64>,
    /// Matching eigenvectors as columns.
    eigenvectors: DMatrix<f64>,
    data_min: f64,
    data_range: f64,
    rank: usize,
}

fn decompose(cube: &Array3<f64>) -> Result<Decomposition> {
    let (rows, cols, channels) = cube.dim();
    let pixels = rows * cols;
    if pixels == 0 || channels == 0 {
        return Err(Error::EmptySelection("PCA of an empty cube".into()));
    }
    if let Some(i) = cube.iter().position(|v| !v.is_finite()) {
        let (r, c, e) = (i / (cols * channels), i / channels % cols, i % channels);
        return Err(Error::InvalidParameter(format!(
            "PCA input holds a non-finite value at pixel ({r}, {c}) channel {e}"
        )));
    }
    let (data_min, data_max) = cube
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let data_range = data_max - data_min;
    if !(data_range.is_finite() && data_range > 0.0) {
        return Err(Error::InvalidParameter(
            "PCA needs a cube with a non-zero intensity range".into(),
        ));
    }

    let mut centred = DMatrix::from_fn(channels, pixels, |e, p| {
        (cube[[p / cols, p % cols, e]] - data_min) / data_range
    });
    #[allow(clippy::cast_precision_loss)]
    let n = channels as f64;
    let mean: Vec<f64> = (0..pixels).map(|p| centred.column(p).sum() / n).collect();
    for (p, m) in mean.iter().enumerate() {
        centred.column_mut(p).add_scalar_mut(-m);
    }

    let gram = &centred * centred.transpose();
    let eig = SymmetricEigen::new(gram);
    let mut order: Vec<usize> = (0..channels).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let eigenvalues: Vec<f64> = order.iter().map(|&i| eig.eigenvalues[i].max(0.0)).collect();
    let mut eigenvectors =
        DMatrix::from_fn(channels, channels, |r, c| eig.eigenvectors[(r, order[c])]);
    flip_signs(&mut eigenvectors);

    Ok(Decomposition {
        centred,
        mean,
        eigenvalues,
        eigenvectors,
        data_min,
        data_range,
        rank: channels.min(pixels),
    })
}

/// Make the largest-magnitude entry of each component positive.
fn flip_signs(vectors: &mut DMatrix<f64>) {
    for mut col in vectors.column_iter_mut() {
        let mut best = 0.0_f64;
        for &v in col.iter() {
            if v.abs() > best.abs() {
                best = v;
            }
        }
        if best < 0.0 {
            col.neg_mut();
        }
    }
}

/// Explained-variance ratios of the first `max_components` components.
///
/// Ratios are non-increasing and sum to at most one.
///
/// # Errors
/// Returns an error for an empty, constant or non-finite cube.
pub fn pca_scree(cube: &Array3<f64>, max_components: usize) -> Result<Vec<f64>> {
    let d = decompose(cube)?;
    let total: f64 = d.eigenvalues.iter().take(d.rank).sum();
    if total <= 0.0 {
        return Ok(vec![0.0; max_components.min(d.rank)]);
    }
    Ok(d.eigenvalues
        .iter()
        .take(d.rank.min(max_components))
        .map(|v| v / total)
        .collect())
}

/// Reconstruct the cube from its leading `n_components` components.
///
/// # Errors
/// Returns an error if `n_components` is zero or larger than the number of
/// available components, or for an empty, constant or non-finite cube.
pub fn pca_filter(cube: &Array3<f64>, n_components: usize) -> Result<PcaFilterResult> {
    let d = decompose(cube)?;
    if n_components == 0 || n_components > d.rank {
        return Err(Error::InvalidParameter(format!(
            "n_components must be in 1..={}, got {n_components}",
            d.rank
        )));
    }
    let (rows, cols, channels) = cube.dim();
    let u = d.eigenvectors.columns(0, n_components);
    let projection = u.transpose() * &d.centred;
    let recon = &u * &projection;

    let scores = Array2::from_shape_fn((channels, n_components), |(e, k)| {
        u[(e, k)] * d.eigenvalues[k].sqrt()
    });
    let filtered = Array3::from_shape_fn((rows, cols, channels), |(r, c, e)| {
        let p = r * cols + c;
        (recon[(e, p)] + d.mean[p]) * d.data_range + d.data_min
    });
    log::debug!("PCA filter kept {n_components} of {} components", d.rank);
    Ok(PcaFilterResult { filtered, scores })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube() -> Array3<f64> {
        Array3::from_shape_fn((3, 4, 6), |(r, c, e)| {
            let (r, c, e) = (r as f64, c as f64, e as f64);
            (1.0 + r) * (-0.3 * e).exp() + 0.5 * c * (e / 5.0) + 0.01 * ((r * 7.0 + c * 3.0 + e) % 5.0)
        })
    }

    #[test]
    fn test_full_rank_reconstruction() {
        let c = cube();
        let res = pca_filter(&c, 6).unwrap();
        for (a, b) in res.filtered.iter().zip(c.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-8);
        }
        assert_eq!(res.scores.dim(), (6, 6));
    }

    #[test]
    fn test_scree_ratios() {
        let ratios = pca_scree(&cube(), 50).unwrap();
        assert_eq!(ratios.len(), 6);
        let total: f64 = ratios.iter().sum();
        assert!(total <= 1.0 + 1e-12);
        for w in ratios.windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn test_invalid_component_count() {
        assert!(pca_filter(&cube(), 0).is_err());
        assert!(pca_filter(&cube(), 7).is_err());
        assert!(pca_filter(&Array3::from_elem((2, 2, 3), 1.0), 1).is_err());
    }

    #[test]
    fn test_non_finite_cube_rejected() {
        let mut c = cube();
        c[[1, 2, 3]] = f64::NAN;
        assert!(matches!(pca_scree(&c, 50), Err(Error::InvalidParameter(_))));
        assert!(matches!(pca_filter(&c, 2), Err(Error::InvalidParameter(_))));
        c[[1, 2, 3]] = f64::INFINITY;
        assert!(pca_scree(&c, 50).is_err());
    }
}
