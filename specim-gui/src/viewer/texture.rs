//! Texture generation for image panels.

use egui::ColorImage;
use ndarray::Array2;
use rayon::prelude::*;
use specim_core::stats::min_max;

use crate::util::f64_to_f32;
use crate::viewer::Colormap;

/// Normalize an image to `[0, 1]` between its finite extremes.
fn normalizer(image: &Array2<f64>, log_scale: bool) -> impl Fn(f64) -> f32 + Sync {
    let transform = move |v: f64| if log_scale { v.max(0.0).ln_1p() } else { v };
    let finite: Vec<f64> = image
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .map(transform)
        .collect();
    let (lo, hi) = min_max(&finite);
    let span = if hi > lo { hi - lo } else { 1.0 };
    move |v: f64| {
        if v.is_finite() {
            f64_to_f32((transform(v) - lo) / span)
        } else {
            0.0
        }
    }
}

/// Render an image with row 0 at the bottom, matching plot coordinates.
#[must_use]
pub fn image_to_color(image: &Array2<f64>, colormap: Colormap, log_scale: bool) -> ColorImage {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return ColorImage::new([1, 1], egui::Color32::BLACK);
    }
    let normalize = normalizer(image, log_scale);
    let mut pixels = vec![0u8; rows * cols * 4];
    pixels
        .par_chunks_mut(cols * 4)
        .enumerate()
        .for_each(|(display_row, line)| {
            let row = rows - 1 - display_row;
            for (col, px) in line.chunks_exact_mut(4).enumerate() {
                px.copy_from_slice(&colormap.apply(normalize(image[[row, col]])));
            }
        });
    ColorImage::from_rgba_unmultiplied([cols, rows], &pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_flipped() {
        let image = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).unwrap();
        let color = image_to_color(&image, Colormap::Grayscale, false);
        assert_eq!(color.size, [1, 2]);
        // Top display row is the last data row.
        assert_eq!(color.pixels[0], egui::Color32::WHITE);
        assert_eq!(color.pixels[1], egui::Color32::BLACK);
    }

    #[test]
    fn test_constant_image() {
        let image = Array2::from_elem((2, 2), 3.0);
        let color = image_to_color(&image, Colormap::Grayscale, true);
        assert!(color.pixels.iter().all(|&p| p == egui::Color32::BLACK));
    }
}
