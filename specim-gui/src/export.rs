//! TIFF export of derived images.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use tiff::encoder::{colortype, TiffEncoder};

use crate::util::f64_to_f32;

/// Write an image as a single-page 32-bit float TIFF, row 0 first.
///
/// # Errors
/// Returns an error if the file cannot be created or encoded.
pub fn write_tiff(path: &Path, image: &Array2<f64>) -> Result<()> {
    let (rows, cols) = image.dim();
    let width = u32::try_from(cols).context("image too wide for TIFF")?;
    let height = u32::try_from(rows).context("image too tall for TIFF")?;
    let samples: Vec<f32> = image.iter().map(|&v| f64_to_f32(v)).collect();

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    encoder
        .write_image::<colortype::Gray32Float>(width, height, &samples)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("exported {rows}x{cols} image to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_tiff_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.tif");
        let image = Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f64);
        write_tiff(&path, &image).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(&bytes[..4] == b"II*\0" || &bytes[..4] == b"MM\0*");
        assert!(bytes.len() > 3 * 4 * 4);
    }
}
