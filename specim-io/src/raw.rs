//! Memory-mapped raw cubes.
//!
//! A raw cube is a headerless little-endian array of `f32` or `f64` in
//! C order `(rows, cols, channels)`. Shape and energy calibration come
//! from the caller.

use crate::{Error, Result};
use memmap2::Mmap;
use ndarray::Array3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sample type of a raw cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RawDtype {
    /// 32-bit float.
    #[default]
    F32,
    /// 64-bit float.
    F64,
}

impl RawDtype {
    /// Bytes per sample.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

impl FromStr for RawDtype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "f32" | "float32" => Ok(Self::F32),
            "f64" | "float64" => Ok(Self::F64),
            other => Err(Error::InvalidFormat(format!("unknown dtype '{other}'"))),
        }
    }
}

/// Shape and sample type of a raw cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawLayout {
    /// `(rows, cols, channels)`.
    pub shape: (usize, usize, usize),
    /// Sample type.
    pub dtype: RawDtype,
}

impl RawLayout {
    /// Expected file size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        let (r, c, e) = self.shape;
        r * c * e * self.dtype.size()
    }
}

/// A memory-mapped raw cube file.
pub struct MappedCubeReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedCubeReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::MmapError(format!("{}: {e}", path.as_ref().display())))?;
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path of the mapped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the mapping as a cube.
    ///
    /// # Errors
    /// Returns an error if the file size does not match the layout.
    pub fn read_cube(&self, layout: &RawLayout) -> Result<Array3<f64>> {
        if self.len() != layout.byte_len() {
            return Err(Error::InvalidFormat(format!(
                "{} holds {} bytes, layout {:?} {:?} needs {}",
                self.path.display(),
                self.len(),
                layout.shape,
                layout.dtype,
                layout.byte_len()
            )));
        }
        let bytes = self.as_bytes();
        let values: Vec<f64> = match layout.dtype {
            RawDtype::F32 => bytes
                .chunks_exact(4)
                .map(|b| f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
                .collect(),
            RawDtype::F64 => bytes
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
        };
        Array3::from_shape_vec(layout.shape, values)
            .map_err(|e| Error::InvalidFormat(e.to_string()))
    }
}

/// Read a raw cube from disk.
///
/// # Errors
/// Returns an error if the file cannot be mapped or has the wrong size.
pub fn read_raw_cube<P: AsRef<Path>>(path: P, layout: &RawLayout) -> Result<Array3<f64>> {
    let reader = MappedCubeReader::open(path)?;
    log::debug!(
        "mapped {} ({} bytes)",
        reader.path().display(),
        reader.len()
    );
    reader.read_cube(layout)
}

/// Write a cube as raw little-endian samples.
///
/// # Errors
/// Returns an error if the file cannot be written.
#[allow(clippy::cast_possible_truncation)]
pub fn write_raw_cube<P: AsRef<Path>>(path: P, cube: &Array3<f64>, dtype: RawDtype) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for &v in cube {
        match dtype {
            RawDtype::F32 => writer.write_all(&(v as f32).to_le_bytes())?,
            RawDtype::F64 => writer.write_all(&v.to_le_bytes())?,
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_raw_f32_roundtrip() {
        let cube = Array3::from_shape_fn((2, 3, 4), |(r, c, e)| (r * 12 + c * 4 + e) as f64 * 0.5);
        let file = NamedTempFile::new().unwrap();
        write_raw_cube(file.path(), &cube, RawDtype::F32).unwrap();
        let layout = RawLayout {
            shape: (2, 3, 4),
            dtype: RawDtype::F32,
        };
        let loaded = read_raw_cube(file.path(), &layout).unwrap();
        assert_eq!(loaded, cube);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let cube = Array3::<f64>::zeros((2, 2, 2));
        let file = NamedTempFile::new().unwrap();
        write_raw_cube(file.path(), &cube, RawDtype::F64).unwrap();
        let layout = RawLayout {
            shape: (2, 2, 3),
            dtype: RawDtype::F64,
        };
        assert!(matches!(
            read_raw_cube(file.path(), &layout),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_dtype_parse() {
        assert_eq!("float64".parse::<RawDtype>().unwrap(), RawDtype::F64);
        assert!("u16".parse::<RawDtype>().is_err());
    }
}
