//! Loader for raw hyperspectral data cubes.
//!
//! Reads a flat little-endian IEEE single-precision stream organized as
//! band-interleaved-by-line (BIL) and converts it into a pixel-major,
//! band-minor cube. During conversion every sentinel sample is scrubbed to
//! zero and the maxima of the three display bands are tracked so the caller
//! can rescale them into the 0..=255 range.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;

use crate::config::CubeConfig;

/// Errors that can occur while loading a data cube.
///
/// All variants are fatal for the run; no partially initialized cube is ever
/// returned.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unable to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while reading '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("short read from '{path}': expected {expected} bytes, got {actual}")]
    ShortRead {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("no positive samples on display band {band}: cannot derive a rescale factor")]
    DegenerateNormalization { band: usize },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// An in-memory hyperspectral cube, immutable after load.
///
/// Storage is flat, pixel-major and band-minor:
/// `index = (row * cols + col) * bands + band`. Pixels are traversed in
/// row-major order, so `pixel(row * cols + col)` yields the full band vector
/// of one pixel as a contiguous slice.
#[derive(Debug, Clone)]
pub struct DataCube {
    rows: usize,
    cols: usize,
    bands: usize,
    data: Vec<f32>,
}

impl DataCube {
    /// Builds a cube from already pixel-major data. Used by tests and by the
    /// loader once conversion is complete.
    pub fn from_data(rows: usize, cols: usize, bands: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), rows * cols * bands);
        Self {
            rows,
            cols,
            bands,
            data,
        }
    }

    /// Number of rows (lines).
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (samples per line).
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of spectral bands per pixel.
    #[inline]
    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Total pixel count.
    #[inline]
    pub fn num_pixels(&self) -> usize {
        self.rows * self.cols
    }

    /// Band vector of the pixel at the given flat index.
    #[inline]
    pub fn pixel(&self, index: usize) -> &[f32] {
        &self.data[index * self.bands..(index + 1) * self.bands]
    }

    /// Single band value at (row, col).
    #[inline]
    pub fn value(&self, row: usize, col: usize, band: usize) -> f32 {
        self.data[(row * self.cols + col) * self.bands + band]
    }

    /// The flat backing storage.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Per-channel factors mapping display band values into 0..=255.
#[derive(Debug, Clone, Copy)]
pub struct RescaleFactors {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

/// Load a raw BIL cube from disk and convert it to pixel-major layout.
///
/// The stream must hold exactly `samples * lines_loaded * bands` little-endian
/// f32 values in band-interleaved-by-line order:
/// `src[row * bands * samples + band * samples + col]`.
///
/// Conversion is row-parallel; rows are independent and the display band
/// maxima are combined with a max-reduction over per-row partials in row
/// order, so the result does not depend on how the work is partitioned.
///
/// # Arguments
///
/// * `path` - Path to the raw binary cube
/// * `config` - Cube geometry, sentinel value, and display band indices
///
/// # Returns
///
/// The converted `DataCube` and the three display rescale factors.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, the stream is shorter than
/// the expected byte count, or a display band carries no positive samples
/// (which would yield an infinite rescale factor).
pub fn load_cube<P: AsRef<Path>>(path: P, config: &CubeConfig) -> Result<(DataCube, RescaleFactors)> {
    let path = path.as_ref();
    let rows = config.lines_loaded();
    let cols = config.samples;
    let bands = config.bands;
    let num_values = rows * cols * bands;

    let raw = read_f32_stream(path, num_values)?;

    let row_len = cols * bands;
    let mut data = vec![0.0f32; num_values];
    let sentinel = config.sentinel;
    let display_bands = [config.red_band, config.green_band, config.blue_band];

    // Reinterleave each line independently: BIL band-major rows become
    // pixel-major rows. Per-row display maxima come back as partials.
    let row_maxima: Vec<[f32; 3]> = data
        .par_chunks_mut(row_len)
        .zip(raw.par_chunks(row_len))
        .map(|(dest_row, src_row)| {
            let mut maxima = [f32::MIN; 3];
            for col in 0..cols {
                for band in 0..bands {
                    let value = src_row[band * cols + col];
                    let value = if value == sentinel { 0.0 } else { value };
                    dest_row[col * bands + band] = value;
                }
                for (m, &band) in maxima.iter_mut().zip(display_bands.iter()) {
                    let value = dest_row[col * bands + band];
                    if value > *m {
                        *m = value;
                    }
                }
            }
            maxima
        })
        .collect();

    // Max is commutative and associative; folding the ordered partials gives
    // the same result as any other partitioning.
    let mut maxima = [f32::MIN; 3];
    for row in &row_maxima {
        for (m, &v) in maxima.iter_mut().zip(row.iter()) {
            if v > *m {
                *m = v;
            }
        }
    }

    for (max, &band) in maxima.iter().zip(display_bands.iter()) {
        if *max <= 0.0 {
            return Err(LoadError::DegenerateNormalization { band });
        }
    }

    let rescale = RescaleFactors {
        red: 255.0 / maxima[0],
        green: 255.0 / maxima[1],
        blue: 255.0 / maxima[2],
    };

    Ok((DataCube::from_data(rows, cols, bands, data), rescale))
}

/// Read exactly `num_values` little-endian f32 values from a file.
fn read_f32_stream(path: &Path, num_values: usize) -> Result<Vec<f32>> {
    let file = File::open(path).map_err(|e| LoadError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);

    let expected = num_values * std::mem::size_of::<f32>();
    let mut bytes = vec![0u8; expected];
    let mut filled = 0;

    while filled < expected {
        match reader.read(&mut bytes[filled..]) {
            Ok(0) => {
                return Err(LoadError::ShortRead {
                    path: path.to_path_buf(),
                    expected,
                    actual: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(LoadError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    let values = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Ok(values)
}
