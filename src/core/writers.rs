//! Writers for clustering results.
//!
//! Two outputs: the final assignment map as CSV (one row per pixel, keyed by
//! image coordinates) and a per-K timing log summarizing iteration counts,
//! wall-clock time, and variance.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::processors::kmeans::KmeansRun;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Assignment map does not match the cube dimensions.
    #[error("assignment map length mismatch: {rows}x{cols} pixels but {labels_len} labels")]
    LengthMismatch {
        rows: usize,
        cols: usize,
        labels_len: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Write an assignment map to CSV.
///
/// Creates a CSV file with headers "row,col,cluster" holding one record per
/// pixel in row-major order, preceded by no metadata; the cube dimensions
/// are implied by the coordinates.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `rows` - Cube row count
/// * `cols` - Cube column count
/// * `labels` - Per-pixel cluster ids, length `rows * cols`
///
/// # Errors
///
/// Returns an error if the label count does not match the dimensions or the
/// file cannot be created or written to.
pub fn write_assignments_csv(path: &Path, rows: usize, cols: usize, labels: &[u32]) -> Result<()> {
    if labels.len() != rows * cols {
        return Err(WriteError::LengthMismatch {
            rows,
            cols,
            labels_len: labels.len(),
        });
    }

    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let buf_writer = BufWriter::new(file);
    let mut csv_writer = csv::Writer::from_writer(buf_writer);

    let path_str = path.display().to_string();

    csv_writer
        .write_record(["row", "col", "cluster"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for (index, label) in labels.iter().enumerate() {
        let row = index / cols;
        let col = index % cols;
        csv_writer
            .write_record(&[row.to_string(), col.to_string(), label.to_string()])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write the per-K timing log.
///
/// One line per completed run with iteration count, total seconds, seconds
/// per iteration, and final variance.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_timing_log(path: &Path, runs: &[KmeansRun]) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    let path_str = path.display().to_string();

    for run in runs {
        let total = run.elapsed.as_secs_f64();
        writeln!(
            writer,
            "k={}: iterations={}, total={:.6}s, per-iteration={:.6}s, variance={:.6}",
            run.k,
            run.iterations,
            total,
            total / run.iterations as f64,
            run.variance
        )
        .map_err(|e| WriteError::WriteFile {
            path: path_str.clone(),
            source: e,
        })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::DataCube;
    use crate::processors::kmeans::KmeansEngine;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_assignments_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("assignments.csv");
        let labels = vec![0u32, 1, 1, 0];

        write_assignments_csv(&path, 2, 2, &labels).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "row,col,cluster");
        assert_eq!(lines.len(), 5); // header + 4 pixels
        assert_eq!(lines[1], "0,0,0");
        assert_eq!(lines[2], "0,1,1");
        assert_eq!(lines[4], "1,1,0");
    }

    #[test]
    fn test_write_assignments_csv_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out").join("assignments.csv");

        write_assignments_csv(&path, 1, 2, &[0, 1]).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_write_assignments_csv_length_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("assignments.csv");

        let result = write_assignments_csv(&path, 2, 2, &[0, 1, 2]);

        match result {
            Err(WriteError::LengthMismatch {
                rows,
                cols,
                labels_len,
            }) => {
                assert_eq!(rows, 2);
                assert_eq!(cols, 2);
                assert_eq!(labels_len, 3);
            }
            _ => panic!("expected LengthMismatch error"),
        }
    }

    #[test]
    fn test_write_timing_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("time.log");

        let cube = DataCube::from_data(2, 2, 1, vec![0.0, 0.0, 10.0, 10.0]);
        let run = KmeansEngine::new(2, 3).run(&cube, None);

        write_timing_log(&path, &[run]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("k=2: iterations=3, total="));
        assert!(content.contains("variance="));
    }
}
