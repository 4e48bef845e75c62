//! PNG rendering of cube data and clustering results.
//!
//! Two render paths: an RGB composite of the three display bands (scaled by
//! the loader's rescale factors) and a cluster map where every pixel takes
//! its cluster's color from an HSV wheel. The clustering core never depends
//! on these; they are invoked only when display output is requested.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::loaders::{DataCube, RescaleFactors};

/// Errors that can occur during rendering.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plotting error: {0}")]
    PlottingError(String),

    #[error("empty image")]
    EmptyImage,

    #[error("assignment map length mismatch: {rows}x{cols} pixels but {labels_len} labels")]
    LengthMismatch {
        rows: usize,
        cols: usize,
        labels_len: usize,
    },
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Convert an HSV color to RGB.
///
/// Hue in degrees (0..360), saturation and value in 0..=100, matching the
/// wheel used for cluster colors.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let s = (s / 100.0).clamp(0.0, 1.0);
    let v = (v / 100.0).clamp(0.0, 1.0);
    let h = h.rem_euclid(360.0);

    let c = s * v;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ]
}

/// Evenly-spaced cluster colors around the HSV wheel: `hue = i * 360 / k`
/// at full saturation and value.
pub fn cluster_palette(k: usize) -> Vec<RGBColor> {
    (0..k)
        .map(|i| {
            let [r, g, b] = hsv_to_rgb((i * 360 / k) as f32, 100.0, 100.0);
            RGBColor(r, g, b)
        })
        .collect()
}

/// Render the RGB composite of the cube's three display bands as PNG.
///
/// Each channel value is multiplied by its rescale factor and clamped into
/// 0..=255, reproducing what the sensor's display bands look like to the
/// eye.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `cube` - The loaded data cube
/// * `display_bands` - Indices of the red, green, and blue display bands
/// * `rescale` - Per-channel normalization factors from the loader
pub fn render_rgb_composite(
    output_path: &Path,
    cube: &DataCube,
    display_bands: [usize; 3],
    rescale: &RescaleFactors,
) -> Result<()> {
    if cube.num_pixels() == 0 {
        return Err(VisualizationError::EmptyImage);
    }

    let (rows, cols) = (cube.rows(), cube.cols());
    let root =
        BitMapBackend::new(output_path, (cols as u32, rows as u32)).into_drawing_area();

    let factors = [rescale.red, rescale.green, rescale.blue];
    for row in 0..rows {
        for col in 0..cols {
            let mut channel = [0u8; 3];
            for (out, (&band, &factor)) in channel
                .iter_mut()
                .zip(display_bands.iter().zip(factors.iter()))
            {
                *out = (cube.value(row, col, band) * factor).clamp(0.0, 255.0) as u8;
            }
            let color = RGBColor(channel[0], channel[1], channel[2]);
            root.draw_pixel((col as i32, row as i32), &color)
                .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
        }
    }

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Render an assignment map as PNG, one image pixel per cube pixel.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `rows` - Cube row count
/// * `cols` - Cube column count
/// * `k` - Number of clusters (palette size)
/// * `labels` - Per-pixel cluster ids, length `rows * cols`
///
/// # Errors
///
/// Returns an error if the label count does not match the dimensions or the
/// image cannot be written.
pub fn render_cluster_map(
    output_path: &Path,
    rows: usize,
    cols: usize,
    k: usize,
    labels: &[u32],
) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(VisualizationError::EmptyImage);
    }
    if labels.len() != rows * cols {
        return Err(VisualizationError::LengthMismatch {
            rows,
            cols,
            labels_len: labels.len(),
        });
    }

    let palette = cluster_palette(k);
    let root =
        BitMapBackend::new(output_path, (cols as u32, rows as u32)).into_drawing_area();

    for (index, &label) in labels.iter().enumerate() {
        let color = palette[label as usize % palette.len()];
        root.draw_pixel(((index % cols) as i32, (index / cols) as i32), &color)
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    }

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_hsv_to_rgb_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 100.0, 100.0), [255, 0, 0]);
        assert_eq!(hsv_to_rgb(120.0, 100.0, 100.0), [0, 255, 0]);
        assert_eq!(hsv_to_rgb(240.0, 100.0, 100.0), [0, 0, 255]);
    }

    #[test]
    fn test_hsv_to_rgb_no_saturation_is_gray() {
        let [r, g, b] = hsv_to_rgb(200.0, 0.0, 50.0);
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_cluster_palette_is_distinct_for_small_k() {
        let palette = cluster_palette(6);
        assert_eq!(palette.len(), 6);
        for i in 0..palette.len() {
            for j in (i + 1)..palette.len() {
                assert_ne!(
                    (palette[i].0, palette[i].1, palette[i].2),
                    (palette[j].0, palette[j].1, palette[j].2)
                );
            }
        }
    }

    #[test]
    fn test_render_cluster_map_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusters.png");
        let labels = vec![0u32, 1, 1, 0];

        render_cluster_map(&path, 2, 2, 2, &labels).unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_render_cluster_map_rejects_bad_lengths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusters.png");

        let result = render_cluster_map(&path, 2, 2, 2, &[0, 1]);

        assert!(matches!(
            result,
            Err(VisualizationError::LengthMismatch { labels_len: 2, .. })
        ));
    }

    #[test]
    fn test_render_rgb_composite_writes_png() {
        use crate::core::loaders::DataCube;

        let dir = tempdir().unwrap();
        let path = dir.path().join("composite.png");
        let cube = DataCube::from_data(2, 2, 3, vec![
            10.0, 20.0, 30.0, //
            40.0, 50.0, 60.0, //
            70.0, 80.0, 90.0, //
            100.0, 110.0, 120.0,
        ]);
        let rescale = RescaleFactors {
            red: 2.0,
            green: 2.0,
            blue: 2.0,
        };

        render_rgb_composite(&path, &cube, [0, 1, 2], &rescale).unwrap();

        assert!(path.exists());
    }
}
