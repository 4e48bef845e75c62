//! End-to-end tests: raw BIL file on disk through loading, clustering, and
//! K-search.

use std::io::Write;

use tempfile::NamedTempFile;

use hyperspec_pipeline::config::CubeConfig;
use hyperspec_pipeline::core::loaders::{load_cube, LoadError};
use hyperspec_pipeline::processors::search::{run_search, SearchParams};
use hyperspec_pipeline::KmeansEngine;

/// Writes single-band pixel values as a little-endian BIL stream. With one
/// band, BIL order and row-major pixel order coincide.
fn write_single_band_file(values: &[f32]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for v in values {
        file.write_all(&v.to_le_bytes()).unwrap();
    }
    file.flush().unwrap();
    file
}

fn single_band_config(samples: usize, lines: usize) -> CubeConfig {
    CubeConfig {
        samples,
        lines,
        bands: 1,
        red_band: 0,
        green_band: 0,
        blue_band: 0,
        data_usage: 4,
        ..CubeConfig::default()
    }
}

/// 6x6 single-band image with three value groups of twelve pixels each.
fn three_group_values() -> Vec<f32> {
    let mut values = Vec::with_capacity(36);
    for row in 0..6 {
        let value = match row {
            0 | 1 => 1.0,
            2 | 3 => 50.0,
            _ => 100.0,
        };
        values.extend(std::iter::repeat(value).take(6));
    }
    values
}

#[test]
fn loaded_cube_never_contains_the_sentinel() {
    let mut values = three_group_values();
    values[7] = -9999.0;
    values[22] = -9999.0;
    let file = write_single_band_file(&values);

    let (cube, _) = load_cube(file.path(), &single_band_config(6, 6)).unwrap();

    assert!(cube.data().iter().all(|&v| v != -9999.0));
    assert_eq!(cube.pixel(7), &[0.0]);
    assert_eq!(cube.pixel(22), &[0.0]);
}

#[test]
fn truncated_stream_yields_load_error_not_a_partial_cube() {
    let values = three_group_values();
    let file = write_single_band_file(&values[..20]);

    let result = load_cube(file.path(), &single_band_config(6, 6));

    assert!(matches!(result, Err(LoadError::ShortRead { .. })));
}

#[test]
fn clustering_a_loaded_cube_is_deterministic() {
    let file = write_single_band_file(&three_group_values());
    let (cube, _) = load_cube(file.path(), &single_band_config(6, 6)).unwrap();

    let engine = KmeansEngine::new(3, 5);
    let a = engine.run(&cube, None);
    let b = engine.run(&cube, None);

    assert_eq!(a.assignments, b.assignments);
    assert_eq!(a.variance, b.variance);
}

#[test]
fn search_over_loaded_cube_selects_three_groups() {
    let file = write_single_band_file(&three_group_values());
    let (cube, _) = load_cube(file.path(), &single_band_config(6, 6)).unwrap();

    let params = SearchParams {
        max_clusters: 4,
        search: true,
        max_iterations: 5,
        search_threads: 1,
        kmeans_threads: 2,
    };
    let (outcome, runs) = run_search(&cube, &params, None).unwrap();

    assert_eq!(outcome.best_k, 3);
    assert_eq!(outcome.best_variance, 0.0);
    assert_eq!(runs.len(), 3);

    // The winning run separates the groups exactly.
    let best = runs.iter().find(|run| run.k == 3).unwrap();
    let group_of = |pixel: usize| best.assignments[pixel];
    for row in 0..6 {
        for col in 0..6 {
            let expected = group_of(row / 2 * 2 * 6);
            assert_eq!(best.assignments[row * 6 + col], expected);
        }
    }
    assert_eq!(best.cluster_sizes.iter().sum::<u64>(), 36);
}
