//! Hyperspectral data cube clustering pipeline.
//!
//! This crate provides tools for:
//! - Loading raw band-interleaved-by-line (BIL) hyperspectral cubes into a
//!   pixel-major in-memory layout, with sentinel scrubbing and display-band
//!   normalization
//! - Iterative K-means clustering of cube pixels (parallelized)
//! - Searching a range of K values, optionally overlapping several K-means
//!   instances, and selecting the K with minimum within-cluster variance
//! - Writing assignment maps and timing logs, and rendering PNG composites
//!   and cluster maps
//!
//! # Example
//!
//! ```no_run
//! use hyperspec_pipeline::core::loaders::load_cube;
//! use hyperspec_pipeline::processors::search::{run_search, SearchParams};
//! use hyperspec_pipeline::config::CubeConfig;
//!
//! let (cube, _rescale) = load_cube("cube.raw", &CubeConfig::default()).unwrap();
//! let params = SearchParams {
//!     max_clusters: 8,
//!     search: true,
//!     max_iterations: 10,
//!     search_threads: 2,
//!     kmeans_threads: 4,
//! };
//! let (outcome, _runs) = run_search(&cube, &params, None).unwrap();
//! println!("best K: {}", outcome.best_k);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{
    ClusteringConfig, ConfigError, CubeConfig, DisplayConfig, PipelineConfig, SchedulerConfig,
};
pub use core::loaders::{DataCube, LoadError, RescaleFactors};
pub use processors::kmeans::{KmeansEngine, KmeansRun};
pub use processors::search::{run_search, SearchOutcome, SearchParams};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
