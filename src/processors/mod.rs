//! Clustering processors: vector kernels, the K-means engine, and the
//! K-search scheduler.

pub mod kernels;
pub mod kmeans;
pub mod search;

pub use kmeans::{Centroids, KmeansEngine, KmeansRun};
pub use search::{run_search, SearchOutcome, SearchParams};
