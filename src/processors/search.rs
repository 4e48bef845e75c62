//! K-search scheduler: runs one K-means instance per candidate K and picks
//! the K with minimum within-cluster variance.
//!
//! Parallelism is two-level. An outer pool fans candidate K values out
//! across up to `search_threads` concurrent engine instances; each instance
//! installs its own inner pool of `kmeans_threads` workers for the per-pixel
//! work. Instances share nothing but the read-only cube; the winner is
//! picked only after every instance has joined, so completion order never
//! influences the result.

use log::{error, info};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;

use crate::core::loaders::DataCube;
use crate::processors::kmeans::{KmeansEngine, KmeansRun};

/// Errors that can occur while scheduling the search.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("failed to build {role} worker pool: {source}")]
    Pool {
        role: &'static str,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },

    #[error("no clustering instance completed")]
    NoRuns,
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Parameters for one search (or single-K run).
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Upper end of the K range; also the single K when `search` is false.
    pub max_clusters: usize,
    /// When true, run every K in `[2, max_clusters]`; otherwise run
    /// `max_clusters` alone.
    pub search: bool,
    /// Fixed iteration budget per instance.
    pub max_iterations: usize,
    /// Concurrent K instances.
    pub search_threads: usize,
    /// Per-pixel workers within one instance.
    pub kmeans_threads: usize,
}

/// The winning K and its variance.
///
/// Selected by scanning the completed runs in ascending K order with a
/// strict less-than, so on exact variance ties the lowest K wins no matter
/// which instance finished first.
#[derive(Debug, Clone, Copy)]
pub struct SearchOutcome {
    pub best_k: usize,
    pub best_variance: f64,
}

/// Observer invoked with `(k, iteration, assignment map)` after every
/// assignment pass of every instance.
pub type SearchObserver<'a> = &'a (dyn Fn(usize, usize, &[u32]) + Sync);

/// Runs one engine instance per candidate K and returns the best K along
/// with every completed run, sorted by K.
///
/// A K instance whose inner worker pool cannot be built aborts alone; the
/// remaining instances are unaffected and the search succeeds as long as at
/// least one instance completes.
///
/// # Errors
///
/// Returns an error if the outer pool cannot be built or no instance
/// completed.
pub fn run_search(
    cube: &DataCube,
    params: &SearchParams,
    observer: Option<SearchObserver<'_>>,
) -> Result<(SearchOutcome, Vec<KmeansRun>)> {
    let min_k = if params.search { 2 } else { params.max_clusters };
    let candidates: Vec<usize> = (min_k..=params.max_clusters).collect();

    let outer = build_pool("search", params.search_threads)?;

    let mut runs: Vec<KmeansRun> = outer.install(|| {
        candidates
            .par_iter()
            .filter_map(|&k| {
                let inner = match build_pool("kmeans", params.kmeans_threads) {
                    Ok(pool) => pool,
                    Err(e) => {
                        // This K aborts alone; the other instances keep going.
                        error!("(k={}) aborted: {}", k, e);
                        return None;
                    }
                };

                let engine = KmeansEngine::new(k, params.max_iterations);
                let run = inner.install(|| match observer {
                    Some(observe) => engine.run(cube, Some(&|iteration, map: &[u32]| {
                        observe(k, iteration, map)
                    })),
                    None => engine.run(cube, None),
                });

                info!(
                    "(k={}) {} iterations in {:.3}s ({:.3}s per iteration), variance {:.3}",
                    k,
                    run.iterations,
                    run.elapsed.as_secs_f64(),
                    run.elapsed.as_secs_f64() / run.iterations as f64,
                    run.variance
                );

                Some(run)
            })
            .collect()
    });

    if runs.is_empty() {
        return Err(SearchError::NoRuns);
    }
    runs.sort_by_key(|run| run.k);

    // Reduce only after every instance has joined, scanning in ascending K
    // order with a strict less-than: exact variance ties go to the lowest
    // K, never to whichever instance the scheduler happened to run first.
    let mut outcome = SearchOutcome {
        best_k: runs[0].k,
        best_variance: runs[0].variance,
    };
    for run in &runs[1..] {
        if run.variance < outcome.best_variance {
            outcome.best_variance = run.variance;
            outcome.best_k = run.k;
        }
    }

    Ok((outcome, runs))
}

fn build_pool(role: &'static str, threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|source| SearchError::Pool { role, source })
}
