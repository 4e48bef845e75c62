//! Parallel K-means engine for hyperspectral cubes.
//!
//! One engine instance clusters the pixels of a [`DataCube`] into a fixed
//! number of groups:
//!
//! 1. **Seed**: K evenly-spaced pixels along the cube diagonal become the
//!    initial centroids (deterministic, no RNG).
//! 2. **Assign**: every pixel takes the nearest centroid, lowest index
//!    winning ties.
//! 3. **Update**: centroids become the mean of their assigned pixels; a
//!    cluster left empty is reseeded from the pixel farthest from its
//!    current centroid instead of propagating NaN.
//! 4. Repeat for a fixed iteration budget; there is no convergence early
//!    exit.
//!
//! All per-pixel work is parallelized with rayon inside whatever thread pool
//! the caller installs. Every floating-point reduction runs over fixed-size
//! pixel chunks whose partials are combined in chunk order, so a run is
//! bit-for-bit reproducible regardless of worker count.

use std::time::{Duration, Instant};

use log::{info, warn};
use rayon::prelude::*;

use crate::core::loaders::DataCube;
use crate::processors::kernels::{accumulate, copy_into, distance};

/// Marker for a pixel that has not been assigned yet. Never a valid cluster
/// id, so the first assignment pass reports every pixel as newly mapped.
pub const UNASSIGNED: u32 = u32::MAX;

/// Pixels per reduction chunk. Fixed so partial results are independent of
/// thread count and scheduling.
const CHUNK: usize = 4096;

/// A contiguous K x bands centroid buffer, exclusively owned by one engine
/// instance.
#[derive(Debug, Clone)]
pub struct Centroids {
    k: usize,
    bands: usize,
    data: Vec<f32>,
}

impl Centroids {
    pub fn new(k: usize, bands: usize) -> Self {
        Self {
            k,
            bands,
            data: vec![0.0; k * bands],
        }
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn row(&self, cluster: usize) -> &[f32] {
        &self.data[cluster * self.bands..(cluster + 1) * self.bands]
    }

    #[inline]
    pub fn row_mut(&mut self, cluster: usize) -> &mut [f32] {
        &mut self.data[cluster * self.bands..(cluster + 1) * self.bands]
    }

    fn reset(&mut self) {
        self.data.fill(0.0);
    }

    fn accumulate_all(&mut self, partial: &[f32]) {
        accumulate(partial, &mut self.data);
    }
}

/// Everything one clustering instance produces.
#[derive(Debug)]
pub struct KmeansRun {
    /// The K this instance ran with.
    pub k: usize,
    /// Per-pixel cluster ids, each in `[0, k)`.
    pub assignments: Vec<u32>,
    /// Final centroids, refreshed against the final assignment map.
    pub centroids: Centroids,
    /// Pixels per cluster for the final assignment map.
    pub cluster_sizes: Vec<u64>,
    /// Band-normalized within-cluster dispersion; the comparison statistic
    /// for K-search.
    pub variance: f64,
    /// Iterations executed (always the full budget).
    pub iterations: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

/// K-means clusterer for a fixed K and iteration budget.
#[derive(Debug, Clone)]
pub struct KmeansEngine {
    k: usize,
    max_iterations: usize,
}

impl KmeansEngine {
    pub fn new(k: usize, max_iterations: usize) -> Self {
        debug_assert!(k >= 1);
        debug_assert!(max_iterations >= 1);
        Self { k, max_iterations }
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Flat index of the i-th seed pixel along the diagonal traversal.
    #[inline]
    fn seed_pixel_index(&self, i: usize, rows: usize, cols: usize) -> usize {
        (i * cols / self.k) * rows + i * rows / self.k
    }

    /// Copies K evenly-spaced diagonal pixels as the initial centroids.
    pub fn seed_centroids(&self, cube: &DataCube) -> Centroids {
        let mut centroids = Centroids::new(self.k, cube.bands());
        for i in 0..self.k {
            let index = self.seed_pixel_index(i, cube.rows(), cube.cols());
            copy_into(cube.pixel(index), centroids.row_mut(i));
        }
        centroids
    }

    /// Assigns every pixel to its nearest centroid.
    ///
    /// Ties go to the lowest cluster index (the first centroid scanned
    /// wins). Returns the number of pixels whose id changed; a map still
    /// holding [`UNASSIGNED`] entries therefore reports the full pixel count
    /// on the first call.
    pub fn assign_objects(
        &self,
        cube: &DataCube,
        centroids: &Centroids,
        assignments: &mut [u32],
    ) -> usize {
        assignments
            .par_chunks_mut(CHUNK)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                let base = chunk_index * CHUNK;
                let mut changed = 0usize;
                for (offset, slot) in chunk.iter_mut().enumerate() {
                    let pixel = cube.pixel(base + offset);
                    let mut nearest = 0u32;
                    let mut min_dist = distance(pixel, centroids.row(0));
                    for cluster in 1..self.k {
                        let dist = distance(pixel, centroids.row(cluster));
                        if dist < min_dist {
                            min_dist = dist;
                            nearest = cluster as u32;
                        }
                    }
                    if *slot != nearest {
                        changed += 1;
                    }
                    *slot = nearest;
                }
                changed
            })
            .sum()
    }

    /// Recomputes centroids as the mean of their assigned pixels.
    ///
    /// Three phases: zero the accumulators, accumulate every pixel into its
    /// cluster, divide by the cluster sizes. Accumulation runs over fixed
    /// pixel chunks into chunk-private buffers that are folded in chunk
    /// order afterwards, so no two workers ever touch the same accumulator
    /// and the float sums are reproducible.
    ///
    /// Returns the ids of clusters that received no pixels; their centroids
    /// are left zeroed and must be reseeded before the next assignment.
    pub fn compute_centroids(
        &self,
        cube: &DataCube,
        assignments: &[u32],
        centroids: &mut Centroids,
        sizes: &mut [u64],
    ) -> Vec<usize> {
        let bands = cube.bands();
        centroids.reset();
        sizes.fill(0);

        let partials: Vec<(Vec<f32>, Vec<u64>)> = assignments
            .par_chunks(CHUNK)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                let base = chunk_index * CHUNK;
                let mut acc = vec![0.0f32; self.k * bands];
                let mut counts = vec![0u64; self.k];
                for (offset, &cluster) in chunk.iter().enumerate() {
                    let cluster = cluster as usize;
                    let pixel = cube.pixel(base + offset);
                    accumulate(pixel, &mut acc[cluster * bands..(cluster + 1) * bands]);
                    counts[cluster] += 1;
                }
                (acc, counts)
            })
            .collect();

        for (acc, counts) in &partials {
            centroids.accumulate_all(acc);
            for (total, &count) in sizes.iter_mut().zip(counts.iter()) {
                *total += count;
            }
        }

        let mut empty = Vec::new();
        for cluster in 0..self.k {
            if sizes[cluster] == 0 {
                empty.push(cluster);
                continue;
            }
            let count = sizes[cluster] as f32;
            for value in centroids.row_mut(cluster) {
                *value /= count;
            }
        }
        empty
    }

    /// Reseeds each empty cluster from the pixel currently farthest from its
    /// assigned centroid, skipping pixels already used for an earlier empty
    /// cluster in the same pass. Deterministic: the farthest scan breaks
    /// ties toward the lowest pixel index.
    fn reseed_empty_clusters(
        &self,
        cube: &DataCube,
        assignments: &[u32],
        centroids: &mut Centroids,
        empty: &[usize],
    ) {
        let mut used = Vec::with_capacity(empty.len());
        for &cluster in empty {
            let pixel_index = farthest_assigned_pixel(cube, assignments, centroids, &used);
            warn!(
                "(k={}) cluster {} received no pixels; reseeding from pixel {}",
                self.k, cluster, pixel_index
            );
            copy_into(cube.pixel(pixel_index), centroids.row_mut(cluster));
            used.push(pixel_index);
        }
    }

    /// Band-normalized within-cluster dispersion:
    /// `sum over pixels of distance(pixel, its centroid) / bands`.
    pub fn compute_cluster_variance(
        &self,
        cube: &DataCube,
        assignments: &[u32],
        centroids: &Centroids,
    ) -> f64 {
        let bands = cube.bands() as f64;
        let partials: Vec<f64> = assignments
            .par_chunks(CHUNK)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                let base = chunk_index * CHUNK;
                let mut sum = 0.0f64;
                for (offset, &cluster) in chunk.iter().enumerate() {
                    let pixel = cube.pixel(base + offset);
                    sum += distance(pixel, centroids.row(cluster as usize)) / bands;
                }
                sum
            })
            .collect();
        partials.iter().sum()
    }

    /// Runs the full clustering instance.
    ///
    /// The optional observer sees the iteration number and the current
    /// assignment map after every assignment pass; the engine never waits on
    /// it beyond the call itself.
    pub fn run(
        &self,
        cube: &DataCube,
        observer: Option<&(dyn Fn(usize, &[u32]) + Sync)>,
    ) -> KmeansRun {
        let start = Instant::now();

        let mut centroids = self.seed_centroids(cube);
        let mut assignments = vec![UNASSIGNED; cube.num_pixels()];
        let mut sizes = vec![0u64; self.k];

        // Iteration 1 maps every pixel for the first time.
        let mapped = self.assign_objects(cube, &centroids, &mut assignments);
        info!("(k={}) iteration 1: {} pixels mapped", self.k, mapped);
        if let Some(observe) = observer {
            observe(1, &assignments);
        }

        for iteration in 1..self.max_iterations {
            let empty = self.compute_centroids(cube, &assignments, &mut centroids, &mut sizes);
            if !empty.is_empty() {
                self.reseed_empty_clusters(cube, &assignments, &mut centroids, &empty);
            }
            let changed = self.assign_objects(cube, &centroids, &mut assignments);
            info!(
                "(k={}) iteration {}: {} pixels reassigned",
                self.k,
                iteration + 1,
                changed
            );
            if let Some(observe) = observer {
                observe(iteration + 1, &assignments);
            }
        }

        // Refresh the means against the final assignment map so the reported
        // variance and centroids describe the map that is returned.
        let empty = self.compute_centroids(cube, &assignments, &mut centroids, &mut sizes);
        if !empty.is_empty() {
            self.reseed_empty_clusters(cube, &assignments, &mut centroids, &empty);
        }
        let variance = self.compute_cluster_variance(cube, &assignments, &centroids);

        KmeansRun {
            k: self.k,
            assignments,
            centroids,
            cluster_sizes: sizes,
            variance,
            iterations: self.max_iterations,
            elapsed: start.elapsed(),
        }
    }
}

/// Index of the pixel with the largest distance to its assigned centroid,
/// ignoring `skip`. Chunk partials are compared in chunk order with a strict
/// greater-than, so the lowest index wins ties.
fn farthest_assigned_pixel(
    cube: &DataCube,
    assignments: &[u32],
    centroids: &Centroids,
    skip: &[usize],
) -> usize {
    let partials: Vec<(f64, usize)> = assignments
        .par_chunks(CHUNK)
        .enumerate()
        .map(|(chunk_index, chunk)| {
            let base = chunk_index * CHUNK;
            let mut best = (f64::NEG_INFINITY, base);
            for (offset, &cluster) in chunk.iter().enumerate() {
                let index = base + offset;
                if skip.contains(&index) {
                    continue;
                }
                let dist = distance(cube.pixel(index), centroids.row(cluster as usize));
                if dist > best.0 {
                    best = (dist, index);
                }
            }
            best
        })
        .collect();

    let mut best = (f64::NEG_INFINITY, 0);
    for &(dist, index) in &partials {
        if dist > best.0 {
            best = (dist, index);
        }
    }
    best.1
}
