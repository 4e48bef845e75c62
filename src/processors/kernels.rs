//! Vector kernels shared by the assignment and update steps.
//!
//! These are the only primitives the engine needs: Euclidean distance,
//! element-wise accumulation, and a straight copy used during seeding.
//! Distances accumulate in f64 so band counts in the hundreds stay stable.

/// Euclidean distance between two equal-length vectors.
#[inline]
pub fn distance(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum_sq = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = (*x - *y) as f64;
        sum_sq += d * d;
    }
    sum_sq.sqrt()
}

/// Adds `src` into `dest` element-wise.
///
/// Safe to call concurrently as long as each call targets a distinct
/// destination; callers that can collide on a destination must serialize.
#[inline]
pub fn accumulate(src: &[f32], dest: &mut [f32]) {
    debug_assert_eq!(src.len(), dest.len());
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        *d += *s;
    }
}

/// Copies `src` over `dest`. Used only when seeding centroids.
#[inline]
pub fn copy_into(src: &[f32], dest: &mut [f32]) {
    dest.copy_from_slice(src);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_basic() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 2.0, 2.0];
        assert!((distance(&a, &b) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_is_symmetric_and_zero_on_self() {
        let a = [1.5, -2.0, 7.25];
        let b = [0.5, 3.0, -1.0];
        assert_eq!(distance(&a, &b), distance(&b, &a));
        assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn test_distance_stable_for_wide_vectors() {
        // ~400 bands with a constant offset of 1: distance is sqrt(n).
        let n = 425;
        let a = vec![1000.0f32; n];
        let b = vec![1001.0f32; n];
        assert!((distance(&a, &b) - (n as f64).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_accumulate() {
        let src = [1.0, 2.0, 3.0];
        let mut dest = [10.0, 20.0, 30.0];
        accumulate(&src, &mut dest);
        assert_eq!(dest, [11.0, 22.0, 33.0]);
    }

    #[test]
    fn test_copy_into() {
        let src = [4.0, 5.0];
        let mut dest = [0.0, 0.0];
        copy_into(&src, &mut dest);
        assert_eq!(dest, src);
    }
}
