//! Centroid representation for the merging digest.
//!
//! A centroid summarizes a contiguous cluster of samples as `(mean, count)`.
//! A centroid with `count == 1` is a *singleton*: its mass sits exactly at
//! `mean` and the query paths treat it as an atomic ECDF jump. For
//! `count > 1` the mass is spread over an interval bracketed by the
//! neighboring centroids.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A `(mean, count)` cluster summary. Total-ordered by mean; ties between
/// equal means are resolved by the stable sort in the compressor, never here.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Centroid {
    mean: OrderedFloat<f64>,
    count: OrderedFloat<f64>,
}

impl Centroid {
    #[inline]
    pub fn new(mean: f64, count: f64) -> Self {
        debug_assert!(count >= 0.0, "centroid count must be non-negative");
        Centroid {
            mean: OrderedFloat(mean),
            count: OrderedFloat(count),
        }
    }

    /// A fresh single-sample centroid.
    #[inline]
    pub fn singleton(mean: f64) -> Self {
        Centroid::new(mean, 1.0)
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean.into_inner()
    }

    #[inline]
    pub fn count(&self) -> f64 {
        self.count.into_inner()
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.count() == 1.0
    }

    /// Weighted combination of two centroids. The degenerate all-zero case
    /// collapses to `(0, 0)` rather than dividing by zero.
    pub fn merged(self, other: Centroid) -> Centroid {
        let w = self.count() + other.count();
        if w == 0.0 {
            return Centroid::new(0.0, 0.0);
        }
        let m = (self.count() * self.mean() + other.count() * other.mean()) / w;
        Centroid::new(m, w)
    }

    /// Fold `other` into `self` in place.
    #[inline]
    pub fn absorb(&mut self, other: Centroid) {
        *self = self.merged(other);
    }
}

impl PartialEq for Centroid {
    fn eq(&self, other: &Centroid) -> bool {
        self.mean == other.mean
    }
}

impl Eq for Centroid {}

impl PartialOrd for Centroid {
    fn partial_cmp(&self, other: &Centroid) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Centroid {
    fn cmp(&self, other: &Centroid) -> Ordering {
        self.mean.cmp(&other.mean)
    }
}
