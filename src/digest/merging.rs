//! MergingDigest orchestration + public ingestion API.
//!
//! # Design: one array, two regimes
//!
//! The digest keeps a single sorted-ish `Vec<Centroid>`. Its prefix of
//! `watermark` elements is the established digest from the last compression
//! pass; everything past the watermark is freshly appended raw singletons
//! (or centroids appended by [`MergingDigest::merge`]). When the array
//! outgrows `max_size`, the compressor sorts the whole thing and greedily
//! re-merges it under the scale-function rule "no cluster spans more than
//! one k-unit" (see `compressor.rs`).
//!
//! Two compression levels are in play. The digest *works* at
//! `working_compression` (> `compression` when two-level mode is on), so
//! the in-memory summary holds more detail than the exported one; the public
//! [`MergingDigest::compress`] runs at the user-visible `compression` and is
//! what serialization uses. Queries force a working-level compression first,
//! so every answer is computed on a sorted, invariant-satisfying sequence.
//!
//! Failure discipline: `BadInput` rejections happen before any state is
//! touched; an `Invariant` error means the digest itself is defective and
//! its contents are no longer trustworthy.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::digest::centroid::Centroid;
use crate::digest::scale::ScaleFunction;
use crate::error::{SketchError, SketchResult};

/// Floor for the user-supplied compression parameter.
const MIN_COMPRESSION: f64 = 10.0;

/// Bulk ingestion is fed to the buffer in chunks of this many samples.
const FIT_CHUNK: usize = 10_000;

/// A mergeable streaming quantile sketch with tail-biased accuracy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergingDigest {
    /// User-visible compression (δ).
    pub(crate) compression: f64,
    /// Working compression (δ'); equals `compression` unless two-level
    /// compression is on.
    pub(crate) working_compression: f64,
    pub(crate) scale: ScaleFunction,
    pub(crate) max_pending: usize,
    pub(crate) max_size: usize,
    pub(crate) centroids: Vec<Centroid>,
    /// Optional per-centroid list of originating samples; debugging aid,
    /// permuted and concatenated in lockstep with `centroids`.
    pub(crate) samples: Option<Vec<Vec<f64>>>,
    pub(crate) total_weight: f64,
    /// Running sum of the raw samples (not of centroid means).
    pub(crate) data_sum: f64,
    /// Parity decides the sort direction of non-forced compressions.
    pub(crate) merge_count: u64,
    /// Length of the established (compressed) prefix at the start of the
    /// current pass.
    pub(crate) watermark: usize,
    /// Whether the established prefix is currently stored in descending
    /// order.
    pub(crate) reversed: bool,
    pub(crate) min: OrderedFloat<f64>,
    pub(crate) max: OrderedFloat<f64>,
}

impl Default for MergingDigest {
    fn default() -> Self {
        MergingDigest::new(100.0)
    }
}

impl MergingDigest {
    /// A digest with the default K3 scale, `max_pending = 5·compression`,
    /// and two-level compression. `compression` is clamped to a minimum
    /// of 10.
    pub fn new(compression: f64) -> Self {
        Self::with_scale(compression, ScaleFunction::default())
    }

    /// Like [`MergingDigest::new`] with an explicit scale function.
    pub fn with_scale(compression: f64, scale: ScaleFunction) -> Self {
        let compression = compression.max(MIN_COMPRESSION);
        Self::with_params(compression, (5.0 * compression) as usize, true, scale)
    }

    /// Fully parameterized construction: buffer head-room, two-level switch,
    /// and scale function.
    pub fn with_params(
        compression: f64,
        max_pending: usize,
        use_two_level: bool,
        scale: ScaleFunction,
    ) -> Self {
        let compression = compression.max(MIN_COMPRESSION);
        let max_size = (2.0 * compression) as usize + max_pending.max(50);
        let working_compression = if use_two_level {
            compression * (max_size as f64 / (2.0 * compression)).sqrt()
        } else {
            compression
        };
        MergingDigest {
            compression,
            working_compression,
            scale,
            max_pending,
            max_size,
            centroids: Vec::new(),
            samples: None,
            total_weight: 0.0,
            data_sum: 0.0,
            merge_count: 0,
            watermark: 0,
            reversed: false,
            min: OrderedFloat(f64::NAN),
            max: OrderedFloat(f64::NAN),
        }
    }

    /// Build a digest directly from a batch of samples.
    pub fn from_samples(xs: &[f64], compression: f64) -> SketchResult<Self> {
        let mut td = Self::new(compression);
        td.fit_all(xs)?;
        Ok(td)
    }

    /// Keep the list of originating samples alongside each centroid.
    /// Debugging aid; enable before the first sample.
    pub fn with_sample_log(mut self) -> Self {
        debug_assert!(
            self.centroids.is_empty(),
            "sample log must be enabled on an empty digest"
        );
        self.samples = Some(Vec::new());
        self
    }

    /* ===========================
     * Ingestion
     * =========================== */

    /// Add a single sample. NaN is rejected and leaves the digest untouched.
    pub fn fit(&mut self, x: f64) -> SketchResult<()> {
        if x.is_nan() {
            return Err(SketchError::BadInput {
                context: "sample value",
            });
        }
        self.push_singleton(x);
        self.compress_if_overflowing()
    }

    /// Add a batch of samples; large batches are chunked so the working
    /// buffer never grows past `max_size + chunk`.
    pub fn fit_all(&mut self, xs: &[f64]) -> SketchResult<()> {
        if xs.iter().any(|x| x.is_nan()) {
            return Err(SketchError::BadInput {
                context: "sample batch",
            });
        }
        for chunk in xs.chunks(FIT_CHUNK) {
            for &x in chunk {
                self.push_singleton(x);
            }
            self.compress_if_overflowing()?;
        }
        Ok(())
    }

    /// Fold another digest into this one. The source is untouched; the
    /// target accumulates its centroids and total weight.
    pub fn merge(&mut self, other: &MergingDigest) -> SketchResult<()> {
        if self.samples.is_some() && other.samples.is_none() {
            return Err(SketchError::BadInput {
                context: "merge source has no sample log",
            });
        }
        if other.centroids.is_empty() {
            return Ok(());
        }
        if self.total_weight == 0.0 {
            self.min = other.min;
            self.max = other.max;
        } else {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
        self.centroids.extend_from_slice(&other.centroids);
        if let (Some(log), Some(other_log)) = (&mut self.samples, &other.samples) {
            log.extend(other_log.iter().cloned());
        }
        self.total_weight += other.total_weight;
        self.data_sum += other.data_sum;
        self.compress_if_overflowing()
    }

    #[inline]
    fn push_singleton(&mut self, x: f64) {
        let x_ord = OrderedFloat(x);
        if self.total_weight == 0.0 {
            self.min = x_ord;
            self.max = x_ord;
        } else {
            self.min = self.min.min(x_ord);
            self.max = self.max.max(x_ord);
        }
        self.centroids.push(Centroid::singleton(x));
        if let Some(log) = &mut self.samples {
            log.push(vec![x]);
        }
        self.total_weight += 1.0;
        self.data_sum += x;
    }

    #[inline]
    fn compress_if_overflowing(&mut self) -> SketchResult<()> {
        if self.centroids.len() > self.max_size {
            self.compress_at(self.working_compression, false)
        } else {
            Ok(())
        }
    }

    /* ===========================
     * Compaction
     * =========================== */

    /// Force a full compression at the public compression level. Run before
    /// serialization; queries compact at the working level on their own.
    pub fn compress(&mut self) -> SketchResult<()> {
        self.compress_at(self.compression, true)
    }

    pub(crate) fn compress_for_query(&mut self) -> SketchResult<()> {
        self.compress_at(self.working_compression, true)
    }

    /* ===========================
     * Accessors
     * =========================== */

    /// Smallest sample seen; NaN while empty.
    #[inline]
    pub fn min(&self) -> f64 {
        self.min.into_inner()
    }

    /// Largest sample seen; NaN while empty.
    #[inline]
    pub fn max(&self) -> f64 {
        self.max.into_inner()
    }

    /// Total weight (number of samples for unweighted streams).
    #[inline]
    pub fn count(&self) -> f64 {
        self.total_weight
    }

    /// Sum of all ingested samples.
    #[inline]
    pub fn sum(&self) -> f64 {
        self.data_sum
    }

    /// Mean of all ingested samples; 0 while empty.
    #[inline]
    pub fn mean(&self) -> f64 {
        if self.total_weight > 0.0 {
            self.data_sum / self.total_weight
        } else {
            0.0
        }
    }

    /// Live centroid count, including any not-yet-compressed tail.
    #[inline]
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    #[inline]
    pub fn compression(&self) -> f64 {
        self.compression
    }

    #[inline]
    pub fn scale(&self) -> ScaleFunction {
        self.scale
    }

    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[inline]
    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    /// Per-centroid originating samples, when the sample log is enabled.
    #[inline]
    pub fn sample_log(&self) -> Option<&[Vec<f64>]> {
        self.samples.as_deref()
    }

    /* ===========================
     * Diagnostics
     * =========================== */

    /// Verify every structural invariant on a compressed snapshot of this
    /// digest. Test/debug aid; a failure signals a defect in the sketch.
    pub fn check_weights(&self) -> SketchResult<()> {
        let mut snapshot = self.clone();
        snapshot.compress_for_query()?;
        snapshot.verify_invariants()
    }

    /// Invariant checks against a sorted, compressed sequence.
    fn verify_invariants(&self) -> SketchResult<()> {
        let cs = &self.centroids;
        if cs.is_empty() {
            if self.total_weight != 0.0 {
                return Err(SketchError::Invariant {
                    what: "empty digest carries weight",
                });
            }
            return Ok(());
        }

        if cs.windows(2).any(|w| w[0].mean() > w[1].mean()) {
            return Err(SketchError::Invariant {
                what: "centroids out of order",
            });
        }

        let sum: f64 = cs.iter().map(Centroid::count).sum();
        let drift = (sum - self.total_weight).abs();
        if drift > 1e-6 * self.total_weight.max(1.0) {
            return Err(SketchError::Invariant {
                what: "centroid weights do not sum to the total",
            });
        }

        if cs.len() > self.max_size {
            return Err(SketchError::Invariant {
                what: "digest exceeds its size bound",
            });
        }

        if cs.len() >= 2 && (!cs[0].is_singleton() || !cs[cs.len() - 1].is_singleton()) {
            return Err(SketchError::Invariant {
                what: "edge centroid is not a singleton",
            });
        }

        // Every non-singleton cluster must fit inside one k-unit at the
        // public compression level.
        let total = self.total_weight;
        let norm = self.scale.normalizer(self.compression, total);
        let mut w_before = 0.0;
        for c in cs {
            if !c.is_singleton() {
                let k_lo = self.scale.k_norm(w_before / total, norm);
                let k_hi = self.scale.k_norm((w_before + c.count()) / total, norm);
                if k_hi - k_lo > 1.0 + 1e-10 {
                    return Err(SketchError::Invariant {
                        what: "cluster spans more than one k-unit",
                    });
                }
            }
            w_before += c.count();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::test_helpers::assert_exact;

    #[test]
    fn new_clamps_compression() {
        let td = MergingDigest::new(1.0);
        assert_eq!(td.compression(), 10.0);
    }

    #[test]
    fn default_sizing() {
        let td = MergingDigest::new(100.0);
        assert_eq!(td.max_size(), 700); // 2δ + max(50, 5δ)
        assert!(td.working_compression > td.compression);
    }

    #[test]
    fn fit_rejects_nan_without_mutation() {
        let mut td = MergingDigest::new(100.0);
        td.fit(1.0).unwrap();
        let before = td.clone();
        assert!(td.fit(f64::NAN).is_err());
        assert_eq!(td.len(), before.len());
        assert_eq!(td.count(), before.count());
        assert!(td.fit_all(&[2.0, f64::NAN]).is_err());
        assert_eq!(td.count(), before.count());
    }

    #[test]
    fn fit_tracks_min_max_and_moments() {
        let mut td = MergingDigest::new(100.0);
        assert!(td.min().is_nan());
        assert_exact("empty mean", 0.0, td.mean());
        td.fit_all(&[3.0, -1.0, 7.0]).unwrap();
        assert_exact("min", -1.0, td.min());
        assert_exact("max", 7.0, td.max());
        assert_exact("sum", 9.0, td.sum());
        assert_exact("mean", 3.0, td.mean());
    }

    #[test]
    fn from_samples_matches_incremental() {
        let xs: Vec<f64> = (0..5_000).map(|i| ((i * 31) % 613) as f64).collect();
        let mut bulk = MergingDigest::from_samples(&xs, 100.0).unwrap();
        let mut one_by_one = MergingDigest::new(100.0);
        for &x in &xs {
            one_by_one.fit(x).unwrap();
        }
        assert_exact("count", one_by_one.count(), bulk.count());
        assert_exact("sum", one_by_one.sum(), bulk.sum());
        let a = bulk.quantile(0.9).unwrap();
        let b = one_by_one.quantile(0.9).unwrap();
        let rel = (a - b).abs() / a.abs().max(1.0);
        assert!(rel < 0.05, "bulk vs incremental q90: {a} vs {b}");
    }

    #[test]
    fn merge_accumulates_weight_and_extremes() {
        let mut a = MergingDigest::new(100.0);
        a.fit_all(&[1.0, 2.0]).unwrap();
        let mut b = MergingDigest::new(100.0);
        b.fit_all(&[-5.0, 9.0]).unwrap();
        a.merge(&b).unwrap();
        assert_exact("count", 4.0, a.count());
        assert_exact("min", -5.0, a.min());
        assert_exact("max", 9.0, a.max());
        a.check_weights().unwrap();
    }

    #[test]
    fn merge_rejects_missing_sample_log() {
        let mut logged = MergingDigest::new(100.0).with_sample_log();
        logged.fit(1.0).unwrap();
        let mut plain = MergingDigest::new(100.0);
        plain.fit(2.0).unwrap();
        let before = logged.clone();
        assert!(logged.merge(&plain).is_err());
        assert_eq!(logged.count(), before.count());
        assert_eq!(logged.len(), before.len());
        // the other direction silently drops the source log
        plain.merge(&logged).unwrap();
        assert_exact("count", 2.0, plain.count());
    }

    #[test]
    fn sample_log_follows_compression() {
        let mut td = MergingDigest::with_params(10.0, 50, false, ScaleFunction::K2)
            .with_sample_log();
        let xs: Vec<f64> = (0..500).map(|i| (i % 40) as f64).collect();
        td.fit_all(&xs).unwrap();
        td.compress().unwrap();
        let log = td.sample_log().expect("log enabled");
        assert_eq!(log.len(), td.len());
        let logged: usize = log.iter().map(Vec::len).sum();
        assert_eq!(logged, 500);
        // each centroid's samples average to its mean
        for (c, ss) in td.centroids().iter().zip(log) {
            let mean = ss.iter().sum::<f64>() / ss.len() as f64;
            assert!(
                (mean - c.mean()).abs() < 1e-9,
                "log mean {mean} vs centroid {}",
                c.mean()
            );
        }
    }

    #[test]
    fn check_weights_passes_after_heavy_use() {
        let mut td = MergingDigest::new(50.0);
        for i in 0..20_000 {
            td.fit((i % 173) as f64).unwrap();
        }
        td.check_weights().unwrap();
        td.compress().unwrap();
        td.check_weights().unwrap();
    }
}
