//! Quantile (inverse CDF) estimation.
//!
//! Mass is attributed half-and-half to the two neighbors of each gap;
//! singleton neighbors claim their half unit outright (no interpolation
//! through an atom), which keeps small digests exact and pins `q=0`/`q=1`
//! to the true extremes.

use crate::digest::merging::MergingDigest;
use crate::error::{SketchError, SketchResult};

impl MergingDigest {
    /// Estimate the value at quantile `q` in `[0, 1]`. An empty digest
    /// answers NaN.
    pub fn quantile(&mut self, q: f64) -> SketchResult<f64> {
        if !(0.0..=1.0).contains(&q) {
            return Err(SketchError::BadInput {
                context: "quantile must lie in [0, 1]",
            });
        }
        self.compress_for_query()?;
        self.quantile_sorted(q)
    }

    /// Batch form of [`MergingDigest::quantile`]: one compaction, many ranks.
    pub fn quantile_many(&mut self, qs: &[f64]) -> SketchResult<Vec<f64>> {
        if qs.iter().any(|q| !(0.0..=1.0).contains(q)) {
            return Err(SketchError::BadInput {
                context: "quantiles must lie in [0, 1]",
            });
        }
        self.compress_for_query()?;
        qs.iter().map(|&q| self.quantile_sorted(q)).collect()
    }

    /// Convenience for `quantile(0.5)`.
    pub fn median(&mut self) -> SketchResult<f64> {
        self.quantile(0.5)
    }

    /// The walk itself; expects a freshly compressed, ascending sequence.
    fn quantile_sorted(&self, q: f64) -> SketchResult<f64> {
        let cs = &self.centroids;
        if cs.is_empty() {
            return Ok(f64::NAN);
        }
        if cs.len() == 1 {
            return Ok(cs[0].mean());
        }

        let total = self.total_weight;
        let index = q * total;
        if index < 1.0 {
            return Ok(cs[0].mean());
        }
        if index > total - 1.0 {
            return Ok(cs[cs.len() - 1].mean());
        }

        let mut weight_so_far = cs[0].count() / 2.0;
        for i in 0..cs.len() - 1 {
            let left = cs[i];
            let right = cs[i + 1];
            let dw = (left.count() + right.count()) / 2.0;
            if weight_so_far + dw > index {
                // The target rank falls between these two centroid centers.
                let mut left_unit = 0.0;
                let mut right_unit = 0.0;
                if left.is_singleton() {
                    if index - weight_so_far < 0.5 {
                        return Ok(left.mean());
                    }
                    left_unit = 0.5;
                }
                if right.is_singleton() {
                    if weight_so_far + dw - index <= 0.5 {
                        return Ok(right.mean());
                    }
                    right_unit = 0.5;
                }
                let z1 = index - weight_so_far - left_unit;
                let z2 = weight_so_far + dw - index - right_unit;
                let v = (left.mean() * z2 + right.mean() * z1) / (z1 + z2);
                return Ok(v.clamp(left.mean(), right.mean()));
            }
            weight_so_far += dw;
        }

        // index <= total - 1 always lands in some gap; this is a walk bug.
        Err(SketchError::Invariant {
            what: "quantile rank fell outside every centroid gap",
        })
    }
}
