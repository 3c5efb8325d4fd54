//! CDF estimation.
//!
//! The estimate blends between adjacent centroids, with two special cases
//! that keep degenerate digests exact: a run of centroids sharing the probe
//! value contributes half its mass (midpoint convention, matching the
//! empirical CDF on ties), and singleton centroids never leak mass across
//! their mean: a probe strictly between two singletons sees the left one in
//! full and the right one not at all.

use crate::digest::merging::MergingDigest;
use crate::error::{SketchError, SketchResult};

impl MergingDigest {
    /// Estimate `P(X <= x)` with the midpoint convention at atoms.
    /// Non-finite probes are rejected; an empty digest answers NaN.
    pub fn cdf(&mut self, x: f64) -> SketchResult<f64> {
        if !x.is_finite() {
            return Err(SketchError::BadInput {
                context: "cdf probe must be finite",
            });
        }
        self.compress_for_query()?;
        self.cdf_sorted(x)
    }

    /// Batch form of [`MergingDigest::cdf`]: one compaction, many probes.
    pub fn cdf_many(&mut self, xs: &[f64]) -> SketchResult<Vec<f64>> {
        if xs.iter().any(|x| !x.is_finite()) {
            return Err(SketchError::BadInput {
                context: "cdf probes must be finite",
            });
        }
        self.compress_for_query()?;
        xs.iter().map(|&x| self.cdf_sorted(x)).collect()
    }

    /// The walk itself; expects a freshly compressed, ascending sequence.
    fn cdf_sorted(&self, x: f64) -> SketchResult<f64> {
        let cs = &self.centroids;
        let total = self.total_weight;
        if cs.is_empty() {
            return Ok(f64::NAN);
        }
        if cs.len() == 1 {
            let v = cs[0].mean();
            return Ok(if x < v {
                0.0
            } else if x > v {
                1.0
            } else {
                0.5
            });
        }

        let min = cs[0].mean();
        let max = cs[cs.len() - 1].mean();
        if x < min {
            return Ok(0.0);
        }
        if x > max {
            return Ok(1.0);
        }
        if x == min {
            let at_or_below: f64 = cs
                .iter()
                .take_while(|c| c.mean() <= x)
                .map(|c| c.count())
                .sum();
            return Ok(at_or_below / (2.0 * total));
        }
        if x == max {
            return Ok(1.0 - 0.5 / total);
        }

        let mut weight_so_far = 0.0;
        let mut i = 0;
        while i < cs.len() - 1 {
            if cs[i].mean() == x {
                // Half of the tied run counts, per the midpoint convention.
                let mut run = 0.0;
                while i < cs.len() && cs[i].mean() == x {
                    run += cs[i].count();
                    i += 1;
                }
                return Ok((weight_so_far + run / 2.0) / total);
            }
            if x < cs[i + 1].mean() {
                // Bracketed by cs[i].mean() < x < cs[i+1].mean().
                let left = cs[i];
                let right = cs[i + 1];
                if left.is_singleton() && right.is_singleton() {
                    return Ok((weight_so_far + 1.0) / total);
                }
                let left_excluded = if left.is_singleton() { 0.5 } else { 0.0 };
                let right_excluded = if right.is_singleton() { 0.5 } else { 0.0 };
                let dw = (left.count() + right.count()) / 2.0;
                let dw_interp = dw - left_excluded - right_excluded;
                let frac = (x - left.mean()) / (right.mean() - left.mean());
                let w = weight_so_far + left.count() / 2.0 + left_excluded + dw_interp * frac;
                return Ok(w / total);
            }
            weight_so_far += cs[i].count();
            i += 1;
        }

        // x <= max is handled above; falling through means the walk is broken.
        Err(SketchError::Invariant {
            what: "cdf walk exhausted the centroid sequence",
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::digest::test_helpers::{assert_abs_close, assert_exact};
    use crate::digest::MergingDigest;

    #[test]
    fn empty_and_single() {
        let mut td = MergingDigest::new(100.0);
        assert!(td.cdf(1.0).unwrap().is_nan());
        td.fit(2.0).unwrap();
        assert_exact("below", 0.0, td.cdf(1.0).unwrap());
        assert_exact("at", 0.5, td.cdf(2.0).unwrap());
        assert_exact("above", 1.0, td.cdf(3.0).unwrap());
    }

    #[test]
    fn rejects_non_finite_probes() {
        let mut td = MergingDigest::new(100.0);
        td.fit_all(&[1.0, 2.0]).unwrap();
        assert!(td.cdf(f64::NAN).is_err());
        assert!(td.cdf(f64::INFINITY).is_err());
        assert!(td.cdf(f64::NEG_INFINITY).is_err());
        assert!(td.cdf_many(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn three_singletons_hit_the_sixths() {
        let mut td = MergingDigest::new(100.0);
        td.fit(1.0).unwrap();
        td.fit(2.0).unwrap();
        td.fit(3.0).unwrap();
        let eps = 1e-9;
        assert_exact("cdf(1)", 1.0 / 6.0, td.cdf(1.0).unwrap());
        assert_exact("cdf(1+)", 1.0 / 3.0, td.cdf(1.0 + eps).unwrap());
        assert_exact("cdf(2)", 0.5, td.cdf(2.0).unwrap());
        assert_exact("cdf(2+)", 2.0 / 3.0, td.cdf(2.0 + eps).unwrap());
        assert_abs_close("cdf(3)", 5.0 / 6.0, td.cdf(3.0).unwrap(), 1e-15);
        assert_exact("cdf(3+)", 1.0, td.cdf(3.0 + eps).unwrap());
    }

    #[test]
    fn tied_run_uses_half_mass() {
        let mut td = MergingDigest::new(100.0);
        td.fit_all(&[1.0, 2.0, 2.0, 2.0, 3.0]).unwrap();
        // 1 below the run, 3 tied: (1 + 3/2) / 5
        assert_exact("cdf(2)", 0.5, td.cdf(2.0).unwrap());
    }

    #[test]
    fn batch_agrees_with_single_probes() {
        let mut td = MergingDigest::new(50.0);
        for i in 0..20_000 {
            td.fit(((i * 13) % 977) as f64).unwrap();
        }
        let xs: Vec<f64> = (-5..=1_000).map(|i| i as f64).collect();
        let batch = td.cdf_many(&xs).unwrap();
        for (&x, &p) in xs.iter().zip(&batch) {
            assert_exact("batch vs single", td.cdf(x).unwrap(), p);
        }
    }

    #[test]
    fn monotone_over_a_dense_grid() {
        let mut td = MergingDigest::new(50.0);
        for i in 0..10_000 {
            td.fit(((i * 37) % 1_000) as f64).unwrap();
        }
        let mut prev = -1.0;
        for i in -10..=1_010 {
            let p = td.cdf(i as f64).unwrap();
            assert!((0.0..=1.0).contains(&p));
            assert!(p >= prev, "cdf not monotone at x={i}: {p} < {prev}");
            prev = p;
        }
    }
}
