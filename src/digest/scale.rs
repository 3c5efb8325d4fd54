//! Scale functions: the q -> k mappings that control compression density.
//!
//! A scale function maps a quantile position `q` in [0,1] to a scale
//! coordinate `k`; the compressor only ever lets a cluster span one unit of
//! `k`. Steep regions of `k(q)` therefore get many small clusters, flat
//! regions few large ones. K1..K3 steepen toward the tails (K3 the most),
//! which is where the digest's accuracy advantage comes from. K0 is linear
//! and exists for diagnostics and comparisons only.
//!
//! Every family exposes the same four operations, each in two forms: a
//! 3-argument closed form over `(compression, n)` and a normalized form over
//! a precomputed [`ScaleFunction::normalizer`] constant for cheap reuse in
//! inner loops.

use serde::{Deserialize, Serialize};

/// Quantiles are clamped away from 0 and 1 before entering any logarithm
/// or arcsine.
const Q_EPS: f64 = 1e-15;

#[inline]
fn clamp_q(q: f64) -> f64 {
    q.max(Q_EPS).min(1.0 - Q_EPS)
}

/// K2 denominator: bounds the cluster count independently of `n`.
#[inline]
fn z2(compression: f64, n: f64) -> f64 {
    4.0 * (n / compression).ln() + 24.0
}

/// K3 denominator: like K2 with a tighter tail bound.
#[inline]
fn z3(compression: f64, n: f64) -> f64 {
    4.0 * (n / compression).ln() + 21.0
}

/// The scale-function family used by a digest.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScaleFunction {
    /// Linear: uniform cluster sizes. Diagnostic use only.
    K0,
    /// Arcsine: cluster size proportional to sqrt(q(1-q)).
    K1,
    /// Logistic: log(q/(1-q)); forces unit clusters at the extremes.
    K2,
    /// Double-log tails (DEFAULT): strictest tail discipline.
    #[default]
    K3,
}

impl ScaleFunction {
    /// Precompute the constant `N` with `k(q) = N * f(q)` so repeated
    /// evaluations avoid the per-family denominators.
    pub fn normalizer(self, compression: f64, n: f64) -> f64 {
        match self {
            ScaleFunction::K0 => compression / 2.0,
            ScaleFunction::K1 => compression / (2.0 * std::f64::consts::PI),
            ScaleFunction::K2 => compression / z2(compression, n),
            ScaleFunction::K3 => compression / z3(compression, n),
        }
    }

    /// `k(q)` in closed form over `(compression, n)`.
    pub fn k(self, q: f64, compression: f64, n: f64) -> f64 {
        let q = clamp_q(q);
        match self {
            ScaleFunction::K0 => compression * q / 2.0,
            ScaleFunction::K1 => {
                compression / (2.0 * std::f64::consts::PI) * (2.0 * q - 1.0).asin()
            }
            ScaleFunction::K2 => compression * (q / (1.0 - q)).ln() / z2(compression, n),
            ScaleFunction::K3 => {
                let f = if q <= 0.5 {
                    (2.0 * q).ln()
                } else {
                    -(2.0 * (1.0 - q)).ln()
                };
                compression * f / z3(compression, n)
            }
        }
    }

    /// `k(q)` against a precomputed normalizer.
    pub fn k_norm(self, q: f64, normalizer: f64) -> f64 {
        let q = clamp_q(q);
        match self {
            ScaleFunction::K0 => normalizer * q,
            ScaleFunction::K1 => normalizer * (2.0 * q - 1.0).asin(),
            ScaleFunction::K2 => normalizer * (q / (1.0 - q)).ln(),
            ScaleFunction::K3 => {
                let f = if q <= 0.5 {
                    (2.0 * q).ln()
                } else {
                    -(2.0 * (1.0 - q)).ln()
                };
                normalizer * f
            }
        }
    }

    /// Inverse of [`ScaleFunction::k`].
    pub fn q(self, k: f64, compression: f64, n: f64) -> f64 {
        self.q_norm(k, self.normalizer(compression, n))
    }

    /// Inverse of [`ScaleFunction::k_norm`]. Always lands in [0, 1].
    pub fn q_norm(self, k: f64, normalizer: f64) -> f64 {
        let x = k / normalizer;
        match self {
            ScaleFunction::K0 => x.clamp(0.0, 1.0),
            ScaleFunction::K1 => {
                let theta = x.clamp(
                    -std::f64::consts::FRAC_PI_2,
                    std::f64::consts::FRAC_PI_2,
                );
                (theta.sin() + 1.0) / 2.0
            }
            ScaleFunction::K2 => {
                // 1/(1+e^-x) stays accurate for large |x| where e^x/(1+e^x)
                // would overflow.
                1.0 / (1.0 + (-x).exp())
            }
            ScaleFunction::K3 => {
                if k <= 0.0 {
                    x.exp() / 2.0
                } else {
                    1.0 - (-x).exp() / 2.0
                }
            }
        }
    }

    /// Largest quantile step a cluster centered at `q` may take while
    /// `k(q + step) - k(q) <= 1` (and symmetrically downward).
    pub fn max_step(self, q: f64, compression: f64, n: f64) -> f64 {
        self.max_step_norm(q, self.normalizer(compression, n))
    }

    /// Normalized form of [`ScaleFunction::max_step`].
    ///
    /// The first-order step `1/k'(q)` is capped by the exact inverse step in
    /// both directions; the linear estimate alone overshoots the unit budget
    /// once the normalizer drops near 1 (small compression with huge `n`).
    pub fn max_step_norm(self, q: f64, normalizer: f64) -> f64 {
        let linear = match self {
            ScaleFunction::K0 => 1.0 / normalizer,
            ScaleFunction::K1 => {
                2.0 * (0.5 / normalizer).sin() * (q * (1.0 - q)).max(0.0).sqrt()
            }
            ScaleFunction::K2 => q * (1.0 - q) / normalizer,
            ScaleFunction::K3 => q.min(1.0 - q) / normalizer,
        };
        let k = self.k_norm(q, normalizer);
        let mut step = linear;
        // The caps only matter when the opposing domain edge is more than a
        // full unit away in k; inside that band the [0,1] clamp already keeps
        // any step within budget.
        if self.k_norm(1.0, normalizer) - k > 1.0 {
            step = step.min(self.q_norm(k + 1.0, normalizer) - q);
        }
        if k - self.k_norm(0.0, normalizer) > 1.0 {
            step = step.min(q - self.q_norm(k - 1.0, normalizer));
        }
        step.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ScaleFunction; 4] = [
        ScaleFunction::K0,
        ScaleFunction::K1,
        ScaleFunction::K2,
        ScaleFunction::K3,
    ];

    #[test]
    fn k_is_monotone_in_q() {
        for scale in ALL {
            let norm = scale.normalizer(100.0, 10_000.0);
            let mut prev = f64::NEG_INFINITY;
            for i in 0..=1_000 {
                let q = i as f64 / 1_000.0;
                let k = scale.k_norm(q, norm);
                assert!(k >= prev, "{scale:?}: k not monotone at q={q}");
                prev = k;
            }
        }
    }

    #[test]
    fn center_of_symmetric_scales_is_zero() {
        for scale in [ScaleFunction::K1, ScaleFunction::K2, ScaleFunction::K3] {
            let k = scale.k(0.5, 100.0, 1_000.0);
            assert!(k.abs() < 1e-12, "{scale:?}: k(0.5)={k}");
        }
    }

    #[test]
    fn normalizer_positive_on_grid() {
        for scale in ALL {
            for compression in [10.0, 30.0, 100.0, 300.0, 1000.0] {
                for n in [10.0, 1e3, 1e6, 1e9] {
                    let norm = scale.normalizer(compression, n);
                    assert!(
                        norm > 0.0,
                        "{scale:?}: normalizer({compression}, {n}) = {norm}"
                    );
                }
            }
        }
    }

    #[test]
    fn max_step_stays_in_unit_interval() {
        for scale in ALL {
            for i in 0..=100 {
                let q = i as f64 / 100.0;
                let step = scale.max_step(q, 10.0, 1e9);
                assert!((0.0..=1.0).contains(&step), "{scale:?}: step {step} at q={q}");
            }
        }
    }

    #[test]
    fn q_norm_saturates() {
        for scale in ALL {
            let norm = scale.normalizer(100.0, 1e6);
            assert!(scale.q_norm(-1e9, norm) <= 1e-9);
            assert!(scale.q_norm(1e9, norm) >= 1.0 - 1e-9);
        }
    }
}
