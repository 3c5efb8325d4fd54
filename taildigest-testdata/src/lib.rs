//! taildigest-testdata
//! Synthetic data generators shared by benches and tests.
//! Shapes are chosen to stress the digest in different ways: smooth mass,
//! heavy tails, and the repeated-key piles that exercise compression
//! stability.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Normal};

/// Available synthetic distributions.
#[derive(Clone, Copy, Debug)]
pub enum DistKind {
    /// Uniform in \[0,1)
    Uniform,
    /// Gaussian with the given mean and standard deviation
    Normal { mean: f64, sd: f64 },
    /// exp(N(0, sigma^2)); long right tail
    LogNormal { sigma: f64 },
    /// A handful of exact keys drawn with skewed frequencies; produces long
    /// runs of identical values
    RepeatedKeys,
}

/// Generate `n` samples for the chosen distribution with a fixed seed.
pub fn gen_dataset(kind: DistKind, n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(n);

    match kind {
        DistKind::Uniform => {
            for _ in 0..n {
                out.push(rng.random::<f64>());
            }
        }
        DistKind::Normal { mean, sd } => {
            let normal = Normal::new(mean, sd).unwrap();
            for _ in 0..n {
                out.push(normal.sample(&mut rng));
            }
        }
        DistKind::LogNormal { sigma } => {
            let lognormal = LogNormal::new(0.0, sigma).unwrap();
            for _ in 0..n {
                out.push(lognormal.sample(&mut rng));
            }
        }
        DistKind::RepeatedKeys => {
            // 1 and 7 are rare; the middle keys dominate.
            const KEYS: [f64; 7] = [1.0, 2.0, 3.0, 3.0, 4.0, 5.0, 7.0];
            for _ in 0..n {
                let pick: u32 = rng.random_range(0..100);
                let v = match pick {
                    0..=2 => KEYS[0],
                    3..=34 => KEYS[1],
                    35..=74 => KEYS[2],
                    75..=89 => KEYS[4],
                    90..=97 => KEYS[5],
                    _ => KEYS[6],
                };
                out.push(v);
            }
        }
    }
    out
}

/// Same samples, sorted ascending. NaN never occurs in generated data.
pub fn gen_sorted(kind: DistKind, n: usize, seed: u64) -> Vec<f64> {
    let mut xs = gen_dataset(kind, n, seed);
    xs.sort_by(|a, b| a.total_cmp(b));
    xs
}
