//! Structural invariants under chunked ingestion and digest merging, for
//! every tail-weighted scale family.

use taildigest::{MergingDigest, ScaleFunction};
use taildigest_testdata::{gen_dataset, DistKind};

const SCALES: [ScaleFunction; 3] = [ScaleFunction::K1, ScaleFunction::K2, ScaleFunction::K3];
const SIZES: [usize; 5] = [1, 10, 100, 1_000, 1_000_000];

fn build(scale: ScaleFunction, n: usize, seed: u64) -> MergingDigest {
    let mut td = MergingDigest::with_scale(100.0, scale);
    let data = gen_dataset(DistKind::Uniform, n, seed);
    // chunked ingestion: uneven chunk sizes exercise the buffer thresholds
    for chunk in data.chunks(617) {
        td.fit_all(chunk).unwrap();
    }
    td
}

#[test]
fn chunked_ingestion_keeps_invariants() {
    for scale in SCALES {
        for &n in &SIZES {
            let td = build(scale, n, n as u64);
            assert_eq!(td.count(), n as f64);
            td.check_weights()
                .unwrap_or_else(|e| panic!("{scale:?} n={n}: {e}"));
        }
    }
}

#[test]
fn pairwise_merges_keep_invariants() {
    for scale in SCALES {
        let digests: Vec<MergingDigest> = SIZES
            .iter()
            .map(|&n| build(scale, n, 7 + n as u64))
            .collect();
        for (i, a) in digests.iter().enumerate() {
            for (j, b) in digests.iter().enumerate() {
                let mut merged = a.clone();
                merged.merge(b).unwrap();
                assert_eq!(merged.count(), (SIZES[i] + SIZES[j]) as f64);
                merged
                    .check_weights()
                    .unwrap_or_else(|e| panic!("{scale:?} merge {i}x{j}: {e}"));
            }
        }
    }
}

#[test]
fn merged_uniform_streams_track_the_true_cdf() {
    let mut a = MergingDigest::new(100.0);
    let mut b = MergingDigest::new(100.0);
    a.fit_all(&gen_dataset(DistKind::Uniform, 1_000_000, 11)).unwrap();
    b.fit_all(&gen_dataset(DistKind::Uniform, 1_000_000, 12)).unwrap();
    a.merge(&b).unwrap();
    a.check_weights().unwrap();

    // K3 accuracy envelope away from the extreme tails
    let xs: Vec<f64> = (1..=999).map(|i| i as f64 / 1_000.0).collect();
    let ps = a.cdf_many(&xs).unwrap();
    let worst = xs
        .iter()
        .zip(&ps)
        .map(|(&x, &p)| (p - x).abs())
        .fold(0.0_f64, f64::max);
    assert!(worst <= 0.005, "worst |cdf - q| = {worst}");
}

#[test]
fn merge_order_does_not_change_totals() {
    let mut forward = MergingDigest::new(200.0);
    let mut backward = MergingDigest::new(200.0);
    let parts: Vec<MergingDigest> = (0..8)
        .map(|s| {
            let mut td = MergingDigest::new(200.0);
            td.fit_all(&gen_dataset(DistKind::LogNormal { sigma: 1.5 }, 20_000, s))
                .unwrap();
            td
        })
        .collect();
    for p in &parts {
        forward.merge(p).unwrap();
    }
    for p in parts.iter().rev() {
        backward.merge(p).unwrap();
    }
    assert_eq!(forward.count(), backward.count());
    assert_eq!(forward.min(), backward.min());
    assert_eq!(forward.max(), backward.max());
    forward.check_weights().unwrap();
    backward.check_weights().unwrap();

    let f50 = forward.quantile(0.5).unwrap();
    let b50 = backward.quantile(0.5).unwrap();
    let rel = (f50 - b50).abs() / f50.abs().max(1e-12);
    assert!(rel < 0.1, "medians diverge: {f50} vs {b50}");
}

#[test]
fn single_level_compression_also_holds() {
    for scale in SCALES {
        let mut td = MergingDigest::with_params(60.0, 300, false, scale);
        td.fit_all(&gen_dataset(DistKind::Normal { mean: 5.0, sd: 2.0 }, 50_000, 3))
            .unwrap();
        td.check_weights().unwrap();
        td.compress().unwrap();
        td.check_weights().unwrap();
    }
}
