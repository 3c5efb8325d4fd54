//! Labeled assertion helpers and reference implementations shared by the
//! unit and integration tests. Not part of the supported API.

pub fn assert_exact(label: &str, expected: f64, got: f64) {
    assert!(
        expected == got || (expected.is_nan() && got.is_nan()),
        "{}: expected exactly {:.17}, got {:.17}",
        label,
        expected,
        got
    );
}

pub fn assert_rel_close(label: &str, expected: f64, got: f64, rtol: f64) {
    let denom = expected.abs().max(1e-300);
    let rel = (expected - got).abs() / denom;
    assert!(
        rel < rtol,
        "{}: expected ~= {:.9}, got {:.9}, rel_err={:.6e}, rtol={:.6e}",
        label,
        expected,
        got,
        rel,
        rtol
    );
}

pub fn assert_abs_close(label: &str, expected: f64, got: f64, atol: f64) {
    let abs = (expected - got).abs();
    assert!(
        abs <= atol,
        "{}: expected ~= {:.12}, got {:.12}, abs_err={:.6e}, atol={:.6e}",
        label,
        expected,
        got,
        abs,
        atol
    );
}

pub fn assert_monotone_chain(label: &str, values: &[f64]) {
    for i in 1..values.len() {
        assert!(
            values[i] >= values[i - 1],
            "{}: non-monotone at i={}: {} < {}",
            label,
            i,
            values[i],
            values[i - 1]
        );
    }
}

/// Empirical CDF with the midpoint convention on ties:
/// `(#{x_i < x} + #{x_i == x}/2) / n`.
pub fn reference_cdf(sorted: &[f64], x: f64) -> f64 {
    let n = sorted.len();
    assert!(n > 0, "reference_cdf needs data");
    let below = sorted.iter().filter(|&&v| v < x).count() as f64;
    let at = sorted.iter().filter(|&&v| v == x).count() as f64;
    (below + at / 2.0) / n as f64
}

/// Sample quantile under the rank convention a digest of pure singletons
/// realizes: the i-th order statistic owns ranks `[i, i+1)`, with the
/// extreme samples pinned at q=0 and q=1.
pub fn reference_quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    assert!(n > 0, "reference_quantile needs data");
    assert!((0.0..=1.0).contains(&q), "q={q} out of range");
    let index = q * n as f64;
    if index < 1.0 {
        return sorted[0];
    }
    if index > n as f64 - 1.0 {
        return sorted[n - 1];
    }
    sorted[index.floor() as usize]
}
