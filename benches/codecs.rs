//! Criterion benchmarks for the Simple-N codecs and the log histogram.

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use taildigest::codec::{decode_words, Simple32, Simple64};
use taildigest::LogHistogram;
use taildigest_testdata::{gen_dataset, DistKind};

fn counts(n: usize, max: u64, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(0..max)).collect()
}

fn bench_encode(c: &mut Criterion) {
    let n = 1_000_000usize;
    let cases = [("3bit", 8u64), ("8bit", 256), ("20bit", 1 << 20)];

    let mut g = c.benchmark_group("simple64/encode");
    for (label, max) in cases {
        let xs = counts(n, max, 1);
        g.throughput(Throughput::Elements(n as u64));
        g.bench_with_input(BenchmarkId::from_parameter(label), &xs, |b, xs| {
            b.iter(|| black_box(Simple64::encode_all(black_box(xs)).unwrap().len()));
        });
    }
    g.finish();

    let xs = counts(n, 8, 2);
    let mut g32 = c.benchmark_group("simple32/encode");
    g32.throughput(Throughput::Elements(n as u64));
    g32.bench_function("3bit", |b| {
        b.iter(|| black_box(Simple32::encode_all(black_box(&xs)).unwrap().len()));
    });
    g32.finish();
}

fn bench_decode(c: &mut Criterion) {
    let xs = counts(1_000_000, 8, 3);
    let words = Simple64::encode_all(&xs).unwrap();

    let mut g = c.benchmark_group("simple64/decode");
    g.throughput(Throughput::Elements(xs.len() as u64));
    g.bench_function("3bit", |b| {
        b.iter(|| black_box(decode_words(black_box(&words)).unwrap().len()));
    });
    g.finish();
}

fn bench_histogram(c: &mut Criterion) {
    let data = gen_dataset(DistKind::LogNormal { sigma: 1.0 }, 1_000_000, 4);

    let mut g = c.benchmark_group("histogram/fit");
    g.throughput(Throughput::Elements(data.len() as u64));
    g.bench_function("lognormal_1m", |b| {
        b.iter(|| {
            let mut h = LogHistogram::new(0.001, 1_000.0, 0.05).unwrap();
            for &x in &data {
                h.fit(black_box(x)).unwrap();
            }
            black_box(h.total())
        });
    });
    g.finish();

    let mut h = LogHistogram::new(0.001, 1_000.0, 0.05).unwrap();
    for &x in &data {
        h.fit(x).unwrap();
    }
    let mut g_bytes = c.benchmark_group("histogram/to_bytes");
    g_bytes.bench_function("packed", |b| {
        b.iter(|| black_box(h.to_bytes().unwrap().len()));
    });
    g_bytes.finish();
}

fn configure() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(2))
        .sample_size(30)
        .without_plots()
}

criterion_group!(
    name = codec_benches;
    config = configure();
    targets = bench_encode, bench_decode, bench_histogram
);

criterion_main!(codec_benches);
