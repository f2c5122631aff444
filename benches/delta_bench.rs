//! Benchmarks for delta computation and merging
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use deltaproxy::timeseries::{compute_deltas, merge, trim, Extent, Fragment, Point, Series};

const STEP: i64 = 60_000;

fn create_series(start: i64, count: usize) -> Series {
    Series::from_points(
        (0..count)
            .map(|i| Point::new(start + i as i64 * STEP, i as f64))
            .collect(),
    )
}

/// Coverage with a one-step hole every `every` steps
fn fragmented_coverage(count: usize, every: usize) -> Vec<Extent> {
    (0..count / every)
        .map(|i| {
            let start = (i * every) as i64 * STEP;
            Extent::new(start, start + (every as i64 - 2) * STEP)
        })
        .collect()
}

fn bench_compute_deltas(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_deltas");

    for extents in [1, 100, 1000] {
        let coverage = fragmented_coverage(extents * 10, 10);
        let requested = Extent::new(0, (extents * 10) as i64 * STEP);

        group.throughput(Throughput::Elements(extents as u64));
        group.bench_function(format!("extents_{}", extents), |b| {
            b.iter(|| compute_deltas(black_box(&requested), black_box(&coverage), STEP))
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for size in [1_000, 10_000] {
        let existing = create_series(0, size);
        let existing_extents = vec![Extent::new(0, (size as i64 - 1) * STEP)];
        let tail_start = size as i64 * STEP;
        let fragments = vec![Fragment::new(
            Extent::new(tail_start, tail_start + 99 * STEP),
            create_series(tail_start, 100),
        )];

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("append_{}", size), |b| {
            b.iter(|| {
                merge(
                    black_box(&existing),
                    black_box(&existing_extents),
                    black_box(&fragments),
                    STEP,
                )
            })
        });

        let merged = merge(&existing, &existing_extents, &fragments, STEP).0;
        let window = Extent::new(tail_start - 500 * STEP, tail_start + 50 * STEP);
        group.bench_function(format!("trim_{}", size), |b| {
            b.iter(|| trim(black_box(&merged), black_box(&window)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute_deltas, bench_merge);
criterion_main!(benches);
