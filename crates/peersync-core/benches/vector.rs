use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use peersync_core::{Counter, ShortId, Vector};

const FLEET_SIZES: [u64; 4] = [2, 8, 32, 128];

/// Two vectors over `devices` ids that disagree on every other device.
fn concurrent_pair(devices: u64) -> (Vector, Vector) {
    let a = Vector::from_counters((0..devices).map(|id| Counter::new(id * 7, id % 2 + 1)));
    let b = Vector::from_counters((0..devices).map(|id| Counter::new(id * 7, 2 - id % 2)));
    (a, b)
}

fn bench_vector(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector");

    for devices in FLEET_SIZES {
        let (a, b) = concurrent_pair(devices);

        group.bench_with_input(BenchmarkId::new("compare", devices), &(&a, &b), |bench, (a, b)| {
            bench.iter(|| black_box(a.compare(b)));
        });

        group.bench_with_input(BenchmarkId::new("merge", devices), &(&a, &b), |bench, (a, b)| {
            bench.iter(|| black_box(a.copy().merge(b)));
        });

        group.bench_with_input(BenchmarkId::new("update_new_device", devices), &a, |bench, a| {
            bench.iter(|| black_box(a.copy().update(ShortId(3))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_vector);
criterion_main!(benches);
