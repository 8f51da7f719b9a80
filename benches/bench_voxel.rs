use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use voxdiff::{PointBudget, PointCloud};
use voxdiff_volume::{estimate, occupied_voxels};

fn random_cloud(n: usize, seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = (0..n).map(|_| rng.gen_range(0.0f64..100.0)).collect();
    let y = (0..n).map(|_| rng.gen_range(0.0f64..100.0)).collect();
    let z = (0..n).map(|_| rng.gen_range(0.0f64..10.0)).collect();
    PointCloud::from_xyz(x, y, z)
}

fn bench_voxel(c: &mut Criterion) {
    let mut group = c.benchmark_group("occupied_voxels");
    for size in [10_000, 100_000, 1_000_000] {
        let cloud = random_cloud(size, 42);
        group.bench_with_input(BenchmarkId::new("voxdiff", size), &cloud, |b, cloud| {
            b.iter(|| occupied_voxels(cloud, 0.05))
        });
    }
    group.finish();
}

fn bench_budgeted_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_budgeted");
    let cloud = random_cloud(1_000_000, 7);
    for budget in [10_000, 100_000, 500_000] {
        group.bench_with_input(BenchmarkId::new("voxdiff", budget), &budget, |b, &budget| {
            let mut rng = StdRng::seed_from_u64(1);
            b.iter(|| estimate(&cloud, 0.05, PointBudget::Max(budget), &mut rng))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_voxel, bench_budgeted_estimate);
criterion_main!(benches);
