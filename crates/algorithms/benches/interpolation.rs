//! Benchmarks for station interpolation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use staklim_algorithms::interpolation::{idw, IdwParams, SpatialCache};
use staklim_core::BoundingBox;

fn create_stations(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut lons = Vec::with_capacity(n);
    let mut lats = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        lons.push(((i * 37) % 997) as f64 / 997.0);
        lats.push(((i * 61) % 991) as f64 / 991.0);
        values.push(((i * 13) % 600) as f64);
    }
    (lons, lats, values)
}

fn bench_spatial_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolation/spatial_build");
    let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
    for n in [50, 200, 1000] {
        let (lons, lats, _) = create_stations(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let cache = SpatialCache::with_cell_size(0.005);
                cache
                    .get_spatial(black_box(&bounds), black_box(&lons), black_box(&lats), 6)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_idw(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolation/idw");
    let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
    for n in [50, 200, 1000] {
        let (lons, lats, values) = create_stations(n);
        let cache = SpatialCache::with_cell_size(0.005);
        let entry = cache.get_spatial(&bounds, &lons, &lats, 6).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| idw(black_box(&entry), black_box(&values), IdwParams::default()).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_spatial_build, bench_idw);
criterion_main!(benches);
