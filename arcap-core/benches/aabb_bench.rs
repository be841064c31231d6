use arcap_core::math::AABB;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;
use rand::{thread_rng, Rng};

fn gen_random_positions(count: usize) -> Vec<Vector3<f32>> {
    let mut rng = thread_rng();
    (0..count)
        .map(|_| Vector3::new(rng.gen(), rng.gen(), rng.gen()))
        .collect()
}

fn aabb_from_positions(positions: &[Vector3<f32>]) {
    black_box(AABB::from_positions(positions.iter()));
}

fn aabb_bounding_cube(positions: &[Vector3<f32>]) {
    let bounds: AABB<f32> = positions.iter().copied().collect();
    black_box(bounds.bounding_cube(1.1));
}

fn bench(c: &mut Criterion) {
    let random_positions = gen_random_positions(100_000);

    c.bench_function("aabb_from_positions", |b| {
        b.iter(|| aabb_from_positions(&random_positions));
    });
    c.bench_function("aabb_bounding_cube", |b| {
        b.iter(|| aabb_bounding_cube(&random_positions));
    });
}

criterion_group! {
    name = aabb;
    config = Criterion::default().sample_size(40);
    targets = bench
}
criterion_main!(aabb);
