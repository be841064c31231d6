use arcap_algorithms::{
    normal_estimation::estimate_normals, outlier_removal::statistical_outlier_removal,
    voxel_grid::voxel_downsample,
};
use arcap_core::{containers::Object3D, nalgebra::Vector3};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};

const NUM_POINTS_SMALL: usize = 1000;
const NUM_POINTS_MEDIUM: usize = 10000;
const NUM_POINTS_BIG: usize = 100000;
/// a full ring buffer at the default capture capacity
const NUM_POINTS_CAPTURE: usize = 500000;

fn get_dummy_object(num_points: usize) -> Object3D {
    let mut rng = StdRng::seed_from_u64(num_points as u64);
    let range = Uniform::new(-1.0f32, 1.0);
    let vertices = (0..num_points)
        .map(|_| Vector3::new(rng.sample(range), rng.sample(range), rng.sample(range) * 0.05))
        .collect();
    Object3D::from_vertices(vertices)
}

fn bench(c: &mut Criterion) {
    for num_points in [NUM_POINTS_SMALL, NUM_POINTS_MEDIUM, NUM_POINTS_BIG] {
        let object = get_dummy_object(num_points);
        c.bench_function(&format!("voxel_downsample_{}", num_points), |b| {
            b.iter(|| voxel_downsample(&object, 0.05))
        });
        c.bench_function(&format!("statistical_outlier_removal_{}", num_points), |b| {
            b.iter(|| statistical_outlier_removal(&object, 20, 2.0))
        });
    }

    let object = get_dummy_object(NUM_POINTS_CAPTURE);
    let mut group = c.benchmark_group("capture_size");
    group.sample_size(10);
    group.bench_function("voxel_downsample_500000", |b| {
        b.iter(|| voxel_downsample(&object, 0.01))
    });
    group.finish();

    let object = get_dummy_object(NUM_POINTS_MEDIUM);
    c.bench_function("estimate_normals_10000", |b| {
        b.iter(|| estimate_normals(&object, 0.1, 30))
    });
}

criterion_group!(benches, bench);
criterion_main!(benches);
