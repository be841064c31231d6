use arcap_core::containers::{shared_ring_buffer, CapturedPoint, ConfidenceLevel, PointRingBuffer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector3;
use rand::{thread_rng, Rng};

const CAPACITY: usize = 500_000;

fn gen_random_batch(count: usize) -> Vec<CapturedPoint> {
    let mut rng = thread_rng();
    (0..count)
        .map(|_| {
            CapturedPoint::new(
                Vector3::new(rng.gen(), rng.gen(), rng.gen()),
                Vector3::new(rng.gen(), rng.gen(), rng.gen()),
                ConfidenceLevel::from_byte(rng.gen_range(0..3)),
            )
        })
        .collect()
}

fn bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer_push_batch");
    for batch_size in [500, 2_000, 8_000] {
        let batch = gen_random_batch(batch_size);
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch, |b, batch| {
            let mut buffer = PointRingBuffer::with_capacity(CAPACITY);
            b.iter(|| black_box(buffer.push_batch(batch)));
        });
    }
    group.finish();

    let batch = gen_random_batch(2_000);
    c.bench_function("shared_ring_buffer_push_and_snapshot", |b| {
        let (writer, reader) = shared_ring_buffer(CAPACITY);
        b.iter(|| {
            writer.push_batch(&batch);
            black_box(reader.with_raw_view(|view| view.count));
        });
    });
}

criterion_group! {
    name = ring_buffer;
    config = Criterion::default().sample_size(40);
    targets = bench
}
criterion_main!(ring_buffer);
