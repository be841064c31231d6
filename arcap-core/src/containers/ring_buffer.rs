use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::CapturedPoint;

/// Fixed-capacity storage for captured points that overwrites its oldest entries once it is full
///
/// All storage is allocated up front. Points are written at `write_cursor`, which wraps around modulo the
/// capacity. `live_count` grows with every write until it reaches the capacity and then stays there:
///
/// ```
/// # use arcap_core::containers::*;
/// let mut buffer = PointRingBuffer::with_capacity(10);
/// let batch = vec![CapturedPoint::default(); 4];
/// for (expected_live, expected_cursor) in [(4, 4), (8, 8), (10, 2)] {
///     buffer.push_batch(&batch);
///     assert_eq!(expected_live, buffer.live_count());
///     assert_eq!(expected_cursor, buffer.write_cursor());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PointRingBuffer {
    points: Vec<CapturedPoint>,
    write_cursor: usize,
    live_count: usize,
}

impl PointRingBuffer {
    /// Creates a new `PointRingBuffer` with room for exactly `capacity` points
    ///
    /// # Panics
    ///
    /// If `capacity` is zero
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("PointRingBuffer::with_capacity: capacity must be greater than zero");
        }
        Self {
            points: vec![CapturedPoint::default(); capacity],
            write_cursor: 0,
            live_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.points.len()
    }

    /// Number of valid points in this buffer
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Index that the next point will be written to
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    pub fn is_full(&self) -> bool {
        self.live_count == self.capacity()
    }

    /// Writes all points of `batch` starting at the current write cursor, wrapping around at the end of the
    /// storage. Returns the number of points written. A batch larger than the capacity overwrites itself,
    /// leaving its last `capacity` points in the buffer.
    pub fn push_batch(&mut self, batch: &[CapturedPoint]) -> usize {
        let capacity = self.capacity();
        let mut remaining = batch;
        while !remaining.is_empty() {
            let count = (capacity - self.write_cursor).min(remaining.len());
            self.points[self.write_cursor..self.write_cursor + count]
                .copy_from_slice(&remaining[..count]);
            self.write_cursor = (self.write_cursor + count) % capacity;
            remaining = &remaining[count..];
        }
        self.live_count = (self.live_count + batch.len()).min(capacity);
        batch.len()
    }

    /// Resets the cursor and live count to zero and overwrites all stored points with the neutral point value
    pub fn clear(&mut self) {
        self.points.fill(CapturedPoint::default());
        self.write_cursor = 0;
        self.live_count = 0;
    }

    /// Returns the valid points, i.e. the range `[0, live_count)`
    pub fn live_points(&self) -> &[CapturedPoint] {
        &self.points[..self.live_count]
    }

    pub fn get(&self, index: usize) -> Option<&CapturedPoint> {
        self.live_points().get(index)
    }

    /// Copies the valid points into a new `Vec`
    pub fn snapshot(&self) -> Vec<CapturedPoint> {
        self.live_points().to_vec()
    }

    /// Returns a raw view over the valid points for handing to a renderer
    pub fn raw_view(&self) -> RawPointView<'_> {
        RawPointView {
            bytes: bytemuck::cast_slice(self.live_points()),
            stride: std::mem::size_of::<CapturedPoint>(),
            count: self.live_count,
        }
    }
}

/// Read-only byte view over the live points of a [PointRingBuffer], laid out as `count` records of
/// `stride` bytes each (see [CapturedPoint] for the record layout)
#[derive(Debug, Clone, Copy)]
pub struct RawPointView<'a> {
    pub bytes: &'a [u8],
    pub stride: usize,
    pub count: usize,
}

/// Creates a [PointRingBuffer] with the given capacity that is shared between one writer and any number of readers.
///
/// The writer is meant to be owned by the accumulation engine. Every batch is written under a single write lock, so
/// readers on other threads see either all or none of a batch.
pub fn shared_ring_buffer(capacity: usize) -> (RingBufferWriter, RingBufferReader) {
    let inner = Arc::new(RwLock::new(PointRingBuffer::with_capacity(capacity)));
    (
        RingBufferWriter {
            inner: inner.clone(),
        },
        RingBufferReader { inner },
    )
}

/// Exclusive write access to a shared [PointRingBuffer]
#[derive(Debug)]
pub struct RingBufferWriter {
    inner: Arc<RwLock<PointRingBuffer>>,
}

impl RingBufferWriter {
    /// Writes `batch` as one unit. Returns the number of points written
    pub fn push_batch(&self, batch: &[CapturedPoint]) -> usize {
        self.write().push_batch(batch)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Returns `(live_count, write_cursor)`
    pub fn counters(&self) -> (usize, usize) {
        let buffer = self.read();
        (buffer.live_count(), buffer.write_cursor())
    }

    pub fn live_count(&self) -> usize {
        self.read().live_count()
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity()
    }

    /// Creates another reader for the buffer written by this writer
    pub fn reader(&self) -> RingBufferReader {
        RingBufferReader {
            inner: self.inner.clone(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, PointRingBuffer> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PointRingBuffer> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared read access to a [PointRingBuffer], e.g. for a render thread or an exporter
#[derive(Debug, Clone)]
pub struct RingBufferReader {
    inner: Arc<RwLock<PointRingBuffer>>,
}

impl RingBufferReader {
    pub fn live_count(&self) -> usize {
        self.read().live_count()
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity()
    }

    /// Copies the current live points
    pub fn snapshot(&self) -> Vec<CapturedPoint> {
        self.read().snapshot()
    }

    /// Calls `f` with a raw view over the current live points. The writer is blocked while `f` runs, so keep it short
    pub fn with_raw_view<R, F: FnOnce(RawPointView<'_>) -> R>(&self, f: F) -> R {
        let buffer = self.read();
        f(buffer.raw_view())
    }

    fn read(&self) -> RwLockReadGuard<'_, PointRingBuffer> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::ConfidenceLevel;
    use nalgebra::Vector3;
    use rand::{thread_rng, Rng};

    fn point_with_x(x: f32) -> CapturedPoint {
        CapturedPoint::new(
            Vector3::new(x, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            ConfidenceLevel::High,
        )
    }

    #[test]
    fn test_wrap_invariant_for_random_batch_sizes() {
        let mut rng = thread_rng();
        for _ in 0..50 {
            let capacity = rng.gen_range(1..64);
            let batch_size = rng.gen_range(1..20);
            let mut buffer = PointRingBuffer::with_capacity(capacity);
            let batch = vec![CapturedPoint::default(); batch_size];
            for k in 1..=10 {
                buffer.push_batch(&batch);
                assert_eq!((k * batch_size).min(capacity), buffer.live_count());
                assert_eq!((k * batch_size) % capacity, buffer.write_cursor());
            }
        }
    }

    #[test]
    fn test_overwrites_oldest_points() {
        let mut buffer = PointRingBuffer::with_capacity(3);
        buffer.push_batch(&[point_with_x(0.0), point_with_x(1.0)]);
        buffer.push_batch(&[point_with_x(2.0), point_with_x(3.0)]);
        let xs = buffer
            .live_points()
            .iter()
            .map(|p| p.position.x)
            .collect::<Vec<_>>();
        assert_eq!(vec![3.0, 1.0, 2.0], xs);
    }

    #[test]
    fn test_batch_larger_than_capacity() {
        let mut buffer = PointRingBuffer::with_capacity(2);
        let batch = (0..5).map(|i| point_with_x(i as f32)).collect::<Vec<_>>();
        assert_eq!(5, buffer.push_batch(&batch));
        assert_eq!(2, buffer.live_count());
        assert_eq!(1, buffer.write_cursor());
        assert_eq!(4.0, buffer.get(0).unwrap().position.x);
        assert_eq!(3.0, buffer.get(1).unwrap().position.x);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut buffer = PointRingBuffer::with_capacity(8);
        buffer.push_batch(&[point_with_x(1.0); 5]);
        buffer.clear();
        let once = (buffer.live_count(), buffer.write_cursor());
        buffer.clear();
        assert_eq!(once, (buffer.live_count(), buffer.write_cursor()));
        assert_eq!((0, 0), once);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_raw_view() {
        let mut buffer = PointRingBuffer::with_capacity(8);
        buffer.push_batch(&[point_with_x(1.0); 3]);
        let view = buffer.raw_view();
        assert_eq!(3, view.count);
        assert_eq!(28, view.stride);
        assert_eq!(view.count * view.stride, view.bytes.len());
    }

    #[test]
    fn test_readers_see_whole_batches() {
        let (writer, reader) = shared_ring_buffer(1024);
        let batch_size = 16;
        let handle = std::thread::spawn(move || {
            for i in 0..32 {
                writer.push_batch(&vec![point_with_x(i as f32); batch_size]);
            }
        });
        for _ in 0..100 {
            let count = reader.live_count();
            assert_eq!(0, count % batch_size);
        }
        handle.join().unwrap();
        assert_eq!(512, reader.snapshot().len());
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than zero")]
    fn test_zero_capacity() {
        PointRingBuffer::with_capacity(0);
    }
}
