use nalgebra::Vector2;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Optional random displacement of the grid points. The displacement of each point is drawn uniformly from
/// `[-amount / 2, amount / 2] * spacing` on both axes, using a generator seeded with `seed`
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridJitter {
    pub amount: f32,
    pub seed: u64,
}

/// A fixed set of sample coordinates over the camera image, computed once and reused for every frame
///
/// Coordinates are normalized to `[0, 1]` on both axes, so they can address any image of the sensor stream
/// regardless of its resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSampler {
    points: Vec<Vector2<f32>>,
}

impl GridSampler {
    /// Creates a `GridSampler` with `count` points laid out for an image of `width` x `height` pixels
    pub fn new(count: usize, width: u32, height: u32, jitter: Option<GridJitter>) -> Self {
        let mut points = Self::generate(count, width, height);
        if let Some(jitter) = jitter {
            apply_jitter(&mut points, count, width, height, jitter);
        }
        Self { points }
    }

    /// Generates exactly `count` staggered grid coordinates for an image of `width` x `height` pixels.
    ///
    /// The target spacing between neighbouring points is `sqrt(width * height / count)`. Points are emitted in
    /// row-major order and every other row is shifted by half a column, which covers the image more evenly than an
    /// aligned grid. The result only depends on the arguments.
    /// ```
    /// # use arcap_capture::grid_sampler::GridSampler;
    /// let points = GridSampler::generate(4, 4, 4);
    /// assert_eq!(4, points.len());
    /// assert_eq!(points, GridSampler::generate(4, 4, 4));
    /// ```
    pub fn generate(count: usize, width: u32, height: u32) -> Vec<Vector2<f32>> {
        if count == 0 {
            return vec![];
        }
        let width = (width as f32).max(1.0);
        let height = (height as f32).max(1.0);
        let spacing = (width * height / count as f32).sqrt();

        let columns = ((width / spacing).round() as usize).clamp(1, count);
        let rows = (count + columns - 1) / columns;
        let column_width = 1.0 / columns as f32;
        let row_height = 1.0 / rows as f32;

        (0..count)
            .map(|index| {
                let row = index / columns;
                let column = index % columns;
                let shift = if row % 2 == 0 { 0.25 } else { 0.75 };
                Vector2::new(
                    (column as f32 + shift) * column_width,
                    (row as f32 + 0.5) * row_height,
                )
            })
            .collect()
    }

    pub fn points(&self) -> &[Vector2<f32>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn apply_jitter(points: &mut [Vector2<f32>], count: usize, width: u32, height: u32, jitter: GridJitter) {
    if jitter.amount <= 0.0 || points.is_empty() {
        return;
    }
    let width = (width as f32).max(1.0);
    let height = (height as f32).max(1.0);
    let spacing = (width * height / count as f32).sqrt();
    let half_x = 0.5 * jitter.amount * spacing / width;
    let half_y = 0.5 * jitter.amount * spacing / height;

    let mut rng = StdRng::seed_from_u64(jitter.seed);
    for point in points.iter_mut() {
        point.x = (point.x + rng.gen_range(-half_x..=half_x)).clamp(0.0, 1.0);
        point.y = (point.y + rng.gen_range(-half_y..=half_y)).clamp(0.0, 1.0);
    }
}
