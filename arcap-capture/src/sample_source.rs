use nalgebra::{Matrix4, Vector2};

use crate::unprojection::CameraIntrinsics;

/// A dense 2D grid of per-pixel values, stored row by row
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGrid<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

/// Metric depth per pixel
pub type DepthMap = ImageGrid<f32>;
/// Discrete sensor confidence per pixel (0 = low, 1 = medium, 2 = high)
pub type ConfidenceMap = ImageGrid<u8>;
/// 8-bit RGB per pixel
pub type ColorImage = ImageGrid<[u8; 3]>;

impl<T: Copy> ImageGrid<T> {
    /// Creates a new `ImageGrid` from row-major `data`
    ///
    /// # Panics
    ///
    /// If `data.len() != width * height`
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Self {
        if data.len() != width * height {
            panic!(
                "ImageGrid::new: Expected {} values for a {}x{} image but got {}",
                width * height,
                width,
                height,
                data.len()
            );
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Creates a new `ImageGrid` by evaluating `f(x, y)` for every pixel
    pub fn from_fn<F: FnMut(usize, usize) -> T>(width: usize, height: usize, mut f: F) -> Self {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Creates a new `ImageGrid` where every pixel has the same value
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    /// Samples the pixel containing the normalized coordinate `uv`. Coordinates outside of `[0, 1]` yield `None`,
    /// a coordinate of exactly `1` addresses the last row/column
    pub fn sample(&self, uv: &Vector2<f32>) -> Option<T> {
        if self.data.is_empty() || !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
            return None;
        }
        let x = ((uv.x * self.width as f32) as usize).min(self.width - 1);
        let y = ((uv.y * self.height as f32) as usize).min(self.height - 1);
        self.get(x, y)
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }
}

/// Per-frame sensor data consumed by the accumulation engine
///
/// Every accessor may return `None` when the platform has no data for the current frame (e.g. tracking was lost),
/// in which case the frame is skipped. Images are addressed by normalized coordinates, so the depth, confidence and
/// color images may have different resolutions.
pub trait SampleSource {
    /// Camera-to-world transform of the current frame
    fn current_pose(&self) -> Option<Matrix4<f32>>;
    /// Intrinsics of the camera for the current frame
    fn intrinsics(&self) -> Option<CameraIntrinsics>;
    fn depth_map(&self) -> Option<&DepthMap>;
    fn confidence_map(&self) -> Option<&ConfidenceMap>;
    fn color_image(&self) -> Option<&ColorImage>;
}

/// A [SampleSource] that holds the data of a single frame
#[derive(Debug, Clone, Default)]
pub struct CameraFrame {
    pub pose: Option<Matrix4<f32>>,
    pub intrinsics: Option<CameraIntrinsics>,
    pub depth: Option<DepthMap>,
    pub confidence: Option<ConfidenceMap>,
    pub color: Option<ColorImage>,
}

impl SampleSource for CameraFrame {
    fn current_pose(&self) -> Option<Matrix4<f32>> {
        self.pose
    }

    fn intrinsics(&self) -> Option<CameraIntrinsics> {
        self.intrinsics
    }

    fn depth_map(&self) -> Option<&DepthMap> {
        self.depth.as_ref()
    }

    fn confidence_map(&self) -> Option<&ConfidenceMap> {
        self.confidence.as_ref()
    }

    fn color_image(&self) -> Option<&ColorImage> {
        self.color.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_nearest_pixel() {
        let image = ImageGrid::from_fn(4, 2, |x, y| (y * 4 + x) as u8);
        assert_eq!(Some(0), image.sample(&Vector2::new(0.0, 0.0)));
        assert_eq!(Some(2), image.sample(&Vector2::new(0.6, 0.4)));
        assert_eq!(Some(7), image.sample(&Vector2::new(1.0, 1.0)));
        assert_eq!(Some(5), image.sample(&Vector2::new(0.3, 0.9)));
        assert_eq!(None, image.sample(&Vector2::new(1.1, 0.5)));
        assert_eq!(None, image.sample(&Vector2::new(f32::NAN, 0.5)));
    }

    #[test]
    #[should_panic(expected = "Expected 6 values for a 3x2 image but got 5")]
    fn test_wrong_data_length() {
        ImageGrid::new(3, 2, vec![0.0f32; 5]);
    }
}
