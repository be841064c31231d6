use crate::grid_sampler::GridJitter;
use crate::motion_gate::MotionGate;
use crate::unprojection::OrientationCorrection;

/// Construction-time parameters of an [AccumulationEngine](crate::engine::AccumulationEngine)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CaptureConfig {
    /// Maximum number of points kept; older points are overwritten once it is reached
    pub ring_capacity: usize,
    /// Number of grid points sampled per accumulated frame
    pub grid_point_count: usize,
    /// Resolution that the sample grid is laid out for. Only the aspect ratio matters
    pub grid_width: u32,
    pub grid_height: u32,
    pub grid_jitter: Option<GridJitter>,
    pub orientation_correction: OrientationCorrection,
    /// Rotation in degrees that triggers accumulation at the regular sampling rate
    pub rotation_threshold_degrees: f32,
    /// Translation in meters that triggers accumulation at the regular sampling rate
    pub translation_threshold_meters: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 500_000,
            grid_point_count: 2_000,
            grid_width: 256,
            grid_height: 192,
            grid_jitter: None,
            orientation_correction: OrientationCorrection::default(),
            rotation_threshold_degrees: 2.0,
            translation_threshold_meters: 0.02,
        }
    }
}

impl CaptureConfig {
    pub fn motion_gate(&self) -> MotionGate {
        MotionGate::new(self.rotation_threshold_degrees, self.translation_threshold_meters)
    }
}
