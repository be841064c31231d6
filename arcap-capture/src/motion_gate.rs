use nalgebra::{Matrix4, Vector3};

/// How eagerly new batches are accumulated per unit of camera motion
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum SamplingRate {
    Slow = 0,
    #[default]
    Regular = 1,
    Fast = 2,
}

impl SamplingRate {
    /// Motion thresholds are divided by this multiplier
    pub fn multiplier(&self) -> f32 {
        match self {
            SamplingRate::Slow => 0.5,
            SamplingRate::Regular => 1.0,
            SamplingRate::Fast => 2.0,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => SamplingRate::Slow,
            2 => SamplingRate::Fast,
            _ => SamplingRate::Regular,
        }
    }
}

/// Effective thresholds for a single accumulation decision
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MotionThresholds {
    /// Cosine of the angle the forward axis has to rotate by
    pub rotation_cosine: f32,
    /// Squared distance the camera has to move
    pub translation_squared: f32,
}

/// Decides whether the camera moved far enough since the last accumulated frame to justify a new batch
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MotionGate {
    base_angle_radians: f32,
    base_distance: f32,
}

impl Default for MotionGate {
    /// 2 degrees of rotation or 2 centimeters of translation at the regular sampling rate
    fn default() -> Self {
        Self::new(2.0, 0.02)
    }
}

impl MotionGate {
    pub fn new(base_angle_degrees: f32, base_distance_meters: f32) -> Self {
        Self {
            base_angle_radians: base_angle_degrees.to_radians(),
            base_distance: base_distance_meters,
        }
    }

    /// Derives the thresholds for the given sampling rates. The horizontal rate scales the rotation trigger and the
    /// vertical rate scales the translation trigger; faster rates require less motion.
    /// ```
    /// # use arcap_capture::motion_gate::*;
    /// let gate = MotionGate::default();
    /// let regular = gate.thresholds(SamplingRate::Regular, SamplingRate::Regular);
    /// let fast = gate.thresholds(SamplingRate::Fast, SamplingRate::Fast);
    /// assert!(fast.rotation_cosine > regular.rotation_cosine);
    /// assert!(fast.translation_squared < regular.translation_squared);
    /// ```
    pub fn thresholds(&self, horizontal: SamplingRate, vertical: SamplingRate) -> MotionThresholds {
        let angle = self.base_angle_radians / horizontal.multiplier();
        let distance = self.base_distance / vertical.multiplier();
        MotionThresholds {
            rotation_cosine: angle.cos(),
            translation_squared: distance * distance,
        }
    }

    /// Returns true if a new batch should be accumulated. Any one of the following is sufficient:
    /// - the buffer is empty (`live_count == 0`), or there is no previously accumulated pose
    /// - the forward axes of the two poses enclose an angle at least as large as the rotation threshold
    /// - the squared distance between the two camera positions reaches the translation threshold
    pub fn should_accumulate(
        current_pose: &Matrix4<f32>,
        last_accumulated_pose: Option<&Matrix4<f32>>,
        live_count: usize,
        thresholds: &MotionThresholds,
    ) -> bool {
        let last_pose = match last_accumulated_pose {
            Some(pose) if live_count > 0 => pose,
            _ => return true,
        };

        let rotation = forward_axis(current_pose).dot(&forward_axis(last_pose));
        if rotation <= thresholds.rotation_cosine {
            return true;
        }

        let translation = (translation(current_pose) - translation(last_pose)).norm_squared();
        translation >= thresholds.translation_squared
    }
}

fn forward_axis(pose: &Matrix4<f32>) -> Vector3<f32> {
    pose.fixed_view::<3, 1>(0, 2).into_owned()
}

fn translation(pose: &Matrix4<f32>) -> Vector3<f32> {
    pose.fixed_view::<3, 1>(0, 3).into_owned()
}
