use nalgebra::Vector3;
use static_assertions::const_assert;

/// Discrete reliability level that a depth sensor reports for each depth sample
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ConfidenceLevel {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl ConfidenceLevel {
    /// Maps a raw confidence value (as stored in a [CapturedPoint] or a confidence map) to a level.
    /// Values are rounded to the nearest level and clamped into the known range
    /// ```
    /// # use arcap_core::containers::ConfidenceLevel;
    /// assert_eq!(ConfidenceLevel::Medium, ConfidenceLevel::from_raw(1.0));
    /// assert_eq!(ConfidenceLevel::High, ConfidenceLevel::from_raw(7.0));
    /// assert_eq!(ConfidenceLevel::Low, ConfidenceLevel::from_raw(f32::NAN));
    /// ```
    pub fn from_raw(value: f32) -> Self {
        if !value.is_finite() || value < 0.5 {
            ConfidenceLevel::Low
        } else if value < 1.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::High
        }
    }

    /// Maps a confidence map byte to a level. Unknown values above the highest level count as `High`
    pub fn from_byte(value: u8) -> Self {
        match value {
            0 => ConfidenceLevel::Low,
            1 => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::High,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Minimum confidence a captured sample needs to be kept when converting a capture into an `Object3D`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConfidenceThreshold {
    #[default]
    Medium,
    High,
}

impl ConfidenceThreshold {
    /// The lowest level that passes this threshold
    pub fn min_level(&self) -> ConfidenceLevel {
        match self {
            ConfidenceThreshold::Medium => ConfidenceLevel::Medium,
            ConfidenceThreshold::High => ConfidenceLevel::High,
        }
    }

    /// Returns true if a sample with the given raw confidence passes this threshold
    pub fn accepts(&self, raw_confidence: f32) -> bool {
        ConfidenceLevel::from_raw(raw_confidence) >= self.min_level()
    }
}

/// One captured sample of the sensor stream in world space
///
/// The layout is plain old data so that a renderer can consume the ring buffer storage as raw bytes
/// (see [RawPointView](crate::containers::RawPointView)).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CapturedPoint {
    pub position: Vector3<f32>,
    /// Normalized RGB in `[0, 1]`
    pub color: Vector3<f32>,
    pub confidence: f32,
}

const_assert!(std::mem::size_of::<CapturedPoint>() == 28);

impl CapturedPoint {
    pub fn new(position: Vector3<f32>, color: Vector3<f32>, confidence: ConfidenceLevel) -> Self {
        Self {
            position,
            color,
            confidence: confidence as u8 as f32,
        }
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_raw(self.confidence)
    }
}

impl Default for CapturedPoint {
    /// The neutral value that flushed ring buffer slots are overwritten with
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_accepts() {
        assert!(ConfidenceThreshold::Medium.accepts(1.0));
        assert!(ConfidenceThreshold::Medium.accepts(2.0));
        assert!(!ConfidenceThreshold::Medium.accepts(0.0));
        assert!(!ConfidenceThreshold::High.accepts(1.0));
        assert!(ConfidenceThreshold::High.accepts(2.0));
    }

    #[test]
    fn test_point_is_castable_to_bytes() {
        let points = [
            CapturedPoint::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.5, 0.5, 0.5), ConfidenceLevel::High),
            CapturedPoint::default(),
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&points);
        assert_eq!(56, bytes.len());
        let first_x = f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(1.0, first_x);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_threshold_serde_names() {
        let json = serde_json::to_string(&ConfidenceThreshold::High).unwrap();
        assert_eq!("\"high\"", json);
        let parsed: ConfidenceThreshold = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(ConfidenceThreshold::Medium, parsed);
    }
}
