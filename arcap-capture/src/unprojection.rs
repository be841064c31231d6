use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// Pinhole camera intrinsics in pixels, valid for an image of `width` x `height` pixels
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

impl CameraIntrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Intrinsics of the same camera for an image with a different resolution
    pub fn scaled_to(&self, width: u32, height: u32) -> Self {
        let sx = width as f32 / self.width as f32;
        let sy = height as f32 / self.height as f32;
        Self {
            fx: self.fx * sx,
            fy: self.fy * sy,
            cx: self.cx * sx,
            cy: self.cy * sy,
            width,
            height,
        }
    }

    /// The camera matrix `K`
    pub fn matrix(&self) -> Matrix3<f32> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// `K⁻¹`, computed in closed form
    pub fn inverse_matrix(&self) -> Matrix3<f32> {
        Matrix3::new(
            1.0 / self.fx,
            0.0,
            -self.cx / self.fx,
            0.0,
            1.0 / self.fy,
            -self.cy / self.fy,
            0.0,
            0.0,
            1.0,
        )
    }

    pub fn resolution(&self) -> Vector2<f32> {
        Vector2::new(self.width as f32, self.height as f32)
    }
}

/// Fixed rotation between the sensor's image space (x right, y down, z forward) and the camera space of the pose
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OrientationCorrection {
    /// Image space and camera space agree
    Identity,
    /// Rotation of 180 degrees around the x axis, for cameras that look down their negative z axis with y up
    #[default]
    FlipYZ,
}

impl OrientationCorrection {
    pub fn matrix(&self) -> Matrix4<f32> {
        match self {
            OrientationCorrection::Identity => Matrix4::identity(),
            OrientationCorrection::FlipYZ => Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, -1.0, 1.0)),
        }
    }
}

/// Maps normalized image coordinates plus depth to world-space positions for one frame
#[derive(Debug, Copy, Clone)]
pub struct Unprojector {
    inverse_intrinsics: Matrix3<f32>,
    resolution: Vector2<f32>,
    local_to_world: Matrix4<f32>,
}

impl Unprojector {
    /// `camera_to_world` is the camera pose of the frame
    pub fn new(
        intrinsics: &CameraIntrinsics,
        camera_to_world: &Matrix4<f32>,
        correction: OrientationCorrection,
    ) -> Self {
        Self {
            inverse_intrinsics: intrinsics.inverse_matrix(),
            resolution: intrinsics.resolution(),
            local_to_world: camera_to_world * correction.matrix(),
        }
    }

    /// Unprojects the normalized image coordinate `uv` at the given metric depth. Returns `None` for depth values
    /// that are zero, negative or not finite
    pub fn unproject(&self, uv: &Vector2<f32>, depth: f32) -> Option<Vector3<f32>> {
        if !depth.is_finite() || depth <= 0.0 {
            return None;
        }
        let pixel = uv.component_mul(&self.resolution);
        let local = self.inverse_intrinsics * Vector3::new(pixel.x, pixel.y, 1.0) * depth;
        let world = self.local_to_world * local.push(1.0);
        Some(world.xyz() / world.w)
    }
}
