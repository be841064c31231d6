use arcap_capture::sample_source::{ColorImage, ConfidenceMap, DepthMap, ImageGrid, SampleSource};
use arcap_capture::unprojection::{CameraIntrinsics, OrientationCorrection};
use arcap_core::nalgebra::{Matrix4, Point3, Vector3, Vector4};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Sensor range in meters, everything further away has no valid depth
pub const MAX_RANGE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Point3<f32>,
    pub radius: f32,
    pub color: [u8; 3],
}

/// A checkered ground disk at `ground_height` plus a set of spheres, with `+Z` pointing up
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub ground_height: f32,
    pub ground_radius: f32,
    pub spheres: Vec<Sphere>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            ground_height: 0.0,
            ground_radius: 2.5,
            spheres: vec![
                Sphere {
                    center: Point3::new(0.0, 0.0, 0.5),
                    radius: 0.5,
                    color: [200, 60, 40],
                },
                Sphere {
                    center: Point3::new(0.9, -0.6, 0.25),
                    radius: 0.25,
                    color: [40, 90, 220],
                },
            ],
        }
    }
}

/// What a ray hit: the ray parameter and the color at the hit point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub color: [u8; 3],
}

impl Scene {
    /// Intersects the ray `origin + t * direction` with the scene. `direction` does not need to be normalized
    pub fn cast(&self, origin: &Point3<f32>, direction: &Vector3<f32>) -> Option<Hit> {
        let ground = self.cast_ground(origin, direction);
        self.spheres
            .iter()
            .filter_map(|sphere| cast_sphere(sphere, origin, direction))
            .chain(ground)
            .min_by(|a, b| a.t.total_cmp(&b.t))
    }

    fn cast_ground(&self, origin: &Point3<f32>, direction: &Vector3<f32>) -> Option<Hit> {
        if direction.z.abs() < f32::EPSILON {
            return None;
        }
        let t = (self.ground_height - origin.z) / direction.z;
        if t <= 0.0 {
            return None;
        }
        let hit = origin + direction * t;
        if hit.x * hit.x + hit.y * hit.y > self.ground_radius * self.ground_radius {
            return None;
        }
        let checker = ((hit.x * 4.0).floor() + (hit.y * 4.0).floor()) as i64 % 2 == 0;
        let color = if checker { [180, 180, 170] } else { [90, 90, 85] };
        Some(Hit { t, color })
    }

    /// The distance of `position` to the closest surface of the scene
    pub fn distance_to_surface(&self, position: &Point3<f32>) -> f32 {
        let ground = (position.z - self.ground_height).abs();
        self.spheres
            .iter()
            .map(|sphere| ((position - sphere.center).norm() - sphere.radius).abs())
            .fold(ground, f32::min)
    }
}

fn cast_sphere(sphere: &Sphere, origin: &Point3<f32>, direction: &Vector3<f32>) -> Option<Hit> {
    let offset = origin - sphere.center;
    let a = direction.norm_squared();
    let b = 2.0 * direction.dot(&offset);
    let c = offset.norm_squared() - sphere.radius * sphere.radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    if t <= 0.0 {
        return None;
    }
    // simple diffuse shading with light from above
    let normal = (origin + direction * t - sphere.center) / sphere.radius;
    let shade = 0.5 + 0.5 * normal.z.max(0.0);
    let color = sphere.color.map(|c| (c as f32 * shade) as u8);
    Some(Hit { t, color })
}

/// A camera that orbits around `target` at a fixed distance and height, always looking at the target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub target: Point3<f32>,
    pub distance: f32,
    pub height: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Point3::new(0.0, 0.0, 0.3),
            distance: 2.5,
            height: 1.2,
        }
    }
}

impl OrbitCamera {
    /// Camera-to-world transform at the given orbit angle (in radians). The camera looks down its negative z axis
    /// with y up
    pub fn pose(&self, angle: f32) -> Matrix4<f32> {
        let eye = Point3::new(
            self.target.x + self.distance * angle.cos(),
            self.target.y + self.distance * angle.sin(),
            self.target.z + self.height,
        );
        let forward = (self.target - eye).normalize();
        let right = forward.cross(&Vector3::z()).normalize();
        let up = right.cross(&forward);
        let mut pose = Matrix4::identity();
        pose.fixed_view_mut::<3, 1>(0, 0).copy_from(&right);
        pose.fixed_view_mut::<3, 1>(0, 1).copy_from(&up);
        pose.fixed_view_mut::<3, 1>(0, 2).copy_from(&-forward);
        pose.fixed_view_mut::<3, 1>(0, 3).copy_from(&eye.coords);
        pose
    }
}

/// A [SampleSource] that renders depth, confidence and color images of a [Scene]
///
/// Depth values get uniform noise of up to `depth_noise` meters. The confidence drops with distance: `High` up to
/// 2.5 m, `Medium` up to 4 m and `Low` beyond.
pub struct SyntheticSource {
    scene: Scene,
    intrinsics: CameraIntrinsics,
    correction: OrientationCorrection,
    depth_noise: f32,
    rng: SmallRng,
    pose: Option<Matrix4<f32>>,
    depth: DepthMap,
    confidence: ConfidenceMap,
    color: ColorImage,
}

impl SyntheticSource {
    pub fn new(scene: Scene, intrinsics: CameraIntrinsics, depth_noise: f32, seed: u64) -> Self {
        let (width, height) = (intrinsics.width as usize, intrinsics.height as usize);
        Self {
            scene,
            intrinsics,
            correction: OrientationCorrection::default(),
            depth_noise,
            rng: SmallRng::seed_from_u64(seed),
            pose: None,
            depth: ImageGrid::filled(width, height, 0.0),
            confidence: ImageGrid::filled(width, height, 0),
            color: ImageGrid::filled(width, height, [0, 0, 0]),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Marks the current frame as having lost tracking, so that no data is reported until the next render
    pub fn lose_tracking(&mut self) {
        self.pose = None;
    }

    /// Renders the scene as seen from `camera_to_world` and makes it the current frame
    pub fn render(&mut self, camera_to_world: &Matrix4<f32>) {
        let (width, height) = (self.intrinsics.width as usize, self.intrinsics.height as usize);
        let image_to_world = camera_to_world * self.correction.matrix();
        let origin = Point3::from(camera_to_world.fixed_view::<3, 1>(0, 3).into_owned());
        let inverse_intrinsics = self.intrinsics.inverse_matrix();

        let mut depth = Vec::with_capacity(width * height);
        let mut confidence = Vec::with_capacity(width * height);
        let mut color = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                // image space ray with a z component of one, so that the ray parameter equals the depth
                let image_ray = inverse_intrinsics * Vector3::new(x as f32 + 0.5, y as f32 + 0.5, 1.0);
                let direction = (image_to_world * Vector4::new(image_ray.x, image_ray.y, image_ray.z, 0.0)).xyz();
                match self.scene.cast(&origin, &direction).filter(|hit| hit.t < MAX_RANGE) {
                    Some(hit) => {
                        let noise = if self.depth_noise > 0.0 {
                            self.rng.gen_range(-self.depth_noise..self.depth_noise)
                        } else {
                            0.0
                        };
                        depth.push(hit.t + noise);
                        confidence.push(confidence_at(hit.t));
                        color.push(hit.color);
                    }
                    None => {
                        depth.push(0.0);
                        confidence.push(0);
                        color.push([0, 0, 0]);
                    }
                }
            }
        }

        self.depth = ImageGrid::new(width, height, depth);
        self.confidence = ImageGrid::new(width, height, confidence);
        self.color = ImageGrid::new(width, height, color);
        self.pose = Some(*camera_to_world);
    }
}

fn confidence_at(depth: f32) -> u8 {
    if depth <= 2.5 {
        2
    } else if depth <= 4.0 {
        1
    } else {
        0
    }
}

impl SampleSource for SyntheticSource {
    fn current_pose(&self) -> Option<Matrix4<f32>> {
        self.pose
    }

    fn intrinsics(&self) -> Option<CameraIntrinsics> {
        self.pose.map(|_| self.intrinsics)
    }

    fn depth_map(&self) -> Option<&DepthMap> {
        self.pose.map(|_| &self.depth)
    }

    fn confidence_map(&self) -> Option<&ConfidenceMap> {
        self.pose.map(|_| &self.confidence)
    }

    fn color_image(&self) -> Option<&ColorImage> {
        self.pose.map(|_| &self.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(60.0, 60.0, 32.0, 24.0, 64, 48)
    }

    #[test]
    fn test_ray_hits_nearest_surface() {
        let scene = Scene::default();
        let hit = scene
            .cast(&Point3::new(0.0, 0.0, 3.0), &Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        // top of the big sphere
        assert_approx_eq!(2.0, hit.t);
        let miss = scene.cast(&Point3::new(0.0, 0.0, 3.0), &Vector3::new(0.0, 0.0, 1.0));
        assert!(miss.is_none());
        let ground = scene
            .cast(&Point3::new(2.0, 2.0, 1.0), &Vector3::new(0.0, 0.0, -2.0))
            .unwrap();
        assert_approx_eq!(0.5, ground.t);
    }

    #[test]
    fn test_orbit_pose_looks_at_target() {
        let camera = OrbitCamera::default();
        let pose = camera.pose(0.7);
        let eye = pose.fixed_view::<3, 1>(0, 3).into_owned();
        let view_direction = -pose.fixed_view::<3, 1>(0, 2).into_owned();
        let to_target = (camera.target.coords - eye).normalize();
        assert_approx_eq!(1.0, view_direction.dot(&to_target), 1e-5);
        let rotation = pose.fixed_view::<3, 3>(0, 0).into_owned();
        assert!((rotation.transpose() * rotation - arcap_core::nalgebra::Matrix3::identity()).norm() < 1e-5);
    }

    #[test]
    fn test_center_pixel_depth() {
        let mut source = SyntheticSource::new(Scene::default(), intrinsics(), 0.0, 1);
        assert!(source.depth_map().is_none());
        // camera straight above the big sphere, looking down
        let pose = Matrix4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 3.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        source.render(&pose);
        let depth = source.depth_map().unwrap().get(32, 24).unwrap();
        assert!((depth - 2.0).abs() < 0.01, "depth {}", depth);
        assert_eq!(Some(2), source.confidence_map().unwrap().get(32, 24));

        source.lose_tracking();
        assert!(source.current_pose().is_none());
        assert!(source.color_image().is_none());
    }
}
