use std::fmt::{self, Display};

use arcap_core::containers::Object3D;

use crate::error::ProcessingResult;
use crate::normal_estimation::estimate_normals;
use crate::outlier_removal::{radius_outlier_removal, statistical_outlier_removal};
use crate::surface_reconstruction::poisson_surface_reconstruction;
use crate::voxel_grid::voxel_downsample;

/// A processing step together with its parameters
///
/// Every operator is a pure function from one [Object3D] to a new one; applying the same operator to the same object
/// twice yields equal results.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "operator", rename_all = "snake_case"))]
pub enum Operator {
    VoxelDownsample { voxel_size: f32 },
    StatisticalOutlierRemoval { neighbors: usize, std_ratio: f32 },
    RadiusOutlierRemoval { min_neighbors: usize, radius: f32 },
    NormalsEstimation { radius: f32, max_neighbors: usize },
    PoissonSurfaceReconstruction { depth: u32 },
}

impl Operator {
    pub fn voxel_downsample() -> Self {
        Operator::VoxelDownsample { voxel_size: 0.01 }
    }

    pub fn statistical_outlier_removal() -> Self {
        Operator::StatisticalOutlierRemoval {
            neighbors: 20,
            std_ratio: 2.0,
        }
    }

    pub fn radius_outlier_removal() -> Self {
        Operator::RadiusOutlierRemoval {
            min_neighbors: 16,
            radius: 0.05,
        }
    }

    pub fn normals_estimation() -> Self {
        Operator::NormalsEstimation {
            radius: 0.1,
            max_neighbors: 30,
        }
    }

    pub fn poisson_surface_reconstruction() -> Self {
        Operator::PoissonSurfaceReconstruction { depth: 8 }
    }

    /// Stable name of this operator, as used in logs and pipeline descriptions
    pub fn name(&self) -> &'static str {
        match self {
            Operator::VoxelDownsample { .. } => "voxel_downsample",
            Operator::StatisticalOutlierRemoval { .. } => "statistical_outlier_removal",
            Operator::RadiusOutlierRemoval { .. } => "radius_outlier_removal",
            Operator::NormalsEstimation { .. } => "normals_estimation",
            Operator::PoissonSurfaceReconstruction { .. } => "poisson_surface_reconstruction",
        }
    }

    /// Runs this operator with the native implementation
    pub fn apply(&self, object: &Object3D) -> ProcessingResult<Object3D> {
        match *self {
            Operator::VoxelDownsample { voxel_size } => voxel_downsample(object, voxel_size),
            Operator::StatisticalOutlierRemoval {
                neighbors,
                std_ratio,
            } => statistical_outlier_removal(object, neighbors, std_ratio),
            Operator::RadiusOutlierRemoval {
                min_neighbors,
                radius,
            } => radius_outlier_removal(object, min_neighbors, radius),
            Operator::NormalsEstimation {
                radius,
                max_neighbors,
            } => estimate_normals(object, radius, max_neighbors),
            Operator::PoissonSurfaceReconstruction { depth } => {
                poisson_surface_reconstruction(object, depth)
            }
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::VoxelDownsample { voxel_size } => {
                write!(f, "{} (voxel size {})", self.name(), voxel_size)
            }
            Operator::StatisticalOutlierRemoval {
                neighbors,
                std_ratio,
            } => write!(
                f,
                "{} ({} neighbors, std ratio {})",
                self.name(),
                neighbors,
                std_ratio
            ),
            Operator::RadiusOutlierRemoval {
                min_neighbors,
                radius,
            } => write!(
                f,
                "{} ({} neighbors within {})",
                self.name(),
                min_neighbors,
                radius
            ),
            Operator::NormalsEstimation {
                radius,
                max_neighbors,
            } => write!(
                f,
                "{} (radius {}, at most {} neighbors)",
                self.name(),
                radius,
                max_neighbors
            ),
            Operator::PoissonSurfaceReconstruction { depth } => {
                write!(f, "{} (depth {})", self.name(), depth)
            }
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn test_json_representation() {
        let json = serde_json::to_string(&Operator::PoissonSurfaceReconstruction { depth: 9 }).unwrap();
        assert_eq!(r#"{"operator":"poisson_surface_reconstruction","depth":9}"#, json);
        let parsed: Operator =
            serde_json::from_str(r#"{"operator":"voxel_downsample","voxel_size":0.02}"#).unwrap();
        assert_eq!(Operator::VoxelDownsample { voxel_size: 0.02 }, parsed);
    }
}
