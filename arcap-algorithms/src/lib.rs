#![warn(clippy::all)]
//! Processing operators for captured point clouds.
//!
//! Every operator takes an [Object3D](arcap_core::containers::Object3D) and produces a new one, leaving its input
//! untouched. The [pipeline] module chains operators and runs them in the background.

// Errors reported by processing operators
pub mod error;
// Nearest neighbor queries on a kd-tree, shared by the operators below
pub mod neighbors;
// Estimation of consistently oriented vertex normals from local plane fits
pub mod normal_estimation;
// Statistical and radius based removal of noisy vertices
pub mod outlier_removal;
pub mod pipeline;
// Extraction of a watertight triangle mesh from an oriented point cloud
pub mod surface_reconstruction;
// Voxel grid downsampling
pub mod voxel_grid;
