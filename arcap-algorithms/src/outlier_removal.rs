use arcap_core::containers::Object3D;
use rayon::prelude::*;

use crate::error::{ProcessingError, ProcessingResult};
use crate::neighbors::NeighborIndex;

/// Removes vertices whose mean distance to their `neighbors` nearest neighbors is unusually large.
///
/// For every vertex the mean distance to its `neighbors` nearest other vertices is computed. A vertex is kept if
/// this mean is at most `global_mean + std_ratio * global_std`, where `global_mean` and `global_std` are the mean
/// and the sample standard deviation of all per-vertex means. Kept vertices retain their attributes and order;
/// triangles survive if all of their vertices are kept.
pub fn statistical_outlier_removal(
    object: &Object3D,
    neighbors: usize,
    std_ratio: f32,
) -> ProcessingResult<Object3D> {
    if neighbors < 1 {
        return Err(ProcessingError::InvalidParameter(
            "statistical outlier removal needs at least one neighbor".into(),
        ));
    }
    if !std_ratio.is_finite() {
        return Err(ProcessingError::InvalidParameter(format!(
            "standard deviation ratio must be finite, got {}",
            std_ratio
        )));
    }
    if object.is_empty() {
        return Ok(Object3D::default());
    }

    let index = NeighborIndex::build(object.vertices());
    let mean_distances = object
        .vertices()
        .par_iter()
        .enumerate()
        .map(|(i, position)| {
            let nearest = index.nearest_excluding(position, i, neighbors);
            if nearest.is_empty() {
                return 0.0;
            }
            let sum = nearest
                .iter()
                .map(|(_, squared_distance)| (*squared_distance as f64).sqrt())
                .sum::<f64>();
            sum / nearest.len() as f64
        })
        .collect::<Vec<_>>();

    let count = mean_distances.len() as f64;
    let global_mean = mean_distances.iter().sum::<f64>() / count;
    let global_std = if mean_distances.len() > 1 {
        let variance = mean_distances
            .iter()
            .map(|d| (d - global_mean) * (d - global_mean))
            .sum::<f64>()
            / (count - 1.0);
        variance.sqrt()
    } else {
        0.0
    };
    let max_distance = global_mean + std_ratio as f64 * global_std;

    let kept = mean_distances
        .iter()
        .enumerate()
        .filter(|(_, distance)| **distance <= max_distance)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    Ok(object.select(&kept))
}

/// Removes vertices that have fewer than `min_neighbors` other vertices within `radius`.
///
/// Kept vertices retain their attributes and order; triangles survive if all of their vertices are kept.
pub fn radius_outlier_removal(
    object: &Object3D,
    min_neighbors: usize,
    radius: f32,
) -> ProcessingResult<Object3D> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(ProcessingError::InvalidParameter(format!(
            "radius must be positive, got {}",
            radius
        )));
    }
    if object.is_empty() {
        return Ok(Object3D::default());
    }
    if min_neighbors == 0 {
        return Ok(object.clone());
    }

    let index = NeighborIndex::build(object.vertices());
    let radius_squared = radius * radius;
    let keep = object
        .vertices()
        .par_iter()
        .enumerate()
        .map(|(i, position)| {
            index
                .nearest_excluding(position, i, min_neighbors)
                .iter()
                .filter(|(_, squared_distance)| *squared_distance <= radius_squared)
                .count()
                >= min_neighbors
        })
        .collect::<Vec<_>>();

    let kept = keep
        .iter()
        .enumerate()
        .filter(|(_, keep)| **keep)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    Ok(object.select(&kept))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcap_core::nalgebra::Vector3;

    /// a 10x10 grid with unit spacing in the xy plane plus one far away vertex
    fn grid_with_outlier() -> Object3D {
        let mut vertices = vec![];
        for x in 0..10 {
            for y in 0..10 {
                vertices.push(Vector3::new(x as f32, y as f32, 0.0));
            }
        }
        vertices.push(Vector3::new(4.5, 4.5, 20.0));
        let colors = vertices.iter().map(|_| Vector3::new(0.5, 0.5, 0.5)).collect();
        Object3D::from_vertices(vertices).with_colors(colors).unwrap()
    }

    #[test]
    fn test_statistical_removes_far_vertex() {
        let object = grid_with_outlier();
        let filtered = statistical_outlier_removal(&object, 8, 2.0).unwrap();
        assert_eq!(100, filtered.len());
        assert!(filtered.vertices().iter().all(|v| v.z == 0.0));
        assert_eq!(100, filtered.vertex_colors().len());
    }

    #[test]
    fn test_statistical_keeps_uniform_cloud() {
        let object = grid_with_outlier().select(&(0..100).collect::<Vec<_>>());
        let filtered = statistical_outlier_removal(&object, 4, 5.0).unwrap();
        assert_eq!(object.len(), filtered.len());
    }

    #[test]
    fn test_statistical_requires_neighbors() {
        assert!(matches!(
            statistical_outlier_removal(&grid_with_outlier(), 0, 2.0),
            Err(ProcessingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_radius_removes_isolated_vertex() {
        let object = grid_with_outlier();
        let filtered = radius_outlier_removal(&object, 2, 1.5).unwrap();
        assert_eq!(100, filtered.len());
        // corners have 3 neighbors within 1.5, so they survive a threshold of 3 but not 4
        assert_eq!(100, radius_outlier_removal(&object, 3, 1.5).unwrap().len());
        assert_eq!(96, radius_outlier_removal(&object, 4, 1.5).unwrap().len());
    }

    #[test]
    fn test_empty_input() {
        let empty = Object3D::default();
        assert!(statistical_outlier_removal(&empty, 10, 1.0).unwrap().is_empty());
        assert!(radius_outlier_removal(&empty, 10, 1.0).unwrap().is_empty());
    }
}
