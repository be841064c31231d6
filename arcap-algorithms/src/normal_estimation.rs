// Normals are estimated from the local covariance of each neighborhood, following the approach of the PCL library
// (https://pointclouds.org/). Orientation is propagated along a minimum spanning tree of the neighbor graph
// (Hoppe et al., 'Surface Reconstruction from Unorganized Points', 1992).
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use arcap_core::containers::Object3D;
use arcap_core::nalgebra::{Matrix3, SymmetricEigen, Vector3};
use float_ord::FloatOrd;
use log::warn;
use rayon::prelude::*;

use crate::error::{ProcessingError, ProcessingResult};
use crate::neighbors::{Neighbor, NeighborIndex};

/// Computes the centroid of the given positions.
///
/// # Panics
///
/// If `indices` is empty
pub fn compute_centroid(positions: &[Vector3<f32>], indices: &[usize]) -> Vector3<f64> {
    if indices.is_empty() {
        panic!("The neighborhood is empty!");
    }
    let sum = indices
        .iter()
        .fold(Vector3::<f64>::zeros(), |acc, &i| acc + positions[i].cast::<f64>());
    sum / indices.len() as f64
}

/// compute the covariance matrix of a neighborhood, which is a measure of how spread out its positions are
fn compute_covariance_matrix(positions: &[Vector3<f32>], indices: &[usize]) -> Matrix3<f64> {
    let centroid = compute_centroid(positions, indices);
    indices.iter().fold(Matrix3::zeros(), |acc, &i| {
        let diff_mean = positions[i].cast::<f64>() - centroid;
        acc + diff_mean * diff_mean.transpose()
    })
}

/// Returns the normal of the plane that best fits the given neighborhood, i.e. the eigenvector of the smallest
/// eigenvalue of its covariance matrix. Neighborhoods with fewer than three positions can't span a plane and
/// yield `None`.
pub fn plane_normal(positions: &[Vector3<f32>], indices: &[usize]) -> Option<Vector3<f32>> {
    if indices.len() < 3 {
        return None;
    }
    let covariance_matrix = compute_covariance_matrix(positions, indices);
    let eigen = SymmetricEigen::new(covariance_matrix);
    let smallest = eigen.eigenvalues.imin();
    let normal = eigen.eigenvectors.column(smallest).into_owned();
    normal
        .try_normalize(f64::EPSILON)
        .map(|normal| normal.cast::<f32>())
        .filter(|normal| normal.iter().all(|c| c.is_finite()))
}

/// Estimates a normal for every vertex of `object` from the vertices within `radius` (at most the `max_neighbors`
/// closest ones, the vertex itself included). Vertices whose neighborhood has fewer than three vertices get the
/// normal `+Z`.
///
/// The signs of the normals are made consistent by propagating the orientation along a minimum spanning tree of the
/// neighbor graph, with edge weight `1 - |n_i · n_j|`. Each connected part of the graph is seeded at its highest
/// vertex, whose normal is made to point upwards. All other attributes of `object` are kept.
pub fn estimate_normals(object: &Object3D, radius: f32, max_neighbors: usize) -> ProcessingResult<Object3D> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(ProcessingError::InvalidParameter(format!(
            "radius must be positive, got {}",
            radius
        )));
    }
    if max_neighbors < 1 {
        return Err(ProcessingError::InvalidParameter(
            "normal estimation needs at least one neighbor".into(),
        ));
    }
    if object.is_empty() {
        return Ok(Object3D::default());
    }

    let positions = object.vertices();
    let index = NeighborIndex::build(positions);
    let neighborhoods = positions
        .par_iter()
        .map(|position| index.within_radius(position, radius, max_neighbors))
        .collect::<Vec<_>>();

    let normals = neighborhoods
        .par_iter()
        .map(|neighborhood| {
            let indices = neighborhood.iter().map(|(i, _)| *i).collect::<Vec<_>>();
            plane_normal(positions, &indices)
        })
        .collect::<Vec<_>>();
    let degenerate = normals.iter().filter(|normal| normal.is_none()).count();
    if degenerate > 0 {
        warn!(
            "{} of {} vertices have fewer than 3 neighbors within radius {}, using +Z as their normal",
            degenerate,
            positions.len(),
            radius
        );
    }
    let mut normals = normals
        .into_iter()
        .map(|normal| normal.unwrap_or_else(Vector3::z))
        .collect::<Vec<_>>();

    let adjacency = neighbor_graph(&neighborhoods);
    orient_normals(positions, &mut normals, &adjacency);

    Ok(object.replace_normals(normals)?)
}

/// symmetric adjacency lists of the neighborhoods, without self loops
fn neighbor_graph(neighborhoods: &[Vec<Neighbor>]) -> Vec<Vec<usize>> {
    let mut adjacency = vec![vec![]; neighborhoods.len()];
    for (i, neighborhood) in neighborhoods.iter().enumerate() {
        for &(j, _) in neighborhood {
            if i != j {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }
    for neighbors in adjacency.iter_mut() {
        neighbors.sort_unstable();
        neighbors.dedup();
    }
    adjacency
}

/// Flips normals so that neighboring normals agree, using Prim's algorithm on each connected component
fn orient_normals(positions: &[Vector3<f32>], normals: &mut [Vector3<f32>], adjacency: &[Vec<usize>]) {
    let mut visited = vec![false; positions.len()];
    for seed in component_seeds(positions, adjacency) {
        if normals[seed].z < 0.0 {
            normals[seed] = -normals[seed];
        }
        visited[seed] = true;

        let mut heap = BinaryHeap::new();
        push_edges(&mut heap, normals, &visited, adjacency, seed);

        while let Some(Reverse((_, target, parent))) = heap.pop() {
            if visited[target] {
                continue;
            }
            visited[target] = true;
            if normals[target].dot(&normals[parent]) < 0.0 {
                normals[target] = -normals[target];
            }
            push_edges(&mut heap, normals, &visited, adjacency, target);
        }
    }
}

type SpanningEdge = Reverse<(FloatOrd<f32>, usize, usize)>;

/// queues the edges from `from` to all unvisited neighbors, as `(weight, to, from)`
fn push_edges(
    heap: &mut BinaryHeap<SpanningEdge>,
    normals: &[Vector3<f32>],
    visited: &[bool],
    adjacency: &[Vec<usize>],
    from: usize,
) {
    for &to in &adjacency[from] {
        if !visited[to] {
            let weight = 1.0 - normals[from].dot(&normals[to]).abs();
            heap.push(Reverse((FloatOrd(weight), to, from)));
        }
    }
}

/// the highest vertex of every connected component of the graph
fn component_seeds(positions: &[Vector3<f32>], adjacency: &[Vec<usize>]) -> Vec<usize> {
    let mut assigned = vec![false; positions.len()];
    let mut seeds = vec![];
    for start in 0..positions.len() {
        if assigned[start] {
            continue;
        }
        assigned[start] = true;
        let mut highest = start;
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if positions[current].z > positions[highest].z {
                highest = current;
            }
            for &next in &adjacency[current] {
                if !assigned[next] {
                    assigned[next] = true;
                    stack.push(next);
                }
            }
        }
        seeds.push(highest);
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn fibonacci_sphere(count: usize, radius: f32) -> Vec<Vector3<f32>> {
        let golden_angle = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
        (0..count)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f32 + 0.5) / count as f32;
                let ring = (1.0 - y * y).sqrt();
                let theta = golden_angle * i as f32;
                Vector3::new(theta.cos() * ring, y, theta.sin() * ring) * radius
            })
            .collect()
    }

    #[test]
    fn test_plane_normal() {
        let positions = vec![
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 1.0),
            Vector3::new(0.0, 1.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
        ];
        let normal = plane_normal(&positions, &[0, 1, 2, 3]).unwrap();
        assert_approx_eq!(1.0, normal.z.abs());
        assert!(plane_normal(&positions, &[0, 1]).is_none());
    }

    #[test]
    fn test_planar_grid_normals_point_up() {
        let mut vertices = vec![];
        for x in 0..20 {
            for y in 0..20 {
                vertices.push(Vector3::new(x as f32 * 0.1, y as f32 * 0.1, 0.5));
            }
        }
        let object = Object3D::from_vertices(vertices);
        let with_normals = estimate_normals(&object, 0.25, 16).unwrap();
        assert_eq!(object.vertices(), with_normals.vertices());
        for normal in with_normals.vertex_normals() {
            assert_approx_eq!(1.0, normal.z, 1e-4);
        }
    }

    #[test]
    fn test_sphere_normals_are_consistently_outward() {
        let object = Object3D::from_vertices(fibonacci_sphere(600, 1.0));
        let with_normals = estimate_normals(&object, 0.3, 30).unwrap();
        for (position, normal) in with_normals.vertices().iter().zip(with_normals.vertex_normals()) {
            assert!(position.dot(normal) > 0.8, "normal {} at {} points inwards", normal, position);
        }
    }

    #[test]
    fn test_sparse_neighborhood_falls_back_to_up() {
        let object = Object3D::from_vertices(vec![Vector3::zeros(), Vector3::new(10.0, 0.0, 0.0)]);
        let with_normals = estimate_normals(&object, 1.0, 8).unwrap();
        assert_eq!(&[Vector3::z(), Vector3::z()], with_normals.vertex_normals());
    }
}
