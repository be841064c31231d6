use arcap_core::containers::Object3D;
use arcap_core::nalgebra::Vector3;

use crate::error::{ProcessingError, ProcessingResult};

/// A cell of the voxel grid together with the indices of the vertices that fall into it
struct Voxel {
    pos: (u64, u64, u64),
    points: Vec<usize>,
}

/// Largest number of voxels along one axis of the grid
const MAX_VOXELS_PER_AXIS: f64 = u32::MAX as f64;

/// index of the voxel containing `position`, relative to the minimum corner of the grid
fn find_voxel(position: &Vector3<f32>, min: &Vector3<f32>, voxel_size: f32) -> (u64, u64, u64) {
    let cell = (position.cast::<f64>() - min.cast::<f64>()) / voxel_size as f64;
    (
        cell.x.floor().max(0.0) as u64,
        cell.y.floor().max(0.0) as u64,
        cell.z.floor().max(0.0) as u64,
    )
}

fn mean(values: &[Vector3<f32>], indices: &[usize]) -> Vector3<f32> {
    let sum = indices
        .iter()
        .fold(Vector3::<f64>::zeros(), |acc, &i| acc + values[i].cast::<f64>());
    (sum / indices.len() as f64).cast::<f32>()
}

/// most common confidence level of the given vertices, ties resolve to the higher level
fn dominant_confidence(levels: &[u32], indices: &[usize]) -> u32 {
    let mut counts: Vec<(u32, usize)> = vec![];
    for &i in indices {
        match counts.iter_mut().find(|(level, _)| *level == levels[i]) {
            Some((_, count)) => *count += 1,
            None => counts.push((levels[i], 1)),
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(level, count)| (count, level))
        .map(|(level, _)| level)
        .unwrap_or_default()
}

/// Downsamples `object` by replacing all vertices within each cube of edge length `voxel_size` with their centroid.
///
/// The grid starts at the minimum corner of the bounding box of `object`. Per voxel, colors are averaged, normals
/// are averaged and re-normalized and the confidence is the most common level. Attributes that `object` does not
/// have stay empty. Triangles are dropped. The output vertices are ordered by voxel index, so the result never has
/// more vertices than `object`.
///
/// # Examples
/// ```
/// # use arcap_algorithms::voxel_grid::voxel_downsample;
/// # use arcap_core::{containers::Object3D, nalgebra::Vector3};
/// let mut vertices = vec![];
/// for i in 0..100 {
///     for j in 0..100 {
///         vertices.push(Vector3::new(0.0, i as f32, j as f32));
///     }
/// }
/// let object = Object3D::from_vertices(vertices);
/// let downsampled = voxel_downsample(&object, 1.5).unwrap();
/// assert!(downsampled.len() < object.len() / 2);
/// ```
pub fn voxel_downsample(object: &Object3D, voxel_size: f32) -> ProcessingResult<Object3D> {
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
        return Err(ProcessingError::InvalidParameter(format!(
            "voxel size must be positive, got {}",
            voxel_size
        )));
    }
    let bounds = match object.bounds() {
        Some(bounds) => bounds,
        None => return Ok(Object3D::default()),
    };
    let voxels_per_axis = bounds.max_extent() as f64 / voxel_size as f64;
    if voxels_per_axis >= MAX_VOXELS_PER_AXIS {
        return Err(ProcessingError::InvalidParameter(format!(
            "voxel size {} is too small for an object with extent {}",
            voxel_size,
            bounds.max_extent()
        )));
    }
    let min = bounds.min().coords;

    let mut keyed = object
        .vertices()
        .iter()
        .enumerate()
        .map(|(i, position)| (find_voxel(position, &min, voxel_size), i))
        .collect::<Vec<_>>();
    keyed.sort_unstable();

    let mut voxels: Vec<Voxel> = vec![];
    for (pos, i) in keyed {
        match voxels.last_mut() {
            Some(voxel) if voxel.pos == pos => voxel.points.push(i),
            _ => voxels.push(Voxel {
                pos,
                points: vec![i],
            }),
        }
    }

    let vertices = voxels
        .iter()
        .map(|voxel| mean(object.vertices(), &voxel.points))
        .collect();
    let vertex_colors = if object.has_colors() {
        voxels
            .iter()
            .map(|voxel| mean(object.vertex_colors(), &voxel.points))
            .collect()
    } else {
        vec![]
    };
    let vertex_normals = if object.has_normals() {
        voxels
            .iter()
            .map(|voxel| {
                let average = mean(object.vertex_normals(), &voxel.points);
                // opposing normals cancel out, keep the first one in that case
                average
                    .try_normalize(f32::EPSILON)
                    .unwrap_or(object.vertex_normals()[voxel.points[0]])
            })
            .collect()
    } else {
        vec![]
    };
    let vertex_confidence = if object.has_confidence() {
        voxels
            .iter()
            .map(|voxel| dominant_confidence(object.vertex_confidence(), &voxel.points))
            .collect()
    } else {
        vec![]
    };

    Ok(Object3D::from_parts(
        vertices,
        vertex_confidence,
        vertex_colors,
        vertex_normals,
        vec![],
    )?)
}
