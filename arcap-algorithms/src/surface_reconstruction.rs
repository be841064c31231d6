use std::collections::{BTreeSet, HashMap};

use arcap_core::containers::Object3D;
use arcap_core::nalgebra::Vector3;
use log::info;
use rayon::prelude::*;

use crate::error::{ProcessingError, ProcessingResult};
use crate::neighbors::NeighborIndex;

/// Integer coordinates of a grid node, or of the cell whose minimum corner is that node
type GridId = [i32; 3];

/// Number of oriented points that the implicit function blends at every sample position
const IMPLICIT_NEIGHBORS: usize = 4;

/// Deepest supported grid, `2^15` cells along each axis
pub const MAX_DEPTH: u32 = 15;

/// Corner index → offset from the minimum corner of a cell. Bit 0 is the x offset, bit 1 the y offset and bit 2 the
/// z offset
const CORNER_OFFSETS: [[i32; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// The 12 edges of a cell as pairs of corner indices
const CELL_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Signed distance estimate from an oriented point cloud. Negative inside (behind the normals), positive outside
struct ImplicitSurface<'a> {
    index: NeighborIndex,
    positions: &'a [Vector3<f32>],
    normals: &'a [Vector3<f32>],
}

impl<'a> ImplicitSurface<'a> {
    fn new(positions: &'a [Vector3<f32>], normals: &'a [Vector3<f32>]) -> Self {
        Self {
            index: NeighborIndex::build(positions),
            positions,
            normals,
        }
    }

    /// inverse distance weighted average of the distances of `x` to the tangent planes of the closest points
    fn evaluate(&self, x: &Vector3<f64>) -> f64 {
        let query = x.cast::<f32>();
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (i, squared_distance) in self.index.nearest(&query, IMPLICIT_NEIGHBORS) {
            let weight = 1.0 / (squared_distance as f64 + 1e-12);
            let plane_distance = self.normals[i]
                .cast::<f64>()
                .dot(&(x - self.positions[i].cast::<f64>()));
            weighted_sum += weight * plane_distance;
            weight_sum += weight;
        }
        weighted_sum / weight_sum
    }
}

/// Uniform grid with `resolution` cells per axis over a cube
struct SparseGrid {
    origin: Vector3<f64>,
    cell_size: f64,
    resolution: i32,
}

impl SparseGrid {
    fn node_position(&self, node: &GridId) -> Vector3<f64> {
        self.origin + Vector3::new(node[0] as f64, node[1] as f64, node[2] as f64) * self.cell_size
    }

    fn cell_of(&self, position: &Vector3<f32>) -> GridId {
        let relative = (position.cast::<f64>() - self.origin) / self.cell_size;
        let clamp = |value: f64| (value.floor() as i32).clamp(0, self.resolution - 1);
        [clamp(relative.x), clamp(relative.y), clamp(relative.z)]
    }

    fn contains_cell(&self, cell: &GridId) -> bool {
        cell.iter().all(|&c| c >= 0 && c < self.resolution)
    }
}

fn offset(id: &GridId, by: &[i32; 3]) -> GridId {
    [id[0] + by[0], id[1] + by[1], id[2] + by[2]]
}

fn unit(axis: usize) -> [i32; 3] {
    let mut unit = [0; 3];
    unit[axis] = 1;
    unit
}

fn negated(v: [i32; 3]) -> [i32; 3] {
    [-v[0], -v[1], -v[2]]
}

/// Reconstructs a triangle mesh from an oriented point cloud.
///
/// A signed distance estimate is built from the vertices and their normals and sampled on a sparse grid with
/// `2^depth` cells per axis, spanning the bounding cube of `object` enlarged by 10%. Only cells around the input
/// vertices are sampled. The zero level set is extracted with surface nets: every cell with a sign change gets one
/// vertex at the mean of its edge crossings, and every sign changing grid edge emits a quad between the four cells
/// that share it, wound so that triangle normals point to the outside.
///
/// The output carries per-vertex normals (area weighted triangle normals); colors and confidence are transferred from
/// the closest input vertex if `object` has them.
///
/// Fails with [MissingNormals](ProcessingError::MissingNormals) if `object` has no normals (this includes the empty
/// object) and with [InvalidParameter](ProcessingError::InvalidParameter) if `depth` is not within `1..=15`.
pub fn poisson_surface_reconstruction(object: &Object3D, depth: u32) -> ProcessingResult<Object3D> {
    if !object.has_normals() {
        return Err(ProcessingError::MissingNormals);
    }
    if !(1..=MAX_DEPTH).contains(&depth) {
        return Err(ProcessingError::InvalidParameter(format!(
            "reconstruction depth must be within 1..={}, got {}",
            MAX_DEPTH, depth
        )));
    }
    let bounds = match object.bounds() {
        Some(bounds) => bounds,
        None => return Ok(Object3D::default()),
    };

    let cube = bounds.bounding_cube(1.1);
    let resolution = 1i32 << depth;
    let grid = SparseGrid {
        origin: cube.min().coords.cast::<f64>(),
        cell_size: cube.extent().x as f64 / resolution as f64,
        resolution,
    };
    let surface = ImplicitSurface::new(object.vertices(), object.vertex_normals());

    let active_cells = active_cells(&grid, object.vertices());
    let node_values = sample_nodes(&grid, &surface, &active_cells);

    let mut positions: Vec<Vector3<f64>> = vec![];
    let mut cell_vertices: HashMap<GridId, u32> = HashMap::new();
    for cell in &active_cells {
        if let Some(position) = cell_vertex(&grid, &node_values, cell) {
            cell_vertices.insert(*cell, positions.len() as u32);
            positions.push(position);
        }
    }

    let mut triangles = vec![];
    for cell in &active_cells {
        for axis in 0..3 {
            let start = node_values[cell];
            let end = node_values[&offset(cell, &unit(axis))];
            if (start < 0.0) == (end < 0.0) {
                continue;
            }
            let u = negated(unit((axis + 1) % 3));
            let v = negated(unit((axis + 2) % 3));
            let around = [*cell, offset(cell, &u), offset(&offset(cell, &u), &v), offset(cell, &v)];
            let quad = match around
                .iter()
                .map(|id| cell_vertices.get(id).copied())
                .collect::<Option<Vec<_>>>()
            {
                Some(quad) => quad,
                None => continue,
            };
            if start < 0.0 {
                triangles.push([quad[0], quad[1], quad[2]]);
                triangles.push([quad[0], quad[2], quad[3]]);
            } else {
                triangles.push([quad[0], quad[2], quad[1]]);
                triangles.push([quad[0], quad[3], quad[2]]);
            }
        }
    }

    let (vertices, triangles) = compact(&positions, triangles);
    info!(
        "Reconstructed {} vertices and {} triangles at depth {} from {} points",
        vertices.len(),
        triangles.len(),
        depth,
        object.len()
    );
    transfer_attributes(object, &surface.index, vertices, triangles)
}

/// all cells that contain an input vertex, dilated by one cell in every direction
fn active_cells(grid: &SparseGrid, vertices: &[Vector3<f32>]) -> BTreeSet<GridId> {
    let mut cells = BTreeSet::new();
    for vertex in vertices {
        let center = grid.cell_of(vertex);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let cell = offset(&center, &[dx, dy, dz]);
                    if grid.contains_cell(&cell) {
                        cells.insert(cell);
                    }
                }
            }
        }
    }
    cells
}

fn sample_nodes(
    grid: &SparseGrid,
    surface: &ImplicitSurface,
    cells: &BTreeSet<GridId>,
) -> HashMap<GridId, f64> {
    let nodes = cells
        .iter()
        .flat_map(|cell| CORNER_OFFSETS.iter().map(move |corner| offset(cell, corner)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    let values = nodes
        .par_iter()
        .map(|node| surface.evaluate(&grid.node_position(node)))
        .collect::<Vec<_>>();
    nodes.into_iter().zip(values).collect()
}

/// mean of the zero crossings on the edges of `cell`, `None` if the function does not change sign within the cell
fn cell_vertex(grid: &SparseGrid, values: &HashMap<GridId, f64>, cell: &GridId) -> Option<Vector3<f64>> {
    let corners = CORNER_OFFSETS.map(|corner| offset(cell, &corner));
    let corner_values = corners.map(|corner| values[&corner]);

    let mut sum = Vector3::zeros();
    let mut crossings = 0;
    for (a, b) in CELL_EDGES {
        let (fa, fb) = (corner_values[a], corner_values[b]);
        if (fa < 0.0) == (fb < 0.0) {
            continue;
        }
        let t = fa / (fa - fb);
        let pa = grid.node_position(&corners[a]);
        let pb = grid.node_position(&corners[b]);
        sum += pa + (pb - pa) * t;
        crossings += 1;
    }
    if crossings == 0 {
        return None;
    }
    Some(sum / crossings as f64)
}

/// drops vertices that no triangle references and re-indexes the triangles
fn compact(positions: &[Vector3<f64>], triangles: Vec<[u32; 3]>) -> (Vec<Vector3<f32>>, Vec<[u32; 3]>) {
    let mut remap = vec![u32::MAX; positions.len()];
    for triangle in &triangles {
        for &index in triangle {
            remap[index as usize] = 0;
        }
    }
    let mut vertices = vec![];
    for (index, position) in positions.iter().enumerate() {
        if remap[index] == 0 {
            remap[index] = vertices.len() as u32;
            vertices.push(position.cast::<f32>());
        }
    }
    let triangles = triangles
        .into_iter()
        .map(|triangle| triangle.map(|index| remap[index as usize]))
        .collect();
    (vertices, triangles)
}

fn transfer_attributes(
    object: &Object3D,
    index: &NeighborIndex,
    vertices: Vec<Vector3<f32>>,
    triangles: Vec<[u32; 3]>,
) -> ProcessingResult<Object3D> {
    let closest = vertices
        .par_iter()
        .map(|vertex| index.nearest(vertex, 1).first().map(|(i, _)| *i).unwrap_or(0))
        .collect::<Vec<_>>();

    let mut accumulated = vec![Vector3::<f32>::zeros(); vertices.len()];
    for triangle in &triangles {
        let [a, b, c] = triangle.map(|i| vertices[i as usize]);
        // the length of the cross product is twice the triangle area
        let weighted_normal = (b - a).cross(&(c - a));
        for &i in triangle {
            accumulated[i as usize] += weighted_normal;
        }
    }
    let vertex_normals = accumulated
        .iter()
        .zip(&closest)
        .map(|(normal, &source)| {
            normal
                .try_normalize(f32::EPSILON)
                .unwrap_or(object.vertex_normals()[source])
        })
        .collect();

    let vertex_colors = if object.has_colors() {
        closest.iter().map(|&i| object.vertex_colors()[i]).collect()
    } else {
        vec![]
    };
    let vertex_confidence = if object.has_confidence() {
        closest.iter().map(|&i| object.vertex_confidence()[i]).collect()
    } else {
        vec![]
    };

    Ok(Object3D::from_parts(
        vertices,
        vertex_confidence,
        vertex_colors,
        vertex_normals,
        triangles,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(count: usize) -> Object3D {
        let golden_angle = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
        let vertices = (0..count)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f32 + 0.5) / count as f32;
                let ring = (1.0 - y * y).sqrt();
                let theta = golden_angle * i as f32;
                Vector3::new(theta.cos() * ring, y, theta.sin() * ring)
            })
            .collect::<Vec<_>>();
        let normals = vertices.clone();
        let colors = vertices
            .iter()
            .map(|v| if v.y > 0.0 { Vector3::new(1.0, 0.0, 0.0) } else { Vector3::new(0.0, 0.0, 1.0) })
            .collect();
        Object3D::from_vertices(vertices)
            .with_normals(normals)
            .and_then(|object| object.with_colors(colors))
            .unwrap()
    }

    #[test]
    fn test_requires_normals() {
        let object = Object3D::from_vertices(vec![Vector3::zeros(), Vector3::x(), Vector3::y()]);
        assert!(matches!(
            poisson_surface_reconstruction(&object, 5),
            Err(ProcessingError::MissingNormals)
        ));
        assert!(matches!(
            poisson_surface_reconstruction(&Object3D::default(), 5),
            Err(ProcessingError::MissingNormals)
        ));
    }

    #[test]
    fn test_depth_range() {
        let object = sphere(50);
        for depth in [0, MAX_DEPTH + 1] {
            assert!(matches!(
                poisson_surface_reconstruction(&object, depth),
                Err(ProcessingError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_sphere_reconstruction() {
        let object = sphere(800);
        let mesh = poisson_surface_reconstruction(&object, 4).unwrap();
        assert!(mesh.has_triangles());
        assert_eq!(mesh.len(), mesh.vertex_normals().len());
        assert_eq!(mesh.len(), mesh.vertex_colors().len());
        assert!(!mesh.has_confidence());

        for vertex in mesh.vertices() {
            let radius = vertex.norm();
            assert!((0.8..1.2).contains(&radius), "vertex {} is off the surface", vertex);
        }
        let outward = mesh
            .vertices()
            .iter()
            .zip(mesh.vertex_normals())
            .filter(|&(vertex, normal)| vertex.dot(normal) > 0.0)
            .count();
        assert!(outward as f32 >= 0.9 * mesh.len() as f32);
    }

    #[test]
    fn test_reconstruction_is_deterministic() {
        let object = sphere(200);
        assert_eq!(
            poisson_surface_reconstruction(&object, 3).unwrap(),
            poisson_surface_reconstruction(&object, 3).unwrap()
        );
    }
}
