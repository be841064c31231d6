use nalgebra::Vector3;
use thiserror::Error;

use super::{CapturedPoint, ConfidenceThreshold};
use crate::layout::{attributes, PointLayout};
use crate::math::AABB;

/// Violations of the per-vertex attribute invariants of an [Object3D]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Object3DError {
    #[error("{attribute} has {actual} entries but the object has {expected} vertices")]
    AttributeLengthMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("triangle {triangle} references vertex {index} but the object has {vertex_count} vertices")]
    TriangleIndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },
}

/// A geometry snapshot that processing operators consume and produce
///
/// Every per-vertex attribute is either empty (the object does not carry it) or has exactly one entry per vertex.
/// Triangles, if present, only reference existing vertices. Both invariants are checked on construction, so an
/// `Object3D` can never be observed in an inconsistent state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object3D {
    vertices: Vec<Vector3<f32>>,
    vertex_confidence: Vec<u32>,
    vertex_colors: Vec<Vector3<f32>>,
    vertex_normals: Vec<Vector3<f32>>,
    triangles: Vec<[u32; 3]>,
}

impl Object3D {
    /// Creates an object that only has positions
    pub fn from_vertices(vertices: Vec<Vector3<f32>>) -> Self {
        Self {
            vertices,
            ..Default::default()
        }
    }

    /// Creates an object from all of its parts, validating the attribute invariants
    pub fn from_parts(
        vertices: Vec<Vector3<f32>>,
        vertex_confidence: Vec<u32>,
        vertex_colors: Vec<Vector3<f32>>,
        vertex_normals: Vec<Vector3<f32>>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<Self, Object3DError> {
        let object = Self {
            vertices,
            vertex_confidence,
            vertex_colors,
            vertex_normals,
            triangles,
        };
        object.validate()?;
        Ok(object)
    }

    /// Converts captured points into an object, keeping only the points whose confidence passes `threshold`
    pub fn from_captured_points(points: &[CapturedPoint], threshold: ConfidenceThreshold) -> Self {
        let kept = points
            .iter()
            .filter(|point| threshold.accepts(point.confidence))
            .collect::<Vec<_>>();
        Self {
            vertices: kept.iter().map(|p| p.position).collect(),
            vertex_confidence: kept.iter().map(|p| p.confidence_level().as_u32()).collect(),
            vertex_colors: kept.iter().map(|p| p.color).collect(),
            vertex_normals: vec![],
            triangles: vec![],
        }
    }

    pub fn with_confidence(mut self, vertex_confidence: Vec<u32>) -> Result<Self, Object3DError> {
        self.vertex_confidence = vertex_confidence;
        self.validate()?;
        Ok(self)
    }

    pub fn with_colors(mut self, vertex_colors: Vec<Vector3<f32>>) -> Result<Self, Object3DError> {
        self.vertex_colors = vertex_colors;
        self.validate()?;
        Ok(self)
    }

    pub fn with_normals(mut self, vertex_normals: Vec<Vector3<f32>>) -> Result<Self, Object3DError> {
        self.vertex_normals = vertex_normals;
        self.validate()?;
        Ok(self)
    }

    pub fn with_triangles(mut self, triangles: Vec<[u32; 3]>) -> Result<Self, Object3DError> {
        self.triangles = triangles;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), Object3DError> {
        let expected = self.vertices.len();
        let check = |attribute: &'static str, actual: usize| {
            if actual != 0 && actual != expected {
                Err(Object3DError::AttributeLengthMismatch {
                    attribute,
                    expected,
                    actual,
                })
            } else {
                Ok(())
            }
        };
        check("vertex_confidence", self.vertex_confidence.len())?;
        check("vertex_colors", self.vertex_colors.len())?;
        check("vertex_normals", self.vertex_normals.len())?;

        for (triangle, indices) in self.triangles.iter().enumerate() {
            if let Some(index) = indices.iter().find(|&&index| index as usize >= expected) {
                return Err(Object3DError::TriangleIndexOutOfRange {
                    triangle,
                    index: *index,
                    vertex_count: expected,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Vector3<f32>] {
        &self.vertices
    }

    pub fn vertex_confidence(&self) -> &[u32] {
        &self.vertex_confidence
    }

    pub fn vertex_colors(&self) -> &[Vector3<f32>] {
        &self.vertex_colors
    }

    pub fn vertex_normals(&self) -> &[Vector3<f32>] {
        &self.vertex_normals
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn has_confidence(&self) -> bool {
        !self.vertex_confidence.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.vertex_colors.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.vertex_normals.is_empty()
    }

    pub fn has_triangles(&self) -> bool {
        !self.triangles.is_empty()
    }

    /// Bounding box of all vertices, `None` for an empty object
    pub fn bounds(&self) -> Option<AABB<f32>> {
        AABB::from_positions(self.vertices.iter())
    }

    /// The attributes this object carries, in serialization order
    pub fn point_layout(&self) -> PointLayout {
        let mut layout = PointLayout::from_attributes(&[attributes::POSITION_3D]);
        if self.has_colors() {
            layout.add_attribute(attributes::COLOR_RGB);
        }
        if self.has_confidence() {
            layout.add_attribute(attributes::CONFIDENCE);
        }
        if self.has_normals() {
            layout.add_attribute(attributes::NORMAL);
        }
        layout
    }

    /// Returns a new object containing only the vertices at `indices` (in that order) with all of their attributes.
    /// Triangles survive if all three of their vertices are selected and are re-indexed accordingly.
    ///
    /// # Panics
    ///
    /// If any index is out of bounds
    pub fn select(&self, indices: &[usize]) -> Object3D {
        let pick_all = |values: &[Vector3<f32>]| {
            if values.is_empty() {
                vec![]
            } else {
                indices.iter().map(|&i| values[i]).collect()
            }
        };
        let vertex_confidence = if self.vertex_confidence.is_empty() {
            vec![]
        } else {
            indices.iter().map(|&i| self.vertex_confidence[i]).collect()
        };

        let triangles = if self.triangles.is_empty() {
            vec![]
        } else {
            let mut remap = vec![u32::MAX; self.vertices.len()];
            for (new_index, &old_index) in indices.iter().enumerate() {
                remap[old_index] = new_index as u32;
            }
            self.triangles
                .iter()
                .filter_map(|triangle| {
                    let mapped = [
                        remap[triangle[0] as usize],
                        remap[triangle[1] as usize],
                        remap[triangle[2] as usize],
                    ];
                    if mapped.contains(&u32::MAX) {
                        None
                    } else {
                        Some(mapped)
                    }
                })
                .collect()
        };

        Object3D {
            vertices: pick_all(&self.vertices),
            vertex_confidence,
            vertex_colors: pick_all(&self.vertex_colors),
            vertex_normals: pick_all(&self.vertex_normals),
            triangles,
        }
    }

    /// Returns a copy of this object with the normals replaced. Fails if the length does not match
    pub fn replace_normals(&self, vertex_normals: Vec<Vector3<f32>>) -> Result<Object3D, Object3DError> {
        self.clone().with_normals(vertex_normals)
    }

    /// Decomposes the object into `(vertices, confidence, colors, normals, triangles)`
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        Vec<Vector3<f32>>,
        Vec<u32>,
        Vec<Vector3<f32>>,
        Vec<Vector3<f32>>,
        Vec<[u32; 3]>,
    ) {
        (
            self.vertices,
            self.vertex_confidence,
            self.vertex_colors,
            self.vertex_normals,
            self.triangles,
        )
    }
}
