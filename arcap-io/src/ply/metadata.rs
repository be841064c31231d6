use std::any::Any;
use std::fmt::Display;

use arcap_core::math::AABB;
use arcap_core::meta::Metadata;

use super::{PlyFormat, PlyHeader};

/// `Metadata` implementation for PLY files
///
/// PLY headers carry no bounding box, so `bounds` is only known once the vertices have been read.
#[derive(Debug, Clone, PartialEq)]
pub struct PlyMetadata {
    format: PlyFormat,
    vertex_count: usize,
    face_count: usize,
    comments: Vec<String>,
    bounds: Option<AABB<f32>>,
}

impl PlyMetadata {
    pub fn from_header(header: &PlyHeader) -> Self {
        let count_of = |name: &str| header.element(name).map(|e| e.count).unwrap_or(0);
        Self {
            format: header.format,
            vertex_count: count_of("vertex"),
            face_count: count_of("face"),
            comments: header.comments.clone(),
            bounds: None,
        }
    }

    pub fn format(&self) -> PlyFormat {
        self.format
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub(crate) fn set_bounds(&mut self, bounds: Option<AABB<f32>>) {
        self.bounds = bounds;
    }
}

impl Display for PlyMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PLY Metadata")?;
        writeln!(f, "\tFormat: {}", self.format)?;
        writeln!(f, "\tVertices: {}", self.vertex_count)?;
        writeln!(f, "\tFaces: {}", self.face_count)?;
        for comment in &self.comments {
            writeln!(f, "\tComment: {}", comment)?;
        }
        if let Some(bounds) = &self.bounds {
            writeln!(f, "\tBounds (min): {}", bounds.min())?;
            writeln!(f, "\tBounds (max): {}", bounds.max())?;
        }
        Ok(())
    }
}

impl Metadata for PlyMetadata {
    fn bounds(&self) -> Option<AABB<f32>> {
        self.bounds
    }

    fn number_of_points(&self) -> Option<usize> {
        Some(self.vertex_count)
    }

    fn get_named_field(&self, field_name: &str) -> Option<Box<dyn Any>> {
        match field_name {
            "format" => Some(Box::new(self.format)),
            "vertex_count" => Some(Box::new(self.vertex_count)),
            "face_count" => Some(Box::new(self.face_count)),
            "comments" => Some(Box::new(self.comments.clone())),
            _ => None,
        }
    }

    fn clone_into_box(&self) -> Box<dyn Metadata> {
        Box::new(self.clone())
    }
}
