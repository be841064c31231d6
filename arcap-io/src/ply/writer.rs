use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use arcap_core::containers::Object3D;
use arcap_core::layout::attributes;
use arcap_core::nalgebra::Vector3;
use byteorder::{LittleEndian, WriteBytesExt};
use itertools::Itertools;

use super::{PlyElement, PlyFormat, PlyHeader, PlyProperty, PlyScalar};
use crate::base::PointWriter;

/// Writes a single object as a PLY file
///
/// Vertices are written with their position and, if the object has them, their color (`red green blue` as bytes),
/// confidence level and normal (`nx ny nz`). Triangles are only written if enabled with
/// [write_faces](PlyWriter::write_faces).
pub struct PlyWriter<W: Write> {
    write: W,
    format: PlyFormat,
    comments: Vec<String>,
    faces: bool,
    has_written: bool,
}

impl PlyWriter<BufWriter<File>> {
    /// Creates a new `PlyWriter` that writes to the file at `path`
    ///
    /// # Errors
    ///
    /// If `path` cannot be created or overwritten, an error is returned.
    pub fn from_path<P: AsRef<Path>>(path: P, format: PlyFormat) -> Result<Self> {
        let file = File::create(path.as_ref())
            .context(format!("Could not open file {} for writing", path.as_ref().display()))?;
        Ok(Self::from_write(BufWriter::new(file), format))
    }
}

impl<W: Write> PlyWriter<W> {
    pub fn from_write(write: W, format: PlyFormat) -> Self {
        Self {
            write,
            format,
            comments: vec![],
            faces: false,
            has_written: false,
        }
    }

    /// Adds a `comment` line to the header. Line breaks are replaced with spaces
    pub fn add_comment(&mut self, comment: &str) {
        self.comments.push(comment.replace(['\r', '\n'], " "));
    }

    /// Whether triangles are written as a `face` element. Disabled by default
    pub fn write_faces(&mut self, faces: bool) {
        self.faces = faces;
    }

    /// The header that writing `object` produces
    pub fn header_for(&self, object: &Object3D) -> PlyHeader {
        let layout = object.point_layout();
        let mut vertex = PlyElement::new("vertex", object.len());
        for name in ["x", "y", "z"] {
            vertex.properties.push(PlyProperty::scalar(name, PlyScalar::Float));
        }
        if layout.has_attribute(attributes::COLOR_RGB.name()) {
            for name in ["red", "green", "blue"] {
                vertex.properties.push(PlyProperty::scalar(name, PlyScalar::UChar));
            }
        }
        if layout.has_attribute(attributes::CONFIDENCE.name()) {
            vertex
                .properties
                .push(PlyProperty::scalar("confidence", PlyScalar::UChar));
        }
        if layout.has_attribute(attributes::NORMAL.name()) {
            for name in ["nx", "ny", "nz"] {
                vertex.properties.push(PlyProperty::scalar(name, PlyScalar::Float));
            }
        }

        let mut elements = vec![vertex];
        if self.faces && object.has_triangles() {
            let mut face = PlyElement::new("face", object.triangles().len());
            face.properties.push(PlyProperty::list(
                "vertex_indices",
                PlyScalar::UChar,
                PlyScalar::Int,
            ));
            elements.push(face);
        }

        PlyHeader {
            format: self.format,
            comments: self.comments.clone(),
            elements,
        }
    }

    fn write_ascii(&mut self, object: &Object3D) -> Result<()> {
        for index in 0..object.len() {
            let mut values = vec![];
            push_floats(&mut values, &object.vertices()[index]);
            if object.has_colors() {
                values.extend(color_bytes(&object.vertex_colors()[index]).map(|c| c.to_string()));
            }
            if object.has_confidence() {
                values.push(confidence_byte(object.vertex_confidence()[index]).to_string());
            }
            if object.has_normals() {
                push_floats(&mut values, &object.vertex_normals()[index]);
            }
            writeln!(self.write, "{}", values.iter().join(" "))?;
        }
        if self.faces {
            for triangle in object.triangles() {
                writeln!(self.write, "3 {}", triangle.iter().join(" "))?;
            }
        }
        Ok(())
    }

    fn write_binary(&mut self, object: &Object3D) -> Result<()> {
        for index in 0..object.len() {
            for coordinate in object.vertices()[index].iter() {
                self.write.write_f32::<LittleEndian>(*coordinate)?;
            }
            if object.has_colors() {
                self.write.write_all(&color_bytes(&object.vertex_colors()[index]))?;
            }
            if object.has_confidence() {
                self.write
                    .write_u8(confidence_byte(object.vertex_confidence()[index]))?;
            }
            if object.has_normals() {
                for component in object.vertex_normals()[index].iter() {
                    self.write.write_f32::<LittleEndian>(*component)?;
                }
            }
        }
        if self.faces {
            for triangle in object.triangles() {
                self.write.write_u8(3)?;
                for vertex in triangle {
                    self.write.write_i32::<LittleEndian>(*vertex as i32)?;
                }
            }
        }
        Ok(())
    }
}

impl<W: Write> PointWriter for PlyWriter<W> {
    fn write(&mut self, object: &Object3D) -> Result<()> {
        if self.has_written {
            bail!("A PLY file holds a single object, it has already been written");
        }
        if self.faces && object.len() > i32::MAX as usize {
            bail!("Too many vertices to reference them from PLY faces");
        }
        self.has_written = true;

        let header = self.header_for(object);
        header.write_to(&mut self.write)?;
        match self.format {
            PlyFormat::Ascii => self.write_ascii(object),
            PlyFormat::BinaryLittleEndian => self.write_binary(object),
        }
        .context("Could not write PLY body")
    }

    fn flush(&mut self) -> Result<()> {
        self.write.flush()?;
        Ok(())
    }
}

fn push_floats(values: &mut Vec<String>, vector: &Vector3<f32>) {
    values.extend(vector.iter().map(|v| v.to_string()));
}

/// colors are normalized floats in memory and bytes on disk
pub(crate) fn color_bytes(color: &Vector3<f32>) -> [u8; 3] {
    let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_byte(color.x), to_byte(color.y), to_byte(color.z)]
}

fn confidence_byte(level: u32) -> u8 {
    level.min(u8::MAX as u32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Object3D {
        Object3D::from_vertices(vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.5, 0.0, 0.0),
            Vector3::new(0.0, -2.25, 0.0),
        ])
        .with_colors(vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 0.5),
        ])
        .and_then(|object| object.with_confidence(vec![0, 1, 2]))
        .and_then(|object| object.with_triangles(vec![[0, 1, 2]]))
        .unwrap()
    }

    #[test]
    fn test_ascii_export() -> Result<()> {
        let mut bytes = vec![];
        let mut writer = PlyWriter::from_write(&mut bytes, PlyFormat::Ascii);
        writer.add_comment("captured with arcap");
        writer.write(&triangle())?;
        writer.flush()?;
        drop(writer);

        let expected = "ply\n\
            format ascii 1.0\n\
            comment captured with arcap\n\
            element vertex 3\n\
            property float x\n\
            property float y\n\
            property float z\n\
            property uchar red\n\
            property uchar green\n\
            property uchar blue\n\
            property uchar confidence\n\
            end_header\n\
            0 0 0 255 0 0 0\n\
            1.5 0 0 0 255 0 1\n\
            0 -2.25 0 0 0 128 2\n";
        assert_eq!(expected, String::from_utf8(bytes)?);
        Ok(())
    }

    #[test]
    fn test_faces_and_normals() -> Result<()> {
        let object = triangle().replace_normals(vec![Vector3::z(); 3])?;
        let mut bytes = vec![];
        let mut writer = PlyWriter::from_write(&mut bytes, PlyFormat::Ascii);
        writer.write_faces(true);
        writer.write(&object)?;
        drop(writer);

        let text = String::from_utf8(bytes)?;
        assert!(text.contains("property float nx\nproperty float ny\nproperty float nz\n"));
        assert!(text.contains("element face 1\nproperty list uchar int vertex_indices\n"));
        assert!(text.ends_with("0 0 0 255 0 0 0 0 0 1\n1.5 0 0 0 255 0 1 0 0 1\n0 -2.25 0 0 0 128 2 0 0 1\n3 0 1 2\n"));
        Ok(())
    }

    #[test]
    fn test_binary_body_size() -> Result<()> {
        let mut bytes = vec![];
        let mut writer = PlyWriter::from_write(&mut bytes, PlyFormat::BinaryLittleEndian);
        writer.write(&triangle())?;
        drop(writer);

        let header_end = b"end_header\n";
        let body_start = bytes
            .windows(header_end.len())
            .position(|window| window == header_end)
            .unwrap()
            + header_end.len();
        // 12 bytes position, 3 bytes color, 1 byte confidence
        assert_eq!(3 * 16, bytes.len() - body_start);
        assert_eq!(1.5f32.to_le_bytes(), bytes[body_start + 16..body_start + 20]);
        Ok(())
    }

    #[test]
    fn test_single_write() {
        let mut writer = PlyWriter::from_write(vec![], PlyFormat::Ascii);
        assert!(writer.write(&triangle()).is_ok());
        assert!(writer.write(&triangle()).is_err());
    }
}
