use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use arcap_core::containers::Object3D;
use arcap_core::layout::{attributes, PointLayout};
use arcap_core::meta::Metadata;
use arcap_core::nalgebra::Vector3;
use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use super::{PlyElement, PlyFormat, PlyHeader, PlyMetadata, PlyPropertyKind, PlyScalar};
use crate::base::PointReader;

/// A single property value of an element record
#[derive(Debug, Clone, PartialEq)]
enum PlyValue {
    Scalar(f64),
    List(Vec<f64>),
}

/// Source of the property values in the body of a PLY file
trait ValueSource {
    /// Called before the first value of every record
    fn begin_record(&mut self) -> Result<()>;
    fn scalar(&mut self, scalar: PlyScalar) -> Result<f64>;
}

struct AsciiValues<R: BufRead> {
    read: R,
    line: String,
    tokens: Vec<String>,
}

impl<R: BufRead> ValueSource for AsciiValues<R> {
    fn begin_record(&mut self) -> Result<()> {
        if !self.tokens.is_empty() {
            bail!("Too many values in PLY record '{}'", self.line.trim_end());
        }
        loop {
            self.line.clear();
            if self.read.read_line(&mut self.line)? == 0 {
                bail!("Unexpected end of file in PLY body");
            }
            if !self.line.trim().is_empty() {
                break;
            }
        }
        self.tokens = self.line.split_whitespace().rev().map(str::to_owned).collect();
        Ok(())
    }

    fn scalar(&mut self, scalar: PlyScalar) -> Result<f64> {
        let token = self
            .tokens
            .pop()
            .ok_or_else(|| anyhow!("Too few values in PLY record '{}'", self.line.trim_end()))?;
        // parsing floats directly as f32 keeps written values bit-exact
        let value = match scalar {
            PlyScalar::Float => token.parse::<f32>().map(f64::from),
            _ => token.parse::<f64>(),
        };
        value.context(format!("Invalid PLY value {}", token))
    }
}

struct BinaryValues<R: Read> {
    read: R,
}

impl<R: Read> ValueSource for BinaryValues<R> {
    fn begin_record(&mut self) -> Result<()> {
        Ok(())
    }

    fn scalar(&mut self, scalar: PlyScalar) -> Result<f64> {
        let read = &mut self.read;
        let value = match scalar {
            PlyScalar::Char => read.read_i8()? as f64,
            PlyScalar::UChar => read.read_u8()? as f64,
            PlyScalar::Short => read.read_i16::<LittleEndian>()? as f64,
            PlyScalar::UShort => read.read_u16::<LittleEndian>()? as f64,
            PlyScalar::Int => read.read_i32::<LittleEndian>()? as f64,
            PlyScalar::UInt => read.read_u32::<LittleEndian>()? as f64,
            PlyScalar::Float => read.read_f32::<LittleEndian>()? as f64,
            PlyScalar::Double => read.read_f64::<LittleEndian>()?,
        };
        Ok(value)
    }
}

fn read_record<S: ValueSource>(source: &mut S, element: &PlyElement) -> Result<Vec<PlyValue>> {
    source.begin_record()?;
    element
        .properties
        .iter()
        .map(|property| match property.kind {
            PlyPropertyKind::Scalar(scalar) => source.scalar(scalar).map(PlyValue::Scalar),
            PlyPropertyKind::List { count, item } => {
                let length = source.scalar(count)?;
                if length < 0.0 {
                    bail!("Negative list length in PLY property {}", property.name);
                }
                (0..length as usize)
                    .map(|_| source.scalar(item))
                    .collect::<Result<Vec<_>>>()
                    .map(PlyValue::List)
            }
        })
        .collect()
}

/// Where the attributes of a vertex are found within a vertex record
struct VertexProperties {
    position: [usize; 3],
    color: Option<([usize; 3], bool)>,
    confidence: Option<usize>,
    normal: Option<[usize; 3]>,
}

impl VertexProperties {
    fn locate(element: &PlyElement) -> Result<Self> {
        let index_of = |name: &str| element.properties.iter().position(|p| p.name == name);
        let triple = |names: [&str; 3]| -> Option<[usize; 3]> {
            Some([index_of(names[0])?, index_of(names[1])?, index_of(names[2])?])
        };
        let position =
            triple(["x", "y", "z"]).ok_or_else(|| anyhow!("PLY vertices have no x, y and z properties"))?;
        let color = triple(["red", "green", "blue"]).map(|indices| {
            let is_float = matches!(
                element.properties[indices[0]].kind,
                PlyPropertyKind::Scalar(PlyScalar::Float) | PlyPropertyKind::Scalar(PlyScalar::Double)
            );
            (indices, is_float)
        });
        Ok(Self {
            position,
            color,
            confidence: index_of("confidence"),
            normal: triple(["nx", "ny", "nz"]),
        })
    }

    fn point_layout(&self) -> PointLayout {
        let mut layout = PointLayout::from_attributes(&[attributes::POSITION_3D]);
        if self.color.is_some() {
            layout.add_attribute(attributes::COLOR_RGB);
        }
        if self.confidence.is_some() {
            layout.add_attribute(attributes::CONFIDENCE);
        }
        if self.normal.is_some() {
            layout.add_attribute(attributes::NORMAL);
        }
        layout
    }
}

#[derive(Default)]
struct Vertices {
    positions: Vec<Vector3<f32>>,
    colors: Vec<Vector3<f32>>,
    confidence: Vec<u32>,
    normals: Vec<Vector3<f32>>,
}

fn scalar_at(record: &[PlyValue], index: usize) -> Result<f64> {
    match &record[index] {
        PlyValue::Scalar(value) => Ok(*value),
        PlyValue::List(_) => bail!("Expected a scalar PLY property, found a list"),
    }
}

fn vector_at(record: &[PlyValue], indices: &[usize; 3]) -> Result<Vector3<f64>> {
    Ok(Vector3::new(
        scalar_at(record, indices[0])?,
        scalar_at(record, indices[1])?,
        scalar_at(record, indices[2])?,
    ))
}

/// Reads objects from PLY files
///
/// Supports ASCII and binary little endian files. Vertices need `x y z` properties; `red green blue`, `confidence`
/// and `nx ny nz` are read if present. Polygons of a `face` element are triangulated as fans. All other elements
/// and properties are skipped.
pub struct PlyReader<R: BufRead> {
    read: R,
    header: PlyHeader,
    metadata: PlyMetadata,
    properties: VertexProperties,
    layout: PointLayout,
    has_read: bool,
}

impl PlyReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .context(format!("Could not open file {}", path.as_ref().display()))?;
        Self::from_read(BufReader::new(file))
    }
}

impl<R: BufRead> PlyReader<R> {
    /// Creates a new `PlyReader` and parses the header of the PLY file in `read`
    pub fn from_read(mut read: R) -> Result<Self> {
        let header = PlyHeader::read_from(&mut read)?;
        let vertex = header
            .element("vertex")
            .ok_or_else(|| anyhow!("PLY file has no vertex element"))?;
        let properties = VertexProperties::locate(vertex)?;
        let layout = properties.point_layout();
        let metadata = PlyMetadata::from_header(&header);
        Ok(Self {
            read,
            header,
            metadata,
            properties,
            layout,
            has_read: false,
        })
    }

    pub fn header(&self) -> &PlyHeader {
        &self.header
    }

    pub fn ply_metadata(&self) -> &PlyMetadata {
        &self.metadata
    }
}

/// Reads all element records in header order
fn read_body<S: ValueSource>(
    header: &PlyHeader,
    properties: &VertexProperties,
    source: &mut S,
) -> Result<(Vertices, Vec<[u32; 3]>)> {
    let mut vertices = Vertices::default();
    let mut triangles = vec![];
    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => {
                for _ in 0..element.count {
                    let record = read_record(source, element)?;
                    push_vertex(properties, &record, &mut vertices)?;
                }
            }
            "face" => {
                let indices = element
                    .properties
                    .iter()
                    .position(|p| p.name == "vertex_indices" || p.name == "vertex_index")
                    .ok_or_else(|| anyhow!("PLY faces have no vertex_indices property"))?;
                for _ in 0..element.count {
                    let record = read_record(source, element)?;
                    match &record[indices] {
                        PlyValue::List(polygon) => push_polygon(polygon, &mut triangles)?,
                        PlyValue::Scalar(_) => bail!("PLY vertex_indices must be a list property"),
                    }
                }
            }
            other => {
                debug!("Skipping {} records of PLY element {}", element.count, other);
                for _ in 0..element.count {
                    read_record(source, element)?;
                }
            }
        }
    }
    Ok((vertices, triangles))
}

fn push_vertex(properties: &VertexProperties, record: &[PlyValue], vertices: &mut Vertices) -> Result<()> {
    vertices
        .positions
        .push(vector_at(record, &properties.position)?.cast::<f32>());
    if let Some((indices, is_float)) = &properties.color {
        let color = vector_at(record, indices)?.cast::<f32>();
        vertices.colors.push(if *is_float { color } else { color / 255.0 });
    }
    if let Some(index) = properties.confidence {
        vertices.confidence.push(scalar_at(record, index)?.max(0.0) as u32);
    }
    if let Some(indices) = &properties.normal {
        vertices.normals.push(vector_at(record, indices)?.cast::<f32>());
    }
    Ok(())
}

fn push_polygon(polygon: &[f64], triangles: &mut Vec<[u32; 3]>) -> Result<()> {
    if polygon.iter().any(|index| *index < 0.0 || *index > u32::MAX as f64) {
        bail!("Invalid vertex index in PLY face");
    }
    let polygon = polygon.iter().map(|index| *index as u32).collect::<Vec<_>>();
    for window in 1..polygon.len().saturating_sub(1) {
        triangles.push([polygon[0], polygon[window], polygon[window + 1]]);
    }
    Ok(())
}

impl<R: BufRead> PointReader for PlyReader<R> {
    fn read(&mut self) -> Result<Object3D> {
        if self.has_read {
            bail!("The object of this PLY file has already been read");
        }
        self.has_read = true;

        let (vertices, triangles) = match self.header.format {
            PlyFormat::Ascii => {
                let mut source = AsciiValues {
                    read: &mut self.read,
                    line: String::new(),
                    tokens: vec![],
                };
                read_body(&self.header, &self.properties, &mut source)?
            }
            PlyFormat::BinaryLittleEndian => {
                let mut source = BinaryValues {
                    read: &mut self.read,
                };
                read_body(&self.header, &self.properties, &mut source)?
            }
        };

        let object = Object3D::from_parts(
            vertices.positions,
            vertices.confidence,
            vertices.colors,
            vertices.normals,
            triangles,
        )
        .context("PLY file contains an invalid object")?;
        self.metadata.set_bounds(object.bounds());
        Ok(object)
    }

    fn get_metadata(&self) -> &dyn Metadata {
        &self.metadata
    }

    fn get_default_point_layout(&self) -> &PointLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::PointWriter;
    use crate::ply::PlyWriter;
    use assert_approx_eq::assert_approx_eq;

    fn reader(text: &str) -> Result<PlyReader<&[u8]>> {
        PlyReader::from_read(text.as_bytes())
    }

    #[test]
    fn test_read_ascii_with_faces() -> Result<()> {
        let text = "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\nproperty float z\n\
            property float red\nproperty float green\nproperty float blue\n\
            element face 1\nproperty list uchar uint vertex_indices\nend_header\n\
            0 0 0 1 0 0\n1 0 0 0 1 0\n1 1 0 0 0 1\n0 1 0 0.5 0.5 0.5\n4 0 1 2 3\n";
        let mut reader = reader(text)?;
        assert_eq!(4, reader.get_metadata().number_of_points().unwrap());
        assert_eq!(1, reader.ply_metadata().face_count());
        assert!(reader.get_default_point_layout().has_attribute(attributes::COLOR_RGB.name()));
        assert!(reader.get_metadata().bounds().is_none());

        let object = reader.read()?;
        assert_eq!(4, object.len());
        assert_eq!(&[[0, 1, 2], [0, 2, 3]], object.triangles());
        assert_approx_eq!(0.5, object.vertex_colors()[3].x);
        assert!(!object.has_confidence());
        let bounds = reader.get_metadata().bounds().unwrap();
        assert_eq!(1.0, bounds.max().x);
        assert!(reader.read().is_err());
        Ok(())
    }

    #[test]
    fn test_skip_unknown_elements_and_properties() -> Result<()> {
        let text = "ply\nformat ascii 1.0\nelement camera 1\nproperty float fov\nelement vertex 2\n\
            property float x\nproperty float y\nproperty float z\nproperty float intensity\nend_header\n\
            60\n1 2 3 0.5\n\n4 5 6 0.25\n";
        let object = reader(text)?.read()?;
        assert_eq!(&[Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0)], object.vertices());
        Ok(())
    }

    #[test]
    fn test_invalid_bodies() {
        let missing_z = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nend_header\n1 2\n";
        assert!(reader(missing_z).is_err());

        let truncated = "ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\nproperty float y\nproperty float z\nend_header\n1 2 3\n";
        assert!(reader(truncated).unwrap().read().is_err());

        let bad_face = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\n\
            element face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n3 0 1 2\n";
        assert!(reader(bad_face).unwrap().read().is_err());
    }

    #[test]
    fn test_binary_written_object_is_read_back() -> Result<()> {
        let object = Object3D::from_vertices(vec![Vector3::new(0.1, 0.2, 0.3), Vector3::new(-4.0, 5.5, 1e-3)])
            .with_confidence(vec![2, 0])
            .and_then(|object| object.with_normals(vec![Vector3::x(), Vector3::y()]))?;
        let mut bytes = vec![];
        let mut writer = PlyWriter::from_write(&mut bytes, PlyFormat::BinaryLittleEndian);
        writer.write(&object)?;
        drop(writer);

        let mut reader = PlyReader::from_read(bytes.as_slice())?;
        assert_eq!(PlyFormat::BinaryLittleEndian, reader.ply_metadata().format());
        assert_eq!(object, reader.read()?);
        Ok(())
    }
}
