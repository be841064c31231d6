use std::fmt::{self, Display};
use std::io::{BufRead, Write};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

/// Encoding of the body of a PLY file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlyFormat {
    #[default]
    Ascii,
    BinaryLittleEndian,
}

impl Display for PlyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlyFormat::Ascii => write!(f, "ascii"),
            PlyFormat::BinaryLittleEndian => write!(f, "binary_little_endian"),
        }
    }
}

impl FromStr for PlyFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ascii" => Ok(PlyFormat::Ascii),
            "binary_little_endian" => Ok(PlyFormat::BinaryLittleEndian),
            "binary_big_endian" => bail!("Big endian PLY files are not supported"),
            other => bail!("Unknown PLY format {}", other),
        }
    }
}

/// Scalar types that PLY properties can have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyScalar {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl PlyScalar {
    /// Size in bytes of a binary encoded value of this type
    pub fn size(&self) -> usize {
        match self {
            PlyScalar::Char | PlyScalar::UChar => 1,
            PlyScalar::Short | PlyScalar::UShort => 2,
            PlyScalar::Int | PlyScalar::UInt | PlyScalar::Float => 4,
            PlyScalar::Double => 8,
        }
    }
}

impl Display for PlyScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlyScalar::Char => "char",
            PlyScalar::UChar => "uchar",
            PlyScalar::Short => "short",
            PlyScalar::UShort => "ushort",
            PlyScalar::Int => "int",
            PlyScalar::UInt => "uint",
            PlyScalar::Float => "float",
            PlyScalar::Double => "double",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for PlyScalar {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "char" | "int8" => Ok(PlyScalar::Char),
            "uchar" | "uint8" => Ok(PlyScalar::UChar),
            "short" | "int16" => Ok(PlyScalar::Short),
            "ushort" | "uint16" => Ok(PlyScalar::UShort),
            "int" | "int32" => Ok(PlyScalar::Int),
            "uint" | "uint32" => Ok(PlyScalar::UInt),
            "float" | "float32" => Ok(PlyScalar::Float),
            "double" | "float64" => Ok(PlyScalar::Double),
            other => bail!("Unknown PLY property type {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyPropertyKind {
    Scalar(PlyScalar),
    /// A variable length list, prefixed by its length
    List { count: PlyScalar, item: PlyScalar },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyProperty {
    pub name: String,
    pub kind: PlyPropertyKind,
}

impl PlyProperty {
    pub fn scalar(name: &str, scalar: PlyScalar) -> Self {
        Self {
            name: name.to_owned(),
            kind: PlyPropertyKind::Scalar(scalar),
        }
    }

    pub fn list(name: &str, count: PlyScalar, item: PlyScalar) -> Self {
        Self {
            name: name.to_owned(),
            kind: PlyPropertyKind::List { count, item },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyElement {
    pub name: String,
    pub count: usize,
    pub properties: Vec<PlyProperty>,
}

impl PlyElement {
    pub fn new(name: &str, count: usize) -> Self {
        Self {
            name: name.to_owned(),
            count,
            properties: vec![],
        }
    }

    pub fn property(&self, name: &str) -> Option<&PlyProperty> {
        self.properties.iter().find(|property| property.name == name)
    }
}

/// The header of a PLY file: its format, comments and the declared elements in file order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlyHeader {
    pub format: PlyFormat,
    pub comments: Vec<String>,
    pub elements: Vec<PlyElement>,
}

impl PlyHeader {
    pub fn element(&self, name: &str) -> Option<&PlyElement> {
        self.elements.iter().find(|element| element.name == name)
    }

    /// Parses the header from `read`, leaving `read` positioned at the first byte of the body
    pub fn read_from<R: BufRead>(read: &mut R) -> Result<Self> {
        let mut line = String::new();
        let mut next_line = |line: &mut String| -> Result<()> {
            line.clear();
            if read.read_line(line).context("Could not read PLY header")? == 0 {
                bail!("Unexpected end of file in PLY header");
            }
            Ok(())
        };

        next_line(&mut line)?;
        if line.trim_end() != "ply" {
            bail!("Not a PLY file, the magic number is missing");
        }

        let mut header = PlyHeader::default();
        let mut format = None;
        loop {
            next_line(&mut line)?;
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                None => continue,
                Some("end_header") => break,
                Some("format") => {
                    let name = tokens.next().ok_or_else(|| anyhow!("PLY format is missing"))?;
                    match tokens.next() {
                        Some("1.0") => {}
                        version => bail!("Unsupported PLY version {:?}", version),
                    }
                    format = Some(name.parse::<PlyFormat>()?);
                }
                Some("comment") | Some("obj_info") => {
                    let comment = line.trim_end().splitn(2, ' ').nth(1).unwrap_or_default();
                    header.comments.push(comment.to_owned());
                }
                Some("element") => {
                    let name = tokens.next().ok_or_else(|| anyhow!("PLY element without name"))?;
                    let count = tokens
                        .next()
                        .ok_or_else(|| anyhow!("PLY element {} without count", name))?
                        .parse::<usize>()
                        .context(format!("Invalid count of PLY element {}", name))?;
                    header.elements.push(PlyElement::new(name, count));
                }
                Some("property") => {
                    let element = header
                        .elements
                        .last_mut()
                        .ok_or_else(|| anyhow!("PLY property declared before any element"))?;
                    let property = match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
                        (Some("list"), Some(count), Some(item), Some(name)) => {
                            PlyProperty::list(name, count.parse()?, item.parse()?)
                        }
                        (Some(scalar), Some(name), None, None) => PlyProperty::scalar(name, scalar.parse()?),
                        _ => bail!("Malformed PLY property line '{}'", line.trim_end()),
                    };
                    element.properties.push(property);
                }
                Some(keyword) => bail!("Unknown PLY header keyword {}", keyword),
            }
        }

        header.format = format.ok_or_else(|| anyhow!("PLY header does not declare a format"))?;
        Ok(header)
    }

    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        writeln!(write, "ply")?;
        writeln!(write, "format {} 1.0", self.format)?;
        for comment in &self.comments {
            writeln!(write, "comment {}", comment)?;
        }
        for element in &self.elements {
            writeln!(write, "element {} {}", element.name, element.count)?;
            for property in &element.properties {
                match property.kind {
                    PlyPropertyKind::Scalar(scalar) => {
                        writeln!(write, "property {} {}", scalar, property.name)?
                    }
                    PlyPropertyKind::List { count, item } => {
                        writeln!(write, "property list {} {} {}", count, item, property.name)?
                    }
                }
            }
        }
        writeln!(write, "end_header")?;
        Ok(())
    }
}
