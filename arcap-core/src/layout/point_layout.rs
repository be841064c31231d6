use nalgebra::Vector3;
use static_assertions::const_assert;

/// How a single record of a vertex attribute is stored on disk
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointAttributeDataType {
    U8,
    U32,
    F32,
    Vec3u8,
    Vec3f32,
}

impl PointAttributeDataType {
    /// Number of scalar components of this data type
    pub fn components(&self) -> usize {
        match self {
            PointAttributeDataType::U8 | PointAttributeDataType::U32 | PointAttributeDataType::F32 => 1,
            PointAttributeDataType::Vec3u8 | PointAttributeDataType::Vec3f32 => 3,
        }
    }

    /// Serialized size in bytes
    pub fn size(&self) -> u64 {
        match self {
            PointAttributeDataType::U8 => 1,
            PointAttributeDataType::U32 | PointAttributeDataType::F32 => 4,
            PointAttributeDataType::Vec3u8 => 3,
            PointAttributeDataType::Vec3f32 => 12,
        }
    }
}

const_assert!(std::mem::size_of::<Vector3<u8>>() == 3);
const_assert!(std::mem::size_of::<Vector3<f32>>() == 12);

/// A named per-vertex attribute of an [Object3D](crate::containers::Object3D) together with its on-disk data type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointAttributeDefinition {
    name: &'static str,
    datatype: PointAttributeDataType,
}

impl PointAttributeDefinition {
    /// An attribute that is not one of the [attributes] known to arcap
    /// ```
    /// # use arcap_core::layout::*;
    /// let intensity = PointAttributeDefinition::custom("Intensity", PointAttributeDataType::F32);
    /// # assert_eq!(intensity.name(), "Intensity");
    /// ```
    pub fn custom(name: &'static str, datatype: PointAttributeDataType) -> Self {
        Self { name, datatype }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn datatype(&self) -> &PointAttributeDataType {
        &self.datatype
    }

    pub fn size(&self) -> u64 {
        self.datatype.size()
    }
}

/// The vertex attributes an `Object3D` can carry
pub mod attributes {
    use super::{PointAttributeDataType, PointAttributeDefinition};

    /// World-space position, stored as three floats
    pub const POSITION_3D: PointAttributeDefinition = PointAttributeDefinition {
        name: "Position3D",
        datatype: PointAttributeDataType::Vec3f32,
    };

    /// RGB color. Normalized floats in memory, stored as three bytes
    pub const COLOR_RGB: PointAttributeDefinition = PointAttributeDefinition {
        name: "ColorRGB",
        datatype: PointAttributeDataType::Vec3u8,
    };

    /// Sensor confidence level (0 = low, 1 = medium, 2 = high), stored as a byte
    pub const CONFIDENCE: PointAttributeDefinition = PointAttributeDefinition {
        name: "Confidence",
        datatype: PointAttributeDataType::U8,
    };

    /// Unit vertex normal, stored as three floats
    pub const NORMAL: PointAttributeDefinition = PointAttributeDefinition {
        name: "Normal",
        datatype: PointAttributeDataType::Vec3f32,
    };
}

/// The ordered set of attributes that every vertex of an object has
///
/// The order is the order in which readers and writers encounter the attributes within a vertex record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointLayout {
    attributes: Vec<PointAttributeDefinition>,
}

impl PointLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// ```
    /// # use arcap_core::layout::*;
    /// let layout = PointLayout::from_attributes(&[attributes::POSITION_3D, attributes::CONFIDENCE]);
    /// # assert_eq!(2, layout.attributes().count());
    /// ```
    ///
    /// # Panics
    ///
    /// If two attributes share a name
    pub fn from_attributes(attributes: &[PointAttributeDefinition]) -> Self {
        attributes.iter().cloned().fold(Self::new(), |mut layout, attribute| {
            layout.add_attribute(attribute);
            layout
        })
    }

    /// Appends `attribute` to the end of this layout
    ///
    /// # Panics
    ///
    /// If the layout already has an attribute with the same name
    pub fn add_attribute(&mut self, attribute: PointAttributeDefinition) {
        if self.has_attribute(attribute.name()) {
            panic!("Attribute {} is already part of this PointLayout", attribute.name());
        }
        self.attributes.push(attribute);
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attribute| attribute.name() == name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &PointAttributeDefinition> + '_ {
        self.attributes.iter()
    }

    /// Size in bytes of one serialized vertex record
    /// ```
    /// # use arcap_core::layout::*;
    /// let layout = PointLayout::from_attributes(&[attributes::POSITION_3D, attributes::COLOR_RGB, attributes::CONFIDENCE]);
    /// assert_eq!(16, layout.size_of_point_entry());
    /// ```
    pub fn size_of_point_entry(&self) -> u64 {
        self.attributes.iter().map(PointAttributeDefinition::size).sum()
    }

    /// Byte offset of `attribute` within a serialized vertex record, `None` if it is not part of this layout
    pub fn offset_of(&self, attribute: &PointAttributeDefinition) -> Option<u64> {
        let index = self.attributes.iter().position(|a| a == attribute)?;
        Some(self.attributes[..index].iter().map(PointAttributeDefinition::size).sum())
    }
}
