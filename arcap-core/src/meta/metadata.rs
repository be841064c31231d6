use crate::math::AABB;

use std::{any::Any, fmt::Display};

/// Trait that represents metadata of a stored point cloud. Metadata is everything that is not the point
/// data itself: a bounding box, the number of points, and format-specific named fields.
pub trait Metadata: Display {
    /// Returns the bounding box of the associated `Metadata`, if it is known without reading all points
    fn bounds(&self) -> Option<AABB<f32>>;
    /// Returns the number of points, if it is known
    fn number_of_points(&self) -> Option<usize>;
    /// Returns the value of the metadata field named `field_name`, if it exists.
    fn get_named_field(&self, field_name: &str) -> Option<Box<dyn Any>>;
    /// Clone the associated `Metadata` and put it into a `Box`
    fn clone_into_box(&self) -> Box<dyn Metadata>;
}
