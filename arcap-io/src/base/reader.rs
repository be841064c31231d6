use anyhow::Result;
use arcap_core::containers::Object3D;
use arcap_core::layout::PointLayout;
use arcap_core::meta::Metadata;

/// Base trait for all types that support reading objects
pub trait PointReader {
    /// Reads the whole object from this `PointReader`
    fn read(&mut self) -> Result<Object3D>;
    /// Returns the `Metadata` of the associated `PointReader`
    fn get_metadata(&self) -> &dyn Metadata;
    /// Returns the `PointLayout` of the vertices stored in the underlying source
    fn get_default_point_layout(&self) -> &PointLayout;
}
