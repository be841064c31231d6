use anyhow::Result;
use arcap_core::containers::Object3D;

/// Base trait for all types that support writing objects
pub trait PointWriter {
    /// Write the given object to the associated `PointWriter`
    fn write(&mut self, object: &Object3D) -> Result<()>;
    /// Flush this `PointWriter`, ensuring that all data is written to its destination
    fn flush(&mut self) -> Result<()>;
}
