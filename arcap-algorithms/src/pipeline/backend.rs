use std::time::Instant;

use arcap_core::containers::Object3D;
use log::info;

use super::Operator;
use crate::error::ProcessingResult;

/// A capability that can run processing operators
///
/// The operator contracts are fixed by [Operator]; a backend only decides how they are computed (in process, in an
/// external tool, ...). Implementations must not modify their input.
pub trait GeometryBackend: Send + Sync {
    /// Human readable name for logs
    fn name(&self) -> &str;
    fn apply(&self, operator: &Operator, object: &Object3D) -> ProcessingResult<Object3D>;
}

/// Runs all operators in process
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl GeometryBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn apply(&self, operator: &Operator, object: &Object3D) -> ProcessingResult<Object3D> {
        let start = Instant::now();
        let result = operator.apply(object)?;
        info!(
            "{}: {} -> {} vertices, {} triangles in {:.2?}",
            operator,
            object.len(),
            result.len(),
            result.triangles().len(),
            start.elapsed()
        );
        Ok(result)
    }
}
