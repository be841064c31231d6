use arcap_core::containers::Object3DError;
use thiserror::Error;

/// Failure of a single processing operator invocation. The object the operator was applied to is never modified
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Surface reconstruction needs an oriented point cloud. Run normal estimation first
    #[error("The object has no vertex normals, estimate normals before reconstructing a surface")]
    MissingNormals,
    #[error("The processing backend is unavailable: {0}")]
    ProcessingUnavailable(String),
    #[error("Temporary storage for processing failed")]
    TemporaryStorageFailure(#[from] std::io::Error),
    #[error("Invalid operator parameter: {0}")]
    InvalidParameter(String),
    /// Another operator is still running on this worker
    #[error("An operator is already running")]
    Busy,
    #[error("The backend produced an invalid object")]
    InvalidObject(#[from] Object3DError),
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;
