use arcap_algorithms::pipeline::{ObjectHistory, Operator, Pipeline, ProcessingWorker};
use arcap_algorithms::error::ProcessingResult;
use arcap_capture::session::CaptureSession;
use log::{info, warn};

/// Runs the operators of `pipeline` one after another on `worker`, committing each result to `history`.
///
/// Stops at the first operator that fails and keeps the last good object. Returns the operators whose results
/// were committed, in order. Only a failed submit (e.g. a busy worker) is returned as an error.
pub fn run_pipeline(
    worker: &ProcessingWorker,
    history: &mut ObjectHistory,
    pipeline: &Pipeline,
) -> ProcessingResult<Vec<Operator>> {
    let mut committed = vec![];
    for operator in &pipeline.operators {
        let handle = worker.submit(*operator, history.current().clone())?;
        match handle.wait() {
            Ok(result) => {
                info!("{}: {} vertices", operator, result.len());
                history.commit(result);
                committed.push(*operator);
            }
            Err(e) => {
                warn!("{} failed, keeping the previous result: {}", operator, e);
                break;
            }
        }
    }
    Ok(committed)
}

/// PLY header comments describing where an exported object came from
pub fn export_comments(session: &CaptureSession, committed: &[Operator]) -> Vec<String> {
    std::iter::once(format!("arcap capture session {}", session.id()))
        .chain(committed.iter().map(|operator| format!("processed with {}", operator)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcap_algorithms::pipeline::NativeBackend;
    use arcap_core::{containers::Object3D, nalgebra::Vector3};
    use std::sync::Arc;

    fn plane() -> Object3D {
        let mut vertices = vec![];
        for x in 0..10 {
            for y in 0..10 {
                vertices.push(Vector3::new(x as f32 * 0.1, y as f32 * 0.1, 0.0));
            }
        }
        Object3D::from_vertices(vertices)
    }

    #[test]
    fn test_failed_operator_is_not_recorded() {
        let worker = ProcessingWorker::new(Arc::new(NativeBackend));
        let mut history = ObjectHistory::new(plane());
        let pipeline = Pipeline::new(vec![
            Operator::VoxelDownsample { voxel_size: 0.25 },
            Operator::PoissonSurfaceReconstruction { depth: 5 },
            Operator::normals_estimation(),
        ]);

        let committed = run_pipeline(&worker, &mut history, &pipeline).unwrap();
        assert_eq!(vec![Operator::VoxelDownsample { voxel_size: 0.25 }], committed);
        assert!(!history.current().has_triangles());
        assert!(!history.current().has_normals());

        let session = CaptureSession::new();
        let comments = export_comments(&session, &committed);
        assert_eq!(2, comments.len());
        assert_eq!(format!("arcap capture session {}", session.id()), comments[0]);
        assert_eq!(
            format!("processed with {}", Operator::VoxelDownsample { voxel_size: 0.25 }),
            comments[1]
        );
        assert!(!comments.iter().any(|comment| comment.contains("poisson_surface_reconstruction")));
    }
}
