use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use arcap_core::containers::Object3D;
use log::{debug, error};

use super::{GeometryBackend, Operator};
use crate::error::{ProcessingError, ProcessingResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs processing operators on a dedicated background thread, one job at a time
///
/// While a job is in flight, [submit](ProcessingWorker::submit) fails with [ProcessingError::Busy]. Jobs can't be
/// cancelled. Dropping the worker waits for a running job to finish.
pub struct ProcessingWorker {
    jobs: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
    busy: Arc<AtomicBool>,
    backend: Arc<dyn GeometryBackend>,
}

impl ProcessingWorker {
    pub fn new(backend: Arc<dyn GeometryBackend>) -> Self {
        let (jobs, queue) = mpsc::channel::<Job>();
        let thread = thread::Builder::new()
            .name("arcap-processing".into())
            .spawn(move || {
                for job in queue {
                    job();
                }
            })
            .ok();
        if thread.is_none() {
            error!("Could not spawn the processing thread, all jobs will fail");
        }
        Self {
            jobs: Some(jobs),
            thread,
            busy: Arc::new(AtomicBool::new(false)),
            backend,
        }
    }

    pub fn backend(&self) -> &dyn GeometryBackend {
        self.backend.as_ref()
    }

    /// Is a job currently in flight?
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Queues `operator` to be applied to `object` on the worker thread
    pub fn submit(&self, operator: Operator, object: Object3D) -> ProcessingResult<JobHandle> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ProcessingError::Busy);
        }

        let (results, receiver) = mpsc::sync_channel(1);
        let busy = self.busy.clone();
        let backend = self.backend.clone();
        let job: Job = Box::new(move || {
            debug!("Running {} on {} vertices", operator, object.len());
            let result = panic::catch_unwind(AssertUnwindSafe(|| backend.apply(&operator, &object)))
                .unwrap_or_else(|_| {
                    Err(ProcessingError::ProcessingUnavailable(format!(
                        "{} panicked",
                        operator.name()
                    )))
                });
            busy.store(false, Ordering::Release);
            // The handle may have been dropped already, nobody is interested in the result then
            let _ = results.send(result);
        });

        let sent = match (&self.jobs, &self.thread) {
            (Some(jobs), Some(_)) => jobs.send(job).is_ok(),
            _ => false,
        };
        if !sent {
            self.busy.store(false, Ordering::Release);
            return Err(ProcessingError::ProcessingUnavailable(
                "the processing thread is not running".into(),
            ));
        }
        Ok(JobHandle { operator, receiver })
    }
}

impl Drop for ProcessingWorker {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("The processing thread terminated abnormally");
            }
        }
    }
}

/// Completion handle of a job submitted to a [ProcessingWorker]
pub struct JobHandle {
    operator: Operator,
    receiver: Receiver<ProcessingResult<Object3D>>,
}

impl JobHandle {
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Blocks until the job has finished
    pub fn wait(self) -> ProcessingResult<Object3D> {
        self.receiver.recv().unwrap_or_else(|_| Err(worker_gone()))
    }

    /// Returns the result if the job has finished, `None` otherwise. The result is only returned once
    pub fn try_result(&mut self) -> Option<ProcessingResult<Object3D>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_gone())),
        }
    }
}

fn worker_gone() -> ProcessingError {
    ProcessingError::ProcessingUnavailable("the processing thread stopped before finishing the job".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::NativeBackend;
    use arcap_core::nalgebra::Vector3;

    struct PanickingBackend;

    impl GeometryBackend for PanickingBackend {
        fn name(&self) -> &str {
            "panicking"
        }

        fn apply(&self, _: &Operator, _: &Object3D) -> ProcessingResult<Object3D> {
            panic!("backend failure");
        }
    }

    #[test]
    fn test_submit_and_wait() {
        let worker = ProcessingWorker::new(Arc::new(NativeBackend));
        let object = Object3D::from_vertices(vec![Vector3::zeros(), Vector3::new(0.1, 0.0, 0.0)]);
        let handle = worker
            .submit(Operator::VoxelDownsample { voxel_size: 1.0 }, object)
            .unwrap();
        assert_eq!(1, handle.wait().unwrap().len());
        assert!(!worker.is_busy());
    }

    #[test]
    fn test_panic_becomes_unavailable() {
        let worker = ProcessingWorker::new(Arc::new(PanickingBackend));
        let handle = worker
            .submit(Operator::normals_estimation(), Object3D::default())
            .unwrap();
        assert!(matches!(handle.wait(), Err(ProcessingError::ProcessingUnavailable(_))));
        // The worker survives a panicking job
        let handle = worker
            .submit(Operator::normals_estimation(), Object3D::default())
            .unwrap();
        assert!(handle.wait().is_err());
    }
}
