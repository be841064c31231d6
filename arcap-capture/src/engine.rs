use std::sync::Arc;

use arcap_core::containers::{
    shared_ring_buffer, CapturedPoint, ConfidenceLevel, Object3D, RingBufferReader, RingBufferWriter,
};
use log::debug;
use nalgebra::{Matrix4, Vector3};

use crate::config::CaptureConfig;
use crate::grid_sampler::GridSampler;
use crate::motion_gate::MotionGate;
use crate::sample_source::SampleSource;
use crate::session::CaptureSession;
use crate::unprojection::{OrientationCorrection, Unprojector};

/// What happened to a single frame
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrameOutcome {
    /// A batch of points was written to the ring buffer
    Accumulated,
    /// The sensor session is not running or capture is paused
    NotCapturing,
    /// The source had no pose, intrinsics, depth, confidence or color data for this frame
    SampleUnavailable,
    /// The camera did not move far enough since the last accumulated frame
    BelowMotionThreshold,
    /// Every sampled depth value was invalid
    NoValidDepth,
}

/// Summary of one call to [AccumulationEngine::process_frame], also handed to the frame listeners
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub outcome: FrameOutcome,
    /// True if a pending flush was honored at the start of this frame
    pub flushed: bool,
    /// Points written in this frame
    pub written: usize,
    /// Grid points skipped because of invalid depth
    pub skipped: usize,
    pub live_count: usize,
    pub write_cursor: usize,
}

type FrameListener = Box<dyn FnMut(&FrameReport) + Send>;

/// Runs the per-frame capture step: flush handling, motion gating, unprojection of the sample grid and writing the
/// resulting batch into the ring buffer
///
/// The engine is the only writer of its ring buffer. Readers for rendering or export are obtained through
/// [reader](AccumulationEngine::reader) and can live on other threads.
pub struct AccumulationEngine {
    session: Arc<CaptureSession>,
    writer: RingBufferWriter,
    grid: GridSampler,
    gate: MotionGate,
    orientation_correction: OrientationCorrection,
    last_accumulated_pose: Option<Matrix4<f32>>,
    listeners: Vec<FrameListener>,
    frame_index: u64,
    batch: Vec<CapturedPoint>,
}

impl AccumulationEngine {
    /// Creates a new engine and allocates its ring buffer
    ///
    /// # Panics
    ///
    /// If `config.ring_capacity` is zero
    pub fn new(config: &CaptureConfig, session: Arc<CaptureSession>) -> Self {
        let (writer, _) = shared_ring_buffer(config.ring_capacity);
        let grid = GridSampler::new(
            config.grid_point_count,
            config.grid_width,
            config.grid_height,
            config.grid_jitter,
        );
        Self {
            session,
            writer,
            batch: Vec::with_capacity(grid.len()),
            grid,
            gate: config.motion_gate(),
            orientation_correction: config.orientation_correction,
            last_accumulated_pose: None,
            listeners: vec![],
            frame_index: 0,
        }
    }

    pub fn session(&self) -> &Arc<CaptureSession> {
        &self.session
    }

    /// Creates a read handle to the accumulated points
    pub fn reader(&self) -> RingBufferReader {
        self.writer.reader()
    }

    pub fn grid(&self) -> &GridSampler {
        &self.grid
    }

    pub fn last_accumulated_pose(&self) -> Option<&Matrix4<f32>> {
        self.last_accumulated_pose.as_ref()
    }

    /// Registers a callback that is invoked with the report of every processed frame, on the frame thread
    pub fn on_frame_processed<F: FnMut(&FrameReport) + Send + 'static>(&mut self, listener: F) {
        self.listeners.push(Box::new(listener));
    }

    /// Converts the accumulated points into an [Object3D], keeping the points that pass the session's current
    /// confidence threshold
    pub fn snapshot_object(&self) -> Object3D {
        let points = self.reader().snapshot();
        Object3D::from_captured_points(&points, self.session.confidence_threshold())
    }

    /// Runs the capture step for the current frame of `source`. Never fails: frames that can't be accumulated are
    /// skipped and the reason is reported in the returned [FrameReport]
    pub fn process_frame<S: SampleSource + ?Sized>(&mut self, source: &S) -> FrameReport {
        let flushed = self.honor_flush();
        let (outcome, written, skipped) = self.accumulate(source);
        let (live_count, write_cursor) = self.writer.counters();

        let report = FrameReport {
            frame_index: self.frame_index,
            outcome,
            flushed,
            written,
            skipped,
            live_count,
            write_cursor,
        };
        self.frame_index += 1;
        for listener in self.listeners.iter_mut() {
            listener(&report);
        }
        report
    }

    fn honor_flush(&mut self) -> bool {
        if !self.session.take_flush_request() {
            return false;
        }
        self.writer.clear();
        self.last_accumulated_pose = None;
        debug!("Flushed accumulated points of session {}", self.session.id());
        true
    }

    fn accumulate<S: SampleSource + ?Sized>(&mut self, source: &S) -> (FrameOutcome, usize, usize) {
        if !self.session.is_running() || !self.session.is_capturing() {
            return (FrameOutcome::NotCapturing, 0, 0);
        }

        let (pose, intrinsics, depth, confidence, color) = match (
            source.current_pose(),
            source.intrinsics(),
            source.depth_map(),
            source.confidence_map(),
            source.color_image(),
        ) {
            (Some(pose), Some(intrinsics), Some(depth), Some(confidence), Some(color)) => {
                (pose, intrinsics, depth, confidence, color)
            }
            _ => return (FrameOutcome::SampleUnavailable, 0, 0),
        };

        let thresholds = self.gate.thresholds(
            self.session.horizontal_sampling_rate(),
            self.session.vertical_sampling_rate(),
        );
        if !MotionGate::should_accumulate(
            &pose,
            self.last_accumulated_pose.as_ref(),
            self.writer.live_count(),
            &thresholds,
        ) {
            return (FrameOutcome::BelowMotionThreshold, 0, 0);
        }

        let unprojector = Unprojector::new(&intrinsics, &pose, self.orientation_correction);
        self.batch.clear();
        let mut skipped = 0;
        for uv in self.grid.points() {
            let position = depth
                .sample(uv)
                .and_then(|depth| unprojector.unproject(uv, depth));
            let position = match position {
                Some(position) => position,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            let rgb = color.sample(uv).unwrap_or([0, 0, 0]);
            let level = confidence
                .sample(uv)
                .map(ConfidenceLevel::from_byte)
                .unwrap_or(ConfidenceLevel::Low);
            self.batch.push(CapturedPoint::new(
                position,
                Vector3::new(rgb[0], rgb[1], rgb[2]).cast::<f32>() / 255.0,
                level,
            ));
        }

        if self.batch.is_empty() {
            return (FrameOutcome::NoValidDepth, 0, skipped);
        }

        let written = self.writer.push_batch(&self.batch);
        self.last_accumulated_pose = Some(pose);
        debug!(
            "Accumulated {} points ({} skipped) in frame {}",
            written, skipped, self.frame_index
        );
        (FrameOutcome::Accumulated, written, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_source::{CameraFrame, ImageGrid};
    use crate::unprojection::CameraIntrinsics;
    use std::sync::Mutex;

    fn frame(depth: f32) -> CameraFrame {
        CameraFrame {
            pose: Some(Matrix4::identity()),
            intrinsics: Some(CameraIntrinsics::new(4.0, 4.0, 2.0, 2.0, 4, 4)),
            depth: Some(ImageGrid::filled(4, 4, depth)),
            confidence: Some(ImageGrid::filled(4, 4, 2)),
            color: Some(ImageGrid::filled(4, 4, [255, 0, 51])),
        }
    }

    fn engine() -> AccumulationEngine {
        let config = CaptureConfig {
            ring_capacity: 16,
            grid_point_count: 4,
            grid_width: 4,
            grid_height: 4,
            ..Default::default()
        };
        let session = Arc::new(CaptureSession::new());
        session.start_session();
        session.resume_capture().unwrap();
        AccumulationEngine::new(&config, session)
    }

    #[test]
    fn test_not_capturing() {
        let mut engine = engine();
        engine.session().pause_capture().unwrap();
        let report = engine.process_frame(&frame(1.0));
        assert_eq!(FrameOutcome::NotCapturing, report.outcome);
        assert!(report.flushed);
        assert_eq!(0, report.live_count);
    }

    #[test]
    fn test_missing_sample_skips_frame() {
        let mut engine = engine();
        let mut incomplete = frame(1.0);
        incomplete.color = None;
        assert_eq!(
            FrameOutcome::SampleUnavailable,
            engine.process_frame(&incomplete).outcome
        );
        assert!(engine.last_accumulated_pose().is_none());
    }

    #[test]
    fn test_invalid_depth_is_skipped() {
        let mut engine = engine();
        let mut partial = frame(1.0);
        partial.depth = Some(ImageGrid::from_fn(4, 4, |x, _| if x < 2 { 0.0 } else { 1.5 }));
        let report = engine.process_frame(&partial);
        assert_eq!(FrameOutcome::Accumulated, report.outcome);
        assert_eq!(2, report.written);
        assert_eq!(2, report.skipped);
        assert_eq!(2, report.live_count);
    }

    #[test]
    fn test_frame_without_valid_depth() {
        let mut engine = engine();
        let report = engine.process_frame(&frame(f32::NAN));
        assert_eq!(FrameOutcome::NoValidDepth, report.outcome);
        assert!(engine.last_accumulated_pose().is_none());
    }

    #[test]
    fn test_colors_and_confidence_are_sampled() {
        let mut engine = engine();
        engine.process_frame(&frame(1.0));
        let points = engine.reader().snapshot();
        assert_eq!(4, points.len());
        for point in points {
            assert_eq!(Vector3::new(1.0, 0.0, 0.2), point.color);
            assert_eq!(ConfidenceLevel::High, point.confidence_level());
        }
    }

    #[test]
    fn test_listeners_receive_reports() {
        let reports = Arc::new(Mutex::new(vec![]));
        let mut engine = engine();
        let sink = reports.clone();
        engine.on_frame_processed(move |report| sink.lock().unwrap().push(*report));
        engine.process_frame(&frame(1.0));
        engine.process_frame(&frame(1.0));

        let reports = reports.lock().unwrap();
        assert_eq!(2, reports.len());
        assert_eq!(FrameOutcome::Accumulated, reports[0].outcome);
        assert_eq!(FrameOutcome::BelowMotionThreshold, reports[1].outcome);
        assert_eq!(1, reports[1].frame_index);
    }
}
