use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use arcap_core::containers::ConfidenceThreshold;
use thiserror::Error;
use uuid::Uuid;

use crate::motion_gate::SamplingRate;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("The capture session has not been started")]
    NotStarted,
}

/// Lifecycle phase of the sensor session
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionPhase {
    Idle = 0,
    Running = 1,
    Paused = 2,
}

impl SessionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionPhase::Running,
            2 => SessionPhase::Paused,
            _ => SessionPhase::Idle,
        }
    }
}

/// Control surface over the accumulation loop
///
/// All flags are atomics, so a `CaptureSession` is shared between the controlling thread and the frame thread
/// through an `Arc`. Sensor phase and capture flag are independent: the sensor can be running while capture is
/// paused. Flush requests are edge-triggered and honored by the engine at the next frame boundary.
#[derive(Debug)]
pub struct CaptureSession {
    id: Uuid,
    phase: AtomicU8,
    capturing: AtomicBool,
    flush_requested: AtomicBool,
    confidence_threshold: AtomicU8,
    horizontal_sampling_rate: AtomicU8,
    vertical_sampling_rate: AtomicU8,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: AtomicU8::new(SessionPhase::Idle as u8),
            capturing: AtomicBool::new(false),
            flush_requested: AtomicBool::new(false),
            confidence_threshold: AtomicU8::new(encode_threshold(ConfidenceThreshold::default())),
            horizontal_sampling_rate: AtomicU8::new(SamplingRate::default() as u8),
            vertical_sampling_rate: AtomicU8::new(SamplingRate::default() as u8),
        }
    }

    /// Unique identifier of this capture
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.phase() == SessionPhase::Running
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    /// Starts (or restarts) the sensor session. Requests a flush of the accumulated points and leaves capture paused
    pub fn start_session(&self) {
        self.request_flush();
        self.capturing.store(false, Ordering::Release);
        self.phase.store(SessionPhase::Running as u8, Ordering::Release);
    }

    pub fn pause_session(&self) -> Result<(), SessionError> {
        self.transition_sensor(SessionPhase::Paused)
    }

    pub fn resume_session(&self) -> Result<(), SessionError> {
        self.transition_sensor(SessionPhase::Running)
    }

    pub fn pause_capture(&self) -> Result<(), SessionError> {
        self.ensure_started()?;
        self.capturing.store(false, Ordering::Release);
        Ok(())
    }

    pub fn resume_capture(&self) -> Result<(), SessionError> {
        self.ensure_started()?;
        self.capturing.store(true, Ordering::Release);
        Ok(())
    }

    /// Asks the engine to clear all accumulated points before its next accumulation step
    pub fn request_flush(&self) {
        self.flush_requested.store(true, Ordering::Release);
    }

    pub fn is_flush_requested(&self) -> bool {
        self.flush_requested.load(Ordering::Acquire)
    }

    /// Consumes a pending flush request. Returns true if there was one
    pub(crate) fn take_flush_request(&self) -> bool {
        self.flush_requested.swap(false, Ordering::AcqRel)
    }

    pub fn confidence_threshold(&self) -> ConfidenceThreshold {
        match self.confidence_threshold.load(Ordering::Relaxed) {
            1 => ConfidenceThreshold::High,
            _ => ConfidenceThreshold::Medium,
        }
    }

    pub fn set_confidence_threshold(&self, threshold: ConfidenceThreshold) {
        self.confidence_threshold
            .store(encode_threshold(threshold), Ordering::Relaxed);
    }

    pub fn horizontal_sampling_rate(&self) -> SamplingRate {
        SamplingRate::from_u8(self.horizontal_sampling_rate.load(Ordering::Relaxed))
    }

    pub fn set_horizontal_sampling_rate(&self, rate: SamplingRate) {
        self.horizontal_sampling_rate
            .store(rate as u8, Ordering::Relaxed);
    }

    pub fn vertical_sampling_rate(&self) -> SamplingRate {
        SamplingRate::from_u8(self.vertical_sampling_rate.load(Ordering::Relaxed))
    }

    pub fn set_vertical_sampling_rate(&self, rate: SamplingRate) {
        self.vertical_sampling_rate.store(rate as u8, Ordering::Relaxed);
    }

    fn ensure_started(&self) -> Result<(), SessionError> {
        if self.phase() == SessionPhase::Idle {
            return Err(SessionError::NotStarted);
        }
        Ok(())
    }

    fn transition_sensor(&self, target: SessionPhase) -> Result<(), SessionError> {
        self.ensure_started()?;
        self.phase.store(target as u8, Ordering::Release);
        Ok(())
    }
}

fn encode_threshold(threshold: ConfidenceThreshold) -> u8 {
    match threshold {
        ConfidenceThreshold::Medium => 0,
        ConfidenceThreshold::High => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_session() {
        let session = CaptureSession::new();
        assert_eq!(SessionPhase::Idle, session.phase());
        session.start_session();
        assert!(session.is_running());
        assert!(!session.is_capturing());
        assert!(session.is_flush_requested());
    }

    #[test]
    fn test_capture_requires_started_session() {
        let session = CaptureSession::new();
        assert_eq!(Err(SessionError::NotStarted), session.resume_capture());
        assert_eq!(Err(SessionError::NotStarted), session.pause_session());
        assert!(!session.is_capturing());
    }

    #[test]
    fn test_capture_is_independent_of_sensor_phase() {
        let session = CaptureSession::new();
        session.start_session();
        session.resume_capture().unwrap();
        session.pause_session().unwrap();
        assert_eq!(SessionPhase::Paused, session.phase());
        assert!(session.is_capturing());
        session.resume_session().unwrap();
        session.pause_capture().unwrap();
        assert!(session.is_running());
        assert!(!session.is_capturing());
    }

    #[test]
    fn test_flush_request_is_edge_triggered() {
        let session = CaptureSession::new();
        session.request_flush();
        session.request_flush();
        assert!(session.take_flush_request());
        assert!(!session.take_flush_request());
    }

    #[test]
    fn test_parameters() {
        let session = CaptureSession::new();
        assert_eq!(ConfidenceThreshold::Medium, session.confidence_threshold());
        session.set_confidence_threshold(ConfidenceThreshold::High);
        session.set_horizontal_sampling_rate(SamplingRate::Fast);
        session.set_vertical_sampling_rate(SamplingRate::Slow);
        assert_eq!(ConfidenceThreshold::High, session.confidence_threshold());
        assert_eq!(SamplingRate::Fast, session.horizontal_sampling_rate());
        assert_eq!(SamplingRate::Slow, session.vertical_sampling_rate());
        assert_ne!(session.id(), CaptureSession::new().id());
    }
}
