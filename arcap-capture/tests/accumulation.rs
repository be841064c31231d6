use std::sync::Arc;

use arcap_capture::config::CaptureConfig;
use arcap_capture::engine::{AccumulationEngine, FrameOutcome};
use arcap_capture::sample_source::{CameraFrame, ImageGrid};
use arcap_capture::session::CaptureSession;
use arcap_capture::unprojection::CameraIntrinsics;
use arcap_core::containers::ConfidenceThreshold;
use assert_approx_eq::assert_approx_eq;
use nalgebra::{Matrix4, Translation3, Vector3};

fn frame_at(position: Vector3<f32>, confidence: u8) -> CameraFrame {
    CameraFrame {
        pose: Some(Translation3::from(position).to_homogeneous()),
        intrinsics: Some(CameraIntrinsics::new(4.0, 4.0, 2.0, 2.0, 4, 4)),
        depth: Some(ImageGrid::filled(4, 4, 1.0)),
        confidence: Some(ImageGrid::filled(4, 4, confidence)),
        color: Some(ImageGrid::filled(4, 4, [128, 128, 128])),
    }
}

fn capturing_engine(ring_capacity: usize, grid_point_count: usize) -> AccumulationEngine {
    let config = CaptureConfig {
        ring_capacity,
        grid_point_count,
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
fn three_batches_wrap_the_ring_buffer() {
    let mut engine = capturing_engine(10, 4);
    let mut counters = vec![];
    for step in 0..3 {
        let report = engine.process_frame(&frame_at(Vector3::new(step as f32, 0.0, 0.0), 2));
        assert_eq!(FrameOutcome::Accumulated, report.outcome);
        counters.push((report.live_count, report.write_cursor));
    }
    assert_eq!(vec![(4, 4), (8, 8), (10, 2)], counters);
}

#[test]
fn unmoved_camera_only_accumulates_once() {
    let mut engine = capturing_engine(100, 4);
    let still = frame_at(Vector3::zeros(), 2);
    assert_eq!(FrameOutcome::Accumulated, engine.process_frame(&still).outcome);
    for _ in 0..5 {
        let report = engine.process_frame(&still);
        assert_eq!(FrameOutcome::BelowMotionThreshold, report.outcome);
        assert_eq!(4, report.live_count);
    }
}

#[test]
fn flush_is_honored_at_the_next_frame_and_is_idempotent() {
    let mut engine = capturing_engine(10, 4);
    engine.process_frame(&frame_at(Vector3::zeros(), 2));
    engine.process_frame(&frame_at(Vector3::new(1.0, 0.0, 0.0), 2));

    engine.session().request_flush();
    engine.session().request_flush();
    engine.session().pause_capture().unwrap();
    let first = engine.process_frame(&frame_at(Vector3::zeros(), 2));
    assert!(first.flushed);
    assert_eq!((0, 0), (first.live_count, first.write_cursor));

    engine.session().request_flush();
    let second = engine.process_frame(&frame_at(Vector3::zeros(), 2));
    assert!(second.flushed);
    assert_eq!((0, 0), (second.live_count, second.write_cursor));
    assert!(engine.reader().snapshot().is_empty());

    // After a flush the next frame bootstraps again, even without motion
    engine.session().resume_capture().unwrap();
    let report = engine.process_frame(&frame_at(Vector3::zeros(), 2));
    assert_eq!(FrameOutcome::Accumulated, report.outcome);
    assert_eq!(4, report.live_count);
}

#[test]
fn points_are_unprojected_into_world_space() {
    let mut engine = capturing_engine(10, 4);
    engine.process_frame(&frame_at(Vector3::new(0.0, 0.0, 5.0), 2));
    let points = engine.reader().snapshot();
    // Camera looks down its negative z axis, all points lie one meter in front of it
    for point in points {
        assert_approx_eq!(4.0, point.position.z);
        assert!(point.position.x.abs() < 0.5);
        assert!(point.position.y.abs() < 0.5);
        assert_approx_eq!(128.0 / 255.0, point.color.x);
    }
}

#[test]
fn snapshot_object_applies_confidence_threshold() {
    let mut engine = capturing_engine(20, 4);
    engine.process_frame(&frame_at(Vector3::zeros(), 1));
    engine.process_frame(&frame_at(Vector3::new(1.0, 0.0, 0.0), 2));

    assert_eq!(8, engine.snapshot_object().len());
    engine.session().set_confidence_threshold(ConfidenceThreshold::High);
    let object = engine.snapshot_object();
    assert_eq!(4, object.len());
    assert!(object.vertex_confidence().iter().all(|&level| level == 2));
}

#[test]
fn render_reader_on_another_thread_sees_whole_batches() {
    let mut engine = capturing_engine(1_000, 4);
    let reader = engine.reader();
    let render = std::thread::spawn(move || {
        for _ in 0..1_000 {
            let count = reader.with_raw_view(|view| view.count);
            assert_eq!(0, count % 4);
        }
    });
    for step in 0..200 {
        engine.process_frame(&frame_at(Vector3::new(step as f32, 0.0, 0.0), 2));
    }
    render.join().unwrap();
    assert_eq!(800, engine.reader().live_count());
}

#[test]
fn idle_session_does_not_capture() {
    let config = CaptureConfig {
        ring_capacity: 10,
        grid_point_count: 4,
        ..Default::default()
    };
    let mut engine = AccumulationEngine::new(&config, Arc::new(CaptureSession::new()));
    let report = engine.process_frame(&CameraFrame {
        pose: Some(Matrix4::identity()),
        ..frame_at(Vector3::zeros(), 2)
    });
    assert_eq!(FrameOutcome::NotCapturing, report.outcome);
}
