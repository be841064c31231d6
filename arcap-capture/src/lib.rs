#![warn(clippy::all)]

//! Real-time accumulation of RGB-D sensor samples into a bounded point cloud
//!
//! Each frame, the [AccumulationEngine](crate::engine::AccumulationEngine) asks the
//! [MotionGate](crate::motion_gate::MotionGate) whether the camera moved far enough since the last accumulated
//! batch, unprojects a fixed grid of image coordinates into world space and writes the resulting points into a
//! ring buffer. A [CaptureSession](crate::session::CaptureSession) is the control surface over this loop.

pub mod config;
pub mod engine;
pub mod grid_sampler;
pub mod motion_gate;
pub mod sample_source;
pub mod session;
pub mod unprojection;
