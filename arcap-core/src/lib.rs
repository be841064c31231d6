#![warn(clippy::all)]

//! Core data structures for capturing point clouds from an RGB-D sensor stream
//!
//! `arcap-core` holds the data model that the rest of the workspace is built around: the
//! [CapturedPoint](crate::containers::CapturedPoint) written by the accumulation engine, the fixed-capacity
//! [PointRingBuffer](crate::containers::PointRingBuffer) it is written into, and the
//! [Object3D](crate::containers::Object3D) geometry snapshot that processing operators consume and produce.

pub extern crate nalgebra;

pub mod containers;
/// Describes which per-vertex attributes a point cloud carries
pub mod layout;
/// Useful mathematical tools when working with point cloud data
pub mod math;
/// Data structures for handling point cloud metadata
pub mod meta;
