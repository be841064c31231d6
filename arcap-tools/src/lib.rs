#![warn(clippy::all)]
//! Support code for the arcap command line tools

/// A ray-cast scene that stands in for a depth sensor
pub mod synthetic;

// Running operator pipelines for the tools and describing their results
pub mod processing;
