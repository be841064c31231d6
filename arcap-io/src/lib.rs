#![warn(clippy::all)]
//! Reading and writing of arcap objects
//!
//! Objects are stored as [PLY](http://paulbourke.net/dataformats/ply/) files, either as ASCII or as binary little
//! endian. The [interop] module uses PLY files to hand objects to external processing tools.

/// Common traits and helper functions for readers and writers
pub mod base;
pub mod interop;
/// PLY reader and writer
pub mod ply;
