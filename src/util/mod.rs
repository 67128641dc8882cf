//! Utility types and functions for BP4 decoding.
//!
//! This module contains fundamental types used throughout the library:
//! - [`DataKind`] / [`Value`] - Closed set of element kinds and decoded values
//! - [`Dims`] / [`BoxDims`] / [`LayoutState`] - Shapes, boxes and orientation
//! - [`Error`] / [`Result`] - Error handling

mod kind;
mod error;
mod dimensions;

pub use kind::*;
pub use error::*;
pub use dimensions::*;
