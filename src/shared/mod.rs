//! Shared Module
//!
//! Types shared between the window-management engine and the display adapter.

pub mod geometry;

pub use geometry::{Geometry, Point};
