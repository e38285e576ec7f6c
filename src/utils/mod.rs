//! Utility modules for lattice_nav

pub mod visualization;

pub use visualization::{colors, PathStyle, Visualizer};
