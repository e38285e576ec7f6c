//! Common types, traits, and error definitions for lattice_nav
//!
//! This module provides the data model shared by the planner driver and
//! its collaborators.

pub mod types;
pub mod geometry;
pub mod path;
pub mod plan;
pub mod cancel;
pub mod traits;
pub mod error;

pub use types::*;
pub use geometry::*;
pub use path::*;
pub use plan::*;
pub use cancel::*;
pub use traits::*;
pub use error::*;
