//! lattice_nav - planning driver for an (x, y, theta) lattice motion planner
//!
//! This crate sits between a navigation loop and a lattice search engine:
//! it imports obstacles from an occupancy map, decides when a committed plan
//! must be replanned, runs searches on a background worker, and turns the
//! discrete plan into a drivable path.

// Core modules
pub mod common;
pub mod utils;

// Planner driver
pub mod lattice_planner;

// Re-export common types for convenience
pub use common::{ContinuousState, DiscreteState, DiscretePlan, Path, PathSegment, ConvexPolygon};
pub use common::{PlannerEngine, OccupancyMap, ContentCategory};
pub use common::{PlannerError, PlannerResult};
pub use lattice_planner::{LatticePlanner, LatticePlannerConfig, ComputePathStatus, ComputeStatus, ErrorType};
