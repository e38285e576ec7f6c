// Lattice planner driver module

pub mod config;
pub mod status;
pub mod context;
pub mod shared;
pub mod obstacles;
pub mod worker;
pub mod replan;
pub mod assembler;
pub mod safety;
pub mod planner;

#[cfg(test)]
pub mod test_support;

pub use config::*;
pub use status::*;
pub use context::*;
pub use obstacles::ImportOutcome;
pub use shared::{DebugPolygon, SearchStats};
pub use assembler::CompletePath;
pub use safety::PathSafety;
pub use planner::LatticePlanner;
