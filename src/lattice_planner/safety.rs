//! Safety check of an arbitrary path against the imported obstacles

use log::debug;

use crate::common::{Path, PlannerEngine};
use crate::lattice_planner::shared::PlannerCore;

#[derive(Debug, Clone, PartialEq)]
pub struct PathSafety {
    pub safe: bool,
    /// Longest prefix whose accumulated penalty stays within tolerance
    pub valid_prefix: Path,
}

pub fn check_is_path_safe<E: PlannerEngine>(
    core: &PlannerCore<E>,
    path: &Path,
    start_heading: f64,
) -> PathSafety {
    let (safe, valid_prefix) = core.engine.path_is_safe(path, start_heading);
    if !safe {
        debug!(
            "Path of {} segments is unsafe after {} segments",
            path.len(),
            valid_prefix.len()
        );
    }
    PathSafety { safe, valid_prefix }
}
