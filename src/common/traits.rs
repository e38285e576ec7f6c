//! Interfaces of the planner's external collaborators
//!
//! The driver in `lattice_planner` orchestrates a `PlannerEngine` (lattice
//! search, motion primitives, obstacle set) and reads an `OccupancyMap`. Both
//! are implemented outside this crate.

use serde::{Deserialize, Serialize};

use crate::common::cancel::CancelToken;
use crate::common::geometry::ConvexPolygon;
use crate::common::path::Path;
use crate::common::plan::{DiscretePlan, PlanSafety};
use crate::common::types::*;
use crate::lattice_planner::context::PlannerContext;

/// Lattice search engine and the environment it owns.
///
/// Every call happens while the driver holds its core lock, so
/// implementations need no interior synchronization. `replan` runs on the
/// worker thread in asynchronous mode, hence the `Send` bound.
pub trait PlannerEngine: Send {
    /// Number of heading buckets in the lattice
    fn num_headings(&self) -> HeadingBucket;

    /// Continuous heading [rad] of a bucket
    fn heading_of(&self, bucket: HeadingBucket) -> f64;

    /// Quantize a continuous pose onto the lattice
    fn discretize(&self, state: &ContinuousState) -> DiscreteState;

    /// Center of a lattice cell
    fn to_continuous(&self, state: &DiscreteState) -> ContinuousState;

    fn start_is_valid(&self, context: &PlannerContext) -> bool;

    fn goals_are_valid(&self, context: &PlannerContext) -> bool;

    /// Whether a single goal pose is reachable at all (not in fatal collision)
    fn goal_is_valid(&self, goal: &ContinuousState) -> bool;

    /// Obstacle penalty of the cell containing `state`
    fn collision_penalty(&self, state: &ContinuousState) -> f32;

    /// Penalty at or above which a cell is impassable
    fn max_obstacle_cost(&self) -> f32;

    /// Reset search bookkeeping after the obstacle set changed
    fn prepare_for_planning(&mut self);

    /// Bounded search from `context.start` to any of `context.goals`.
    ///
    /// Must poll `cancel` inside its expansion loop and return `false`
    /// promptly once cancelled.
    fn replan(
        &mut self,
        context: &PlannerContext,
        max_expansions: u32,
        cancel: &CancelToken,
    ) -> bool;

    /// Plan produced by the last successful `replan`
    fn plan(&self) -> &DiscretePlan;

    /// Goal reached by the last successful `replan`
    fn chosen_goal(&self) -> GoalId;

    fn last_num_expansions(&self) -> u32;

    fn last_num_considerations(&self) -> u32;

    /// Lattice state reached after applying every action of `plan`
    fn plan_final_state(&self, plan: &DiscretePlan) -> DiscreteState;

    /// Re-check `plan` from action `from_index` on against the current obstacles.
    ///
    /// The safe prefix starts at the state reached after `from_index`
    /// actions and stops growing once it ends more than `max_lookahead_mm`
    /// from there. An empty plan is never safe.
    fn plan_is_safe(
        &self,
        plan: &DiscretePlan,
        max_lookahead_mm: f64,
        from_index: usize,
    ) -> PlanSafety;

    /// Longest collision free prefix of a continuous path.
    /// Returns `(whole_path_safe, valid_prefix)`.
    fn path_is_safe(&self, path: &Path, start_heading: f64) -> (bool, Path);

    /// Index of the plan action closest to `state`, and the distance to it [mm]
    fn find_closest_plan_segment(
        &self,
        plan: &DiscretePlan,
        state: &ContinuousState,
    ) -> (usize, f64);

    fn clear_obstacles(&mut self);

    /// Number of obstacle entries for one heading bucket
    fn num_obstacles(&self) -> usize;

    /// Add `obstacle` expanded by `robot` to heading bucket `heading`
    fn add_obstacle_with_expansion(
        &mut self,
        obstacle: &ConvexPolygon,
        robot: &ConvexPolygon,
        heading: HeadingBucket,
        penalty: f32,
    );

    /// Convert the plan's actions, skipping the first `skip_actions`, into path segments
    fn append_to_path(&self, plan: &DiscretePlan, path: &mut Path, skip_actions: usize);

    /// Human readable plan listing for diagnostics
    fn describe_plan(&self, plan: &DiscretePlan) -> String {
        format!("{:?}", plan)
    }

    /// JSON snapshot of the environment for offline diagnosis
    fn environment_snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Occupancy category of a map region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentCategory {
    Unknown,
    InterestingEdge,
    NotInterestingEdge,
    Cliff,
    ObstacleProx,
}

/// Read access to the live occupancy map
pub trait OccupancyMap {
    /// Watermark that increases whenever the map content changes
    fn last_changed(&self) -> u64;

    /// Convex hulls of all regions of one category
    fn convex_regions(&self, category: ContentCategory) -> Vec<ConvexPolygon>;

    /// Bounding polygons of individually tracked objects
    fn tracked_object_polygons(&self) -> Vec<ConvexPolygon>;
}
