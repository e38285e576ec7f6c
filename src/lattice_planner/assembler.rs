//! Converts the committed discrete plan into a drivable path that ends on
//! the goal heading.

use log::{debug, info, warn};

use crate::common::{
    angle_diff, normalize_angle, ContinuousState, GoalId, Path, PathSegment, PlannerEngine,
    SpeedProfile,
};
use crate::lattice_planner::config::TerminalTurnConfig;
use crate::lattice_planner::shared::{PlannerCore, SharedStatus};
use crate::lattice_planner::status::{ComputeStatus, ErrorType};

/// Path handed to the follower
#[derive(Debug, Clone, PartialEq)]
pub struct CompletePath {
    pub path: Path,
    /// Index into the targets passed to the last path request
    pub selected_goal: GoalId,
}

/// Path from `pose` to the end of the committed plan, or `None` when no plan
/// is available or the robot drifted away from it.
pub fn get_complete_path<E: PlannerEngine>(
    core: &mut PlannerCore<E>,
    shared: &SharedStatus,
    pose: &ContinuousState,
) -> Option<CompletePath> {
    match shared.status() {
        ComputeStatus::Running | ComputeStatus::Error => return None,
        ComputeStatus::CompleteWithPlan | ComputeStatus::CompleteNoPlan => {}
    }

    let selected_goal = core.selected_goal;
    if core.committed.is_empty() {
        debug!("No committed plan, returning an empty path");
        return Some(CompletePath {
            path: Path::new(),
            selected_goal,
        });
    }

    let location = core.locate_on_plan(pose);
    if location.too_far {
        info!(
            "Robot is {:.1} mm from the plan (closest action {}), dropping it",
            location.offset_mm, location.index
        );
        core.clear_committed();
        shared.set(ComputeStatus::Error, ErrorType::TooFarFromPlan);
        return None;
    }

    let mut path = Path::new();
    core.engine
        .append_to_path(&core.committed, &mut path, location.index);

    let goal = core
        .target_poses
        .get(selected_goal)
        .or_else(|| core.context.goal(selected_goal))
        .copied();
    match goal {
        Some(goal) => append_terminal_turn(&mut path, goal.theta_rad, &core.config.terminal_turn),
        None => warn!("Selected goal {} is unknown, path keeps its heading", selected_goal),
    }

    Some(CompletePath {
        path,
        selected_goal,
    })
}

/// Replace trailing point turns with a single turn onto `goal_heading`.
///
/// The lattice only knows a few headings, so the plan usually arrives at a
/// heading close to the goal's but not equal to it.
pub fn append_terminal_turn(path: &mut Path, goal_heading: f64, turn: &TerminalTurnConfig) {
    let mut first_turn_start: Option<ContinuousState> = None;
    while let Some(&segment) = path.last() {
        if let PathSegment::PointTurn {
            position,
            start_angle,
            ..
        } = segment
        {
            first_turn_start = Some(ContinuousState::new(position.x, position.y, start_angle));
            path.pop_back();
        } else {
            break;
        }
    }

    let end = match (path.last(), first_turn_start) {
        (Some(segment), _) => segment.end_pose(),
        (None, Some(start)) => start,
        (None, None) => return,
    };

    let target = normalize_angle(goal_heading);
    let direction = if angle_diff(target, end.theta_rad) > 0.0 {
        1.0
    } else {
        -1.0
    };
    debug!(
        "Final turn at ({:.1}, {:.1}) from {:.3} to {:.3} rad",
        end.x_mm, end.y_mm, end.theta_rad, target
    );

    path.append_point_turn(
        end.position(),
        end.theta_rad,
        target,
        turn.angle_tolerance_rad(),
        true,
        SpeedProfile::new(
            direction * turn.speed_rad_per_s,
            turn.accel_rad_per_s2,
            turn.decel_rad_per_s2,
        ),
    );
}
