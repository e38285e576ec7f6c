//! Replan decision: keep following the committed plan, or search again from
//! the end of its safe prefix.

use log::{debug, info, warn};

use crate::common::{CancelToken, ContinuousState, DiscretePlan, OccupancyMap, PlannerEngine};
use crate::lattice_planner::obstacles::import_obstacles;
use crate::lattice_planner::shared::{PlannerCore, SharedStatus};
use crate::lattice_planner::status::{ComputePathStatus, ComputeStatus, ErrorType};
use crate::lattice_planner::worker::{do_planning, WorkerThread};
use crate::utils::colors;

/// Result of `decide_replan`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplanOutcome {
    /// The committed plan is still safe
    NoPlanNeeded,
    /// A search cannot start; the committed plan is left cleared
    Rejected(ErrorType),
    /// The context is prepared and a search must be dispatched
    Search,
}

/// Decide whether a new search is needed and, if so, prepare the context
/// and the engine for it.
///
/// The caller must hold the core lock for the whole call.
pub fn decide_replan<E: PlannerEngine, M: OccupancyMap + ?Sized>(
    core: &mut PlannerCore<E>,
    map: &M,
    pose: &ContinuousState,
    force_replan_from_scratch: bool,
) -> ReplanOutcome {
    core.context.force_replan_from_scratch = force_replan_from_scratch;

    let (committed, start) = if force_replan_from_scratch {
        core.clear_committed();
        (DiscretePlan::new(core.engine.discretize(pose)), *pose)
    } else {
        import_obstacles(core, map, pose, true, Some(colors::REPLAN_OBSTACLE));

        let location = core.locate_on_plan(pose);
        if location.too_far {
            info!(
                "Robot is {:.1} mm from the plan (threshold {:.1}), replanning from scratch",
                location.offset_mm, core.config.plan_error_for_replan_mm
            );
            core.clear_committed();
        }

        let safety = core.engine.plan_is_safe(
            &core.committed,
            core.config.max_distance_to_follow_old_plan_mm,
            location.index,
        );
        if safety.fully_safe {
            debug!("Committed plan of {} actions is still safe", core.committed.len());
            return ReplanOutcome::NoPlanNeeded;
        }

        if safety.safe_prefix.is_empty() {
            (safety.safe_prefix, *pose)
        } else {
            info!(
                "Plan unsafe, keeping {} actions from index {} up to {:?}",
                safety.safe_prefix.len(),
                location.index,
                safety.last_safe_state
            );
            let start = safety.last_safe_state;
            (safety.safe_prefix, start)
        }
    };

    core.committed = committed;
    core.context.start = start;

    if !core.engine.start_is_valid(&core.context) {
        info!("Start state {:?} is not valid, cannot plan", core.context.start);
        core.clear_committed();
        return ReplanOutcome::Rejected(ErrorType::InvalidStart);
    }
    if !core.engine.goals_are_valid(&core.context) {
        info!("None of the {} goals is valid, cannot plan", core.context.goals.len());
        core.clear_committed();
        return ReplanOutcome::Rejected(ErrorType::InvalidGoals);
    }

    import_obstacles(core, map, pose, false, Some(colors::OBSTACLE));
    core.engine.prepare_for_planning();
    core.search_num += 1;
    info!(
        "Search {} from {:?} towards {} goal(s), keeping {} committed actions",
        core.search_num,
        core.context.start,
        core.context.goals.len(),
        core.committed.len()
    );

    if let Some(dumper) = &core.dumper {
        match dumper.dump(
            core.search_num,
            &core.context,
            core.engine.environment_snapshot(),
        ) {
            Ok(path) => debug!("Wrote planner context to {}", path.display()),
            Err(e) => warn!("Could not dump planner context {}: {}", core.search_num, e),
        }
    }

    ReplanOutcome::Search
}

/// Decide and dispatch. With `worker` unset the search runs right here on
/// the caller's thread.
pub fn start_planning<E: PlannerEngine, M: OccupancyMap + ?Sized>(
    core: &mut PlannerCore<E>,
    shared: &SharedStatus,
    worker: Option<&WorkerThread>,
    map: &M,
    pose: &ContinuousState,
    force_replan_from_scratch: bool,
) -> ComputePathStatus {
    match decide_replan(core, map, pose, force_replan_from_scratch) {
        ReplanOutcome::NoPlanNeeded => ComputePathStatus::NoPlanNeeded,
        ReplanOutcome::Rejected(error) => {
            shared.set(ComputeStatus::Error, error);
            ComputePathStatus::Error
        }
        ReplanOutcome::Search => match worker {
            None => {
                do_planning(core, shared, &CancelToken::new());
                ComputePathStatus::Running
            }
            Some(worker) if worker.request_search() => ComputePathStatus::Running,
            Some(_) => ComputePathStatus::Error,
        },
    }
}
