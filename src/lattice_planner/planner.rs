//! `LatticePlanner`: the public face of the planner driver.
//!
//! The navigation loop calls in from one thread; searches run on the
//! background worker unless the planner is synchronous. Status is polled
//! through [`LatticePlanner::check_planning_status`] and
//! [`LatticePlanner::get_error_type`], which never block, even while a
//! search holds the planner state.
//!
//! Typical cycle:
//!
//! ```text
//! compute_path(map, pose, targets)        -> Running
//! check_planning_status()                 -> Running ... CompleteWithPlan
//! get_complete_path(pose)                 -> path for the follower
//! compute_new_path_if_needed(map, pose)   -> NoPlanNeeded | Running
//! ```

use std::path::Path as FsPath;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use parking_lot::Mutex;

use crate::common::{
    ContinuousState, DiscretePlan, GoalId, OccupancyMap, Path, PlannerEngine, PlannerResult,
};
use crate::lattice_planner::assembler::{self, CompletePath};
use crate::lattice_planner::config::LatticePlannerConfig;
use crate::lattice_planner::context::ContextDumper;
use crate::lattice_planner::obstacles::{import_obstacles, ImportOutcome};
use crate::lattice_planner::replan;
use crate::lattice_planner::safety::{self, PathSafety};
use crate::lattice_planner::shared::{DebugPolygon, PlannerCore, SearchStats, SharedStatus};
use crate::lattice_planner::status::{ComputePathStatus, ComputeStatus, ErrorType};
use crate::lattice_planner::worker::WorkerThread;
use crate::utils::colors;

/// Collision penalty below which a target counts as clear in single goal mode
const CLEAR_GOAL_PENALTY: f32 = 0.01;

/// Closest target with a penalty below `CLEAR_GOAL_PENALTY`, else the closest
/// one the engine does not treat as a collision.
fn select_single_goal<E: PlannerEngine>(
    engine: &E,
    start: &ContinuousState,
    targets: &[ContinuousState],
) -> Option<GoalId> {
    [CLEAR_GOAL_PENALTY, engine.max_obstacle_cost()]
        .into_iter()
        .find_map(|max_penalty| {
            targets
                .iter()
                .enumerate()
                .filter(|(_, target)| engine.collision_penalty(target) < max_penalty)
                .min_by_key(|(_, target)| OrderedFloat(target.position().distance(&start.position())))
                .map(|(id, _)| id)
        })
}

pub struct LatticePlanner<E: PlannerEngine + 'static> {
    worker: WorkerThread,
    core: Arc<Mutex<PlannerCore<E>>>,
    shared: Arc<SharedStatus>,
    synchronous: AtomicBool,
}

impl<E: PlannerEngine + 'static> LatticePlanner<E> {
    pub fn new(engine: E, config: LatticePlannerConfig) -> PlannerResult<Self> {
        config.validate()?;
        let dumper = config
            .context_dump_dir
            .as_deref()
            .map(ContextDumper::new)
            .transpose()?;

        let shared = Arc::new(SharedStatus::new(config.artificial_delay_ms));
        let synchronous = AtomicBool::new(config.synchronous);
        info!(
            "Creating lattice planner (synchronous: {}, multi goal: {}, max expansions: {})",
            config.synchronous, config.multi_goal_planning, config.max_expansions
        );

        let core = Arc::new(Mutex::new(PlannerCore::new(engine, config, dumper)));
        let worker = WorkerThread::spawn(Arc::clone(&core), Arc::clone(&shared))?;

        Ok(Self {
            worker,
            core,
            shared,
            synchronous,
        })
    }

    pub fn from_config_file(engine: E, path: &FsPath) -> PlannerResult<Self> {
        Self::new(engine, LatticePlannerConfig::load(path)?)
    }

    /// Plan from `start` to any of `targets`, replacing whatever plan is
    /// committed. Refused with `Error` while a search is queued or running.
    pub fn compute_path<M: OccupancyMap + ?Sized>(
        &self,
        map: &M,
        start: &ContinuousState,
        targets: &[ContinuousState],
    ) -> ComputePathStatus {
        if self.worker.is_busy() {
            warn!("Tried to compute a new path while the planner is already running");
            return ComputePathStatus::Error;
        }
        let mut core = self.core.lock();

        import_obstacles(&mut core, map, start, false, Some(colors::OBSTACLE));
        core.target_poses = targets.to_vec();
        core.selected_goal = 0;
        core.clear_committed();

        let goals: Vec<(GoalId, ContinuousState)> = if core.config.multi_goal_planning {
            targets
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, target)| core.engine.goal_is_valid(target))
                .collect()
        } else {
            select_single_goal(&core.engine, start, targets)
                .map(|id| vec![(id, targets[id])])
                .unwrap_or_default()
        };

        if goals.is_empty() {
            info!("Could not find a valid goal out of {} targets", targets.len());
            self.shared.set(ComputeStatus::Error, ErrorType::InvalidGoals);
            return ComputePathStatus::Error;
        }
        debug!("Planning towards goals {:?}", goals.iter().map(|(id, _)| id).collect::<Vec<_>>());
        core.context.goals = goals;

        self.start_planning_locked(&mut core, map, start, true)
    }

    /// Replan if the committed plan became unsafe or the robot left it.
    /// Never blocks: returns `NoPlanNeeded` while the planner is busy.
    pub fn compute_new_path_if_needed<M: OccupancyMap + ?Sized>(
        &self,
        map: &M,
        pose: &ContinuousState,
        force_replan_from_scratch: bool,
    ) -> ComputePathStatus {
        if self.worker.is_busy() {
            return ComputePathStatus::NoPlanNeeded;
        }
        match self.core.try_lock() {
            Some(mut core) => {
                self.start_planning_locked(&mut core, map, pose, force_replan_from_scratch)
            }
            None => {
                debug!("Planner state is locked, skipping replan check");
                ComputePathStatus::NoPlanNeeded
            }
        }
    }

    /// Replan decision and dispatch. Waits for the planner state if another
    /// caller holds it, but refuses with `Error` while a search is pending.
    pub fn start_planning<M: OccupancyMap + ?Sized>(
        &self,
        map: &M,
        pose: &ContinuousState,
        force_replan_from_scratch: bool,
    ) -> ComputePathStatus {
        if self.worker.is_busy() {
            warn!("Tried to start planning while a search is pending");
            return ComputePathStatus::Error;
        }
        let mut core = self.core.lock();
        self.start_planning_locked(&mut core, map, pose, force_replan_from_scratch)
    }

    fn start_planning_locked<M: OccupancyMap + ?Sized>(
        &self,
        core: &mut PlannerCore<E>,
        map: &M,
        pose: &ContinuousState,
        force_replan_from_scratch: bool,
    ) -> ComputePathStatus {
        let worker = if self.is_synchronous() {
            None
        } else {
            Some(&self.worker)
        };
        replan::start_planning(core, &self.shared, worker, map, pose, force_replan_from_scratch)
    }

    pub fn check_planning_status(&self) -> ComputeStatus {
        self.shared.status()
    }

    pub fn get_error_type(&self) -> ErrorType {
        self.shared.error_type()
    }

    pub fn get_complete_path(&self, pose: &ContinuousState) -> Option<CompletePath> {
        // a running search holds the lock, don't wait for it
        if self.shared.status() == ComputeStatus::Running {
            return None;
        }
        let mut core = self.core.lock();
        assembler::get_complete_path(&mut core, &self.shared, pose)
    }

    /// Check `path` against the current obstacles. `None` while a search
    /// holds the planner state.
    pub fn check_is_path_safe(&self, path: &Path, start_heading: f64) -> Option<PathSafety> {
        let core = self.core.try_lock()?;
        Some(safety::check_is_path_safe(&core, path, start_heading))
    }

    /// Cancel the running search. Returns whether one was running.
    pub fn stop_planning(&self) -> bool {
        let stopped = self.worker.stop_planning();
        if stopped {
            info!("Stopping the running search");
        }
        stopped
    }

    pub fn set_is_synchronous(&self, synchronous: bool) {
        self.synchronous.store(synchronous, Ordering::Relaxed);
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous.load(Ordering::Relaxed)
    }

    /// Full padding import ahead of a path request
    pub fn preload_obstacles<M: OccupancyMap + ?Sized>(
        &self,
        map: &M,
        pose: &ContinuousState,
    ) -> ImportOutcome {
        if self.worker.is_busy() {
            debug!("Search pending, skipping obstacle preload");
            return ImportOutcome::Skipped;
        }
        match self.core.try_lock() {
            Some(mut core) => import_obstacles(&mut core, map, pose, false, Some(colors::OBSTACLE)),
            None => {
                debug!("Planner state is locked, skipping obstacle preload");
                ImportOutcome::Skipped
            }
        }
    }

    pub fn set_artificial_delay_ms(&self, ms: u32) {
        self.shared.set_artificial_delay_ms(ms);
    }

    /// Run `f` on the engine. Unlike the accessors below this waits for a
    /// running search to finish.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        f(&mut self.core.lock().engine)
    }

    // The accessors below return `None` while a search holds the planner state.

    pub fn committed_plan(&self) -> Option<DiscretePlan> {
        Some(self.core.try_lock()?.committed.clone())
    }

    pub fn selected_goal(&self) -> Option<GoalId> {
        Some(self.core.try_lock()?.selected_goal)
    }

    pub fn search_count(&self) -> Option<u32> {
        Some(self.core.try_lock()?.search_num)
    }

    pub fn last_search_stats(&self) -> Option<SearchStats> {
        self.core.try_lock()?.last_stats
    }

    pub fn is_search_running(&self) -> bool {
        self.worker.is_planning()
    }

    pub fn debug_obstacles(&self) -> Option<Vec<DebugPolygon>> {
        Some(self.core.try_lock()?.debug_obstacles.clone())
    }
}
