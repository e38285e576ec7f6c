//! State shared between the navigation loop and the planner worker.
//!
//! - `SharedStatus`: lock-free status words, readable while a search holds the core
//! - `PlannerCore`: everything the driver mutates, kept behind one mutex

use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::common::{ContinuousState, ConvexPolygon, DiscretePlan, GoalId, PlannerEngine};
use crate::lattice_planner::config::LatticePlannerConfig;
use crate::lattice_planner::context::{ContextDumper, PlannerContext};
use crate::lattice_planner::status::{ComputeStatus, ErrorType};

/// `(ComputeStatus, ErrorType)` packed into one atomic word so the pair is
/// always read consistently.
#[derive(Debug)]
pub struct SharedStatus {
    word: AtomicU16,
    artificial_delay_ms: AtomicU32,
}

fn pack(status: ComputeStatus, error: ErrorType) -> u16 {
    ((status as u16) << 8) | error as u16
}

impl SharedStatus {
    /// Nothing has been planned yet, which callers see as `Error` / `None`
    pub fn new(artificial_delay_ms: u32) -> Self {
        Self {
            word: AtomicU16::new(pack(ComputeStatus::Error, ErrorType::None)),
            artificial_delay_ms: AtomicU32::new(artificial_delay_ms),
        }
    }

    pub fn set(&self, status: ComputeStatus, error: ErrorType) {
        self.word.store(pack(status, error), Ordering::Release);
    }

    pub fn load(&self) -> (ComputeStatus, ErrorType) {
        let word = self.word.load(Ordering::Acquire);
        (
            ComputeStatus::from_u8((word >> 8) as u8),
            ErrorType::from_u8(word as u8),
        )
    }

    pub fn status(&self) -> ComputeStatus {
        self.load().0
    }

    pub fn error_type(&self) -> ErrorType {
        self.load().1
    }

    pub fn artificial_delay_ms(&self) -> u32 {
        self.artificial_delay_ms.load(Ordering::Relaxed)
    }

    pub fn set_artificial_delay_ms(&self, ms: u32) {
        self.artificial_delay_ms.store(ms, Ordering::Relaxed);
    }
}

/// Telemetry of one search
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchStats {
    pub search_num: u32,
    pub success: bool,
    pub duration: Duration,
    pub expansions: u32,
    pub considerations: u32,
}

/// Obstacle polygon recorded for debug drawing
#[derive(Debug, Clone, PartialEq)]
pub struct DebugPolygon {
    pub polygon: ConvexPolygon,
    pub color: &'static str,
}

/// Where a pose sits relative to a committed plan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanLocation {
    /// Index of the closest plan action
    pub index: usize,
    /// Distance from the pose to that action [mm]
    pub offset_mm: f64,
    /// Offset reached the abandon threshold
    pub too_far: bool,
}

/// Everything guarded by the driver's mutex
pub struct PlannerCore<E: PlannerEngine> {
    pub engine: E,
    pub config: LatticePlannerConfig,
    pub context: PlannerContext,
    pub committed: DiscretePlan,
    /// Targets as the caller passed them, indexed by `GoalId`
    pub target_poses: Vec<ContinuousState>,
    pub selected_goal: GoalId,
    /// Map watermark seen by the last import, `None` before the first
    pub last_import_watermark: Option<u64>,
    pub search_num: u32,
    pub last_stats: Option<SearchStats>,
    pub debug_obstacles: Vec<DebugPolygon>,
    pub dumper: Option<ContextDumper>,
}

impl<E: PlannerEngine> PlannerCore<E> {
    pub fn new(engine: E, config: LatticePlannerConfig, dumper: Option<ContextDumper>) -> Self {
        Self {
            engine,
            config,
            context: PlannerContext::default(),
            committed: DiscretePlan::default(),
            target_poses: Vec::new(),
            selected_goal: 0,
            last_import_watermark: None,
            search_num: 0,
            last_stats: None,
            debug_obstacles: Vec::new(),
            dumper,
        }
    }

    /// Closest action of the committed plan to `state`.
    ///
    /// Replanning and path assembly both decide drift with this, so the two
    /// always agree on the threshold.
    pub fn locate_on_plan(&self, state: &ContinuousState) -> PlanLocation {
        let (index, offset_mm) = self.engine.find_closest_plan_segment(&self.committed, state);
        PlanLocation {
            index,
            offset_mm,
            too_far: offset_mm >= self.config.plan_error_for_replan_mm,
        }
    }

    /// Drop the committed plan, keeping its start for diagnostics
    pub fn clear_committed(&mut self) {
        self.committed.clear();
    }
}
