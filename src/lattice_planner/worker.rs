//! Background planner worker and the bounded search it runs.
//!
//! The worker owns no planner state. On every `WorkerMessage::Plan` it locks
//! the shared `PlannerCore`, runs `do_planning` with a fresh `CancelToken`
//! and goes back to waiting. Its lifecycle is one tagged `WorkerState`:
//!
//! ```text
//! Idle --request--> Queued --worker picks up--> Planning{cancel} --done--> Idle
//!   \________________________ drop ______________________________> Stopping
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::common::{CancelToken, PlannerEngine, PlannerError, PlannerResult};
use crate::lattice_planner::shared::{PlannerCore, SearchStats, SharedStatus};
use crate::lattice_planner::status::{ComputeStatus, ErrorType};

/// Run one bounded search from `core.context` and fold its result into the
/// committed plan.
pub fn do_planning<E: PlannerEngine>(
    core: &mut PlannerCore<E>,
    shared: &SharedStatus,
    cancel: &CancelToken,
) {
    shared.set(ComputeStatus::Running, ErrorType::None);

    let delay_ms = shared.artificial_delay_ms();
    if delay_ms > 0 {
        debug!("Delaying search {} by {} ms", core.search_num, delay_ms);
        let step_ms = core.config.artificial_delay_step_ms.max(1);
        let mut blocked_ms = 0;
        while blocked_ms < delay_ms && cancel.keep_running() {
            let this_block = step_ms.min(delay_ms - blocked_ms);
            thread::sleep(Duration::from_millis(this_block as u64));
            blocked_ms += this_block;
        }
    }

    let started = Instant::now();
    let success = core
        .engine
        .replan(&core.context, core.config.max_expansions, cancel);
    let stats = SearchStats {
        search_num: core.search_num,
        success,
        duration: started.elapsed(),
        expansions: core.engine.last_num_expansions(),
        considerations: core.engine.last_num_considerations(),
    };
    info!(
        "Search {} {} in {} ms ({} expansions, {} considerations)",
        stats.search_num,
        if success { "succeeded" } else { "failed" },
        stats.duration.as_millis(),
        stats.expansions,
        stats.considerations
    );
    core.last_stats = Some(stats);

    if !success {
        if cancel.is_cancelled() {
            info!("Search {} was stopped", core.search_num);
        }
        core.clear_committed();
        shared.set(ComputeStatus::Error, ErrorType::PlannerFailed);
        return;
    }

    let new_plan = core.engine.plan().clone();
    if new_plan.is_empty() {
        shared.set(ComputeStatus::CompleteNoPlan, ErrorType::None);
        return;
    }

    // committed may still hold the safe prefix of the previous plan
    if !core.committed.is_empty() {
        let end_state = core.engine.plan_final_state(&core.committed);
        if end_state != new_plan.start {
            error!(
                "Refusing to append a plan starting at {} onto a plan ending at {}",
                new_plan.start, end_state
            );
            error!("committed plan: {}", core.engine.describe_plan(&core.committed));
            error!("new plan: {}", core.engine.describe_plan(&new_plan));
            core.clear_committed();
            shared.set(ComputeStatus::Error, ErrorType::InvalidAppendant);
            return;
        }
    }

    core.selected_goal = core.engine.chosen_goal();
    debug!("old plan: {}", core.engine.describe_plan(&core.committed));
    core.committed.append(&new_plan);
    debug!("new plan: {}", core.engine.describe_plan(&new_plan));

    shared.set(ComputeStatus::CompleteWithPlan, ErrorType::None);
}

/// Lifecycle of the worker
#[derive(Debug, Clone)]
pub enum WorkerState {
    Idle,
    /// A search was requested but the worker has not started it
    Queued,
    Planning { cancel: CancelToken },
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMessage {
    Plan,
    Stop,
}

enum Begin {
    Run,
    Skip,
    Exit,
}

fn begin(state: &Mutex<WorkerState>, cancel: &CancelToken) -> Begin {
    let mut state = state.lock();
    match *state {
        WorkerState::Queued => {
            *state = WorkerState::Planning {
                cancel: cancel.clone(),
            };
            Begin::Run
        }
        WorkerState::Stopping => Begin::Exit,
        WorkerState::Idle | WorkerState::Planning { .. } => Begin::Skip,
    }
}

fn finish(state: &Mutex<WorkerState>) {
    let mut state = state.lock();
    if matches!(*state, WorkerState::Planning { .. }) {
        *state = WorkerState::Idle;
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn run<E: PlannerEngine>(
    core: Arc<Mutex<PlannerCore<E>>>,
    shared: Arc<SharedStatus>,
    state: Arc<Mutex<WorkerState>>,
    requests: Receiver<WorkerMessage>,
) {
    debug!("Planner worker started");
    while let Ok(WorkerMessage::Plan) = requests.recv() {
        let mut guard = core.lock();
        let cancel = CancelToken::new();
        match begin(&state, &cancel) {
            Begin::Run => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    do_planning(&mut guard, &shared, &cancel)
                }));
                if let Err(panic) = outcome {
                    error!(
                        "Search {} panicked: {}",
                        guard.search_num,
                        panic_reason(&*panic)
                    );
                    guard.clear_committed();
                    shared.set(ComputeStatus::Error, ErrorType::PlannerFailed);
                }
                // release the core before callers can see the worker idle
                drop(guard);
                finish(&state);
            }
            Begin::Skip => debug!("Ignoring stale plan request"),
            Begin::Exit => break,
        }
    }
    debug!("Planner worker exiting");
}

/// Persistent background thread executing searches
pub struct WorkerThread {
    state: Arc<Mutex<WorkerState>>,
    shared: Arc<SharedStatus>,
    requests: Sender<WorkerMessage>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    pub fn spawn<E: PlannerEngine + 'static>(
        core: Arc<Mutex<PlannerCore<E>>>,
        shared: Arc<SharedStatus>,
    ) -> PlannerResult<Self> {
        let (tx, rx) = unbounded();
        let state = Arc::new(Mutex::new(WorkerState::Idle));

        let thread_state = Arc::clone(&state);
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("lattice_planner".to_string())
            .spawn(move || run(core, thread_shared, thread_state, rx))
            .map_err(|e| PlannerError::Worker(format!("failed to spawn planner thread: {}", e)))?;

        Ok(Self {
            state,
            shared,
            requests: tx,
            handle: Some(handle),
        })
    }

    /// Queue a search. The caller must hold the core lock so the worker
    /// sees the context it just prepared.
    pub fn request_search(&self) -> bool {
        {
            let mut state = self.state.lock();
            match *state {
                WorkerState::Stopping => return false,
                WorkerState::Planning { .. } => {
                    warn!("Search requested while another one is running");
                    return false;
                }
                WorkerState::Idle | WorkerState::Queued => *state = WorkerState::Queued,
            }
        }
        self.shared.set(ComputeStatus::Running, ErrorType::None);
        if self.requests.send(WorkerMessage::Plan).is_err() {
            error!("Planner worker is gone, cannot dispatch search");
            *self.state.lock() = WorkerState::Idle;
            self.shared.set(ComputeStatus::Error, ErrorType::PlannerFailed);
            return false;
        }
        true
    }

    /// Cancel the running search. No effect unless one is running.
    pub fn stop_planning(&self) -> bool {
        match &*self.state.lock() {
            WorkerState::Planning { cancel } => {
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// A search is queued or running
    pub fn is_busy(&self) -> bool {
        matches!(
            *self.state.lock(),
            WorkerState::Queued | WorkerState::Planning { .. }
        )
    }

    pub fn is_planning(&self) -> bool {
        matches!(*self.state.lock(), WorkerState::Planning { .. })
    }

    /// Stop the thread and wait for it. Safe to call more than once.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.state.lock();
            if let WorkerState::Planning { cancel } = &*state {
                cancel.cancel();
            }
            *state = WorkerState::Stopping;
        }
        let _ = self.requests.send(WorkerMessage::Stop);

        if let Some(handle) = self.handle.take() {
            if let Err(panic) = handle.join() {
                error!("Planner worker panicked: {}", panic_reason(&*panic));
            }
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
