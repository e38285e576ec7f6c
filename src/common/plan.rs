//! Discrete lattice plans

use serde::{Deserialize, Serialize};

use crate::common::types::{ActionId, ContinuousState, DiscreteState};

/// Start lattice state plus a sequence of motion primitives.
///
/// `penalties[i]` is the obstacle penalty recorded for `actions[i]` when the
/// plan was searched; safety checks compare against it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiscretePlan {
    pub start: DiscreteState,
    pub actions: Vec<ActionId>,
    pub penalties: Vec<f32>,
}

impl DiscretePlan {
    pub fn new(start: DiscreteState) -> Self {
        Self {
            start,
            actions: Vec::new(),
            penalties: Vec::new(),
        }
    }

    pub fn push(&mut self, action: ActionId, penalty: f32) {
        self.actions.push(action);
        self.penalties.push(penalty);
    }

    /// Concatenate `other` after this plan. An empty plan adopts the start of `other`.
    pub fn append(&mut self, other: &DiscretePlan) {
        if self.actions.is_empty() {
            self.start = other.start;
        }
        self.actions.extend_from_slice(&other.actions);
        self.penalties.extend_from_slice(&other.penalties);
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.penalties.clear();
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn action(&self, index: usize) -> Option<ActionId> {
        self.actions.get(index).copied()
    }

    pub fn penalty(&self, index: usize) -> Option<f32> {
        self.penalties.get(index).copied()
    }
}

/// Result of validating a committed plan against the current obstacle set
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSafety {
    /// No action of the plan collides
    pub fully_safe: bool,
    /// Leading actions that are collision free and within the lookahead
    pub safe_prefix: DiscretePlan,
    /// Continuous state at the end of `safe_prefix`
    pub last_safe_state: ContinuousState,
}
