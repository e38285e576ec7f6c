//! Status values reported to the navigation loop

use serde::Serialize;

/// Progress of the most recent planning request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ComputeStatus {
    Running = 0,
    Error = 1,
    CompleteWithPlan = 2,
    CompleteNoPlan = 3,
}

impl ComputeStatus {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ComputeStatus::Running,
            2 => ComputeStatus::CompleteWithPlan,
            3 => ComputeStatus::CompleteNoPlan,
            _ => ComputeStatus::Error,
        }
    }
}

/// Immediate answer of a planning entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComputePathStatus {
    /// A search was dispatched (or already ran in synchronous mode)
    Running,
    /// The committed plan is still good
    NoPlanNeeded,
    Error,
}

/// Cause of the last `ComputeStatus::Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ErrorType {
    None = 0,
    PlannerFailed = 1,
    InvalidAppendant = 2,
    TooFarFromPlan = 3,
    InvalidStart = 4,
    InvalidGoals = 5,
}

impl ErrorType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ErrorType::PlannerFailed,
            2 => ErrorType::InvalidAppendant,
            3 => ErrorType::TooFarFromPlan,
            4 => ErrorType::InvalidStart,
            5 => ErrorType::InvalidGoals,
            _ => ErrorType::None,
        }
    }
}
