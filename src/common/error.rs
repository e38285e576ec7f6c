//! Error types for lattice_nav
//!
//! These cover the ambient failures around the planner (configuration,
//! file output, worker lifecycle). Planning outcomes themselves are
//! reported through `ComputeStatus` / `ErrorType`, not through this enum.

use thiserror::Error;

/// Main error type for the planner driver
#[derive(Error, Debug)]
pub enum PlannerError {
    /// Configuration rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding of a dumped planner context failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Background worker could not be started or reached
    #[error("Worker error: {0}")]
    Worker(String),

    /// Visualization error
    #[error("Visualization error: {0}")]
    Visualization(String),
}

/// Result type alias for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
