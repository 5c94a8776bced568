//! Error types for the Supernova scan core
//!
//! Only pre-scan validation and operator interrupts surface as errors.
//! Everything that goes wrong inside a running scan is recorded as data.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupernovaError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid port specification: {0}")]
    InvalidPortSpec(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Scan interrupted by operator")]
    Cancelled,
}

/// Result type alias for Supernova operations
pub type SupernovaResult<T> = Result<T, SupernovaError>;
