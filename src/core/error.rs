//! Error types for pool operations.

use thiserror::Error;

/// Errors produced by the pool and its components.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Submission or scaling attempted after shutdown.
    #[error("pool is closed")]
    PoolClosed,
    /// An internal lock could not be acquired within the configured
    /// window. Reserved for non-blocking acquisition modes; the default
    /// configuration never produces it.
    #[error("timed out acquiring internal lock")]
    LockTimeout,
    /// Scale target out of bounds, or autoscaling not enabled.
    #[error("invalid scale target: {0}")]
    InvalidScaleTarget(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A task body panicked; caught at the worker boundary and delivered
    /// through the completion handle when one exists.
    #[error("task fault: {0}")]
    TaskFault(String),
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Application-facing result using anyhow for task bodies and
/// higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
