//! Fluent construction of a pool from configuration.

use crate::config::{AutoScalingConfig, PoolConfig};
use crate::core::{Pool, PoolError};

/// Fluent builder over [`PoolConfig`].
///
/// ```rust
/// use adaptive_workpool::builders::PoolBuilder;
///
/// let pool = PoolBuilder::new()
///     .initial_workers(4)
///     .priority(true)
///     .build()
///     .unwrap();
/// pool.submit(|| {}).unwrap();
/// pool.shutdown();
/// ```
#[derive(Debug, Clone, Default)]
pub struct PoolBuilder {
    config: PoolConfig,
}

impl PoolBuilder {
    /// Start from library defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn from_config(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Worker threads at startup.
    #[must_use]
    pub fn initial_workers(mut self, count: usize) -> Self {
        self.config.initial_workers = count;
        self
    }

    /// Advisory queue depth.
    #[must_use]
    pub fn queue_size(mut self, size: usize) -> Self {
        self.config.queue_size = size;
        self
    }

    /// Enable or disable the priority queue.
    #[must_use]
    pub fn priority(mut self, enabled: bool) -> Self {
        self.config.enable_priority = enabled;
        self
    }

    /// Autoscaling settings.
    #[must_use]
    pub fn autoscaling(mut self, autoscaling: AutoScalingConfig) -> Self {
        self.config.autoscaling = autoscaling;
        self
    }

    /// Validate the assembled configuration and construct the pool.
    ///
    /// # Errors
    ///
    /// Same as [`Pool::new`].
    pub fn build(self) -> Result<Pool, PoolError> {
        Pool::new(self.config)
    }
}
