//! Pool and autoscaling configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Autoscaling controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoScalingConfig {
    /// Master switch; every other field is ignored when false.
    pub enabled: bool,
    /// Lower bound for worker capacity.
    pub min_workers: usize,
    /// Upper bound for worker capacity.
    pub max_workers: usize,
    /// Queue depth above which the pool scales up.
    pub scale_up_queue_threshold: usize,
    /// Utilization above which the pool scales up.
    pub scale_up_utilization: f64,
    /// Utilization below which the pool may scale down.
    pub scale_down_utilization: f64,
    /// Workers added per ordinary scale-up.
    pub scale_up_step: usize,
    /// Workers removed per scale-down.
    pub scale_down_step: usize,
    /// Minimum time between automatic scaling actions, in milliseconds.
    pub cooldown_ms: u64,
    /// Also scale up on a projected backlog trend, not just its current
    /// value.
    pub enable_predictive: bool,
}

impl Default for AutoScalingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_workers: 1,
            max_workers: num_cpus::get().max(1) * 4,
            scale_up_queue_threshold: 10,
            scale_up_utilization: 0.8,
            scale_down_utilization: 0.3,
            scale_up_step: 5,
            scale_down_step: 2,
            cooldown_ms: 30_000,
            enable_predictive: false,
        }
    }
}

impl AutoScalingConfig {
    /// Cooldown period as a `Duration`.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Validate bounds, ratios, and steps. A disabled config is always
    /// valid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.min_workers == 0 {
            return Err("min_workers must be greater than 0".into());
        }
        if self.max_workers < self.min_workers {
            return Err("max_workers must be >= min_workers".into());
        }
        if self.scale_up_queue_threshold == 0 {
            return Err("scale_up_queue_threshold must be greater than 0".into());
        }
        if self.scale_up_utilization <= 0.0 || self.scale_up_utilization > 1.0 {
            return Err("scale_up_utilization must be in (0, 1]".into());
        }
        if self.scale_down_utilization < 0.0 || self.scale_down_utilization >= 1.0 {
            return Err("scale_down_utilization must be in [0, 1)".into());
        }
        if self.scale_down_utilization >= self.scale_up_utilization {
            return Err("scale_down_utilization must be below scale_up_utilization".into());
        }
        if self.scale_up_step == 0 || self.scale_down_step == 0 {
            return Err("scale steps must be greater than 0".into());
        }
        if self.cooldown_ms == 0 {
            return Err("cooldown_ms must be greater than 0".into());
        }
        Ok(())
    }
}

/// Pool configuration, immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Worker threads at startup.
    pub initial_workers: usize,
    /// Advisory queue depth. Not enforced: under sustained overload the
    /// priority queue grows past it (with a logged warning), keeping
    /// submission non-blocking in priority mode.
    pub queue_size: usize,
    /// Route submissions through the priority queue.
    pub enable_priority: bool,
    /// Autoscaling controller settings.
    pub autoscaling: AutoScalingConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_workers: num_cpus::get().max(1),
            queue_size: 1_000,
            enable_priority: false,
            autoscaling: AutoScalingConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Configuration with library defaults; tune with the `with_*`
    /// methods.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting worker count.
    #[must_use]
    pub fn with_initial_workers(mut self, count: usize) -> Self {
        self.initial_workers = count;
        self
    }

    /// Set the advisory queue depth.
    #[must_use]
    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    /// Enable or disable the priority queue.
    #[must_use]
    pub fn with_priority(mut self, enabled: bool) -> Self {
        self.enable_priority = enabled;
        self
    }

    /// Replace the autoscaling settings.
    #[must_use]
    pub fn with_autoscaling(mut self, autoscaling: AutoScalingConfig) -> Self {
        self.autoscaling = autoscaling;
        self
    }

    /// Validate all settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_workers == 0 {
            return Err("initial_workers must be greater than 0".into());
        }
        if self.queue_size == 0 {
            return Err("queue_size must be greater than 0".into());
        }
        self.autoscaling.validate()?;
        if self.autoscaling.enabled
            && !(self.autoscaling.min_workers..=self.autoscaling.max_workers)
                .contains(&self.initial_workers)
        {
            return Err(format!(
                "initial_workers {} outside autoscaling bounds [{}, {}]",
                self.initial_workers, self.autoscaling.min_workers, self.autoscaling.max_workers
            ));
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate it.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
