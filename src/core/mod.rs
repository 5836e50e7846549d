//! Core scheduling components.

pub mod autoscaler;
pub mod error;
pub mod executor;
pub mod handle;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod stats;

pub use autoscaler::{predict_next, AutoScaler, ScalingState};
pub use error::{AppResult, PoolError};
pub use executor::{Executor, Job, TrySubmitError};
pub use handle::CompletionHandle;
pub use metrics::{MetricsCollector, MetricsSnapshot, HISTORY_CAPACITY};
pub use pool::Pool;
pub use queue::{PendingQueue, QueuedTask};
pub use scheduler::PriorityScheduler;
pub use stats::{Counters, Statistics, StatisticsTracker};
