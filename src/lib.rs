//! # Adaptive Workpool
//!
//! An adaptive worker-pool scheduler: a bounded task executor on reusable
//! OS threads, an optional priority queue, and a feedback-driven
//! autoscaling controller, composed behind a single [`core::Pool`] facade.
//!
//! ## Core Problem Solved
//!
//! Services that accept bursts of short, independent work units need to
//! coordinate them across a shared set of worker threads without
//! over-committing resources, starving low-priority work unnecessarily,
//! or oscillating between pool sizes:
//!
//! - **Bounded concurrency**: the executor's thread count is the only
//!   hard limit; callers block (or queue, in priority mode) when it is
//!   reached
//! - **Priority dispatch**: High > Normal > Low bands, FIFO within a
//!   band, with non-blocking submission once the queue is enabled
//! - **Feedback-driven sizing**: a periodic controller scales the pool
//!   from observed backlog and utilization, with a cooldown against
//!   oscillation and an optional linear-regression trend trigger
//! - **Fault isolation**: a panic inside a task is caught at the worker
//!   boundary, logged, and never takes the worker down
//!
//! ## Example
//!
//! ```rust,ignore
//! use adaptive_workpool::builders::PoolBuilder;
//! use adaptive_workpool::config::AutoScalingConfig;
//! use adaptive_workpool::util::Priority;
//!
//! let pool = PoolBuilder::new()
//!     .initial_workers(4)
//!     .priority(true)
//!     .autoscaling(AutoScalingConfig {
//!         enabled: true,
//!         min_workers: 2,
//!         max_workers: 32,
//!         ..AutoScalingConfig::default()
//!     })
//!     .build()?;
//!
//! pool.submit_with_priority(Priority::High, || do_urgent_work())?;
//!
//! let handle = pool.submit_with_result(|| Ok(expensive_computation()))?;
//! let value = handle.wait()?;
//!
//! println!("completed: {}", pool.stats().total.completed);
//! pool.shutdown();
//! ```
//!
//! Scheduling model: parallel worker threads, not cooperative tasks. All
//! state is in-process and per-instance; queued tasks do not survive a
//! restart, and a dispatched task always runs to completion (no
//! mid-execution cancellation).

#![deny(unsafe_code)]
#![warn(clippy::all)]

/// Core scheduling components: executor, priority queue, metrics,
/// autoscaler, and the pool facade.
pub mod core;
/// Configuration models for the pool and its autoscaler.
pub mod config;
/// Builders to construct pool components from configuration.
pub mod builders;
/// Shared utilities: priority bands, wall clock, telemetry.
pub mod util;
