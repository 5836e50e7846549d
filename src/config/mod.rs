//! Configuration models for the pool and its autoscaler.

pub mod pool;

pub use pool::{AutoScalingConfig, PoolConfig};
