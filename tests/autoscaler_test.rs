//! Integration tests for the autoscaling controller
//!
//! These tests drive `sample_now()` and `evaluate()` directly instead of
//! sleeping through wall-clock ticks, which keeps the scaling decisions
//! deterministic:
//! - Flood-driven scale-up bounded by max_workers
//! - Tiered scale-up steps by backlog severity
//! - Idle scale-down toward min_workers in fixed steps
//! - Cooldown spacing between automatic actions
//! - Manual scaling bounds and cooldown exemption
//! - Predictive (trend-based) scale-up

use adaptive_workpool::builders::PoolBuilder;
use adaptive_workpool::config::AutoScalingConfig;
use adaptive_workpool::core::{Pool, PoolError};
use crossbeam_channel::Sender;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

fn scaling_config() -> AutoScalingConfig {
    AutoScalingConfig {
        enabled: true,
        min_workers: 2,
        max_workers: 20,
        scale_up_queue_threshold: 10,
        scale_up_utilization: 0.8,
        scale_down_utilization: 0.3,
        scale_up_step: 5,
        scale_down_step: 2,
        cooldown_ms: 60_000,
        enable_predictive: false,
    }
}

/// Build a priority pool whose workers all block on the returned sender,
/// with `queued` additional tasks held in the queue.
fn flooded_pool(initial: usize, queued: usize, cfg: AutoScalingConfig) -> (Pool, Sender<()>) {
    let pool = PoolBuilder::new()
        .initial_workers(initial)
        .priority(true)
        .autoscaling(cfg)
        .build()
        .unwrap();

    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    for _ in 0..(initial + queued) {
        let release_rx = release_rx.clone();
        pool.submit(move || {
            let _ = release_rx.recv();
        })
        .unwrap();
    }
    assert!(wait_until(Duration::from_secs(5), || {
        pool.running() == initial && pool.queue_len() == queued
    }));
    (pool, release_tx)
}

// ============================================================================
// TESTS
// ============================================================================

/// Flooding 100 tasks onto a 2-worker pool triggers the severest step
/// and capacity climbs straight to max_workers, never past it.
#[test]
fn test_flood_scales_up_to_max() {
    println!("\n=== test_flood_scales_up_to_max ===");

    let (pool, release_tx) = flooded_pool(2, 98, scaling_config());
    let scaler = pool.autoscaler().unwrap();

    pool.metrics_collector().sample_now();
    scaler.evaluate();

    let state = scaler.state();
    println!("capacity after flood evaluation: {}", state.current_workers);
    assert_eq!(state.current_workers, 20);
    assert_eq!(pool.capacity(), 20);

    // A later evaluation with the backlog still high cannot pass max.
    pool.metrics_collector().sample_now();
    scaler.evaluate();
    assert_eq!(scaler.state().current_workers, 20);

    drop(release_tx);
    assert!(wait_until(Duration::from_secs(10), || {
        pool.stats().total.completed == 100
    }));

    pool.shutdown();
    println!("=== test_flood_scales_up_to_max PASSED ===\n");
}

/// Backlogs in (threshold, 2x] use the ordinary configured step.
#[test]
fn test_ordinary_scale_up_step() {
    println!("\n=== test_ordinary_scale_up_step ===");

    let (pool, release_tx) = flooded_pool(2, 12, scaling_config());
    let scaler = pool.autoscaler().unwrap();

    pool.metrics_collector().sample_now();
    scaler.evaluate();
    // 12 > 10 but not past 2x: step 5.
    assert_eq!(scaler.state().current_workers, 7);

    drop(release_tx);
    assert!(wait_until(Duration::from_secs(10), || {
        pool.stats().total.completed == 14
    }));
    pool.shutdown();
    println!("=== test_ordinary_scale_up_step PASSED ===\n");
}

/// Backlogs past 2x the threshold jump by the surge step of 20.
#[test]
fn test_surge_scale_up_step() {
    println!("\n=== test_surge_scale_up_step ===");

    let cfg = AutoScalingConfig {
        max_workers: 40,
        ..scaling_config()
    };
    let (pool, release_tx) = flooded_pool(2, 25, cfg);
    let scaler = pool.autoscaler().unwrap();

    pool.metrics_collector().sample_now();
    scaler.evaluate();
    // 25 > 20 but not past 3x: step 20.
    assert_eq!(scaler.state().current_workers, 22);

    drop(release_tx);
    assert!(wait_until(Duration::from_secs(10), || {
        pool.stats().total.completed == 27
    }));
    pool.shutdown();
    println!("=== test_surge_scale_up_step PASSED ===\n");
}

/// An idle pool above min_workers shrinks by scale_down_step per action,
/// gated by the cooldown, and never below min_workers.
#[test]
fn test_scale_down_toward_min() {
    println!("\n=== test_scale_down_toward_min ===");

    let cfg = AutoScalingConfig {
        cooldown_ms: 200,
        ..scaling_config()
    };
    let pool = PoolBuilder::new()
        .initial_workers(8)
        .autoscaling(cfg)
        .build()
        .unwrap();
    let scaler = pool.autoscaler().unwrap();

    // Idle: utilization 0, queue empty.
    pool.metrics_collector().sample_now();
    scaler.evaluate();
    assert_eq!(scaler.state().current_workers, 6);

    // Within the cooldown nothing moves.
    pool.metrics_collector().sample_now();
    scaler.evaluate();
    assert_eq!(scaler.state().current_workers, 6);

    thread::sleep(Duration::from_millis(250));
    pool.metrics_collector().sample_now();
    scaler.evaluate();
    assert_eq!(scaler.state().current_workers, 4);

    thread::sleep(Duration::from_millis(250));
    pool.metrics_collector().sample_now();
    scaler.evaluate();
    assert_eq!(scaler.state().current_workers, 2);

    // At min_workers the pool stays put.
    thread::sleep(Duration::from_millis(250));
    pool.metrics_collector().sample_now();
    scaler.evaluate();
    let state = scaler.state();
    assert_eq!(state.current_workers, 2);
    assert!(state.current_workers >= 2);

    pool.shutdown();
    println!("=== test_scale_down_toward_min PASSED ===\n");
}

/// Two automatic actions are never closer than the cooldown; a manual
/// scale is exempt.
#[test]
fn test_cooldown_gates_actions_but_not_manual_scale() {
    println!("\n=== test_cooldown_gates_actions_but_not_manual_scale ===");

    let (pool, release_tx) = flooded_pool(2, 12, scaling_config());
    let scaler = pool.autoscaler().unwrap();

    pool.metrics_collector().sample_now();
    scaler.evaluate();
    assert_eq!(scaler.state().current_workers, 7);

    // Backlog is still there, but the 60s cooldown blocks a second
    // automatic action.
    pool.metrics_collector().sample_now();
    scaler.evaluate();
    assert_eq!(scaler.state().current_workers, 7);

    // Manual scaling ignores the cooldown entirely.
    pool.manual_scale(12).unwrap();
    assert_eq!(scaler.state().current_workers, 12);
    assert_eq!(pool.capacity(), 12);

    drop(release_tx);
    assert!(wait_until(Duration::from_secs(10), || {
        pool.stats().total.completed == 14
    }));
    pool.shutdown();
    println!("=== test_cooldown_gates_actions_but_not_manual_scale PASSED ===\n");
}

/// Manual scale targets outside [min_workers, max_workers] are rejected.
#[test]
fn test_manual_scale_bounds() {
    println!("\n=== test_manual_scale_bounds ===");

    let pool = PoolBuilder::new()
        .initial_workers(4)
        .autoscaling(scaling_config())
        .build()
        .unwrap();

    assert!(matches!(
        pool.manual_scale(1),
        Err(PoolError::InvalidScaleTarget(_))
    ));
    assert!(matches!(
        pool.manual_scale(21),
        Err(PoolError::InvalidScaleTarget(_))
    ));
    pool.manual_scale(20).unwrap();
    assert_eq!(pool.capacity(), 20);
    pool.manual_scale(2).unwrap();
    assert_eq!(pool.capacity(), 2);

    pool.shutdown();
    println!("=== test_manual_scale_bounds PASSED ===\n");
}

/// With predictive scaling on, a rising queue trend triggers a scale-up
/// before the backlog itself crosses the threshold.
#[test]
fn test_predictive_scale_up() {
    println!("\n=== test_predictive_scale_up ===");

    let cfg = AutoScalingConfig {
        min_workers: 1,
        max_workers: 8,
        scale_up_queue_threshold: 9,
        // Saturated-but-not-backlogged must not trip the utilization rule
        // here, so the trend trigger is the only active path.
        scale_up_utilization: 1.0,
        scale_up_step: 3,
        cooldown_ms: 60_000,
        enable_predictive: true,
        ..scaling_config()
    };
    let pool = PoolBuilder::new()
        .initial_workers(1)
        .priority(true)
        .autoscaling(cfg)
        .build()
        .unwrap();
    let scaler = pool.autoscaler().unwrap();

    // Hold the single worker, then grow the queue between samples so the
    // history rises: 2, 4, 6, 8 (all below the threshold of 9).
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    {
        let release_rx = release_rx.clone();
        pool.submit(move || {
            let _ = release_rx.recv();
        })
        .unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || pool.running() == 1));

    for _ in 0..4 {
        for _ in 0..2 {
            let release_rx = release_rx.clone();
            pool.submit(move || {
                let _ = release_rx.recv();
            })
            .unwrap();
        }
        pool.metrics_collector().sample_now();
    }

    // The regression extrapolates the trend past the threshold.
    scaler.evaluate();
    let state = scaler.state();
    println!("capacity after predictive evaluation: {}", state.current_workers);
    assert_eq!(state.current_workers, 4);

    drop(release_tx);
    assert!(wait_until(Duration::from_secs(10), || {
        pool.stats().total.completed == 9
    }));
    pool.shutdown();
    println!("=== test_predictive_scale_up PASSED ===\n");
}

/// The same rising trend with predictive scaling off takes no action.
#[test]
fn test_rising_trend_without_predictive_is_ignored() {
    println!("\n=== test_rising_trend_without_predictive_is_ignored ===");

    let cfg = AutoScalingConfig {
        min_workers: 1,
        max_workers: 8,
        scale_up_queue_threshold: 9,
        scale_up_utilization: 1.0,
        scale_up_step: 3,
        cooldown_ms: 60_000,
        enable_predictive: false,
        ..scaling_config()
    };
    let pool = PoolBuilder::new()
        .initial_workers(1)
        .priority(true)
        .autoscaling(cfg)
        .build()
        .unwrap();
    let scaler = pool.autoscaler().unwrap();

    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    {
        let release_rx = release_rx.clone();
        pool.submit(move || {
            let _ = release_rx.recv();
        })
        .unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || pool.running() == 1));

    for _ in 0..4 {
        for _ in 0..2 {
            let release_rx = release_rx.clone();
            pool.submit(move || {
                let _ = release_rx.recv();
            })
            .unwrap();
        }
        pool.metrics_collector().sample_now();
    }

    scaler.evaluate();
    assert_eq!(scaler.state().current_workers, 1);

    drop(release_tx);
    assert!(wait_until(Duration::from_secs(10), || {
        pool.stats().total.completed == 9
    }));
    pool.shutdown();
    println!("=== test_rising_trend_without_predictive_is_ignored PASSED ===\n");
}
