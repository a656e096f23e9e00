// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Convergence detection
//!
//! MeshSync discovers resources in a burst and then goes quiet. Once the
//! distinct count has stayed flat for a few ticks (and is above a floor that
//! rules out an empty or slow-starting source), collection can end early.
//! The detector is advisory: it can only shorten a run.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::signal::{StopReason, StopSignal};

/// Delay before the first observation, giving the source time to start publishing
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(3);

/// Polling cadence
pub const DEFAULT_TICK: Duration = Duration::from_millis(300);

/// Consecutive unchanged ticks required
pub const DEFAULT_STABLE_TICKS: u32 = 3;

/// Count must exceed this before a plateau counts
pub const DEFAULT_MIN_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceConfig {
    pub warmup: Duration,
    pub tick: Duration,
    pub stable_ticks: u32,
    pub min_count: usize,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            tick: DEFAULT_TICK,
            stable_ticks: DEFAULT_STABLE_TICKS,
            min_count: DEFAULT_MIN_COUNT,
        }
    }
}

/// Plateau tracker fed one count per tick
#[derive(Debug)]
pub struct ConvergenceDetector {
    stable_ticks: u32,
    min_count: usize,
    last_count: usize,
    stable: u32,
}

impl ConvergenceDetector {
    pub fn new(config: &ConvergenceConfig) -> Self {
        Self {
            stable_ticks: config.stable_ticks,
            min_count: config.min_count,
            last_count: 0,
            stable: 0,
        }
    }

    /// Record the count seen on this tick; returns true once converged
    pub fn observe(&mut self, count: usize) -> bool {
        let mut converged = false;
        if count > self.min_count {
            if count == self.last_count {
                self.stable += 1;
            } else {
                self.stable = 0;
            }
            converged = self.stable >= self.stable_ticks;
        }
        self.last_count = count;
        converged
    }

    pub fn stable_ticks(&self) -> u32 {
        self.stable
    }
}

/// Poll `counter` until it converges or the run is stopped by another trigger
pub async fn monitor(config: ConvergenceConfig, counter: Arc<AtomicUsize>, signal: Arc<StopSignal>) {
    let mut observer = signal.subscribe();
    let mut detector = ConvergenceDetector::new(&config);

    tokio::select! {
        _ = tokio::time::sleep(config.warmup) => {}
        _ = observer.stopped() => return,
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + config.tick, config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let count = counter.load(Ordering::Acquire);
                if detector.observe(count) {
                    if signal.fire(StopReason::Converged) {
                        info!(count, "Resource count converged");
                    }
                    return;
                }
                debug!(count, stable_ticks = detector.stable_ticks(), "Convergence tick");
            }
            _ = observer.stopped() => return,
        }
    }
}
