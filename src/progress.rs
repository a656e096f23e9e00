// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for a collection run
//!
//! The collector publishes phase changes and counts on a broadcast channel; the
//! CLI spinner listens. Listeners only observe, they never touch collection state.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

use crate::collector::StopReason;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Progress update message
#[derive(Clone, Debug)]
pub enum ProgressUpdate {
    /// Opening the bus connection
    Connecting { url: String },
    /// Subscriptions established, collection running
    Collecting { topics: usize },
    /// A new distinct resource was accepted
    ResourceCollected { total: usize },
    /// A termination trigger fired
    Draining { reason: StopReason },
    /// Filtering finished
    Complete {
        collected: usize,
        kept: usize,
        elapsed_ms: u64,
    },
}

/// Progress reporter shared between the collector and its observers
pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressUpdate>,
    /// Distinct resources accepted in the current run
    collected: AtomicUsize,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            sender,
            collected: AtomicUsize::new(0),
        }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    pub fn connecting(&self, url: &str) {
        self.collected.store(0, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::Connecting {
            url: url.to_string(),
        });
    }

    pub fn collecting(&self, topics: usize) {
        let _ = self.sender.send(ProgressUpdate::Collecting { topics });
    }

    pub fn resource_collected(&self, total: usize) {
        self.collected.store(total, Ordering::SeqCst);
        let _ = self
            .sender
            .send(ProgressUpdate::ResourceCollected { total });
    }

    pub fn draining(&self, reason: StopReason) {
        let _ = self.sender.send(ProgressUpdate::Draining { reason });
    }

    pub fn complete(&self, collected: usize, kept: usize, elapsed_ms: u64) {
        let _ = self.sender.send(ProgressUpdate::Complete {
            collected,
            kept,
            elapsed_ms,
        });
    }

    /// Distinct resources seen so far
    pub fn collected(&self) -> usize {
        self.collected.load(Ordering::SeqCst)
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to progress reporter
pub type ProgressHandle = Arc<ProgressReporter>;

/// Create a new progress reporter handle
pub fn create_progress_handle() -> ProgressHandle {
    Arc::new(ProgressReporter::new())
}
