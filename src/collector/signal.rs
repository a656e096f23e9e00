// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Single-fire stop signal shared by the termination triggers
//!
//! Convergence, the hard timer, and external cancellation race to end a run.
//! Only the first `fire` is recorded; observers (the spinner, tests) hold a
//! read-only receiver.

use std::fmt;

use tokio::sync::watch;

/// Why collection stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Distinct resource count plateaued
    Converged,
    /// Configured collection time elapsed
    TimedOut,
    /// Caller cancelled (interrupt or outer deadline)
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Converged => write!(f, "converged"),
            StopReason::TimedOut => write!(f, "timed out"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug)]
pub struct StopSignal {
    sender: watch::Sender<Option<StopReason>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Record the stop reason. Returns true only for the call that won.
    pub fn fire(&self, reason: StopReason) -> bool {
        self.sender.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    /// Reason recorded by the winning trigger, if any
    pub fn reason(&self) -> Option<StopReason> {
        *self.sender.borrow()
    }

    /// Read-only view for observers
    pub fn subscribe(&self) -> StopObserver {
        StopObserver {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct StopObserver {
    receiver: watch::Receiver<Option<StopReason>>,
}

impl StopObserver {
    /// Wait until the signal fires
    ///
    /// Resolves to `None` only if the signal was dropped without firing.
    pub async fn stopped(&mut self) -> Option<StopReason> {
        match self.receiver.wait_for(|r| r.is_some()).await {
            Ok(reason) => *reason,
            Err(_) => None,
        }
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.receiver.borrow()
    }
}
