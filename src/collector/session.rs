// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-run collection state and deduplication
//!
//! Records are keyed by `kind/namespace/name`; the first record seen for a key
//! wins and later publications are ignored. The accepted list and the seen set
//! share one lock, while the visible count is a lock-free atomic so the
//! convergence monitor never contends with ingestion.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::ResourceRecord;

/// Result of offering a record to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Duplicate,
    /// No metadata, so no identity key
    MissingIdentity,
}

#[derive(Default)]
struct Accumulated {
    records: Vec<ResourceRecord>,
    seen: HashSet<String>,
}

#[derive(Default)]
pub struct CollectionSession {
    state: Mutex<Accumulated>,
    count: Arc<AtomicUsize>,
}

impl CollectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Accumulated> {
        // Push always follows a successful insert, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Offer a record; accepted records are appended in arrival order
    pub fn admit(&self, record: ResourceRecord) -> Admission {
        let Some(key) = record.identity_key() else {
            return Admission::MissingIdentity;
        };

        let mut state = self.lock();
        if !state.seen.insert(key) {
            return Admission::Duplicate;
        }
        state.records.push(record);
        self.count.fetch_add(1, Ordering::Release);
        Admission::Accepted
    }

    /// Number of distinct records accepted so far
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Shared handle to the counter, for readers that must not touch the lock
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.count)
    }

    /// Take the accumulated records, leaving the session empty
    pub fn take_records(&self) -> Vec<ResourceRecord> {
        let mut state = self.lock();
        state.seen.clear();
        self.count.store(0, Ordering::Release);
        std::mem::take(&mut state.records)
    }
}
