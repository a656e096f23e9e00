// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource collection engine
//!
//! Subscribes to the MeshSync topics, deduplicates the resources it hears about,
//! and stops on whichever comes first: convergence, the collection timer, or
//! external cancellation. The collected set is then filtered.
//!
//! ```text
//! bus ─┬─ topic ─┐
//!      ├─ topic ─┼─► decode ─► channel ─► dedup ─► filter ─► result
//!      └─ topic ─┘                          │
//!                            convergence ◄──┘ (count)
//! ```

pub mod bus;
mod convergence;
mod envelope;
mod fanin;
mod filter;
mod preview;
mod session;
mod signal;

pub use bus::{MessageBus, NatsBus};
pub use convergence::ConvergenceConfig;
pub use filter::{FilterOptions, filter_resources};
pub use preview::preview_resources;
pub use signal::StopReason;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::ResourceRecord;
use crate::progress::{ProgressHandle, create_progress_handle};
use fanin::FanIn;
use session::{Admission, CollectionSession};
use signal::StopSignal;

/// Candidate topics MeshSync may publish to, depending on version and config
pub const DEFAULT_TOPICS: &[&str] = &[
    "meshery.meshsync.core",
    "meshery.meshsync.core.resource",
    "meshery.meshsync",
    "meshery.meshsync.resource",
];

/// Default collection time budget
pub const DEFAULT_COLLECTION_TIME: Duration = Duration::from_secs(30);

/// Buffer between topic forwarders and ingestion
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Errors that abort a collection run
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("failed to connect to NATS at {url}")]
    Connect {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to subscribe to any NATS topics (tried {})", .topics.join(", "))]
    NoSubscriptions { topics: Vec<String> },
}

/// Lifecycle of a run, reported in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionPhase {
    Idle,
    Subscribing,
    Collecting,
    Draining,
    Done,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub topics: Vec<String>,
    pub collection_time: Duration,
    pub convergence: ConvergenceConfig,
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            collection_time: DEFAULT_COLLECTION_TIME,
            convergence: ConvergenceConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct Collection {
    /// Filtered resources in first-seen order
    pub resources: Vec<ResourceRecord>,
    /// Distinct resources seen before filtering
    pub collected: usize,
    pub reason: StopReason,
    pub elapsed: Duration,
}

pub struct Collector {
    config: CollectorConfig,
    progress: ProgressHandle,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            progress: create_progress_handle(),
        }
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    fn enter(&self, phase: CollectionPhase) {
        debug!(phase = ?phase, "Collection phase");
    }

    /// Connect to the NATS server at `url` and run one collection
    ///
    /// The connection is closed once the run ends, whatever the outcome.
    pub async fn collect_from(
        &self,
        url: &str,
        filters: &FilterOptions,
        cancel: impl Future<Output = ()>,
    ) -> Result<Collection, CollectError> {
        self.enter(CollectionPhase::Idle);
        self.progress.connecting(url);

        let bus = NatsBus::connect(url)
            .await
            .map_err(|e| CollectError::Connect {
                url: url.to_string(),
                source: e.into(),
            })?;

        let result = self.collect(&bus, filters, cancel).await;

        if let Err(e) = bus.close().await {
            warn!(error = %e, "Error closing bus connection");
        }
        result
    }

    /// Run one collection over an established bus connection
    pub async fn collect(
        &self,
        bus: &dyn MessageBus,
        filters: &FilterOptions,
        cancel: impl Future<Output = ()>,
    ) -> Result<Collection, CollectError> {
        let start = Instant::now();
        self.enter(CollectionPhase::Subscribing);

        let (sink, mut records) = mpsc::channel(self.config.channel_capacity);
        let fanin = FanIn::open(bus, &self.config.topics, sink).await?;

        self.enter(CollectionPhase::Collecting);
        self.progress.collecting(fanin.subscription_count());

        let session = CollectionSession::new();
        let signal = Arc::new(StopSignal::new());
        let monitor = tokio::spawn(convergence::monitor(
            self.config.convergence.clone(),
            session.counter(),
            Arc::clone(&signal),
        ));

        let deadline = tokio::time::sleep(self.config.collection_time);
        tokio::pin!(deadline);
        tokio::pin!(cancel);
        let mut stopped = signal.subscribe();
        let mut open = true;

        loop {
            tokio::select! {
                _ = stopped.stopped() => break,
                _ = &mut deadline => {
                    signal.fire(StopReason::TimedOut);
                    break;
                }
                _ = &mut cancel => {
                    signal.fire(StopReason::Cancelled);
                    break;
                }
                record = records.recv(), if open => match record {
                    Some(record) => {
                        if session.admit(record) == Admission::Accepted {
                            self.progress.resource_collected(session.count());
                        }
                    }
                    None => {
                        debug!("All topic subscriptions closed");
                        open = false;
                    }
                },
            }
        }

        let reason = signal.reason().unwrap_or(StopReason::Cancelled);
        info!(reason = %reason, count = session.count(), "Collection stopped");

        self.enter(CollectionPhase::Draining);
        self.progress.draining(reason);
        drop(records);
        fanin.close().await;
        if let Err(e) = monitor.await {
            warn!(error = %e, "Convergence monitor terminated abnormally");
        }

        let collected = session.take_records();
        let total = collected.len();
        let resources = filter_resources(collected, filters);
        let elapsed = start.elapsed();

        info!(
            collected = total,
            kept = resources.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Collection complete"
        );
        self.progress
            .complete(total, resources.len(), elapsed.as_millis() as u64);
        self.enter(CollectionPhase::Done);

        Ok(Collection {
            resources,
            collected: total,
            reason,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::bus::memory::MemoryBus;
    use std::sync::atomic::Ordering;

    const TOPIC: &str = "meshery.meshsync.core";

    fn config() -> CollectorConfig {
        CollectorConfig {
            collection_time: Duration::from_secs(30),
            ..Default::default()
        }
    }

    fn event(kind: &str, namespace: &str, name: &str) -> String {
        format!(
            r#"{{"Object": {{"kind": "{}", "metadata": {{"name": "{}", "namespace": "{}"}}}}, "EventType": "ADDED"}}"#,
            kind, name, namespace
        )
    }

    fn keys(records: &[ResourceRecord]) -> Vec<String> {
        records.iter().filter_map(|r| r.identity_key()).collect()
    }

    fn publish_scenario(bus: &MemoryBus) {
        bus.publish(TOPIC, event("Pod", "default", "a"));
        bus.publish(TOPIC, event("Pod", "default", "a"));
        bus.publish(TOPIC, event("Pod", "default", "b"));
        bus.publish(TOPIC, event("Namespace", "", "kube-system"));
    }

    /// Run a collection while publishing from a side task
    async fn run_with<F>(
        bus: Arc<MemoryBus>,
        collector: &Collector,
        filters: &FilterOptions,
        publish: F,
    ) -> Result<Collection, CollectError>
    where
        F: FnOnce(&MemoryBus) + Send + 'static,
    {
        let publisher = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                // Let subscriptions register first
                tokio::time::sleep(Duration::from_millis(10)).await;
                publish(&bus);
            })
        };
        let result = collector
            .collect(bus.as_ref(), filters, std::future::pending())
            .await;
        publisher.await.unwrap();
        result
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_dedup_and_order() {
        let bus = Arc::new(MemoryBus::new());
        let collector = Collector::new(config());

        let collection = run_with(bus, &collector, &FilterOptions::default(), publish_scenario)
            .await
            .unwrap();

        assert_eq!(
            keys(&collection.resources),
            vec!["Pod/default/a", "Pod/default/b", "Namespace//kube-system"]
        );
        assert_eq!(collection.collected, 3);
        // Three resources never reach the convergence floor
        assert_eq!(collection.reason, StopReason::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_namespace_filter() {
        let bus = Arc::new(MemoryBus::new());
        let collector = Collector::new(config());
        let filters = FilterOptions {
            namespace: Some("default".to_string()),
            ..Default::default()
        };

        let collection = run_with(bus, &collector, &filters, publish_scenario)
            .await
            .unwrap();

        assert_eq!(
            keys(&collection.resources),
            vec!["Pod/default/a", "Pod/default/b"]
        );
        assert_eq!(collection.collected, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_before_timeout() {
        let bus = Arc::new(MemoryBus::new());
        let collector = Collector::new(config());

        let collection = run_with(bus, &collector, &FilterOptions::default(), |bus| {
            for i in 0..25 {
                bus.publish(TOPIC, event("Pod", "default", &format!("p{}", i)));
            }
        })
        .await
        .unwrap();

        assert_eq!(collection.reason, StopReason::Converged);
        assert_eq!(collection.resources.len(), 25);
        assert!(collection.elapsed < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bound() {
        let bus = Arc::new(MemoryBus::new());
        let collector = Collector::new(CollectorConfig {
            collection_time: Duration::from_secs(5),
            ..Default::default()
        });

        // Keeps producing new keys, so convergence never fires
        let producer = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                for i in 0..100 {
                    bus.publish(TOPIC, event("Pod", "default", &format!("p{}", i)));
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            })
        };

        let collection = collector
            .collect(bus.as_ref(), &FilterOptions::default(), std::future::pending())
            .await
            .unwrap();
        producer.abort();

        assert_eq!(collection.reason, StopReason::TimedOut);
        assert!(collection.elapsed <= Duration::from_secs(5) + ConvergenceConfig::default().tick);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancellation() {
        let bus = MemoryBus::new();
        let collector = Collector::new(config());
        let cancel = tokio::time::sleep(Duration::from_secs(1));

        let collection = collector
            .collect(&bus, &FilterOptions::default(), cancel)
            .await
            .unwrap();

        assert_eq!(collection.reason, StopReason::Cancelled);
        assert!(collection.resources.is_empty());
        assert_eq!(collection.elapsed, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_resources_is_not_an_error() {
        let bus = MemoryBus::new();
        let collector = Collector::new(CollectorConfig {
            collection_time: Duration::from_secs(2),
            ..Default::default()
        });

        let collection = collector
            .collect(&bus, &FilterOptions::default(), std::future::pending())
            .await
            .unwrap();

        assert!(collection.resources.is_empty());
        assert_eq!(collection.reason, StopReason::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_subscriptions_is_fatal() {
        let mut bus = MemoryBus::new();
        for topic in DEFAULT_TOPICS {
            bus = bus.failing_on(topic);
        }
        let collector = Collector::new(config());

        let err = collector
            .collect(&bus, &FilterOptions::default(), std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, CollectError::NoSubscriptions { .. }));
        assert!(err.to_string().contains("meshery.meshsync.core"));
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal() {
        let collector = Collector::new(config());

        let result = collector
            .collect_from("nats://127.0.0.1:1", &FilterOptions::default(), std::future::pending())
            .await;

        match result {
            Err(CollectError::Connect { url, .. }) => assert_eq!(url, "nats://127.0.0.1:1"),
            Err(other) => panic!("Expected connect error, got {}", other),
            Ok(collection) => panic!("Expected connect error, got {:?}", collection),
        }
        assert_eq!(collector.progress().collected(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_subscription_failure_still_collects() {
        let bus = Arc::new(MemoryBus::new().failing_on(TOPIC));
        let collector = Collector::new(CollectorConfig {
            collection_time: Duration::from_secs(2),
            ..Default::default()
        });

        let collection = run_with(bus, &collector, &FilterOptions::default(), |bus| {
            bus.publish("meshery.meshsync", event("Service", "default", "web"));
        })
        .await
        .unwrap();

        assert_eq!(keys(&collection.resources), vec!["Service/default/web"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriptions_released_on_exit() {
        let bus = MemoryBus::new();
        let collector = Collector::new(CollectorConfig {
            collection_time: Duration::from_secs(1),
            ..Default::default()
        });

        collector
            .collect(&bus, &FilterOptions::default(), std::future::pending())
            .await
            .unwrap();

        assert_eq!(bus.unsubscribed.load(Ordering::SeqCst), DEFAULT_TOPICS.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_mode_excludes_configmap() {
        let bus = Arc::new(MemoryBus::new());
        let collector = Collector::new(CollectorConfig {
            collection_time: Duration::from_secs(2),
            ..Default::default()
        });
        let filters = FilterOptions {
            fast_mode: true,
            ..Default::default()
        };

        let collection = run_with(bus, &collector, &filters, |bus| {
            bus.publish(TOPIC, event("Pod", "default", "a"));
            bus.publish(TOPIC, event("ConfigMap", "default", "settings"));
        })
        .await
        .unwrap();

        assert_eq!(keys(&collection.resources), vec!["Pod/default/a"]);
        assert_eq!(collection.collected, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reports_collected_resources() {
        let bus = Arc::new(MemoryBus::new());
        let collector = Collector::new(CollectorConfig {
            collection_time: Duration::from_secs(2),
            ..Default::default()
        });
        let progress = Arc::clone(collector.progress());

        run_with(bus, &collector, &FilterOptions::default(), publish_scenario)
            .await
            .unwrap();

        assert_eq!(progress.collected(), 3);
    }
}
