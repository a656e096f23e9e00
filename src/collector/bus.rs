// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Message bus abstraction and the NATS implementation
//!
//! The collector only needs to subscribe to a subject, pull raw payloads, and
//! release the subscription. Keeping that behind a trait lets the engine run
//! against an in-memory bus in tests.

use std::time::Duration;

use anyhow::{Context, Result};
use async_nats::{ConnectOptions, Event};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

/// Timeout for the initial connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Delay between reconnect attempts
const RECONNECT_DELAY: Duration = Duration::from_millis(300);

/// Reconnect attempts before the client gives up
const MAX_RECONNECTS: usize = 5;

/// An active subscription on one topic
#[async_trait]
pub trait Subscription: Send {
    /// Next raw payload, or `None` once the subscription is closed
    async fn next_message(&mut self) -> Option<Vec<u8>>;

    /// Release the subscription on the server
    async fn unsubscribe(&mut self) -> Result<()>;
}

/// Connection to a publish/subscribe transport
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>>;

    /// Flush and close the connection
    async fn close(&self) -> Result<()>;
}

/// NATS connection used for a single collection run
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to the NATS server at `url`
    ///
    /// Reconnects after a disconnect are handled by the client for the lifetime
    /// of the connection; connection events are logged.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = ConnectOptions::new()
            .connection_timeout(CONNECT_TIMEOUT)
            .max_reconnects(MAX_RECONNECTS)
            .reconnect_delay_callback(|_attempts| RECONNECT_DELAY)
            .event_callback(|event| async move {
                match event {
                    Event::Connected => debug!("NATS connected"),
                    Event::Disconnected => warn!("NATS disconnected"),
                    other => debug!(event = %other, "NATS connection event"),
                }
            });

        let client = options
            .connect(url)
            .await
            .with_context(|| format!("Failed to connect to NATS at {}", url))?;

        info!(url = %url, "Connected to NATS");
        Ok(Self { client })
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>> {
        let subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .with_context(|| format!("Failed to subscribe to {}", topic))?;
        Ok(Box::new(NatsSubscription { subscriber }))
    }

    async fn close(&self) -> Result<()> {
        self.client
            .drain()
            .await
            .context("Failed to close NATS connection")?;
        debug!("NATS connection closed");
        Ok(())
    }
}

struct NatsSubscription {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn next_message(&mut self) -> Option<Vec<u8>> {
        self.subscriber
            .next()
            .await
            .map(|message| message.payload.to_vec())
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.subscriber
            .unsubscribe()
            .await
            .context("Failed to unsubscribe")?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    //! In-process bus used by the collector tests

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    #[derive(Default)]
    pub struct MemoryBus {
        /// Topics that refuse subscriptions
        failing: HashSet<String>,
        senders: Mutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
        pub unsubscribed: std::sync::Arc<AtomicUsize>,
        pub closed: AtomicUsize,
    }

    impl MemoryBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_on(mut self, topic: &str) -> Self {
            self.failing.insert(topic.to_string());
            self
        }

        /// Publish a payload to a topic; returns false if nobody subscribed
        pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
            let senders = self.senders.lock().unwrap();
            match senders.get(topic) {
                Some(tx) => tx.send(payload.into()).is_ok(),
                None => false,
            }
        }

        pub fn subscribed_topics(&self) -> Vec<String> {
            let mut topics: Vec<_> = self.senders.lock().unwrap().keys().cloned().collect();
            topics.sort();
            topics
        }
    }

    #[async_trait]
    impl MessageBus for MemoryBus {
        async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>> {
            if self.failing.contains(topic) {
                anyhow::bail!("permissions violation for subscription to {}", topic);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            self.senders.lock().unwrap().insert(topic.to_string(), tx);
            Ok(Box::new(MemorySubscription {
                receiver: rx,
                unsubscribed: std::sync::Arc::clone(&self.unsubscribed),
            }))
        }

        async fn close(&self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MemorySubscription {
        receiver: mpsc::UnboundedReceiver<Vec<u8>>,
        unsubscribed: std::sync::Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Subscription for MemorySubscription {
        async fn next_message(&mut self) -> Option<Vec<u8>> {
            self.receiver.recv().await
        }

        async fn unsubscribe(&mut self) -> Result<()> {
            self.receiver.close();
            self.unsubscribed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
