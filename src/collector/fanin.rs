// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Subscription fan-in
//!
//! One forwarding task per topic decodes payloads and pushes resources into a
//! single bounded channel. Forwarders unsubscribe before they exit, and `close`
//! waits for all of them, so subscriptions are released however the run ends.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::CollectError;
use super::bus::{MessageBus, Subscription};
use super::envelope::{self, Decoded};
use crate::models::ResourceRecord;

pub struct FanIn {
    forwarders: Vec<JoinHandle<()>>,
    stop: watch::Sender<bool>,
}

impl FanIn {
    /// Subscribe to every topic and start forwarding into `sink`
    ///
    /// A failing topic is logged and skipped; the call only fails when no topic
    /// could be subscribed.
    pub async fn open(
        bus: &dyn MessageBus,
        topics: &[String],
        sink: mpsc::Sender<ResourceRecord>,
    ) -> Result<Self, CollectError> {
        let (stop, _) = watch::channel(false);
        let mut forwarders = Vec::with_capacity(topics.len());

        for topic in topics {
            debug!(topic = %topic, "Subscribing to topic");
            match bus.subscribe(topic).await {
                Ok(subscription) => {
                    forwarders.push(tokio::spawn(forward(
                        topic.clone(),
                        subscription,
                        sink.clone(),
                        stop.subscribe(),
                    )));
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Failed to subscribe to topic");
                }
            }
        }

        if forwarders.is_empty() {
            return Err(CollectError::NoSubscriptions {
                topics: topics.to_vec(),
            });
        }

        debug!(
            subscribed = forwarders.len(),
            candidates = topics.len(),
            "Topic subscriptions established"
        );
        Ok(Self { forwarders, stop })
    }

    pub fn subscription_count(&self) -> usize {
        self.forwarders.len()
    }

    /// Stop all forwarders and wait for them to unsubscribe
    pub async fn close(self) {
        let _ = self.stop.send(true);
        for forwarder in self.forwarders {
            if let Err(e) = forwarder.await {
                warn!(error = %e, "Topic forwarder terminated abnormally");
            }
        }
    }
}

async fn forward(
    topic: String,
    mut subscription: Box<dyn Subscription>,
    sink: mpsc::Sender<ResourceRecord>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let payload = tokio::select! {
            biased;
            _ = stop.changed() => break,
            message = subscription.next_message() => match message {
                Some(payload) => payload,
                None => {
                    debug!(topic = %topic, "Subscription closed by bus");
                    break;
                }
            },
        };

        let record = match envelope::decode(&payload) {
            Ok(Decoded::Resource(record)) => record,
            Ok(Decoded::Skipped { event_type }) => {
                trace!(topic = %topic, event_type = %event_type, "Ignoring non-add event");
                continue;
            }
            Err(e) => {
                debug!(topic = %topic, error = %e, "Could not decode message");
                continue;
            }
        };

        tokio::select! {
            biased;
            _ = stop.changed() => break,
            sent = sink.send(record) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    if let Err(e) = subscription.unsubscribe().await {
        debug!(topic = %topic, error = %e, "Unsubscribe failed");
    }
}
