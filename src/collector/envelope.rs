// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Decoding of raw bus payloads into resource records
//!
//! MeshSync publishes either an event envelope
//! (`{"Object": {...}, "ObjectType": "...", "EventType": "ADDED"}`) or, depending
//! on version, the bare resource. Both shapes are accepted.

use serde::Deserialize;

use crate::models::ResourceRecord;

/// Event type that marks a resource as present
const ADDED_EVENT: &str = "ADDED";

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "Object", default)]
    object: Option<ResourceRecord>,
    #[serde(rename = "ObjectType", default)]
    #[allow(dead_code)]
    object_type: Option<String>,
    #[serde(rename = "EventType", default)]
    event_type: Option<String>,
}

/// Outcome of decoding one bus message
#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// A resource that is present in the cluster
    Resource(ResourceRecord),
    /// A well-formed event that does not describe current state (update/delete)
    Skipped { event_type: String },
}

/// Decode a raw payload
///
/// Envelopes with an empty or `ADDED` event type yield their object; any other
/// event type is skipped. An envelope without an object falls back to parsing
/// the payload as a bare record, which must carry a kind or metadata.
pub fn decode(payload: &[u8]) -> Result<Decoded, serde_json::Error> {
    if let Ok(envelope) = serde_json::from_slice::<EventEnvelope>(payload) {
        let event_type = envelope.event_type.unwrap_or_default();
        if !event_type.is_empty() && !event_type.eq_ignore_ascii_case(ADDED_EVENT) {
            return Ok(Decoded::Skipped { event_type });
        }
        if let Some(object) = envelope.object {
            return Ok(Decoded::Resource(object));
        }
    }

    let record: ResourceRecord = serde_json::from_slice(payload)?;
    if record.kind.is_empty() && record.meta.is_none() {
        return Err(serde::de::Error::custom(
            "payload is neither an event envelope nor a resource",
        ));
    }
    Ok(Decoded::Resource(record))
}
