// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource records as MeshSync publishes them on the bus
//!
//! Field names follow the MeshSync JSON wire format. Every field is optional on
//! input so partially populated publications still decode; `spec` and `status`
//! are carried through untouched.

use serde::{Deserialize, Deserializer, Serialize};

/// A single cluster object discovered by MeshSync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "apiVersion", default, deserialize_with = "null_as_default")]
    pub api_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(rename = "metadata", default)]
    pub meta: Option<ResourceMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cluster_id: String,
    #[serde(default)]
    pub pattern_resource: Option<serde_json::Value>,
    #[serde(default)]
    pub component_metadata: Option<serde_json::Map<String, serde_json::Value>>,

    // Secondary fields carried by ConfigMaps and Secrets
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub immutable: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub data: String,
    #[serde(rename = "binaryData", default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub binary_data: String,
    #[serde(rename = "stringData", default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub string_data: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub secret_type: String,
}

/// Object metadata for a resource record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMeta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub generate_name: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub self_link: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uid: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub generation: i64,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub creation_timestamp: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub deletion_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_grace_period_seconds: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<KeyValue>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<KeyValue>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub owner_references: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub finalizers: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub managed_fields: String,
    #[serde(rename = "cluster_id", default, deserialize_with = "null_as_default")]
    pub cluster_id: String,
}

/// Label or annotation entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unique_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub value: String,
}

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl ResourceRecord {
    /// Build a minimal record, mostly useful for samples and tests
    pub fn new(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            meta: Some(ResourceMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Attach a label, returning the record
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        let meta = self.meta.get_or_insert_with(ResourceMeta::default);
        meta.labels.push(KeyValue {
            key: key.to_string(),
            value: value.to_string(),
            ..Default::default()
        });
        self
    }

    /// Logical identity `kind/namespace/name`
    ///
    /// Returns `None` when the record has no metadata, since such records can
    /// neither be deduplicated nor reported.
    pub fn identity_key(&self) -> Option<String> {
        let meta = self.meta.as_ref()?;
        Some(format!("{}/{}/{}", self.kind, meta.namespace, meta.name))
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta.as_ref().map(|m| m.namespace.as_str())
    }

    pub fn labels(&self) -> &[KeyValue] {
        self.meta.as_ref().map(|m| m.labels.as_slice()).unwrap_or(&[])
    }
}
