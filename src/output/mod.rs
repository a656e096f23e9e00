// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod files;
mod json;
mod summary;
mod yaml;

pub use files::{format_size, save_snapshot, timestamped_filename};
pub use json::JsonFormatter;
pub use summary::print_summary;
pub use yaml::YamlFormatter;

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::collector::FilterOptions;
use crate::models::ResourceRecord;

pub const SNAPSHOT_VERSION: &str = "v1";

/// Snapshot document written to disk
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub version: &'static str,
    pub timestamp: String,
    pub resources: &'a [ResourceRecord],
    pub cluster_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_context: Option<String>,
    pub plugin_info: PluginInfo,
    pub filter_options: FilterSummary,
}

#[derive(Debug, Serialize)]
pub struct PluginInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub created_at: String,
}

/// Filters and time budget the snapshot was taken with
#[derive(Debug, Serialize)]
pub struct FilterSummary {
    pub namespaces: String,
    pub resource_type: String,
    pub fast_mode: bool,
    pub collection_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_types: Vec<String>,
}

impl<'a> Snapshot<'a> {
    pub fn new(
        resources: &'a [ResourceRecord],
        filters: &FilterOptions,
        collection_time: Duration,
        cluster_context: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let timestamp = now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        Self {
            version: SNAPSHOT_VERSION,
            timestamp: timestamp.clone(),
            resources,
            cluster_id: cluster_id(resources),
            cluster_context,
            plugin_info: PluginInfo {
                name: "kubectl-meshsync_snapshot",
                version: env!("CARGO_PKG_VERSION"),
                description: "A kubectl plugin for capturing Kubernetes cluster state using MeshSync",
                created_at: timestamp,
            },
            filter_options: FilterSummary {
                namespaces: filters.namespace.clone().unwrap_or_default(),
                resource_type: filters.resource_type.clone().unwrap_or_default(),
                fast_mode: filters.fast_mode,
                collection_time: format!("{:?}", collection_time),
                label_selector: filters.label_selector.clone(),
                excluded_types: filters.exclude_types.clone(),
            },
        }
    }

    pub fn format(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => JsonFormatter::format(self),
            OutputFormat::Yaml => YamlFormatter::format(self),
        }
    }
}

/// Cluster id of the first resource, or "unknown"
fn cluster_id(resources: &[ResourceRecord]) -> String {
    resources
        .first()
        .map(|r| r.cluster_id.clone())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_snapshot_metadata() {
        let mut pod = ResourceRecord::new("Pod", "default", "a");
        pod.cluster_id = "cluster-7".to_string();
        let resources = vec![pod];
        let filters = FilterOptions {
            namespace: Some("default".to_string()),
            exclude_types: vec!["Secret".to_string()],
            ..Default::default()
        };

        let snapshot = Snapshot::new(
            &resources,
            &filters,
            Duration::from_secs(30),
            Some("kind-dev".to_string()),
            fixed_time(),
        );

        assert_eq!(snapshot.version, "v1");
        assert_eq!(snapshot.timestamp, "2025-03-14T09:26:53Z");
        assert_eq!(snapshot.cluster_id, "cluster-7");
        assert_eq!(snapshot.filter_options.collection_time, "30s");
        assert_eq!(snapshot.filter_options.namespaces, "default");
    }

    #[test]
    fn test_cluster_id_unknown_when_empty() {
        assert_eq!(cluster_id(&[]), "unknown");
        assert_eq!(cluster_id(&[ResourceRecord::new("Pod", "a", "b")]), "unknown");
    }

    #[test]
    fn test_optional_filter_fields_omitted() {
        let snapshot = Snapshot::new(
            &[],
            &FilterOptions::default(),
            Duration::from_secs(10),
            None,
            fixed_time(),
        );
        let value = serde_json::to_value(&snapshot).unwrap();
        let filters = &value["filter_options"];
        assert!(filters.get("label_selector").is_none());
        assert!(filters.get("excluded_types").is_none());
        assert!(value.get("cluster_context").is_none());
        assert_eq!(value["resources"], serde_json::json!([]));
    }
}
