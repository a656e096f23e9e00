// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Post-collection filter pipeline
//!
//! Applied once, after collection ends. Checks run in a fixed order:
//! exclusion list, fast-mode whitelist, namespace, resource type, label selector.
//! Surviving records keep their original order.

use crate::models::{KeyValue, ResourceRecord};

/// Kinds kept in fast mode
pub const ESSENTIAL_KINDS: &[&str] = &["Namespace", "Pod", "Service", "Deployment", "Node"];

/// Filters for one run
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub namespace: Option<String>,
    pub resource_type: Option<String>,
    pub label_selector: Option<String>,
    pub exclude_types: Vec<String>,
    pub fast_mode: bool,
}

impl FilterOptions {
    /// True when no filter is configured
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none()
            && self.resource_type.is_none()
            && self.label_selector.is_none()
            && self.exclude_types.is_empty()
            && !self.fast_mode
    }

    pub fn is_type_excluded(&self, kind: &str) -> bool {
        self.exclude_types.iter().any(|t| t == kind)
    }

    pub fn is_fast_mode_relevant(&self, kind: &str) -> bool {
        !self.fast_mode || ESSENTIAL_KINDS.contains(&kind)
    }
}

/// Apply the configured filters
///
/// With no filters configured the input is returned as-is.
pub fn filter_resources(resources: Vec<ResourceRecord>, options: &FilterOptions) -> Vec<ResourceRecord> {
    if options.is_empty() {
        return resources;
    }

    let resource_type = options.resource_type.as_deref().map(str::to_lowercase);

    resources
        .into_iter()
        .filter(|resource| {
            if options.is_type_excluded(&resource.kind) {
                return false;
            }

            if !options.is_fast_mode_relevant(&resource.kind) {
                return false;
            }

            if let (Some(namespace), Some(meta)) = (&options.namespace, &resource.meta)
                && meta.namespace != *namespace
            {
                return false;
            }

            if let Some(ref resource_type) = resource_type
                && !matches_resource_type(&resource.kind, resource_type)
            {
                return false;
            }

            if let (Some(selector), Some(meta)) = (&options.label_selector, &resource.meta)
                && !matches_label_selector(&meta.labels, selector)
            {
                return false;
            }

            true
        })
        .collect()
}

/// Loose singular/plural match of a kind against a lowercased type filter
///
/// Accepts an exact match, `kind + "s"` as the filter, or the kind being the
/// filter plus `"s"`. This is string concatenation, not pluralization:
/// `ingresses` does not match `Ingress`. A one-character filter matches any kind.
fn matches_resource_type(kind: &str, resource_type: &str) -> bool {
    let kind = kind.to_lowercase();
    if kind == resource_type || kind == format!("{}s", resource_type) {
        return true;
    }
    resource_type.len() <= 1 || resource_type == format!("{}s", kind)
}

/// Match a single `key=value` selector against a label list
///
/// Records without labels never match.
fn matches_label_selector(labels: &[KeyValue], selector: &str) -> bool {
    if selector.is_empty() || labels.is_empty() {
        return false;
    }

    let parts: Vec<&str> = selector.split('=').collect();
    let [key, value] = parts.as_slice() else {
        return false;
    };
    let (key, value) = (key.trim(), value.trim());

    labels.iter().any(|label| label.key == key && label.value == value)
}
