// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use super::filter::{FilterOptions, filter_resources};
use crate::models::ResourceRecord;

/// Fixed sample returned in preview mode, run through the normal filter pipeline
pub fn preview_resources(filters: &FilterOptions) -> Vec<ResourceRecord> {
    let sample = vec![
        ResourceRecord::new("Namespace", "", "default"),
        ResourceRecord::new("Pod", "default", "sample-pod"),
        ResourceRecord::new("Deployment", "default", "sample-deployment"),
    ];
    filter_resources(sample, filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_unfiltered() {
        let resources = preview_resources(&FilterOptions::default());
        let kinds: Vec<_> = resources.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Namespace", "Pod", "Deployment"]);
    }

    #[test]
    fn test_preview_respects_filters() {
        let filters = FilterOptions {
            resource_type: Some("deployments".to_string()),
            ..Default::default()
        };
        let resources = preview_resources(&filters);
        assert_eq!(resources.len(), 1);
        assert_eq!(
            resources[0].identity_key().as_deref(),
            Some("Deployment/default/sample-deployment")
        );
    }
}
