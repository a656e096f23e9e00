use std::collections::{BTreeMap, BTreeSet};

use comfy_table::{Table, presets::ASCII_BORDERS_ONLY_CONDENSED};
use console::style;

use crate::models::ResourceRecord;

/// Per-kind counts and namespaces seen in a snapshot
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResourceSummary {
    pub by_kind: BTreeMap<String, usize>,
    pub namespaces: BTreeSet<String>,
}

impl ResourceSummary {
    pub fn from_resources(resources: &[ResourceRecord]) -> Self {
        let mut summary = Self::default();
        for resource in resources {
            *summary.by_kind.entry(resource.kind.clone()).or_default() += 1;
            if let Some(namespace) = resource.namespace()
                && !namespace.is_empty()
            {
                summary.namespaces.insert(namespace.to_string());
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.by_kind.values().sum()
    }

    pub fn render(&self) -> String {
        if self.by_kind.is_empty() {
            return "(0 resources)".to_string();
        }

        let mut table = Table::new();
        table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);
        table.set_header(vec!["KIND", "COUNT"]);
        for (kind, count) in &self.by_kind {
            table.add_row(vec![kind.clone(), count.to_string()]);
        }

        let mut output = table.to_string();
        if !self.namespaces.is_empty() {
            let namespaces: Vec<&str> = self.namespaces.iter().map(String::as_str).collect();
            output.push_str(&format!("\nNamespaces: {}", namespaces.join(", ")));
        }
        output
    }
}

/// Print the resource summary to stdout
pub fn print_summary(resources: &[ResourceRecord]) {
    let summary = ResourceSummary::from_resources(resources);
    println!(
        "{} {} resources",
        style("Resource Summary:").bold(),
        summary.total()
    );
    println!("{}", summary.render());
}
