use anyhow::{Context, Result};

use super::Snapshot;

pub struct YamlFormatter;

impl YamlFormatter {
    pub fn format(snapshot: &Snapshot<'_>) -> Result<String> {
        serde_yaml::to_string(snapshot).context("Failed to marshal snapshot to YAML")
    }
}
