use anyhow::{Context, Result};

use super::Snapshot;

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format(snapshot: &Snapshot<'_>) -> Result<String> {
        serde_json::to_string_pretty(snapshot).context("Failed to marshal snapshot to JSON")
    }
}
