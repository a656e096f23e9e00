// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for meshsync-snapshot
//!
//! Collector tuning lives in a config file; command line flags override it.
//! All data is stored under ~/.meshsync-snapshot/:
//! - ~/.meshsync-snapshot/config.json - user configuration
//! - ~/.meshsync-snapshot/log/ - rolling log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collector::{self, CollectorConfig, ConvergenceConfig};

/// Default NATS endpoint MeshSync publishes to
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// Get the base directory (~/.meshsync-snapshot/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".meshsync-snapshot"))
        .context("Could not determine home directory")
}

/// meshsync-snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,
    /// Candidate topics, subscribed in order
    pub topics: Vec<String>,
    /// Collection time budget in seconds
    pub collection_time_secs: u64,
    /// Convergence heuristic tuning
    pub convergence: ConvergenceSettings,
    /// Buffer between topic subscriptions and ingestion
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConvergenceSettings {
    pub warmup_ms: u64,
    pub tick_ms: u64,
    pub stable_ticks: u32,
    pub min_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nats_url: DEFAULT_NATS_URL.to_string(),
            topics: collector::DEFAULT_TOPICS
                .iter()
                .map(|t| t.to_string())
                .collect(),
            collection_time_secs: collector::DEFAULT_COLLECTION_TIME.as_secs(),
            convergence: ConvergenceSettings::default(),
            channel_capacity: collector::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for ConvergenceSettings {
    fn default() -> Self {
        let defaults = ConvergenceConfig::default();
        Self {
            warmup_ms: defaults.warmup.as_millis() as u64,
            tick_ms: defaults.tick.as_millis() as u64,
            stable_ticks: defaults.stable_ticks,
            min_count: defaults.min_count,
        }
    }
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the config file path (~/.meshsync-snapshot/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    /// Build the collector configuration
    ///
    /// The tick interval and channel capacity are floored at 1.
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            topics: self.topics.clone(),
            collection_time: Duration::from_secs(self.collection_time_secs),
            convergence: ConvergenceConfig {
                warmup: Duration::from_millis(self.convergence.warmup_ms),
                tick: Duration::from_millis(self.convergence.tick_ms.max(1)),
                stable_ticks: self.convergence.stable_ticks,
                min_count: self.convergence.min_count,
            },
            channel_capacity: self.channel_capacity.max(1),
        }
    }
}
