// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::collector::FilterOptions;

#[derive(Parser, Debug)]
#[command(name = "kubectl-meshsync_snapshot")]
#[command(
    author,
    version,
    about = "Capture a snapshot of cluster state from MeshSync events"
)]
pub struct Args {
    /// Output file for the snapshot
    #[arg(short, long, default_value = "meshsync-snapshot.json")]
    pub output: PathBuf,

    /// Append a timestamp to the output file name
    #[arg(long)]
    pub auto_name: bool,

    /// Filter resources by namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Filter resources by type (e.g., pods, deployments)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub resource_type: Option<String>,

    /// Filter resources by label selector (e.g., app=nginx)
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Snapshot format
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Capture only essential resources (Namespace, Pod, Service, Deployment, Node)
    #[arg(long)]
    pub fast: bool,

    /// Collection time in seconds [default: from config, 30]
    #[arg(long, value_name = "SECONDS")]
    pub time: Option<u64>,

    /// Comma-separated list of resource kinds to exclude
    #[arg(long, value_delimiter = ',', value_name = "KINDS")]
    pub exclude: Vec<String>,

    /// NATS server URL [default: from config, nats://localhost:4222]
    #[arg(long, value_name = "URL")]
    pub nats_url: Option<String>,

    /// Path to a MeshSync binary to launch for the duration of the run
    #[arg(long, value_name = "PATH")]
    pub meshsync: Option<PathBuf>,

    /// Find and launch MeshSync from ./meshsync, the plugin directory or PATH
    #[arg(long, conflicts_with = "meshsync")]
    pub auto_meshsync: bool,

    /// Show what would be captured without connecting or saving
    #[arg(long)]
    pub preview: bool,

    /// Persist the effective NATS URL and collection time to the config file and exit
    #[arg(long)]
    pub save_config: bool,

    /// Minimal output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Detailed output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl Args {
    /// Filters requested on the command line
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            namespace: non_empty(&self.namespace),
            resource_type: non_empty(&self.resource_type),
            label_selector: non_empty(&self.selector),
            exclude_types: self
                .exclude
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            fast_mode: self.fast,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["kubectl-meshsync_snapshot"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.output, PathBuf::from("meshsync-snapshot.json"));
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.time.is_none());
        assert!(args.filter_options().is_empty());
    }

    #[test]
    fn test_short_flags() {
        let args = parse(&["-n", "default", "-t", "pods", "-l", "app=web", "-o", "out.json", "-v"]);
        let filters = args.filter_options();
        assert_eq!(filters.namespace.as_deref(), Some("default"));
        assert_eq!(filters.resource_type.as_deref(), Some("pods"));
        assert_eq!(filters.label_selector.as_deref(), Some("app=web"));
        assert!(args.verbose);
    }

    #[test]
    fn test_exclude_list_trimmed() {
        let args = parse(&["--exclude", "ConfigMap, Secret,,Event"]);
        assert_eq!(
            args.filter_options().exclude_types,
            vec!["ConfigMap", "Secret", "Event"]
        );
    }

    #[test]
    fn test_empty_values_are_unset() {
        let args = parse(&["--namespace", ""]);
        assert!(args.filter_options().namespace.is_none());
    }

    #[test]
    fn test_format_and_time() {
        let args = parse(&["--format", "yaml", "--time", "10", "--fast"]);
        assert_eq!(args.format, OutputFormat::Yaml);
        assert_eq!(args.time, Some(10));
        assert!(args.filter_options().fast_mode);
    }

    #[test]
    fn test_auto_meshsync_conflicts_with_path() {
        assert!(parse(&["--auto-meshsync"]).auto_meshsync);
        let result = Args::try_parse_from([
            "kubectl-meshsync_snapshot",
            "--auto-meshsync",
            "--meshsync",
            "/opt/meshsync",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Args::try_parse_from(["kubectl-meshsync_snapshot", "-q", "-v"]);
        assert!(result.is_err());
    }
}
