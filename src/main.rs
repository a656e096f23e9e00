// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod agent;
mod cli;
mod collector;
pub mod config;
mod kubernetes;
mod models;
mod output;
pub mod progress;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use agent::MeshSyncAgent;
use cli::Args;
use collector::{Collection, CollectError, Collector, FilterOptions, preview_resources};
use output::{Snapshot, format_size, print_summary, save_snapshot, timestamped_filename};
use progress::{ProgressUpdate, create_spinner};

/// Extra time allowed past the collection budget before the run is cancelled
const DEADLINE_GRACE: Duration = Duration::from_secs(5);

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // Rotate daily or at 10MB, keeping up to 5 files
    let log_path = log_dir.join("meshsync-snapshot.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, guard) = file_appender.get_non_blocking_appender();
    // Keep the background writer alive for the life of the process
    std::mem::forget(guard);

    let filter = if verbose {
        "meshsync_snapshot=debug"
    } else {
        "meshsync_snapshot=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    if verbose {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
            return;
        }
    }

    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to listen for Ctrl-C, relying on the collection deadline");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = config::Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {:#}", e);
        config::Config::default()
    });
    if let Some(url) = &args.nats_url {
        config.nats_url = url.clone();
    }
    if let Some(secs) = args.time {
        config.collection_time_secs = secs;
    }

    if args.save_config {
        config.save()?;
        println!("Configuration saved to {}", config::Config::config_path()?.display());
        return Ok(());
    }

    let filters = args.filter_options();

    if args.preview {
        return run_preview(&args, &filters);
    }

    run_snapshot(&args, &config, &filters).await
}

fn run_preview(args: &Args, filters: &FilterOptions) -> Result<()> {
    println!("Preview mode - showing what would be captured without actually running");
    let resources = preview_resources(filters);
    if !args.quiet {
        print_summary(&resources);
    }
    println!("Preview completed. No snapshot was created.");
    Ok(())
}

async fn run_snapshot(args: &Args, config: &config::Config, filters: &FilterOptions) -> Result<()> {
    let collector_config = config.collector_config();
    let collection_time = collector_config.collection_time;

    let output_path = if args.auto_name {
        timestamped_filename(&args.output, &chrono::Local::now())
    } else {
        args.output.clone()
    };

    if !args.quiet {
        println!("Starting kubectl meshsync-snapshot...");
    }

    let binary = match &args.meshsync {
        Some(path) => Some(path.clone()),
        None if args.auto_meshsync => Some(agent::find_binary()?),
        None => None,
    };

    let agent = match &binary {
        Some(binary) => {
            if !args.quiet {
                println!("Starting MeshSync from: {}", binary.display());
            }
            Some(MeshSyncAgent::start(binary, &config.nats_url, args.verbose).await?)
        }
        None => None,
    };

    let collector = Collector::new(collector_config);
    let deadline = collection_time + DEADLINE_GRACE;
    let cancel = async move {
        tokio::select! {
            _ = shutdown_signal() => {
                eprintln!("\nInterrupted. Cleaning up...");
            }
            _ = tokio::time::sleep(deadline) => {
                warn!(deadline_secs = deadline.as_secs(), "Collection deadline reached");
            }
        }
    };

    let result = if args.quiet {
        collector.collect_from(&config.nats_url, filters, cancel).await
    } else {
        collect_with_spinner(&collector, &config.nats_url, filters, cancel).await
    };

    if let Some(agent) = agent {
        if !args.quiet {
            println!("Terminating MeshSync process...");
            if let Some(path) = agent.log_path() {
                println!("MeshSync logs available at: {}", path.display());
            }
        }
        if let Err(e) = agent.stop().await {
            warn!(error = %e, "Failed to stop MeshSync");
        }
    }

    let collection = result.context("Error collecting resources")?;

    if args.verbose {
        println!(
            "Collected {} resources, filtered to {} resources",
            collection.collected,
            collection.resources.len()
        );
    }

    let cluster_context = match kubernetes::current_context() {
        Ok(ctx) => Some(ctx.label()),
        Err(e) => {
            info!(error = %e, "No kubeconfig context recorded in snapshot");
            None
        }
    };

    let output_path = std::path::absolute(&output_path).unwrap_or(output_path);
    if !args.quiet {
        println!("Saving snapshot to {}...", output_path.display());
    }

    let snapshot = Snapshot::new(
        &collection.resources,
        filters,
        collection_time,
        cluster_context,
        chrono::Utc::now(),
    );
    let written = save_snapshot(&snapshot, &output_path, args.format)
        .context("Error saving snapshot")?;

    if !args.quiet {
        println!("Snapshot file size: {}", format_size(written));
        print_summary(&collection.resources);
        println!(
            "{} Snapshot created successfully with {} resources",
            style("✓").green(),
            collection.resources.len()
        );
        println!("You can now import this snapshot into Meshery");
        println!("Snapshot saved to: {}", output_path.display());
    }

    Ok(())
}

/// Run a collection while a spinner follows its progress updates
async fn collect_with_spinner(
    collector: &Collector,
    url: &str,
    filters: &FilterOptions,
    cancel: impl std::future::Future<Output = ()>,
) -> Result<Collection, CollectError> {
    let spinner = create_spinner("Collecting resources");
    let mut progress_rx = collector.progress().subscribe();

    let result = {
        let mut collect_handle = Box::pin(collector.collect_from(url, filters, cancel));

        loop {
            tokio::select! {
                biased;
                result = &mut collect_handle => {
                    break result;
                }
                progress = progress_rx.recv() => {
                    match progress {
                        Ok(ProgressUpdate::Connecting { url }) => {
                            spinner.set_message(format!("Connecting to {}...", url));
                        }
                        Ok(ProgressUpdate::Collecting { topics }) => {
                            spinner.set_message(format!("Collecting resources from {} topics", topics));
                        }
                        Ok(ProgressUpdate::ResourceCollected { total }) => {
                            spinner.set_message(format!("Collecting resources ({} found)", total));
                        }
                        Ok(ProgressUpdate::Draining { reason }) => {
                            spinner.set_message(format!("Collection {}, finishing...", reason));
                        }
                        _ => {}
                    }
                }
            }
        }
    };

    match &result {
        Ok(collection) => spinner.finish_with_message(format!(
            "Collecting resources {} ({} found, {} after {:.1}s)",
            style("✓").green(),
            collection.collected,
            collection.reason,
            collection.elapsed.as_secs_f64()
        )),
        Err(_) => spinner.finish_and_clear(),
    }
    result
}
