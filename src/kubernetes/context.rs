// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Kubeconfig context lookup
//!
//! The snapshot records which kubeconfig context (and cluster) it was taken
//! from. Nothing here talks to the API server.

use anyhow::{Result, anyhow};
use kube::config::Kubeconfig;

/// Context the snapshot is attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterContext {
    pub context: String,
    pub cluster: Option<String>,
}

impl ClusterContext {
    /// Label used in snapshot metadata
    pub fn label(&self) -> String {
        match &self.cluster {
            Some(cluster) if cluster != &self.context => format!("{} ({})", self.context, cluster),
            _ => self.context.clone(),
        }
    }
}

/// Resolve the current context from the user's kubeconfig
pub fn current_context() -> Result<ClusterContext> {
    let kubeconfig = Kubeconfig::read()?;
    resolve_context(&kubeconfig)
}

fn resolve_context(kubeconfig: &Kubeconfig) -> Result<ClusterContext> {
    let context_name = kubeconfig
        .current_context
        .clone()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| anyhow!("No current context in kubeconfig"))?;

    let named = kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == context_name)
        .ok_or_else(|| anyhow!("Context '{}' not found in kubeconfig", context_name))?;

    Ok(ClusterContext {
        cluster: named
            .context
            .as_ref()
            .map(|c| c.cluster.clone())
            .filter(|c| !c.is_empty()),
        context: context_name,
    })
}
