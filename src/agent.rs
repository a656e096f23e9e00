// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! MeshSync process supervision
//!
//! Optionally launches a MeshSync binary that publishes to the same bus the
//! collector listens on. The child is killed when the handle is dropped.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Time given to MeshSync to connect before collection starts
const STARTUP_GRACE: Duration = Duration::from_secs(2);

/// Executable name looked up during discovery
const BINARY_NAME: &str = "meshsync";

/// Locate a MeshSync binary
///
/// Tries `./meshsync`, then the directory this plugin was installed in, then `$PATH`.
pub fn find_binary() -> Result<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let path_var = std::env::var_os("PATH");

    find_binary_in(Path::new("."), exe_dir.as_deref(), path_var.as_deref())
        .ok_or_else(|| anyhow!("MeshSync binary not found in current directory, plugin directory or PATH"))
}

fn find_binary_in(cwd: &Path, exe_dir: Option<&Path>, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let local = cwd.join(BINARY_NAME);
    if local.is_file() {
        return Some(local);
    }

    if let Some(dir) = exe_dir {
        let candidate = dir.join(BINARY_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    std::env::split_paths(path_var?)
        .map(|dir| dir.join(BINARY_NAME))
        .find(|candidate| candidate.is_file())
}

/// Log file used when output is not shown on the terminal
pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("meshsync.log")
}

/// Running MeshSync process
pub struct MeshSyncAgent {
    child: Child,
    log_path: Option<PathBuf>,
}

impl MeshSyncAgent {
    /// Start MeshSync publishing to `broker_url`
    ///
    /// In verbose mode its output goes to the terminal, otherwise to a log file.
    pub async fn start(binary: &Path, broker_url: &str, verbose: bool) -> Result<Self> {
        if !binary.exists() {
            return Err(anyhow!("MeshSync binary not found at {}", binary.display()));
        }

        let mut command = Command::new(binary);
        command
            .env("BROKER_URL", broker_address(broker_url))
            .env("LOG_LEVEL", if verbose { "debug" } else { "error" })
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let log_path = if verbose {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            None
        } else {
            let path = log_path();
            match std::fs::File::create(&path).and_then(|f| Ok((f.try_clone()?, f))) {
                Ok((stdout, stderr)) => {
                    command.stdout(stdout).stderr(stderr);
                    Some(path)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not create MeshSync log file");
                    command.stdout(Stdio::null()).stderr(Stdio::null());
                    None
                }
            }
        };

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start MeshSync from {}", binary.display()))?;
        info!(pid = ?child.id(), binary = %binary.display(), "Started MeshSync");

        tokio::time::sleep(STARTUP_GRACE).await;

        if let Some(status) = child.try_wait().context("Failed to poll MeshSync process")? {
            return Err(anyhow!("MeshSync exited immediately ({})", status));
        }

        Ok(Self { child, log_path })
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Kill the process and reap it
    pub async fn stop(mut self) -> Result<()> {
        match self.child.try_wait()? {
            Some(status) => debug!(status = %status, "MeshSync already exited"),
            None => {
                self.child.kill().await.context("Failed to kill MeshSync")?;
                debug!("MeshSync terminated");
            }
        }
        Ok(())
    }
}

/// MeshSync expects `host:port`, without the URL scheme
fn broker_address(url: &str) -> &str {
    url.split_once("://").map(|(_, rest)| rest).unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_address() {
        assert_eq!(broker_address("nats://localhost:4222"), "localhost:4222");
        assert_eq!(broker_address("nats:4222"), "nats:4222");
    }

    fn touch(dir: &Path) -> PathBuf {
        let path = dir.join(BINARY_NAME);
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_find_binary_prefers_current_directory() {
        let cwd = tempfile::tempdir().unwrap();
        let exe_dir = tempfile::tempdir().unwrap();
        let expected = touch(cwd.path());
        touch(exe_dir.path());

        let found = find_binary_in(cwd.path(), Some(exe_dir.path()), None);
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_find_binary_in_plugin_directory() {
        let cwd = tempfile::tempdir().unwrap();
        let exe_dir = tempfile::tempdir().unwrap();
        let bin_dir = tempfile::tempdir().unwrap();
        let expected = touch(exe_dir.path());
        touch(bin_dir.path());

        let path_var = std::env::join_paths([bin_dir.path()]).unwrap();
        let found = find_binary_in(cwd.path(), Some(exe_dir.path()), Some(&path_var));
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_find_binary_on_path() {
        let cwd = tempfile::tempdir().unwrap();
        let empty = tempfile::tempdir().unwrap();
        let bin_dir = tempfile::tempdir().unwrap();
        let expected = touch(bin_dir.path());

        let path_var = std::env::join_paths([empty.path(), bin_dir.path()]).unwrap();
        let found = find_binary_in(cwd.path(), None, Some(&path_var));
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_find_binary_not_found() {
        let cwd = tempfile::tempdir().unwrap();
        let path_var = std::env::join_paths([cwd.path()]).unwrap();
        assert_eq!(find_binary_in(cwd.path(), None, Some(&path_var)), None);
        assert_eq!(find_binary_in(cwd.path(), None, None), None);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let result =
            MeshSyncAgent::start(Path::new("/nonexistent/meshsync"), "nats://localhost:4222", false)
                .await;
        let err = result.err().unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_that_exits_immediately() {
        // `sleep` without arguments exits with an error right away
        let agent = MeshSyncAgent::start(Path::new("/bin/sleep"), "nats://localhost:4222", true)
            .await;
        let err = agent.err().unwrap();
        assert!(err.to_string().contains("exited immediately"));
    }
}
