//! Errors that end the launcher before or instead of reporting a child exit code.
//!
//! Everything that can be handled inside the wait loop (interrupts, forwarding
//! to a child that already exited) never becomes one of these.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Fatal launcher failures.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The launcher could not work out where its own executable lives.
    #[error("cannot locate the launcher executable: {source}")]
    LauncherLocation {
        #[source]
        source: std::io::Error,
    },

    /// The aria2c binary is not where the provisioner was supposed to put it.
    #[error("aria2c binary not found: {}", .path.display())]
    MissingExecutable { path: PathBuf },

    /// The path exists but cannot be executed.
    #[error("aria2c binary is not executable: {}", .path.display())]
    NotExecutable { path: PathBuf },

    /// The OS refused to create the child process.
    #[error("failed to spawn {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Installing a console signal handler failed before the child was spawned.
    #[error("failed to install {signal} handler: {source}")]
    SignalSetup {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the child failed for a reason other than an interrupt.
    #[error("failed to wait for aria2c (pid {pid}): {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

impl LaunchError {
    /// Whether this failure happened before any child process existed.
    pub fn is_provisioning(&self) -> bool {
        matches!(
            self,
            LaunchError::MissingExecutable { .. } | LaunchError::NotExecutable { .. }
        )
    }
}
