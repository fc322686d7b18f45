//! Single-instance process lifecycle.
//!
//! A PID file marks the running instance. A file whose process is gone is
//! stale and does not block a new start.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle error
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Reading or writing the PID file failed
    #[error("PID file {path}: {source}")]
    Io {
        /// PID file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Another instance is already running
    #[error("claude-router is already running (pid {0})")]
    AlreadyRunning(i32),

    /// Signalling the running instance failed
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        /// Target process
        pid: i32,
        /// Underlying error
        #[source]
        source: Errno,
    },
}

/// PID file of the gateway process
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// PID file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.claude-router/.claude-router.pid`
    ///
    /// # Errors
    /// Returns error if the home directory cannot be determined
    pub fn default_location() -> Result<Self, gateway_config::ConfigError> {
        gateway_config::pid_file_path().map(Self::new)
    }

    /// File path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded in the file, if any
    #[must_use]
    pub fn read_pid(&self) -> Option<i32> {
        let text = fs::read_to_string(&self.path).ok()?;
        text.trim().parse::<i32>().ok().filter(|pid| *pid > 0)
    }

    /// PID of a live recorded process
    #[must_use]
    pub fn running_pid(&self) -> Option<i32> {
        self.read_pid().filter(|pid| process_alive(*pid))
    }

    /// Whether the recorded process is alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running_pid().is_some()
    }

    /// Record the current process, refusing if another instance is alive
    ///
    /// # Errors
    /// Returns `AlreadyRunning` or an I/O error
    pub fn acquire(&self) -> Result<(), LifecycleError> {
        if let Some(pid) = self.running_pid() {
            if pid != current_pid() {
                return Err(LifecycleError::AlreadyRunning(pid));
            }
        }
        self.save_pid()
    }

    /// Write the current PID
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn save_pid(&self) -> Result<(), LifecycleError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io(source))?;
        }
        let pid = current_pid();
        fs::write(&self.path, pid.to_string()).map_err(|source| self.io(source))?;
        debug!(pid, path = %self.path.display(), "PID file written");
        Ok(())
    }

    /// Remove the PID file; a missing file is fine
    pub fn cleanup(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "PID file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove PID file"),
        }
    }

    /// Ask the running instance to stop with SIGTERM.
    ///
    /// Returns the signalled PID, or `None` when nothing was running; a stale
    /// file is removed.
    ///
    /// # Errors
    /// Returns error if the signal cannot be delivered
    pub fn stop(&self) -> Result<Option<i32>, LifecycleError> {
        let Some(pid) = self.running_pid() else {
            self.cleanup();
            return Ok(None);
        };
        kill(Pid::from_raw(pid), Signal::SIGTERM)
            .map_err(|source| LifecycleError::Signal { pid, source })?;
        info!(pid, "Sent SIGTERM");
        Ok(Some(pid))
    }

    fn io(&self, source: io::Error) -> LifecycleError {
        LifecycleError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn current_pid() -> i32 {
    i32::try_from(std::process::id()).unwrap_or(i32::MAX)
}

fn process_alive(pid: i32) -> bool {
    // signal 0 only checks existence; EPERM means it exists under another user
    matches!(kill(Pid::from_raw(pid), None), Ok(()) | Err(Errno::EPERM))
}
