//! Physical shutdown action.
//!
//! The last step of a halt sequence hands control to an external
//! executable (typically a wrapper around `shutdown -h now`). Its exit status
//! decides whether the halt call succeeded.

use crate::error::NapError;
use nap_common::rtc::config::ValidatedNapConfig;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Action that powers the board off.
///
/// Implementations block until the action has been carried out or has
/// failed. On real hardware the process usually dies shortly after a
/// successful call.
pub trait ShutdownAction: Send + Sync {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Perform the shutdown.
    ///
    /// # Errors
    /// Return `NapError::ShutdownActionFailed` if the action could not run
    /// or reported failure.
    fn execute(&self) -> Result<(), NapError>;
}

/// Runs an external executable to halt the board.
#[derive(Debug, Clone)]
pub struct CommandShutdown {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandShutdown {
    /// Create an action running `program` with `args`.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build the action from a validated configuration.
    pub fn from_config(config: &ValidatedNapConfig) -> Self {
        Self::new(&config.shutdown_command, config.shutdown_args.clone())
    }

    /// Path of the executable.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl ShutdownAction for CommandShutdown {
    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.display().to_string()
        } else {
            format!("{} {}", self.program.display(), self.args.join(" "))
        }
    }

    fn execute(&self) -> Result<(), NapError> {
        info!("Running shutdown command: {}", self.describe());

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| NapError::ShutdownActionFailed {
                status: "spawn failed".to_string(),
                stderr: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("stdout: {}", stdout.trim_end());
        debug!("stderr: {}", stderr.trim_end());

        if output.status.success() {
            Ok(())
        } else {
            Err(NapError::ShutdownActionFailed {
                status: output.status.to_string(),
                stderr: stderr.trim_end().to_string(),
            })
        }
    }
}
