//! Guarded execution of the configured command
//!
//! The command runs only when the coordinator reports the lock as acquired. It
//! runs in the foreground with the parent's stdin, stdout and stderr, and the
//! caller keeps the lock session open until it exits.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::{config::CommandLine, lock::LockOutcome, CommandError, Result};

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// What the executor did with the command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// The lock was held and the command ran successfully
    Completed,
    /// The lock was not obtained and the command was not run
    Skipped,
}

/// Runs a command to completion.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Run the command and wait for it. `Ok` only for a zero exit status.
    async fn launch(&self, command: &CommandLine) -> Result<()>;
}

/// Launches the command as a child process with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, command: &CommandLine) -> Result<()> {
        let status = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| CommandError::Spawn {
                program: command.program().to_string(),
                source,
            })?;

        check_status(command.program(), status)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// GUARDED EXECUTOR
// ═══════════════════════════════════════════════════════════════════════════

/// Runs the command if and only if the lock was acquired.
#[derive(Debug, Clone)]
pub struct GuardedExecutor<L> {
    launcher: L,
}

impl<L: Launcher> GuardedExecutor<L> {
    pub const fn new(launcher: L) -> Self {
        Self { launcher }
    }

    /// Consume the lock outcome.
    ///
    /// # Errors
    ///
    /// Returns the cause of a failed lock attempt unchanged, or
    /// `Error::Command` if the command could not start or did not exit cleanly.
    pub async fn run(
        &self,
        outcome: LockOutcome,
        lock_id: u32,
        command: &CommandLine,
    ) -> Result<Execution> {
        match outcome {
            LockOutcome::Acquired => {
                info!(lock_id, "Lock ID {lock_id} obtained successfully!");
                info!(command = %command, "Executing command");
                self.launcher.launch(command).await?;
                info!("Execution finished, exiting and cleaning up lock.");
                Ok(Execution::Completed)
            }
            LockOutcome::NotAcquired => {
                info!(lock_id, "Could not obtain lock {lock_id}, skipping command");
                Ok(Execution::Skipped)
            }
            LockOutcome::Failed(err) => Err(err),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════

fn check_status(program: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }

    let err = match (status.code(), terminating_signal(status)) {
        (Some(code), _) => CommandError::Exited {
            program: program.to_string(),
            code,
        },
        (None, Some(signal)) => CommandError::Signaled {
            program: program.to_string(),
            signal,
        },
        (None, None) => CommandError::Exited {
            program: program.to_string(),
            code: 1,
        },
    };
    Err(err.into())
}

#[cfg(unix)]
fn terminating_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: ExitStatus) -> Option<i32> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════
