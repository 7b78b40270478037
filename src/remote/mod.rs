//! The narrow command capability consumed by installation, customization,
//! and extraction.
//!
//! Collaborators only ever see [`RemoteRunner::exec`], so every command they
//! issue is a string they built themselves through [`crate::shell`].

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tracing::debug;

use crate::ssh::{SshError, StdinSource};

/// Outcome of one remote command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit status reported by the remote shell.
    pub exit_code: i32,
}

impl CommandResult {
    /// Returns `true` when the exit status is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// # use blackbsd::remote::CommandResult;
    /// let result = CommandResult { exit_code: 127, ..CommandResult::default() };
    /// assert!(!result.is_success());
    /// ```
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Boxed future returned by remote runners.
pub type RemoteFuture<'a> = Pin<Box<dyn Future<Output = Result<CommandResult, SshError>> + Send + 'a>>;

/// Executes a command string on a remote host.
pub trait RemoteRunner: Send + Sync {
    /// Runs `command` to completion.
    ///
    /// A non-zero exit status is returned as a [`CommandResult`]; only a
    /// failure to reach or talk to the host is an error.
    fn exec<'a>(&'a self, command: &'a str) -> RemoteFuture<'a>;
}

/// Remote runner that can also drive terminal programs.
pub trait InteractiveRunner: RemoteRunner {
    /// Runs `command` with a pseudo-terminal, streaming `input` to its
    /// standard input.
    fn exec_interactive<'a>(&'a self, command: &'a str, input: StdinSource<'a>)
    -> RemoteFuture<'a>;

    /// Host the commands run on, for diagnostics.
    fn host(&self) -> &str;
}

/// Errors raised by the remote steps of a build.
#[derive(Debug, Error)]
pub enum StepError {
    /// The command could not be executed at all.
    #[error("{operation}: {source}")]
    Exec {
        /// Step being performed.
        operation: String,
        /// Underlying transport failure.
        source: SshError,
    },
    /// The command exited with a status the step does not accept.
    #[error("{operation} failed with exit code {exit_code}: {stderr}")]
    Command {
        /// Step being performed.
        operation: String,
        /// Exit status.
        exit_code: i32,
        /// Trimmed standard error.
        stderr: String,
    },
    /// A path failed validation before any command was built.
    #[error("{operation}: invalid path {path:?}")]
    InvalidPath {
        /// Step being performed.
        operation: String,
        /// Rejected path.
        path: String,
    },
    /// The command succeeded but its output could not be interpreted.
    #[error("{operation}: unexpected output {output:?}")]
    Parse {
        /// Step being performed.
        operation: String,
        /// Offending output.
        output: String,
    },
    /// The step did not finish in time.
    #[error("{operation} on {host} did not finish within {timeout_secs}s (last state: {last_state})")]
    DeadlineExceeded {
        /// Step being performed.
        operation: String,
        /// Host the step ran on.
        host: String,
        /// Time budget in seconds.
        timeout_secs: u64,
        /// What the step was doing when the budget ran out.
        last_state: String,
    },
}

impl StepError {
    /// Builds an [`StepError::InvalidPath`] for `path`.
    #[must_use]
    pub fn invalid_path(operation: &str, path: &str) -> Self {
        Self::InvalidPath {
            operation: operation.to_owned(),
            path: path.to_owned(),
        }
    }
}

/// Runs `command` and accepts exit status zero plus any status in
/// `tolerated`.
///
/// # Errors
///
/// Returns [`StepError::Exec`] when the command cannot run and
/// [`StepError::Command`] for any other exit status.
pub async fn run_checked<R>(
    runner: &R,
    operation: &str,
    command: &str,
    tolerated: &[i32],
) -> Result<CommandResult, StepError>
where
    R: RemoteRunner + ?Sized,
{
    debug!(operation, command, "running remote command");
    let result = runner
        .exec(command)
        .await
        .map_err(|source| StepError::Exec {
            operation: operation.to_owned(),
            source,
        })?;
    if result.is_success() || tolerated.contains(&result.exit_code) {
        return Ok(result);
    }
    Err(StepError::Command {
        operation: operation.to_owned(),
        exit_code: result.exit_code,
        stderr: result.stderr.trim().to_owned(),
    })
}
