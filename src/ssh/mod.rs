//! Remote command execution over the system OpenSSH client.
//!
//! Every command and transfer spawns its own `ssh` or `scp` process, so no
//! connection outlives a single call.
//!
//! # Trust boundary
//!
//! Host-key verification is disabled (`StrictHostKeyChecking=no`, known
//! hosts discarded). Rescue systems generate fresh host keys on every boot,
//! so there is no stable identity to pin. This is only acceptable for the
//! ephemeral, single-tenant servers the builder provisions for itself; do
//! not point [`SshClient`] at any other host.

mod error;
mod key;
mod process;
mod readiness;
mod transfer;

use std::ffi::OsString;
use std::net::IpAddr;
use std::time::Duration;

use camino::Utf8PathBuf;
use tracing::debug;

use crate::remote::{CommandResult, InteractiveRunner, RemoteFuture, RemoteRunner};
use crate::retry::Backoff;

pub use error::SshError;
pub use key::expand_tilde;
pub(crate) use key::read_to_string_ambient;
pub use process::{ProcessFuture, ProcessOutput, ProcessRunner, StdinSource, TokioProcessRunner};

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Exit status OpenSSH uses for its own failures.
pub const SSH_CONNECTION_FAILURE: i32 = 255;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READY_INITIAL_INTERVAL: Duration = Duration::from_secs(2);
const READY_TIMEOUT: Duration = Duration::from_secs(300);

/// Client-side settings shared by every session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshSettings {
    /// Port the remote SSH daemon listens on.
    pub port: u16,
    /// Remote account.
    pub user: String,
    /// `ssh` executable.
    pub ssh_bin: String,
    /// `scp` executable.
    pub scp_bin: String,
    /// Handshake timeout passed to the client.
    pub connect_timeout: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_SSH_PORT,
            user: String::from("root"),
            ssh_bin: String::from("ssh"),
            scp_bin: String::from("scp"),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Session template for one remote host.
///
/// Construction loads and checks the key but does not touch the network.
#[derive(Clone, Debug)]
pub struct SshClient<R = TokioProcessRunner> {
    host: String,
    key_path: Utf8PathBuf,
    settings: SshSettings,
    runner: R,
    ready_backoff: Backoff,
}

impl SshClient<TokioProcessRunner> {
    /// Prepares a session to `host` authenticating with the key at
    /// `key_path`.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Key`] when the key cannot be read or is not a
    /// private key.
    pub fn connect(host: impl Into<String>, key_path: &str, port: u16) -> Result<Self, SshError> {
        let settings = SshSettings {
            port,
            ..SshSettings::default()
        };
        Self::with_runner(host, key_path, settings, TokioProcessRunner)
    }
}

impl<R: ProcessRunner> SshClient<R> {
    /// Prepares a session using a custom process runner.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Key`] when the key cannot be read or is not a
    /// private key.
    pub fn with_runner(
        host: impl Into<String>,
        key_path: &str,
        settings: SshSettings,
        runner: R,
    ) -> Result<Self, SshError> {
        let key = key::load_private_key(key_path)?;
        Ok(Self {
            host: host.into(),
            key_path: key,
            settings,
            runner,
            ready_backoff: Backoff::with_max_elapsed(READY_INITIAL_INTERVAL, READY_TIMEOUT),
        })
    }

    /// Replaces the polling policy used by [`SshClient::wait_for_ready`].
    #[must_use]
    pub fn with_ready_backoff(mut self, backoff: Backoff) -> Self {
        self.ready_backoff = backoff;
        self
    }

    /// Returns the target host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the client settings.
    #[must_use]
    pub const fn settings(&self) -> &SshSettings {
        &self.settings
    }

    /// Returns the process runner.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    fn common_options(&self) -> Vec<OsString> {
        vec![
            OsString::from("-i"),
            OsString::from(self.key_path.as_str()),
            OsString::from("-o"),
            OsString::from("BatchMode=yes"),
            OsString::from("-o"),
            OsString::from("StrictHostKeyChecking=no"),
            OsString::from("-o"),
            OsString::from("UserKnownHostsFile=/dev/null"),
            OsString::from("-o"),
            OsString::from(format!(
                "ConnectTimeout={}",
                self.settings.connect_timeout.as_secs().max(1)
            )),
            OsString::from("-o"),
            OsString::from("LogLevel=ERROR"),
        ]
    }

    /// Builds the `ssh` argument list for `command`.
    #[must_use]
    pub fn ssh_args(&self, command: &str, tty: bool) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(self.settings.port.to_string()),
        ];
        args.extend(self.common_options());
        if tty {
            args.push(OsString::from("-tt"));
        }
        args.push(OsString::from(format!("{}@{}", self.settings.user, self.host)));
        args.push(OsString::from(command));
        args
    }

    /// Host rendered for `scp` remote specifications.
    fn scp_host(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{}]", self.host),
            _ => self.host.clone(),
        }
    }

    fn interpret(&self, output: ProcessOutput) -> Result<CommandResult, SshError> {
        match output.code {
            Some(SSH_CONNECTION_FAILURE) => Err(SshError::Connectivity {
                host: self.host.clone(),
                message: output.stderr.trim().to_owned(),
            }),
            Some(exit_code) => Ok(CommandResult {
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code,
            }),
            None => Err(SshError::Terminated {
                host: self.host.clone(),
            }),
        }
    }

    fn spawn_error(&self, program: &str, err: &std::io::Error) -> SshError {
        debug!(host = %self.host, program, error = %err, "failed to spawn client");
        SshError::Spawn {
            program: program.to_owned(),
            message: err.to_string(),
        }
    }

    /// Runs `command` on the host and captures its result.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Connectivity`] when the client reports a
    /// connection failure (exit 255), [`SshError::Spawn`] when `ssh`
    /// cannot start, and [`SshError::Terminated`] when it is killed.
    pub async fn exec(&self, command: &str) -> Result<CommandResult, SshError> {
        let args = self.ssh_args(command, false);
        let output = self
            .runner
            .run(&self.settings.ssh_bin, &args, None)
            .await
            .map_err(|err| self.spawn_error(&self.settings.ssh_bin, &err))?;
        self.interpret(output)
    }

    /// Runs `command` under a pseudo-terminal, streaming `input` to it.
    ///
    /// # Errors
    ///
    /// Same as [`SshClient::exec`].
    pub async fn exec_interactive(
        &self,
        command: &str,
        input: StdinSource<'_>,
    ) -> Result<CommandResult, SshError> {
        let args = self.ssh_args(command, true);
        let output = self
            .runner
            .run(&self.settings.ssh_bin, &args, Some(input))
            .await
            .map_err(|err| self.spawn_error(&self.settings.ssh_bin, &err))?;
        self.interpret(output)
    }
}

impl<R: ProcessRunner> RemoteRunner for SshClient<R> {
    fn exec<'a>(&'a self, command: &'a str) -> RemoteFuture<'a> {
        Box::pin(Self::exec(self, command))
    }
}

impl<R: ProcessRunner> InteractiveRunner for SshClient<R> {
    fn exec_interactive<'a>(
        &'a self,
        command: &'a str,
        input: StdinSource<'a>,
    ) -> RemoteFuture<'a> {
        Box::pin(Self::exec_interactive(self, command, input))
    }

    fn host(&self) -> &str {
        Self::host(self)
    }
}

#[cfg(test)]
mod tests;
