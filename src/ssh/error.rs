//! Error types for the remote execution service.

use thiserror::Error;

use crate::shell::InvalidPath;

/// Errors raised while reaching or talking to a remote host.
///
/// A remote command exiting non-zero is not an error at this layer; it is
/// reported through [`crate::remote::CommandResult`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SshError {
    /// The private key could not be read or is not a private key.
    #[error("ssh key {path}: {message}")]
    Key {
        /// Path the key was loaded from.
        path: String,
        /// Reason the key was rejected.
        message: String,
    },
    /// The local ssh or scp binary could not be started.
    #[error("failed to run {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error.
        message: String,
    },
    /// The connection, handshake, or authentication failed.
    #[error("connection to {host} failed: {message}")]
    Connectivity {
        /// Target host.
        host: String,
        /// Diagnostic output from the ssh client.
        message: String,
    },
    /// The ssh client was terminated by a signal.
    #[error("ssh session to {host} terminated without an exit status")]
    Terminated {
        /// Target host.
        host: String,
    },
    /// A remote path failed validation.
    #[error(transparent)]
    InvalidPath(#[from] InvalidPath),
    /// A file transfer exited non-zero.
    #[error("{operation} {path} on {host} failed with exit code {exit_code}: {stderr}")]
    Transfer {
        /// `upload` or `download`.
        operation: &'static str,
        /// Remote path involved in the transfer.
        path: String,
        /// Target host.
        host: String,
        /// Exit code reported by scp.
        exit_code: i32,
        /// Trimmed standard error.
        stderr: String,
    },
    /// The host did not accept connections before the deadline.
    #[error("timed out waiting for {host}:{port} to accept connections (last error: {last_error})")]
    DeadlineExceeded {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Error from the final connection attempt.
        last_error: String,
    },
}
