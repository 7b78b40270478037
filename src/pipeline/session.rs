//! Session seam between the pipeline and the SSH client.

use std::future::Future;
use std::pin::Pin;

use crate::remote::InteractiveRunner;
use crate::ssh::{ProcessRunner, SshClient, SshError, SshSettings, TokioProcessRunner};

/// Boxed future returned by [`RemoteSession::wait_for_ready`].
pub type ReadyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SshError>> + Send + 'a>>;

/// A runner bound to one host that can wait for the host to come up.
pub trait RemoteSession: InteractiveRunner {
    /// Resolves once the host accepts connections.
    fn wait_for_ready(&self) -> ReadyFuture<'_>;
}

impl<R: ProcessRunner> RemoteSession for SshClient<R> {
    fn wait_for_ready(&self) -> ReadyFuture<'_> {
        Box::pin(Self::wait_for_ready(self))
    }
}

/// Builds sessions for freshly addressed hosts.
pub trait Connector: Send + Sync {
    /// Session type handed to the remote stages.
    type Session: RemoteSession;

    /// Prepares a session for `host` without touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`SshError`] when the session cannot be prepared, typically
    /// because the key material is unusable.
    fn connect(&self, host: &str) -> Result<Self::Session, SshError>;
}

/// Connector producing [`SshClient`] sessions backed by the system `ssh`.
#[derive(Clone, Debug)]
pub struct SshConnector {
    key_path: String,
    settings: SshSettings,
}

impl SshConnector {
    /// Creates a connector authenticating with the private key at
    /// `key_path`.
    #[must_use]
    pub fn new(key_path: impl Into<String>, settings: SshSettings) -> Self {
        Self {
            key_path: key_path.into(),
            settings,
        }
    }
}

impl Connector for SshConnector {
    type Session = SshClient<TokioProcessRunner>;

    fn connect(&self, host: &str) -> Result<Self::Session, SshError> {
        SshClient::with_runner(host, &self.key_path, self.settings.clone(), TokioProcessRunner)
    }
}
