//! Readiness polling after boot or rescue transitions.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::retry::{Attempt, RetryError};

use super::{ProcessRunner, SshClient, SshError};

const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

impl<R: ProcessRunner> SshClient<R> {
    /// Polls until the SSH port accepts TCP connections.
    ///
    /// Only reachability is checked; no authentication takes place.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::DeadlineExceeded`] with the last connection error
    /// when the host stays unreachable past the polling window.
    pub async fn wait_for_ready(&self) -> Result<(), SshError> {
        let host = self.host.as_str();
        let port = self.settings.port;
        let outcome = self
            .ready_backoff
            .retry(|| async move {
                match timeout(CONNECT_ATTEMPT_TIMEOUT, TcpStream::connect((host, port))).await {
                    Ok(Ok(_stream)) => Ok(()),
                    Ok(Err(err)) => {
                        debug!(host, port, error = %err, "ssh port not ready");
                        Err(Attempt::Retryable(err.to_string()))
                    }
                    Err(_elapsed) => {
                        debug!(host, port, "ssh connection attempt timed out");
                        Err(Attempt::Retryable(String::from("connection attempt timed out")))
                    }
                }
            })
            .await;

        match outcome {
            Ok(()) => {
                info!(host, port, "ssh ready");
                Ok(())
            }
            Err(RetryError::Permanent(last_error) | RetryError::Exhausted { last: last_error, .. }) => {
                Err(SshError::DeadlineExceeded {
                    host: host.to_owned(),
                    port,
                    last_error,
                })
            }
        }
    }
}
