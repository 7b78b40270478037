//! Bounded waits on server status and provider actions.

use tracing::debug;

use crate::retry::{Attempt, RetryError};

use super::super::{
    Action, ActionStatus, CloudApi, HetznerClient, HetznerError, ManagedServer, ServerStatus,
};

/// Why a single status poll did not finish the wait.
enum Poll {
    /// The server was observed in another status.
    Pending(String),
    /// The wait cannot succeed.
    Fatal(HetznerError),
}

impl<A: CloudApi> HetznerClient<A> {
    /// Polls until the server reports `target`, returning the final
    /// observation.
    ///
    /// A missing server or a failed lookup ends the wait immediately; only a
    /// status mismatch is retried.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError::ServerNotFound`] when the server disappears,
    /// the lookup error when the provider fails, and
    /// [`HetznerError::DeadlineExceeded`] naming the last observed status
    /// when the deadline passes.
    pub async fn wait_for_server_status(
        &self,
        server_id: u64,
        target: ServerStatus,
    ) -> Result<ManagedServer, HetznerError> {
        let outcome = self
            .status_backoff
            .retry(|| async move {
                match self.get_server(server_id).await {
                    Ok(Some(server)) if server.status == target => Ok(server),
                    Ok(Some(server)) => {
                        debug!(server_id, status = %server.status, %target, "waiting for status");
                        Err(Attempt::Retryable(Poll::Pending(server.status.to_string())))
                    }
                    Ok(None) => Err(Attempt::Permanent(Poll::Fatal(
                        HetznerError::ServerNotFound { server_id },
                    ))),
                    Err(err) => Err(Attempt::Permanent(Poll::Fatal(err))),
                }
            })
            .await;

        outcome.map_err(|err| {
            finish(
                err,
                format!("status {target}"),
                format!("server {server_id}"),
            )
        })
    }

    /// Polls an action until it leaves the running state.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError::ActionFailed`] when the action ends in error,
    /// the lookup error when polling fails, and
    /// [`HetznerError::DeadlineExceeded`] when the deadline passes.
    pub async fn wait_for_action(&self, action: &Action) -> Result<Action, HetznerError> {
        let action_id = action.id;
        let outcome = self
            .action_backoff
            .retry(|| async move {
                let current = match self.api.get_action(action_id).await {
                    Ok(current) => current,
                    Err(err) => {
                        return Err(Attempt::Permanent(Poll::Fatal(HetznerError::from_api(
                            "get",
                            format!("action {action_id}"),
                            err,
                        ))));
                    }
                };
                match current.status {
                    ActionStatus::Success => Ok(current),
                    ActionStatus::Running => Err(Attempt::Retryable(Poll::Pending(String::from(
                        "running",
                    )))),
                    ActionStatus::Error => {
                        let message = current
                            .error
                            .map_or_else(|| String::from("unknown error"), |detail| detail.message);
                        Err(Attempt::Permanent(Poll::Fatal(HetznerError::ActionFailed {
                            action_id,
                            command: current.command,
                            message,
                        })))
                    }
                }
            })
            .await;

        outcome.map_err(|err| {
            finish(
                err,
                format!("action {}", action.command),
                format!("action {action_id}"),
            )
        })
    }
}

fn finish(err: RetryError<Poll>, operation: String, resource: String) -> HetznerError {
    match err {
        RetryError::Permanent(Poll::Fatal(inner))
        | RetryError::Exhausted {
            last: Poll::Fatal(inner),
            ..
        } => inner,
        RetryError::Permanent(Poll::Pending(last_observed))
        | RetryError::Exhausted {
            last: Poll::Pending(last_observed),
            ..
        } => HetznerError::DeadlineExceeded {
            operation,
            resource,
            last_observed,
        },
    }
}
