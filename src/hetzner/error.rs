//! Error types for the Hetzner lifecycle manager.

use thiserror::Error;

const TRANSIENT_CODES: [&str; 7] = [
    "conflict",
    "locked",
    "maintenance",
    "rate_limit_exceeded",
    "server_error",
    "timeout",
    "unavailable",
];

/// Failure reported by the Hetzner Cloud API or by the transport beneath it.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message} ({code})")]
pub struct ApiError {
    /// HTTP status, absent when the request never produced a response.
    pub status: Option<u16>,
    /// Machine-readable error code from the response body.
    pub code: String,
    /// Human-readable message from the response body or transport.
    pub message: String,
}

impl ApiError {
    /// Builds an error for a request that never received a response.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: String::from("transport"),
            message: message.into(),
        }
    }

    /// Builds an error from an HTTP status and provider error code.
    #[must_use]
    pub fn response(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns `true` when the resource addressed by the request does not
    /// exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == "not_found" || self.status == Some(404)
    }

    /// Returns `true` for rate limiting, provider-side failures, and
    /// transport errors. Everything else is a rejected request.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self.status {
            None => true,
            Some(429) => true,
            Some(status) if status >= 500 => true,
            Some(_) => TRANSIENT_CODES.contains(&self.code.as_str()),
        }
    }
}

/// Errors raised by [`super::HetznerClient`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HetznerError {
    /// The provider rejected the request; retrying cannot help.
    #[error("{operation} {target}: request rejected: {source}")]
    Rejected {
        /// Operation being attempted, e.g. `create` or `reset`.
        operation: String,
        /// Resource the operation addressed.
        target: String,
        /// Provider error.
        source: ApiError,
    },
    /// The provider or transport failed after any permitted retries.
    #[error("{operation} {target}: {source}")]
    Provider {
        /// Operation being attempted.
        operation: String,
        /// Resource the operation addressed.
        target: String,
        /// Provider error.
        source: ApiError,
    },
    /// A server disappeared while it was being observed.
    #[error("server {server_id} not found")]
    ServerNotFound {
        /// Provider server identifier.
        server_id: u64,
    },
    /// The server has no public IPv4 address.
    #[error("server {server_id} has no public IPv4 address")]
    MissingPublicIp {
        /// Provider server identifier.
        server_id: u64,
    },
    /// A provider action finished in the error state.
    #[error("action {action_id} ({command}) failed: {message}")]
    ActionFailed {
        /// Provider action identifier.
        action_id: u64,
        /// Action command, e.g. `reset_server`.
        command: String,
        /// Provider error message.
        message: String,
    },
    /// A bounded wait ran out of time.
    #[error("timed out waiting for {operation} on {resource} (last observed: {last_observed})")]
    DeadlineExceeded {
        /// Condition being waited for.
        operation: String,
        /// Resource being observed.
        resource: String,
        /// Last state seen before the deadline.
        last_observed: String,
    },
}

impl HetznerError {
    /// Wraps an API failure, separating rejected requests from provider
    /// failures.
    #[must_use]
    pub fn from_api(operation: &str, target: impl Into<String>, source: ApiError) -> Self {
        if source.is_transient() {
            Self::Provider {
                operation: operation.to_owned(),
                target: target.into(),
                source,
            }
        } else {
            Self::Rejected {
                operation: operation.to_owned(),
                target: target.into(),
                source,
            }
        }
    }
}
