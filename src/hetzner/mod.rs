//! Hetzner Cloud lifecycle manager.
//!
//! Every server the builder creates carries the ownership label
//! `managed-by=blackbsd-builder`. Listing is always scoped by that label, so
//! bulk operations never reach resources created by anything else.

mod api;
mod error;
mod lifecycle;
mod types;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::retry::Backoff;

pub use api::{
    ApiFuture, CloudApi, CreateServerRequest, DEFAULT_BASE_URL, HttpCloudApi, ServerPage,
};
pub use error::{ApiError, HetznerError};
pub use lifecycle::generate_server_name;
pub use types::{
    Action, ActionError, ActionStatus, ManagedServer, PowerAction, RescueCredentials,
    RescueOutcome, ServerSpec, ServerStatus, SshKey,
};

/// Label key marking servers owned by the builder.
pub const OWNERSHIP_LABEL_KEY: &str = "managed-by";
/// Label value marking servers owned by the builder.
pub const OWNERSHIP_LABEL_VALUE: &str = "blackbsd-builder";
/// Prefix for generated server names.
pub const SERVER_NAME_PREFIX: &str = "blackbsd-builder";

const CREATE_ATTEMPTS: u32 = 3;
const CREATE_INITIAL_INTERVAL: Duration = Duration::from_secs(1);
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);
const STATUS_TIMEOUT: Duration = Duration::from_secs(600);
const ACTION_POLL_INTERVAL: Duration = Duration::from_secs(1);
const ACTION_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Returns the label selector matching builder-owned servers.
#[must_use]
pub fn ownership_selector() -> String {
    format!("{OWNERSHIP_LABEL_KEY}={OWNERSHIP_LABEL_VALUE}")
}

/// Returns the labels attached to every server the builder creates.
#[must_use]
pub fn ownership_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(
        OWNERSHIP_LABEL_KEY.to_owned(),
        OWNERSHIP_LABEL_VALUE.to_owned(),
    )])
}

/// Manages builder-owned servers through a [`CloudApi`].
#[derive(Clone, Debug)]
pub struct HetznerClient<A = HttpCloudApi> {
    api: A,
    create_backoff: Backoff,
    status_backoff: Backoff,
    action_backoff: Backoff,
}

impl HetznerClient<HttpCloudApi> {
    /// Creates a client for the public Hetzner API using `token`.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError::Provider`] when the HTTP client cannot be
    /// initialised.
    pub fn new(token: impl Into<String>) -> Result<Self, HetznerError> {
        let api = HttpCloudApi::new(token).map_err(|source| HetznerError::Provider {
            operation: String::from("initialise"),
            target: String::from("HTTP client"),
            source,
        })?;
        Ok(Self::with_api(api))
    }
}

impl<A: CloudApi> HetznerClient<A> {
    /// Wraps an API implementation with the default retry and wait policies.
    #[must_use]
    pub fn with_api(api: A) -> Self {
        Self {
            api,
            create_backoff: Backoff::with_max_attempts(CREATE_INITIAL_INTERVAL, CREATE_ATTEMPTS),
            status_backoff: Backoff::with_max_elapsed(STATUS_POLL_INTERVAL, STATUS_TIMEOUT)
                .max_interval(MAX_POLL_INTERVAL),
            action_backoff: Backoff::with_max_elapsed(ACTION_POLL_INTERVAL, ACTION_TIMEOUT)
                .max_interval(MAX_POLL_INTERVAL),
        }
    }

    /// Replaces the retry policy used for server creation.
    #[must_use]
    pub fn with_create_backoff(mut self, backoff: Backoff) -> Self {
        self.create_backoff = backoff;
        self
    }

    /// Replaces the polling policy used while waiting for a server status.
    #[must_use]
    pub fn with_status_backoff(mut self, backoff: Backoff) -> Self {
        self.status_backoff = backoff;
        self
    }

    /// Replaces the polling policy used while waiting for an action.
    #[must_use]
    pub fn with_action_backoff(mut self, backoff: Backoff) -> Self {
        self.action_backoff = backoff;
        self
    }

    /// Returns the underlying API implementation.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }
}

#[cfg(test)]
mod tests;
