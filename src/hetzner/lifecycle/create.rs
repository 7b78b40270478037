//! Server creation with bounded retry.

use tracing::{info, warn};
use uuid::Uuid;

use crate::retry::{Attempt, RetryError};

use super::super::{
    CloudApi, CreateServerRequest, HetznerClient, HetznerError, ManagedServer, SERVER_NAME_PREFIX,
    ServerSpec, ownership_labels,
};

/// Generates a unique server name with the builder prefix.
#[must_use]
pub fn generate_server_name() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{SERVER_NAME_PREFIX}-{}",
        suffix.get(..12).unwrap_or(suffix.as_str())
    )
}

impl<A: CloudApi> HetznerClient<A> {
    /// Creates a server carrying the ownership label.
    ///
    /// Transient provider failures are retried; rejected requests (bad server
    /// type, unknown image, quota) fail on the first attempt.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError::Rejected`] for invalid requests and
    /// [`HetznerError::Provider`] once retries are exhausted.
    pub async fn create_server(&self, spec: &ServerSpec) -> Result<ManagedServer, HetznerError> {
        let request = CreateServerRequest::new(spec, ownership_labels());
        let api = &self.api;
        let outcome = self
            .create_backoff
            .retry(|| {
                let body = &request;
                async move {
                    api.create_server(body).await.map_err(|err| {
                        if err.is_transient() {
                            warn!(name = %body.name, error = %err, "server creation failed; retrying");
                            Attempt::Retryable(err)
                        } else {
                            Attempt::Permanent(err)
                        }
                    })
                }
            })
            .await;

        match outcome {
            Ok(server) => {
                info!(server_id = server.id, name = %server.name, "server created");
                Ok(server)
            }
            Err(RetryError::Permanent(err) | RetryError::Exhausted { last: err, .. }) => Err(
                HetznerError::from_api("create", format!("server {}", spec.name), err),
            ),
        }
    }
}
