//! Lifecycle operations on builder-owned servers.

mod create;
mod power;
mod rescue;
mod ssh_keys;
mod wait;

pub use create::generate_server_name;

use tracing::{debug, info};

use super::{CloudApi, HetznerClient, HetznerError, ManagedServer, ServerStatus, ownership_selector};

impl<A: CloudApi> HetznerClient<A> {
    /// Lists every server carrying the ownership label, following pagination.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError`] when any page request fails.
    pub async fn list_servers(&self) -> Result<Vec<ManagedServer>, HetznerError> {
        let selector = ownership_selector();
        let mut servers = Vec::new();
        let mut page = 1;
        loop {
            let batch = self
                .api
                .list_servers(&selector, page)
                .await
                .map_err(|err| HetznerError::from_api("list", "servers", err))?;
            servers.extend(batch.servers);
            match batch.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        debug!(count = servers.len(), "listed managed servers");
        Ok(servers)
    }

    /// Fetches a single server, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError`] when the lookup fails for any other reason.
    pub async fn get_server(&self, server_id: u64) -> Result<Option<ManagedServer>, HetznerError> {
        self.api
            .get_server(server_id)
            .await
            .map_err(|err| HetznerError::from_api("get", format!("server {server_id}"), err))
    }

    /// Returns the current status of a server, or
    /// [`ServerStatus::Unknown`] when it cannot be observed.
    pub async fn server_status(&self, server_id: u64) -> ServerStatus {
        match self.get_server(server_id).await {
            Ok(Some(server)) => server.status,
            Ok(None) => ServerStatus::Unknown,
            Err(err) => {
                debug!(server_id, error = %err, "status lookup failed");
                ServerStatus::Unknown
            }
        }
    }

    /// Deletes a server.
    ///
    /// Returns `Ok(false)` when the server no longer exists, so repeated
    /// teardown is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError`] for any failure other than not-found.
    pub async fn delete_server(&self, server: &ManagedServer) -> Result<bool, HetznerError> {
        match self.api.delete_server(server.id).await {
            Ok(_) => {
                info!(server_id = server.id, name = %server.name, "server deleted");
                Ok(true)
            }
            Err(err) if err.is_not_found() => {
                debug!(server_id = server.id, "server already gone");
                Ok(false)
            }
            Err(err) => Err(HetznerError::from_api(
                "delete",
                format!("server {}", server.id),
                err,
            )),
        }
    }
}
