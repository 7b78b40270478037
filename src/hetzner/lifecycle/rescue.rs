//! Rescue-mode enablement.

use tracing::{info, warn};

use super::super::{
    Action, CloudApi, HetznerClient, HetznerError, ManagedServer, RescueCredentials,
    RescueOutcome,
};

impl<A: CloudApi> HetznerClient<A> {
    /// Arms the Linux rescue system for the server's next boot.
    ///
    /// The server must be reset afterwards for rescue mode to take effect.
    pub async fn enable_rescue(&self, server: &ManagedServer, ssh_key_ids: &[u64]) -> RescueOutcome {
        match self.api.enable_rescue(server.id, ssh_key_ids).await {
            Ok((root_password, action)) => {
                info!(server_id = server.id, action_id = action.id, "rescue mode armed");
                RescueOutcome::Enabled(RescueCredentials {
                    root_password,
                    action,
                })
            }
            Err(err) => {
                warn!(server_id = server.id, error = %err, "rescue enablement failed");
                RescueOutcome::Failed(HetznerError::from_api(
                    "enable rescue",
                    format!("server {}", server.id),
                    err,
                ))
            }
        }
    }

    /// Disarms the rescue system.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError`] prefixed with `disable rescue server <id>`.
    pub async fn disable_rescue(&self, server: &ManagedServer) -> Result<Action, HetznerError> {
        self.api.disable_rescue(server.id).await.map_err(|err| {
            HetznerError::from_api("disable rescue", format!("server {}", server.id), err)
        })
    }
}
