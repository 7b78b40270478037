//! Power actions.

use tracing::info;

use super::super::{Action, CloudApi, HetznerClient, HetznerError, ManagedServer, PowerAction};

impl<A: CloudApi> HetznerClient<A> {
    /// Boots a powered-off server.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError`] prefixed with `power on server <id>`.
    pub async fn power_on(&self, server: &ManagedServer) -> Result<Action, HetznerError> {
        self.power_action(server, PowerAction::PowerOn).await
    }

    /// Cuts power to a server.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError`] prefixed with `power off server <id>`.
    pub async fn power_off(&self, server: &ManagedServer) -> Result<Action, HetznerError> {
        self.power_action(server, PowerAction::PowerOff).await
    }

    /// Hard-resets a server, e.g. to boot into an armed rescue system.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError`] prefixed with `reset server <id>`.
    pub async fn reset(&self, server: &ManagedServer) -> Result<Action, HetznerError> {
        self.power_action(server, PowerAction::Reset).await
    }

    async fn power_action(
        &self,
        server: &ManagedServer,
        action: PowerAction,
    ) -> Result<Action, HetznerError> {
        let result = self
            .api
            .power_action(server.id, action)
            .await
            .map_err(|err| HetznerError::from_api(action.verb(), format!("server {}", server.id), err))?;
        info!(server_id = server.id, action = action.verb(), action_id = result.id, "power action issued");
        Ok(result)
    }
}
