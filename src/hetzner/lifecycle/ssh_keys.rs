//! SSH key registration and lookup.

use tracing::info;

use super::super::{CloudApi, HetznerClient, HetznerError, SshKey};

impl<A: CloudApi> HetznerClient<A> {
    /// Returns the key registered under `name`, registering `public_key`
    /// when none exists.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError`] when the lookup or registration fails.
    pub async fn ensure_ssh_key(&self, name: &str, public_key: &str) -> Result<SshKey, HetznerError> {
        let target = format!("ssh key {name}");
        let existing = self
            .api
            .find_ssh_key_by_name(name)
            .await
            .map_err(|err| HetznerError::from_api("find", target.as_str(), err))?;
        if let Some(key) = existing {
            return Ok(key);
        }

        let key = self
            .api
            .create_ssh_key(name, public_key.trim())
            .await
            .map_err(|err| HetznerError::from_api("register", target.as_str(), err))?;
        info!(key_id = key.id, name, "ssh key registered");
        Ok(key)
    }

    /// Finds a registered key by fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError`] when the lookup fails.
    pub async fn find_ssh_key_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<SshKey>, HetznerError> {
        self.api
            .find_ssh_key_by_fingerprint(fingerprint)
            .await
            .map_err(|err| HetznerError::from_api("find", format!("ssh key {fingerprint}"), err))
    }
}
