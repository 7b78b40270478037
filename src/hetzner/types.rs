//! Provider-neutral views of Hetzner servers, actions, and SSH keys.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use serde::Deserialize;

use super::HetznerError;

/// Lifecycle status reported for a server.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Server is being allocated.
    Initializing,
    /// Server is booting.
    Starting,
    /// Server is powered on.
    Running,
    /// Server is shutting down.
    Stopping,
    /// Server is powered off.
    Off,
    /// Server is being deleted.
    Deleting,
    /// Server is booted into the rescue system.
    Rescue,
    /// Server is moving between hosts.
    Migrating,
    /// Server is being rebuilt from an image.
    Rebuilding,
    /// Any status this crate does not recognise.
    #[serde(other)]
    Unknown,
}

impl ServerStatus {
    /// Returns the provider's spelling of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Off => "off",
            Self::Deleting => "deleting",
            Self::Rescue => "rescue",
            Self::Migrating => "migrating",
            Self::Rebuilding => "rebuilding",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server carrying the builder ownership label.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManagedServer {
    /// Provider server identifier.
    pub id: u64,
    /// Server name.
    pub name: String,
    /// Status at the time of the last observation.
    pub status: ServerStatus,
    /// Public IPv4 address, once assigned.
    pub public_ipv4: Option<Ipv4Addr>,
    /// Whether rescue mode is armed for the next boot.
    pub rescue_enabled: bool,
    /// Labels attached to the server.
    pub labels: BTreeMap<String, String>,
}

impl ManagedServer {
    /// Returns the public IPv4 address or an error naming the server.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError::MissingPublicIp`] when no address is assigned.
    pub fn require_ipv4(&self) -> Result<Ipv4Addr, HetznerError> {
        self.public_ipv4
            .ok_or(HetznerError::MissingPublicIp { server_id: self.id })
    }

    /// Returns the IPv4 address rendered for tables; empty when unassigned.
    #[must_use]
    pub fn ipv4_display(&self) -> String {
        self.public_ipv4
            .map_or_else(String::new, |ip| ip.to_string())
    }
}

/// Parameters for [`super::HetznerClient::create_server`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSpec {
    /// Server name; must be unique within the project.
    pub name: String,
    /// Server type, e.g. `cpx31`.
    pub server_type: String,
    /// Boot image, e.g. `ubuntu-24.04`.
    pub image: String,
    /// Datacenter location, e.g. `fsn1`.
    pub location: String,
    /// Provider SSH key identifiers installed for root.
    pub ssh_key_ids: Vec<u64>,
}

/// Progress of a provider action.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Action is still in progress.
    Running,
    /// Action completed.
    Success,
    /// Action failed.
    Error,
}

/// Error detail attached to a failed action.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ActionError {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Asynchronous provider operation such as a reset or rescue enablement.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Action {
    /// Provider action identifier.
    pub id: u64,
    /// Command name, e.g. `reset_server`.
    pub command: String,
    /// Current progress.
    pub status: ActionStatus,
    /// Error detail when `status` is [`ActionStatus::Error`].
    #[serde(default)]
    pub error: Option<ActionError>,
}

/// Credentials returned when rescue mode is armed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RescueCredentials {
    /// Root password for the rescue system.
    pub root_password: String,
    /// Action tracking the enablement.
    pub action: Action,
}

/// Outcome of arming rescue mode.
///
/// Rescue enablement is the step most likely to fail for account reasons,
/// so the outcome is a value the caller has to inspect.
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub enum RescueOutcome {
    /// Rescue mode is armed for the next boot.
    Enabled(RescueCredentials),
    /// The provider refused or failed to arm rescue mode.
    Failed(HetznerError),
}

impl RescueOutcome {
    /// Converts the outcome into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the carried error for [`RescueOutcome::Failed`].
    pub fn into_result(self) -> Result<RescueCredentials, HetznerError> {
        match self {
            Self::Enabled(credentials) => Ok(credentials),
            Self::Failed(err) => Err(err),
        }
    }
}

/// SSH public key registered with the provider.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct SshKey {
    /// Provider key identifier.
    pub id: u64,
    /// Key name.
    pub name: String,
    /// MD5 fingerprint as reported by the provider.
    pub fingerprint: String,
    /// Public key material.
    pub public_key: String,
}

/// Power operations accepted by the server actions endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerAction {
    /// Boots a powered-off server.
    PowerOn,
    /// Cuts power immediately.
    PowerOff,
    /// Hard reset.
    Reset,
}

impl PowerAction {
    /// Endpoint segment under `/servers/{id}/actions/`.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::PowerOn => "poweron",
            Self::PowerOff => "poweroff",
            Self::Reset => "reset",
        }
    }

    /// Verb used in logs and error messages.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::PowerOn => "power on",
            Self::PowerOff => "power off",
            Self::Reset => "reset",
        }
    }
}
