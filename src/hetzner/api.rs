//! Transport seam between the lifecycle manager and the Hetzner Cloud API.
//!
//! [`CloudApi`] mirrors the handful of REST endpoints the builder needs.
//! [`HttpCloudApi`] talks to the real service; tests substitute an
//! in-memory fake.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::types::{Action, ManagedServer, PowerAction, ServerSpec, ServerStatus, SshKey};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.hetzner.cloud/v1";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 50;

/// Boxed future returned by [`CloudApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// One page of a server listing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServerPage {
    /// Servers on this page.
    pub servers: Vec<ManagedServer>,
    /// Next page number, when more results exist.
    pub next_page: Option<u32>,
}

/// Body of a server creation request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CreateServerRequest {
    /// Server name.
    pub name: String,
    /// Server type.
    pub server_type: String,
    /// Boot image.
    pub image: String,
    /// Datacenter location.
    pub location: String,
    /// SSH key identifiers.
    pub ssh_keys: Vec<u64>,
    /// Labels to attach.
    pub labels: BTreeMap<String, String>,
}

impl CreateServerRequest {
    /// Builds a request from a server specification and label set.
    #[must_use]
    pub fn new(spec: &ServerSpec, labels: BTreeMap<String, String>) -> Self {
        Self {
            name: spec.name.clone(),
            server_type: spec.server_type.clone(),
            image: spec.image.clone(),
            location: spec.location.clone(),
            ssh_keys: spec.ssh_key_ids.clone(),
            labels,
        }
    }
}

/// Operations the lifecycle manager needs from the provider.
pub trait CloudApi: Send + Sync {
    /// Lists one page of servers matching `label_selector`.
    fn list_servers<'a>(&'a self, label_selector: &'a str, page: u32) -> ApiFuture<'a, ServerPage>;

    /// Fetches a server, returning `None` when it does not exist.
    fn get_server(&self, id: u64) -> ApiFuture<'_, Option<ManagedServer>>;

    /// Creates a server.
    fn create_server<'a>(&'a self, request: &'a CreateServerRequest)
    -> ApiFuture<'a, ManagedServer>;

    /// Deletes a server.
    fn delete_server(&self, id: u64) -> ApiFuture<'_, Action>;

    /// Runs a power action against a server.
    fn power_action(&self, id: u64, action: PowerAction) -> ApiFuture<'_, Action>;

    /// Arms the Linux rescue system for the next boot, returning the root
    /// password and tracking action.
    fn enable_rescue<'a>(
        &'a self,
        id: u64,
        ssh_key_ids: &'a [u64],
    ) -> ApiFuture<'a, (String, Action)>;

    /// Disarms the rescue system.
    fn disable_rescue(&self, id: u64) -> ApiFuture<'_, Action>;

    /// Fetches the current state of an action.
    fn get_action(&self, id: u64) -> ApiFuture<'_, Action>;

    /// Finds an SSH key by exact name.
    fn find_ssh_key_by_name<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<SshKey>>;

    /// Finds an SSH key by fingerprint.
    fn find_ssh_key_by_fingerprint<'a>(
        &'a self,
        fingerprint: &'a str,
    ) -> ApiFuture<'a, Option<SshKey>>;

    /// Registers a new SSH key.
    fn create_ssh_key<'a>(&'a self, name: &'a str, public_key: &'a str)
    -> ApiFuture<'a, SshKey>;
}

#[derive(Deserialize)]
struct Ipv4Payload {
    ip: Ipv4Addr,
}

#[derive(Deserialize)]
struct PublicNetPayload {
    #[serde(default)]
    ipv4: Option<Ipv4Payload>,
}

#[derive(Deserialize)]
struct ServerPayload {
    id: u64,
    name: String,
    status: ServerStatus,
    public_net: PublicNetPayload,
    #[serde(default)]
    rescue_enabled: bool,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

impl From<ServerPayload> for ManagedServer {
    fn from(payload: ServerPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name,
            status: payload.status,
            public_ipv4: payload.public_net.ipv4.map(|ipv4| ipv4.ip),
            rescue_enabled: payload.rescue_enabled,
            labels: payload.labels,
        }
    }
}

#[derive(Deserialize)]
struct PaginationPayload {
    next_page: Option<u32>,
}

#[derive(Deserialize)]
struct MetaPayload {
    pagination: PaginationPayload,
}

#[derive(Deserialize)]
struct ServerListResponse {
    servers: Vec<ServerPayload>,
    #[serde(default)]
    meta: Option<MetaPayload>,
}

#[derive(Deserialize)]
struct ServerResponse {
    server: ServerPayload,
}

#[derive(Deserialize)]
struct ActionResponse {
    action: Action,
}

#[derive(Deserialize)]
struct RescueResponse {
    root_password: String,
    action: Action,
}

#[derive(Deserialize)]
struct SshKeyListResponse {
    ssh_keys: Vec<SshKey>,
}

#[derive(Deserialize)]
struct SshKeyResponse {
    ssh_key: SshKey,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct EnableRescueRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    ssh_keys: &'a [u64],
}

#[derive(Serialize)]
struct CreateSshKeyRequest<'a> {
    name: &'a str,
    public_key: &'a str,
}

/// [`CloudApi`] implementation backed by the Hetzner Cloud REST API.
#[derive(Clone, Debug)]
pub struct HttpCloudApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpCloudApi {
    /// Creates a client for the public API endpoint.
    ///
    /// # Errors
    ///
    /// Returns a transport [`ApiError`] when the HTTP client cannot be
    /// initialised.
    pub fn new(token: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Creates a client for an alternative endpoint.
    ///
    /// # Errors
    ///
    /// Returns a transport [`ApiError`] when the HTTP client cannot be
    /// initialised, e.g. because no TLS backend is available.
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| ApiError::transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| ApiError::transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ApiError::transport(err.to_string()))?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|err| {
                ApiError::response(
                    status.as_u16(),
                    "invalid_response",
                    format!("failed to decode response: {err}"),
                )
            });
        }

        Err(match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(parsed) => ApiError::response(status.as_u16(), parsed.error.code, parsed.error.message),
            Err(_) => ApiError::response(
                status.as_u16(),
                "http_error",
                String::from_utf8_lossy(&body).trim().to_owned(),
            ),
        })
    }
}

impl CloudApi for HttpCloudApi {
    fn list_servers<'a>(&'a self, label_selector: &'a str, page: u32) -> ApiFuture<'a, ServerPage> {
        Box::pin(async move {
            let request = self.client.get(self.url("/servers")).query(&[
                ("label_selector", label_selector.to_owned()),
                ("page", page.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ]);
            let response: ServerListResponse = self.send(request).await?;
            Ok::<_, ApiError>(ServerPage {
                servers: response.servers.into_iter().map(ManagedServer::from).collect(),
                next_page: response.meta.and_then(|meta| meta.pagination.next_page),
            })
        })
    }

    fn get_server(&self, id: u64) -> ApiFuture<'_, Option<ManagedServer>> {
        Box::pin(async move {
            let request = self.client.get(self.url(&format!("/servers/{id}")));
            match self.send::<ServerResponse>(request).await {
                Ok(response) => Ok(Some(response.server.into())),
                Err(err) if err.is_not_found() => Ok(None),
                Err(err) => Err(err),
            }
        })
    }

    fn create_server<'a>(
        &'a self,
        request: &'a CreateServerRequest,
    ) -> ApiFuture<'a, ManagedServer> {
        Box::pin(async move {
            let builder = self.client.post(self.url("/servers")).json(request);
            self.send::<ServerResponse>(builder)
                .await
                .map(|response| response.server.into())
        })
    }

    fn delete_server(&self, id: u64) -> ApiFuture<'_, Action> {
        Box::pin(async move {
            let request = self.client.delete(self.url(&format!("/servers/{id}")));
            self.send::<ActionResponse>(request)
                .await
                .map(|response| response.action)
        })
    }

    fn power_action(&self, id: u64, action: PowerAction) -> ApiFuture<'_, Action> {
        Box::pin(async move {
            let path = format!("/servers/{id}/actions/{}", action.endpoint());
            self.send::<ActionResponse>(self.client.post(self.url(&path)))
                .await
                .map(|response| response.action)
        })
    }

    fn enable_rescue<'a>(
        &'a self,
        id: u64,
        ssh_key_ids: &'a [u64],
    ) -> ApiFuture<'a, (String, Action)> {
        Box::pin(async move {
            let path = format!("/servers/{id}/actions/enable_rescue");
            let body = EnableRescueRequest {
                kind: "linux64",
                ssh_keys: ssh_key_ids,
            };
            let request = self.client.post(self.url(&path)).json(&body);
            self.send::<RescueResponse>(request)
                .await
                .map(|response| (response.root_password, response.action))
        })
    }

    fn disable_rescue(&self, id: u64) -> ApiFuture<'_, Action> {
        Box::pin(async move {
            let path = format!("/servers/{id}/actions/disable_rescue");
            self.send::<ActionResponse>(self.client.post(self.url(&path)))
                .await
                .map(|response| response.action)
        })
    }

    fn get_action(&self, id: u64) -> ApiFuture<'_, Action> {
        Box::pin(async move {
            let request = self.client.get(self.url(&format!("/actions/{id}")));
            self.send::<ActionResponse>(request)
                .await
                .map(|response| response.action)
        })
    }

    fn find_ssh_key_by_name<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<SshKey>> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.url("/ssh_keys"))
                .query(&[("name", name)]);
            self.send::<SshKeyListResponse>(request)
                .await
                .map(|response| response.ssh_keys.into_iter().find(|key| key.name == name))
        })
    }

    fn find_ssh_key_by_fingerprint<'a>(
        &'a self,
        fingerprint: &'a str,
    ) -> ApiFuture<'a, Option<SshKey>> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.url("/ssh_keys"))
                .query(&[("fingerprint", fingerprint)]);
            self.send::<SshKeyListResponse>(request)
                .await
                .map(|response| response.ssh_keys.into_iter().next())
        })
    }

    fn create_ssh_key<'a>(
        &'a self,
        name: &'a str,
        public_key: &'a str,
    ) -> ApiFuture<'a, SshKey> {
        Box::pin(async move {
            let body = CreateSshKeyRequest { name, public_key };
            let request = self.client.post(self.url("/ssh_keys")).json(&body);
            self.send::<SshKeyResponse>(request)
                .await
                .map(|response| response.ssh_key)
        })
    }
}
