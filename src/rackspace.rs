// Rackspace Cloud Servers API Client
//
// Talks to the v1.0 Cloud Servers REST API: token auth, server create and reload.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::compute::{CloudServers, Server, ServerRequest};

pub const DEFAULT_AUTH_URL: &str = "https://auth.api.rackspacecloud.com/v1.0";

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const MANAGEMENT_URL_HEADER: &str = "X-Server-Management-Url";

/// Authenticated Cloud Servers client
pub struct RackspaceClient {
    client: Client,
    management_url: String,
    auth_token: String,
}

/// Request and response envelope used by every server endpoint
#[derive(Debug, Serialize, Deserialize)]
struct ServerEnvelope<T> {
    server: T,
}

impl RackspaceClient {
    /// Authenticate and return a client bound to the account's management URL
    ///
    /// # Arguments
    /// * `auth_url` - Auth endpoint (e.g., "https://auth.api.rackspacecloud.com/v1.0")
    /// * `username` - Rackspace account username
    /// * `api_key` - Rackspace API key
    pub async fn authenticate(auth_url: &str, username: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("rackstrap/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        info!("Authenticating {} against {}", username, auth_url);

        let response = client
            .get(auth_url)
            .header("X-Auth-User", username)
            .header("X-Auth-Key", api_key)
            .send()
            .await
            .context("Failed to send authentication request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Authentication failed: {} - {}", status, body);
            anyhow::bail!("Rackspace authentication failed: {} - {}", status, body);
        }

        let auth_token = header_value(&response, AUTH_TOKEN_HEADER)?;
        let management_url = header_value(&response, MANAGEMENT_URL_HEADER)?;

        debug!("Server management URL: {}", management_url);

        Ok(Self {
            client,
            management_url: management_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    pub fn management_url(&self) -> &str {
        &self.management_url
    }

    /// Create a server. The response carries the generated admin password.
    pub async fn create_server(&self, request: &ServerRequest) -> Result<Server> {
        let url = format!("{}/servers", self.management_url);

        info!(
            "Creating server {} (flavor {}, image {})",
            request.name, request.flavor_id, request.image_id
        );

        let response = self.client
            .post(&url)
            .header(AUTH_TOKEN_HEADER, &self.auth_token)
            .header(header::ACCEPT, "application/json")
            .json(&ServerEnvelope { server: request })
            .send()
            .await
            .context("Failed to send create server request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Failed to create server: {} - {}", status, body);
            anyhow::bail!("Rackspace API error: {} - {}", status, body);
        }

        let created: ServerEnvelope<Server> = response.json().await
            .context("Failed to parse create server response")?;

        info!("Server {} created with id {}", created.server.name, created.server.id);
        Ok(created.server)
    }

    /// Reload a server's current state
    pub async fn get_server(&self, id: u64) -> Result<Server> {
        let url = format!("{}/servers/{}", self.management_url, id);

        let response = self.client
            .get(&url)
            .header(AUTH_TOKEN_HEADER, &self.auth_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .context("Failed to get server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to get server {}: {} - {}", id, status, body);
        }

        let resp: ServerEnvelope<Server> = response.json().await
            .context("Failed to parse server response")?;

        debug!("Server {} status {} ({}%)", id, resp.server.status, resp.server.progress);
        Ok(resp.server)
    }
}

fn header_value(response: &Response, name: &str) -> Result<String> {
    let value = response
        .headers()
        .get(name)
        .with_context(|| format!("Authentication response is missing {}", name))?;

    value
        .to_str()
        .map(str::to_string)
        .with_context(|| format!("Invalid {} header", name))
}

#[async_trait]
impl CloudServers for RackspaceClient {
    async fn create_server(&self, request: &ServerRequest) -> Result<Server> {
        RackspaceClient::create_server(self, request).await
    }

    async fn get_server(&self, id: u64) -> Result<Server> {
        RackspaceClient::get_server(self, id).await
    }
}
