//! HTTP client for a remote fleet registry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{App, Node, NodeCandidate, RegistryApi};
use crate::error::{Result, SyncError};

/// Client speaking the registry protocol over HTTP.
///
/// URI layout: `apps/{appId}`, `apps/{appId}/nodes/{nodeId}` and
/// `apps/{appId}/configuration` under the configured base URL.
///
/// # Examples
///
/// ```rust,no_run
/// use driftsync::registry::RegistryClient;
///
/// # fn example() -> driftsync::error::Result<()> {
/// let client = RegistryClient::new("https://registry.example.com")?;
/// # Ok(())
/// # }
/// ```
pub struct RegistryClient {
    base_url: String,
    client: Client,
}

impl RegistryClient {
    /// Create a client with a 10 second request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SyncError::Registry(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    fn app_uri(&self, app_id: &str) -> String {
        format!("{}/apps/{}", self.base_url, app_id)
    }

    fn node_uri(&self, app_id: &str, node_id: &str) -> String {
        format!("{}/nodes/{}", self.app_uri(app_id), node_id)
    }

    async fn read<T>(
        response: reqwest::Response,
        not_found: impl FnOnce() -> SyncError,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Err(not_found());
        }
        if !status.is_success() {
            return Err(SyncError::Registry(format!(
                "Unexpected status {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }
        response
            .json()
            .await
            .map_err(|e| SyncError::Registry(format!("Failed to parse response body: {e}")))
    }
}

#[async_trait]
impl RegistryApi for RegistryClient {
    async fn put_node(
        &self,
        app_id: &str,
        node_id: &str,
        candidate: NodeCandidate,
    ) -> Result<Node> {
        let response = self
            .client
            .put(self.node_uri(app_id, node_id))
            .json(&candidate)
            .send()
            .await
            .map_err(|e| SyncError::Registry(format!("put-node request failed: {e}")))?;

        Self::read(response, || SyncError::NodeNotFound {
            app_id: app_id.to_string(),
            node_id: node_id.to_string(),
        })
        .await
    }

    async fn get_node(&self, app_id: &str, node_id: &str) -> Result<Node> {
        let response = self
            .client
            .get(self.node_uri(app_id, node_id))
            .send()
            .await
            .map_err(|e| SyncError::Registry(format!("get-node request failed: {e}")))?;

        Self::read(response, || SyncError::NodeNotFound {
            app_id: app_id.to_string(),
            node_id: node_id.to_string(),
        })
        .await
    }

    async fn get_app(&self, app_id: &str) -> Result<App> {
        let response = self
            .client
            .get(self.app_uri(app_id))
            .send()
            .await
            .map_err(|e| SyncError::Registry(format!("get-app request failed: {e}")))?;

        Self::read(response, || SyncError::AppNotFound {
            app_id: app_id.to_string(),
        })
        .await
    }

    async fn put_configuration(&self, app_id: &str, configuration: Value) -> Result<App> {
        let response = self
            .client
            .put(format!("{}/configuration", self.app_uri(app_id)))
            .json(&configuration)
            .send()
            .await
            .map_err(|e| SyncError::Registry(format!("put-configuration request failed: {e}")))?;

        Self::read(response, || SyncError::AppNotFound {
            app_id: app_id.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_layout() {
        let client = RegistryClient::new("https://manager.example.com/").unwrap();
        assert_eq!(
            client.app_uri("shop"),
            "https://manager.example.com/apps/shop"
        );
        assert_eq!(
            client.node_uri("shop", "node-1"),
            "https://manager.example.com/apps/shop/nodes/node-1"
        );
    }

    #[test]
    fn test_trailing_slashes_are_trimmed() {
        let client = RegistryClient::new("http://localhost:8080///").unwrap();
        assert_eq!(client.app_uri("a"), "http://localhost:8080/apps/a");
    }
}
