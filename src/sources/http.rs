//! Remote HTTP/HTTPS backing source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::HeaderValue};
use serde_json::Value;

use super::BackingStore;
use crate::error::{Result, SyncError};

/// Placeholder substituted with the document id in a URL template.
const ID_PLACEHOLDER: &str = "{id}";

/// Authentication method for HTTP requests.
#[derive(Clone)]
pub enum HttpAuth {
    /// No authentication
    None,
    /// Bearer token authentication
    Bearer(String),
    /// Basic authentication (username, password)
    Basic(String, String),
}

/// HTTP-based backing source.
///
/// Fetches configuration documents from a remote HTTP/HTTPS endpoint.
/// The URL may contain a `{id}` placeholder that is substituted with the
/// requested document id; without one, the endpoint is treated as serving
/// a single document. HTTP endpoints cannot push changes, so this source
/// is poll-only.
///
/// # Examples
///
/// ```rust,no_run
/// use driftsync::sources::HttpSource;
/// use std::time::Duration;
///
/// # fn example() -> driftsync::error::Result<()> {
/// let source = HttpSource::builder()
///     .with_url("https://config.example.com/api/configs/{id}")
///     .with_auth_token("secret-token")
///     .with_timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HttpSource {
    url: String,
    client: Client,
    auth: HttpAuth,
}

impl HttpSource {
    /// Create a new builder for constructing an HTTP source.
    pub fn builder() -> HttpSourceBuilder {
        HttpSourceBuilder::new()
    }

    fn url_for(&self, document_id: &str) -> String {
        if self.url.contains(ID_PLACEHOLDER) {
            self.url.replace(ID_PLACEHOLDER, document_id)
        } else {
            self.url.clone()
        }
    }
}

#[async_trait]
impl BackingStore for HttpSource {
    async fn fetch_current(&self, document_id: &str) -> Result<Option<Value>> {
        let mut request = self.client.get(self.url_for(document_id));

        request = match &self.auth {
            HttpAuth::None => request,
            HttpAuth::Bearer(token) => {
                let header_value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| SyncError::Fetch(format!("Invalid bearer token: {e}")))?;
                request.header("Authorization", header_value)
            }
            HttpAuth::Basic(username, password) => request.basic_auth(username, Some(password)),
        };

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Fetch(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SyncError::Fetch(format!(
                "HTTP request failed with status {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| SyncError::Fetch(format!("Failed to parse JSON body: {e}")))?;

        Ok(Some(document))
    }

    fn name(&self) -> String {
        format!("http:{}", self.url)
    }
}

/// Builder for constructing an [`HttpSource`].
pub struct HttpSourceBuilder {
    url: Option<String>,
    auth: HttpAuth,
    timeout: Duration,
}

impl HttpSourceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: None,
            auth: HttpAuth::None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the URL to fetch documents from. A `{id}` placeholder, if
    /// present, is replaced with the document id on each fetch.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set Bearer token authentication.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth = HttpAuth::Bearer(token.into());
        self
    }

    /// Set Basic authentication.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = HttpAuth::Basic(username.into(), password.into());
        self
    }

    /// Set the request timeout. Default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the HTTP source.
    ///
    /// # Errors
    ///
    /// Returns an error if no URL is provided or the HTTP client cannot
    /// be constructed.
    pub fn build(self) -> Result<HttpSource> {
        let url = self
            .url
            .ok_or_else(|| SyncError::Fetch("URL is required for HttpSource".to_string()))?;

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| SyncError::Fetch(format!("Failed to create HTTP client: {e}")))?;

        Ok(HttpSource {
            url,
            client,
            auth: self.auth,
        })
    }
}

impl Default for HttpSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
