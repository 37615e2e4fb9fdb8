//! Diagram rendering through the mermaid.ink web service.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use reqwest::blocking::Client;
use tracing::debug;

use super::{ArtifactRenderer, RenderError, RenderFormat};
use crate::cache::normalize_source;

/// Public mermaid.ink instance.
pub const DEFAULT_ENDPOINT: &str = "https://mermaid.ink";

/// HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the blocking client both renderers fetch with.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("flint/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// GET `url` and return the body, mapping failures onto [`RenderError`].
pub(crate) fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, RenderError> {
    let response = client.get(url).send().map_err(map_transport_error)?;
    let status = response.status();
    if status.is_client_error() {
        return Err(RenderError::InvalidSource(format!("server rejected request ({status})")));
    }
    if !status.is_success() {
        return Err(RenderError::Network(format!("server error ({status})")));
    }
    let body = response.bytes().map_err(map_transport_error)?;
    if body.is_empty() {
        return Err(RenderError::Network("empty response body".to_string()));
    }
    Ok(body.to_vec())
}

fn map_transport_error(err: reqwest::Error) -> RenderError {
    if err.is_timeout() {
        RenderError::Timeout
    } else {
        RenderError::Network(err.to_string())
    }
}

/// Renders mermaid source by asking a mermaid.ink server for the picture.
pub struct MermaidInkRenderer {
    client: Client,
    endpoint: String,
    version_tag: String,
}

impl MermaidInkRenderer {
    /// Create a renderer talking to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> reqwest::Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        Ok(Self {
            client: http_client(timeout)?,
            version_tag: format!("mermaid.ink/1 {endpoint}"),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request URL for `source` in `format`.
    pub fn url_for(&self, source: &str, format: RenderFormat) -> String {
        let encoded = URL_SAFE.encode(normalize_source(source));
        match format {
            RenderFormat::Png => format!(
                "{}/img/{encoded}?type=png&bgColor=transparent",
                self.endpoint
            ),
            RenderFormat::Svg => format!("{}/svg/{encoded}?bgColor=transparent", self.endpoint),
        }
    }
}

impl ArtifactRenderer for MermaidInkRenderer {
    fn version_tag(&self) -> &str {
        &self.version_tag
    }

    fn render(&self, source: &str, format: RenderFormat) -> Result<Vec<u8>, RenderError> {
        if normalize_source(source).is_empty() {
            return Err(RenderError::InvalidSource("empty diagram".to_string()));
        }
        let url = self.url_for(source, format);
        debug!(endpoint = %self.endpoint, format = format.name(), "requesting diagram");
        let bytes = fetch_bytes(&self.client, &url)?;
        if !format.matches_header(&bytes) {
            return Err(RenderError::Network(format!(
                "response is not a {} image",
                format.name()
            )));
        }
        Ok(bytes)
    }
}
