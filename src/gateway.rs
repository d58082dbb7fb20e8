use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::GatewayConfig;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("invalid gateway url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("gateway returned HTTP {0}")]
    Status(StatusCode),
}

/// Metadata for a content bundle as reported by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub files: Vec<BundleFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleFile {
    pub path: String,
    #[serde(default)]
    pub length: u64,
}

/// Client for the HTTP gateway in front of the torrent engine.
///
/// Every request is authenticated with HTTP Basic credentials; the same
/// credentials are handed to the renderer as a pre-encoded header so it can
/// open the stream URL itself.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base64 `username:password`, the value after `Basic ` in an
    /// `Authorization` header.
    pub fn authorization_token(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.username, self.password))
    }

    /// Resolve a magnet link into the bundle name, description and file list.
    pub async fn lookup(&self, magnet: &str) -> Result<BundleInfo, GatewayError> {
        let mut url = Url::parse(&self.base_url)?.join("/info")?;
        url.query_pairs_mut().append_pair("magnet", magnet);

        let short: String = magnet.chars().take(60).collect();
        info!(magnet = %short, "getting info for magnet link");

        let response = self.get(url.as_str()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status));
        }

        let info: BundleInfo = response.json().await?;
        debug!(name = %info.name, files = info.files.len(), "bundle info received");
        Ok(info)
    }

    pub fn stream_url(&self, magnet: &str, path: &str) -> Result<String, GatewayError> {
        stream_url(&self.base_url, magnet, path)
    }

    /// Authenticated GET; status handling is left to the caller.
    pub async fn get(&self, url: &str) -> Result<Response, GatewayError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Ok(response)
    }

    /// Reachability check used by `doctor`.
    pub async fn ping(&self) -> Result<StatusCode, GatewayError> {
        let response = self.get(&self.base_url).await?;
        Ok(response.status())
    }
}

/// Build the URL that streams `path` out of the bundle identified by `magnet`.
pub fn stream_url(base: &str, magnet: &str, path: &str) -> Result<String, GatewayError> {
    let mut stream = Url::parse(base)?.join("/stream")?;
    stream
        .query_pairs_mut()
        .append_pair("magnet", magnet)
        .append_pair("path", path);
    Ok(stream.into())
}
