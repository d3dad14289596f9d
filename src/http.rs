//! reqwest-backed implementations of the transport seams.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{DriverError, DriverResult},
    params::EngineConfig,
    transport::{Connector, KeyValueStore, RawResponse, Transport},
};

/// Per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 25;

fn build_client() -> DriverResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!("jobstore/{}", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .tcp_keepalive(TCP_KEEPALIVE)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| DriverError::Transport(format!("failed to create HTTP client: {e}")))
}

fn transport_error(url: &Url, err: reqwest::Error) -> DriverError {
    DriverError::Transport(format!("{url}: {err}"))
}

// ============================================================================
// Registry transport
// ============================================================================

/// HTTP client for the job registry, rooted at the configured `apiurl`
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(config: &EngineConfig) -> DriverResult<Self> {
        Ok(Self {
            client: build_client()?,
            base: config.api_url.clone(),
        })
    }

    pub fn connector() -> Connector {
        Arc::new(|config: &EngineConfig| {
            Ok(Arc::new(HttpTransport::new(config)?) as Arc<dyn Transport>)
        })
    }

    /// Append `path` to the base path; the base query string is kept.
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let joined = format!("{}{}", self.base.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> DriverResult<RawResponse> {
        let url = self.endpoint(path);
        debug!("HTTP GET {} {:?}", url, query);

        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&url, e))?;

        Ok(RawResponse::new(status, body.to_vec()))
    }
}

// ============================================================================
// Coordination store
// ============================================================================

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: KeysNode,
}

#[derive(Debug, Deserialize)]
struct KeysNode {
    #[serde(default)]
    value: Option<String>,
}

/// Coordination store over the etcd v2 keys API.
///
/// `hosts` is a comma separated endpoint list; requests go to the first
/// endpoint that answers.
pub struct EtcdKeyValue {
    client: reqwest::Client,
    endpoints: Vec<Url>,
}

impl EtcdKeyValue {
    pub fn new(hosts: &str) -> DriverResult<Self> {
        let endpoints = hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| {
                let raw = if h.contains("://") {
                    h.to_string()
                } else {
                    format!("http://{h}")
                };
                Url::parse(&raw).map_err(|e| DriverError::construction("hosts", format!("{h}: {e}")))
            })
            .collect::<DriverResult<Vec<_>>>()?;

        if endpoints.is_empty() {
            return Err(DriverError::construction("hosts", "no endpoint given"));
        }

        Ok(Self {
            client: build_client()?,
            endpoints,
        })
    }

    fn key_url(endpoint: &Url, key: &str) -> Url {
        let mut url = endpoint.clone();
        url.set_path(&format!("/v2/keys/{}", key.trim_start_matches('/')));
        url
    }

    async fn send(&self, key: &str, value: Option<&str>) -> DriverResult<reqwest::Response> {
        let mut last_err = None;
        for endpoint in &self.endpoints {
            let url = Self::key_url(endpoint, key);
            let request = match value {
                Some(value) => self.client.put(url.clone()).form(&[("value", value)]),
                None => self.client.get(url.clone()),
            };
            match request.send().await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!("etcd endpoint {} unreachable: {}", endpoint, err);
                    last_err = Some(transport_error(&url, err));
                }
            }
        }
        Err(last_err.unwrap_or_else(|| DriverError::Transport("no etcd endpoint".into())))
    }
}

#[async_trait]
impl KeyValueStore for EtcdKeyValue {
    async fn get(&self, key: &str) -> DriverResult<Vec<u8>> {
        let response = self.send(key, None).await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DriverError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(DriverError::RemoteStatus {
                status: status.as_u16(),
                path: key.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DriverError::Transport(e.to_string()))?;
        let keys: KeysResponse = serde_json::from_slice(&body)?;
        keys.node
            .value
            .map(String::into_bytes)
            .ok_or_else(|| DriverError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> DriverResult<()> {
        let value = String::from_utf8_lossy(&value);
        let response = self.send(key, Some(value.as_ref())).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::RemoteStatus {
                status: status.as_u16(),
                path: key.to_string(),
            });
        }
        Ok(())
    }
}
