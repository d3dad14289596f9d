//! Seams to the two external services a backend talks to.
//!
//! Implementors own connection lifecycle only; paging, error policy and
//! locking live in the engine and adapter above them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::{error::DriverResult, params::EngineConfig};

pub type Query = Vec<(String, String)>;

/// Status code and body of a completed request
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    pub fn json<T: DeserializeOwned>(&self) -> DriverResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Request executor for the remote job registry
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// `GET {base}{path}?{query}`. Transport-level failures map to
    /// [`DriverError::Transport`](crate::DriverError::Transport); any HTTP
    /// status is a successful return.
    async fn get(&self, path: &str, query: &[(String, String)]) -> DriverResult<RawResponse>;
}

/// Builds a transport for a given engine configuration.
///
/// Called at construction and again on every reconfiguration.
pub type Connector = Arc<dyn Fn(&EngineConfig) -> DriverResult<Arc<dyn Transport>> + Send + Sync>;

/// Single-key read/write primitive of the coordination service
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Raw bytes stored under `key`, or `DriverError::NotFound`
    async fn get(&self, key: &str) -> DriverResult<Vec<u8>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> DriverResult<()>;
}
