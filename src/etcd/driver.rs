use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use jobstore_protocol::{Job, JobLog, SimpleJob, WorkLocation};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::engine::{Engine, JobFilter};
use crate::{
    driver::StorageDriver,
    error::{DriverError, DriverResult},
    metrics::{MetricsSink, NoopMetrics},
    params::{EngineConfig, Parameters},
    transport::{Connector, KeyValueStore},
};

/// [`StorageDriver`] over the etcd coordination store and the REST registry.
///
/// Reads share the engine; writes and reconfiguration take it exclusively,
/// so a multi-page scan never sees its transport swapped underneath it.
pub struct EtcdDriver {
    engine: RwLock<Engine>,
    metrics: Arc<dyn MetricsSink>,
}

impl EtcdDriver {
    /// Build the production stack: etcd v2 keys API plus an HTTP registry
    /// client. Needs `hosts` and `apiurl`.
    #[cfg(feature = "etcd")]
    pub fn new(parameters: Parameters) -> DriverResult<Self> {
        let hosts = required(&parameters, "hosts")?;
        let store = Arc::new(crate::http::EtcdKeyValue::new(&hosts)?);
        Self::with_backends(&parameters, store, crate::http::HttpTransport::connector())
    }

    /// Registry constructor
    #[cfg(feature = "etcd")]
    pub fn initialize(parameters: Parameters) -> DriverResult<Arc<dyn StorageDriver>> {
        Ok(Arc::new(Self::new(parameters)?))
    }

    pub fn with_backends(
        parameters: &Parameters,
        store: Arc<dyn KeyValueStore>,
        connector: Connector,
    ) -> DriverResult<Self> {
        Self::with_metrics(parameters, store, connector, Arc::new(NoopMetrics))
    }

    pub fn with_metrics(
        parameters: &Parameters,
        store: Arc<dyn KeyValueStore>,
        connector: Connector,
        metrics: Arc<dyn MetricsSink>,
    ) -> DriverResult<Self> {
        required(parameters, "hosts")?;
        let config = EngineConfig::from_parameters(parameters)?;
        info!(
            "etcd driver configured, apiurl {} readpagesize {}",
            config.api_url, config.read_page_size
        );

        let engine = Engine::new(config, connector, store, metrics.clone())?;
        Ok(Self {
            engine: RwLock::new(engine),
            metrics,
        })
    }

    /// Configuration currently in effect
    pub async fn config(&self) -> EngineConfig {
        self.engine.read().await.config().clone()
    }

    /// Single exit point for engine failures: log with context, count, and
    /// hand back nothing.
    fn degrade<T>(&self, op: &'static str, key: &dyn Display, result: DriverResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.metrics.driver_error(op, err.kind());
                if err.is_not_found() {
                    warn!(op, key = %key, "[cache] engine {} {} not found: {}", op, key, err);
                } else {
                    error!(op, key = %key, kind = err.kind(), "[cache] engine {} {} error: {}", op, key, err);
                }
                None
            }
        }
    }

    async fn read_jobs(&self, op: &'static str, filter: JobFilter) -> Vec<Job> {
        let result = self.engine.read().await.read_jobs(&filter).await;
        self.degrade(op, &filter, result).unwrap_or_default()
    }
}

fn required(parameters: &Parameters, key: &'static str) -> DriverResult<String> {
    parameters
        .get_str(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DriverError::construction(key, "missing"))
}

#[async_trait]
impl StorageDriver for EtcdDriver {
    async fn open(&self) -> DriverResult<()> {
        let engine = self.engine.read().await;
        engine.probe().await?;
        info!("etcd driver opened, registry {}", engine.config().api_url);
        Ok(())
    }

    async fn close(&self) {
        info!("etcd driver closed");
    }

    async fn set_config_parameters(&self, parameters: Parameters) {
        let config = match EngineConfig::from_parameters(&parameters) {
            Ok(config) => config,
            Err(err) => {
                error!("[cache] etcd driver parse configs error, {}", err);
                return;
            }
        };

        let mut engine = self.engine.write().await;
        let summary = format!("{} {}", config.api_url, config.read_page_size);
        match engine.reconfigure(config) {
            Ok(()) => info!("[cache] etcd driver configs changed, {}", summary),
            Err(err) => error!("[cache] etcd driver reconnect error, {}", err),
        }
    }

    async fn list_location_names(&self) -> Vec<String> {
        let result = self.engine.read().await.read_locations_name();
        self.degrade("list_location_names", &"locations", result)
            .unwrap_or_default()
    }

    async fn get_location(&self, location: &str) -> Option<WorkLocation> {
        let result = self.engine.read().await.get_location(location).await;
        self.degrade("get_location", &location, result)
    }

    async fn set_location(&self, location: &WorkLocation) -> bool {
        let result = self.engine.write().await.post_location(location).await;
        self.degrade("set_location", &location.location, result)
            .is_some()
    }

    async fn list_simple_jobs_by_location(&self, location: &str) -> Vec<SimpleJob> {
        let filter = JobFilter::Location(location.to_string());
        let result = self.engine.read().await.read_simple_jobs(&filter).await;
        self.degrade("list_simple_jobs_by_location", &filter, result)
            .unwrap_or_default()
    }

    async fn get_simple_job(&self, job_id: &str) -> Option<SimpleJob> {
        let result = self.engine.read().await.get_simple_job(job_id).await;
        self.degrade("get_simple_job", &job_id, result)
    }

    async fn list_all_jobs(&self) -> Vec<Job> {
        self.read_jobs("list_all_jobs", JobFilter::All).await
    }

    async fn list_jobs_by_state(&self, state: i32) -> Vec<Job> {
        self.read_jobs("list_jobs_by_state", JobFilter::State(state))
            .await
    }

    async fn list_jobs_by_location(&self, location: &str) -> Vec<Job> {
        self.read_jobs(
            "list_jobs_by_location",
            JobFilter::Location(location.to_string()),
        )
        .await
    }

    async fn list_jobs_by_group(&self, group_id: &str) -> Vec<Job> {
        self.read_jobs("list_jobs_by_group", JobFilter::Group(group_id.to_string()))
            .await
    }

    async fn get_job(&self, job_id: &str) -> Option<Job> {
        let result = self.engine.read().await.get_job(job_id).await;
        self.degrade("get_job", &job_id, result)
    }

    async fn put_job(&self, job: &Job) -> bool {
        let result = self.engine.write().await.put_job(job).await;
        self.degrade("put_job", &job.job_id, result).is_some()
    }

    async fn append_job_log(&self, log: &JobLog) -> bool {
        let result = self.engine.write().await.post_job_log(log).await;
        self.degrade("append_job_log", &log.job_id, result)
            .is_some()
    }
}
