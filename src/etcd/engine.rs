//! Remote registry client.
//!
//! Collection reads walk the registry page by page, strictly in order, until
//! the accumulated (deduplicated) records cover the total the registry
//! reports. Any failed page aborts the whole read; partial results are never
//! returned.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use jobstore_protocol::{
    JOBS_PATH, Job, JobLog, JobRecord, Page, SIMPLE_JOB_FIELDS, SimpleJob, WorkLocation,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    error::{DriverError, DriverResult},
    metrics::{MetricsSink, elapsed_ms},
    params::EngineConfig,
    transport::{Connector, KeyValueStore, Query, RawResponse, Transport},
};

/// Coordination key holding the serialized work location
pub const WORK_LOCATION_KEY: &str = "/cloudtask/location";

/// Only one location is supported for now.
pub const DEFAULT_LOCATION_NAME: &str = "myCluster";

const STATUS_NO_CONTENT: u16 = 204;

/// Filter applied to a collection read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFilter {
    All,
    Location(String),
    Group(String),
    State(i32),
}

impl JobFilter {
    pub fn query(&self) -> Query {
        match self {
            JobFilter::All => Vec::new(),
            JobFilter::Location(location) => vec![("f_location".into(), location.clone())],
            JobFilter::Group(group_id) => vec![("f_groupid".into(), group_id.clone())],
            JobFilter::State(state) => vec![("f_stat".into(), state.to_string())],
        }
    }
}

impl fmt::Display for JobFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFilter::All => write!(f, "all"),
            JobFilter::Location(location) => write!(f, "location={location}"),
            JobFilter::Group(group_id) => write!(f, "groupid={group_id}"),
            JobFilter::State(state) => write!(f, "stat={state}"),
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    connector: Connector,
    store: Arc<dyn KeyValueStore>,
    metrics: Arc<dyn MetricsSink>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        connector: Connector,
        store: Arc<dyn KeyValueStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> DriverResult<Self> {
        let transport = connector(&config)?;
        Ok(Self {
            config,
            transport,
            connector,
            store,
            metrics,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Swap in a transport built for `config`. On failure the current
    /// transport and configuration stay untouched.
    pub fn reconfigure(&mut self, config: EngineConfig) -> DriverResult<()> {
        let transport = (self.connector)(&config)?;
        self.transport = transport;
        self.config = config;
        Ok(())
    }

    /// Check that the coordination store answers. An unset location key is
    /// fine.
    pub async fn probe(&self) -> DriverResult<()> {
        match self.store.get(WORK_LOCATION_KEY).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    // ------------------------------------------------------------------------
    // Locations
    // ------------------------------------------------------------------------

    pub async fn get_location(&self, _location: &str) -> DriverResult<WorkLocation> {
        let raw = self.store.get(WORK_LOCATION_KEY).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub async fn post_location(&self, location: &WorkLocation) -> DriverResult<()> {
        let raw = serde_json::to_vec(location)?;
        self.store.set(WORK_LOCATION_KEY, raw).await
    }

    pub fn read_locations_name(&self) -> DriverResult<Vec<String>> {
        Ok(vec![DEFAULT_LOCATION_NAME.to_string()])
    }

    // ------------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------------

    pub async fn read_simple_jobs(&self, filter: &JobFilter) -> DriverResult<Vec<SimpleJob>> {
        let mut query = filter.query();
        query.push(("fields".into(), serde_json::to_string(&SIMPLE_JOB_FIELDS)?));
        self.read_pages(query).await
    }

    pub async fn read_jobs(&self, filter: &JobFilter) -> DriverResult<Vec<Job>> {
        self.read_pages(filter.query()).await
    }

    async fn read_pages<T>(&self, mut query: Query) -> DriverResult<Vec<T>>
    where
        T: DeserializeOwned + JobRecord,
    {
        query.push(("pageSize".into(), self.config.read_page_size.to_string()));

        let started = Instant::now();
        let mut records: Vec<T> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut page_index = 1usize;

        loop {
            if page_index > self.config.max_pages {
                return Err(DriverError::PageLimitExceeded {
                    path: JOBS_PATH.to_string(),
                    pages: self.config.max_pages,
                });
            }

            let mut page_query = query.clone();
            page_query.push(("pageIndex".into(), page_index.to_string()));

            let page_started = Instant::now();
            let response = self.transport.get(JOBS_PATH, &page_query).await?;
            self.metrics.page_fetched(elapsed_ms(page_started));
            let page: Page<T> = checked(response, JOBS_PATH)?.json()?;

            let received = page.jobs.len();
            for record in page.jobs {
                if seen.insert(record.job_id().to_owned()) {
                    records.push(record);
                }
            }

            debug!(
                page_index,
                received,
                accumulated = records.len(),
                total_rows = page.total_rows,
                "Fetched {} page",
                JOBS_PATH
            );

            // The total is re-read from every page; it may drift while we scan.
            if records.len() >= page.total_rows {
                break;
            }
            if received == 0 {
                warn!(
                    page_index,
                    accumulated = records.len(),
                    total_rows = page.total_rows,
                    "{} ran out of pages before reaching reported total",
                    JOBS_PATH
                );
                break;
            }
            page_index += 1;
        }

        self.metrics
            .collection_fetched(page_index, elapsed_ms(started));
        Ok(records)
    }

    pub async fn get_job(&self, job_id: &str) -> DriverResult<Job> {
        let path = format!("{JOBS_PATH}/{job_id}");
        let response = checked(self.transport.get(&path, &[]).await?, &path)?;
        if response.status == STATUS_NO_CONTENT {
            return Err(DriverError::NotFound(format!("job {job_id}")));
        }
        response.json()
    }

    /// Projection of [`Engine::get_job`]; shares its single remote call.
    pub async fn get_simple_job(&self, job_id: &str) -> DriverResult<SimpleJob> {
        let job = self.get_job(job_id).await?;
        Ok(SimpleJob::from(&job))
    }

    // TODO: wire to the registry's job upsert endpoint once its request format is published.
    pub async fn put_job(&self, job: &Job) -> DriverResult<()> {
        debug!(job_id = %job.job_id, "put job accepted, remote write not wired");
        Ok(())
    }

    pub async fn post_job_log(&self, log: &JobLog) -> DriverResult<()> {
        debug!(job_id = %log.job_id, "post job log accepted, remote write not wired");
        Ok(())
    }
}

fn checked(response: RawResponse, path: &str) -> DriverResult<RawResponse> {
    if response.is_error() {
        return Err(DriverError::RemoteStatus {
            status: response.status,
            path: path.to_string(),
        });
    }
    Ok(response)
}
