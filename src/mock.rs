//! In-memory stand-ins for the coordination service and the job registry.
//!
//! Used by the test suites; they behave like the real services closely
//! enough to exercise paging, filtering and failure handling.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use jobstore_protocol::{JOBS_PATH, Job, SimpleJob};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};

use crate::{
    error::{DriverError, DriverResult},
    etcd::DEFAULT_LOCATION_NAME,
    params::{DEFAULT_READ_PAGE_SIZE, EngineConfig},
    transport::{Connector, KeyValueStore, RawResponse, Transport},
};

// ============================================================================
// Coordination store
// ============================================================================

#[derive(Default)]
pub struct MemoryKeyValue {
    entries: DashMap<String, Vec<u8>>,
    unavailable: AtomicBool,
}

impl MemoryKeyValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail at the transport level
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> DriverResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DriverError::Transport("coordination service unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValue {
    async fn get(&self, key: &str) -> DriverResult<Vec<u8>> {
        self.check()?;
        self.entries
            .get(key)
            .map(|v| v.value().clone())
            .ok_or_else(|| DriverError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> DriverResult<()> {
        self.check()?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

// ============================================================================
// Job registry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Connection-level failure
    Transport,
    /// Reply with this HTTP status and an empty body
    Status(u16),
    /// Reply 200 with a truncated JSON body
    Garbage,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Registry {
    jobs: RwLock<Vec<Job>>,
    page_failures: Mutex<HashMap<usize, MockFailure>>,
    job_failures: Mutex<HashMap<String, u16>>,
    calls: Mutex<Vec<RecordedCall>>,
    connected: Mutex<Vec<String>>,
    refuse: AtomicBool,
    overlap: AtomicUsize,
    reported_total: Mutex<Option<usize>>,
}

/// Scripted paginating job registry.
///
/// Clones share state, so a test keeps one handle for assertions while the
/// engine owns others.
#[derive(Clone, Default)]
pub struct PagedTransport {
    inner: Arc<Registry>,
}

impl PagedTransport {
    pub fn new(jobs: Vec<Job>) -> Self {
        let transport = Self::default();
        *transport.inner.jobs.write() = jobs;
        transport
    }

    /// Start every page after the first `overlap` records early, the way a
    /// registry behaves when rows are inserted ahead of the cursor.
    pub fn with_overlap(self, overlap: usize) -> Self {
        self.inner.overlap.store(overlap, Ordering::SeqCst);
        self
    }

    /// Report this total instead of the real collection size
    pub fn with_reported_total(self, total: usize) -> Self {
        *self.inner.reported_total.lock() = Some(total);
        self
    }

    pub fn fail_page(&self, page_index: usize, failure: MockFailure) {
        self.inner.page_failures.lock().insert(page_index, failure);
    }

    pub fn fail_job(&self, job_id: &str, status: u16) {
        self.inner.job_failures.lock().insert(job_id.to_string(), status);
    }

    pub fn clear_failures(&self) {
        self.inner.page_failures.lock().clear();
        self.inner.job_failures.lock().clear();
    }

    /// Make the connector refuse to build new transports
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.calls.lock().clone()
    }

    /// `pageIndex` of every collection request, in arrival order
    pub fn page_indexes(&self) -> Vec<usize> {
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|c| c.path == JOBS_PATH)
            .filter_map(|c| c.param("pageIndex")?.parse().ok())
            .collect()
    }

    /// Base URLs the connector was asked to connect to
    pub fn connected_urls(&self) -> Vec<String> {
        self.inner.connected.lock().clone()
    }

    pub fn connector(&self) -> Connector {
        let transport = self.clone();
        Arc::new(move |config: &EngineConfig| {
            if transport.inner.refuse.load(Ordering::SeqCst) {
                return Err(DriverError::Transport(format!(
                    "connection to {} refused",
                    config.api_url
                )));
            }
            transport.inner.connected.lock().push(config.api_url.to_string());
            Ok(Arc::new(transport.clone()) as Arc<dyn Transport>)
        })
    }

    fn serve_page(&self, call: &RecordedCall) -> DriverResult<RawResponse> {
        let page_index: usize = call
            .param("pageIndex")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
            .max(1);

        if let Some(failure) = self.inner.page_failures.lock().get(&page_index).copied() {
            return failed(failure, page_index);
        }

        let page_size: usize = call
            .param("pageSize")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_READ_PAGE_SIZE)
            .max(1);

        let jobs = self.inner.jobs.read();
        let filtered: Vec<&Job> = jobs.iter().filter(|job| matches_filters(job, call)).collect();

        let start = (page_index - 1) * page_size;
        let overlap = if page_index > 1 {
            self.inner.overlap.load(Ordering::SeqCst)
        } else {
            0
        };
        let from = start.saturating_sub(overlap).min(filtered.len());
        let to = (start + page_size).min(filtered.len());

        let projected = call.param("fields").is_some();
        let rows = filtered[from..to]
            .iter()
            .map(|job| {
                if projected {
                    serde_json::to_value(SimpleJob::from(*job))
                } else {
                    serde_json::to_value(job)
                }
            })
            .collect::<Result<Vec<Value>, _>>()?;

        let total = self.inner.reported_total.lock().unwrap_or(filtered.len());
        let body = json!({ "total_rows": total, "jobs": rows });
        Ok(RawResponse::new(200, serde_json::to_vec(&body)?))
    }

    fn serve_job(&self, job_id: &str) -> DriverResult<RawResponse> {
        if let Some(status) = self.inner.job_failures.lock().get(job_id).copied() {
            return Ok(RawResponse::new(status, ""));
        }

        let jobs = self.inner.jobs.read();
        match jobs.iter().find(|job| job.job_id == job_id) {
            Some(job) => Ok(RawResponse::new(200, serde_json::to_vec(job)?)),
            None => Ok(RawResponse::new(204, "")),
        }
    }
}

fn failed(failure: MockFailure, page_index: usize) -> DriverResult<RawResponse> {
    match failure {
        MockFailure::Transport => Err(DriverError::Transport(format!(
            "connection reset while reading page {page_index}"
        ))),
        MockFailure::Status(status) => Ok(RawResponse::new(status, "")),
        MockFailure::Garbage => Ok(RawResponse::new(200, r#"{"total_rows": 4, "jobs": [{"#)),
    }
}

fn matches_filters(job: &Job, call: &RecordedCall) -> bool {
    if call.param("f_location").is_some_and(|v| v != job.location) {
        return false;
    }
    if call.param("f_groupid").is_some_and(|v| v != job.group_id) {
        return false;
    }
    if let Some(state) = call.param("f_stat") {
        return state.parse::<i32>().is_ok_and(|s| s == job.state);
    }
    true
}

#[async_trait]
impl Transport for PagedTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> DriverResult<RawResponse> {
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;

        let call = RecordedCall {
            path: path.to_string(),
            query: query.to_vec(),
        };
        self.inner.calls.lock().push(call.clone());

        if path == JOBS_PATH {
            return self.serve_page(&call);
        }
        match path.strip_prefix(JOBS_PATH).and_then(|p| p.strip_prefix('/')) {
            Some(job_id) => self.serve_job(job_id),
            None => Ok(RawResponse::new(404, "")),
        }
    }
}

/// `n` jobs spread over two locations, three groups and four states
pub fn sample_jobs(n: usize) -> Vec<Job> {
    (0..n)
        .map(|i| Job {
            job_id: format!("job-{i:04}"),
            name: format!("nightly-{i}"),
            location: if i % 2 == 0 {
                DEFAULT_LOCATION_NAME.to_string()
            } else {
                "edge".to_string()
            },
            group_id: format!("g{}", i % 3),
            servers: vec![format!("10.0.0.{}", i % 250 + 1)],
            enabled: i % 5 != 0,
            state: (i % 4) as i32,
            cmd: "echo done".to_string(),
            ..Default::default()
        })
        .collect()
}
