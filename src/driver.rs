use async_trait::async_trait;
use jobstore_protocol::{Job, JobLog, SimpleJob, WorkLocation};

use crate::{error::DriverResult, params::Parameters};

/// Storage backend contract consumed by the job cache.
///
/// Read accessors never fail: a backend that cannot answer logs the cause
/// and returns an empty collection or `None`. Callers therefore cannot tell
/// "nothing stored" from "backend unavailable" through this trait alone.
/// Writers report whether the record was accepted.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Acquire backend resources. The only call besides construction that
    /// may surface an error.
    async fn open(&self) -> DriverResult<()>;

    async fn close(&self);

    /// Replace the live configuration wholesale. Invalid parameters are
    /// logged and the previous configuration stays in effect.
    async fn set_config_parameters(&self, parameters: Parameters);

    async fn list_location_names(&self) -> Vec<String>;

    async fn get_location(&self, location: &str) -> Option<WorkLocation>;

    async fn set_location(&self, location: &WorkLocation) -> bool;

    async fn list_simple_jobs_by_location(&self, location: &str) -> Vec<SimpleJob>;

    async fn get_simple_job(&self, job_id: &str) -> Option<SimpleJob>;

    async fn list_all_jobs(&self) -> Vec<Job>;

    async fn list_jobs_by_state(&self, state: i32) -> Vec<Job>;

    async fn list_jobs_by_location(&self, location: &str) -> Vec<Job>;

    async fn list_jobs_by_group(&self, group_id: &str) -> Vec<Job>;

    async fn get_job(&self, job_id: &str) -> Option<Job>;

    async fn put_job(&self, job: &Job) -> bool;

    async fn append_job_log(&self, log: &JobLog) -> bool;
}
