//! Record types for jobs, job logs and work locations

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Work Location
// ============================================================================

/// A named execution zone.
///
/// Only the name is interpreted; everything else the platform stores on the
/// record (groups, servers, owner...) rides along in `metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkLocation {
    pub location: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl WorkLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            metadata: Map::new(),
        }
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// Records keyed by job id, used to deduplicate paged reads
pub trait JobRecord {
    fn job_id(&self) -> &str;
}

/// Full job definition as served by the registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "jobid")]
    pub job_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "groupid", default)]
    pub group_id: String,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default, with = "crate::flag")]
    pub enabled: bool,
    /// Scheduler status code
    #[serde(rename = "stat", default)]
    pub state: i32,
    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub timeout: i64,
    #[serde(default)]
    pub schedule: Vec<Value>,
    /// Fields this crate does not model, kept so writes are lossless
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRecord for Job {
    fn job_id(&self) -> &str {
        &self.job_id
    }
}

/// Reduced projection of [`Job`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleJob {
    #[serde(rename = "jobid")]
    pub job_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "groupid", default)]
    pub group_id: String,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default, with = "crate::flag")]
    pub enabled: bool,
    #[serde(rename = "stat", default)]
    pub state: i32,
}

impl JobRecord for SimpleJob {
    fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl From<&Job> for SimpleJob {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            name: job.name.clone(),
            location: job.location.clone(),
            group_id: job.group_id.clone(),
            servers: job.servers.clone(),
            enabled: job.enabled,
            state: job.state,
        }
    }
}

/// Execution log entry, append-only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobLog {
    #[serde(rename = "jobid")]
    pub job_id: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub errout: String,
    #[serde(rename = "execerr", default)]
    pub exec_err: String,
    #[serde(rename = "ipaddr", default)]
    pub ip_addr: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Paging
// ============================================================================

/// One page of a registry collection.
///
/// `total_rows` is the size of the whole filtered collection as seen by the
/// registry when it served this page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(alias = "totalRows", default)]
    pub total_rows: usize,
    #[serde(alias = "rows", default = "Vec::new")]
    pub jobs: Vec<T>,
}

pub type JobsPage = Page<Job>;
pub type SimpleJobsPage = Page<SimpleJob>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_flag_accepts_ints_and_bools() {
        let from_int: SimpleJob =
            serde_json::from_str(r#"{"jobid":"a","enabled":1,"stat":2}"#).unwrap();
        let from_bool: SimpleJob = serde_json::from_str(r#"{"jobid":"b","enabled":true}"#).unwrap();
        let off: SimpleJob = serde_json::from_str(r#"{"jobid":"c","enabled":0}"#).unwrap();

        assert!(from_int.enabled);
        assert_eq!(from_int.state, 2);
        assert!(from_bool.enabled);
        assert!(!off.enabled);

        let encoded = serde_json::to_value(&from_int).unwrap();
        assert_eq!(encoded["enabled"], 1);
    }

    #[test]
    fn job_keeps_unknown_fields() {
        let raw = r#"{"jobid":"j1","name":"backup","notify":{"mail":["ops@example.com"]},"createuser":"root"}"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.extra.len(), 2);

        let back = serde_json::to_value(&job).unwrap();
        assert_eq!(back["notify"]["mail"][0], "ops@example.com");
        assert_eq!(back["createuser"], "root");
    }

    #[test]
    fn simple_job_is_a_projection() {
        let job = Job {
            job_id: "j1".into(),
            name: "backup".into(),
            location: "myCluster".into(),
            group_id: "g1".into(),
            servers: vec!["10.0.0.1".into()],
            enabled: true,
            state: 3,
            cmd: "tar czf /tmp/a.tgz /data".into(),
            ..Default::default()
        };

        let simple = SimpleJob::from(&job);
        assert_eq!(simple.job_id, job.job_id);
        assert_eq!(simple.name, job.name);
        assert_eq!(simple.location, job.location);
        assert_eq!(simple.group_id, job.group_id);
        assert_eq!(simple.servers, job.servers);
        assert_eq!(simple.enabled, job.enabled);
        assert_eq!(simple.state, job.state);
    }

    #[test]
    fn page_accepts_alternate_field_names() {
        let page: SimpleJobsPage =
            serde_json::from_str(r#"{"totalRows":3,"rows":[{"jobid":"a"}]}"#).unwrap();
        assert_eq!(page.total_rows, 3);
        assert_eq!(page.jobs.len(), 1);
    }
}
