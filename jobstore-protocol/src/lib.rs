//! Jobstore wire protocol
//!
//! Serde types exchanged with the remote job registry and stored in the
//! coordination service. The cache layer only ever sees these values as
//! snapshots; nothing here carries behaviour beyond projection.
//!
//! # Registry endpoints
//!
//! - `GET /sys_jobs` - paged job list, see [`Page`]
//! - `GET /sys_jobs/{jobid}` - single [`Job`], or `204 No Content` when absent

mod flag;
mod types;

pub use types::*;

/// Collection path served by the remote registry
pub const JOBS_PATH: &str = "/sys_jobs";

/// Field list requested when only [`SimpleJob`] projections are needed
pub const SIMPLE_JOB_FIELDS: [&str; 7] = [
    "jobid", "name", "location", "groupid", "servers", "enabled", "stat",
];
