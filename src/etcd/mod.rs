//! Etcd + REST registry backend.
//!
//! Work locations live in the coordination service under a single key; jobs
//! come from the paginated REST registry.

mod driver;
mod engine;

pub use driver::EtcdDriver;
pub use engine::{DEFAULT_LOCATION_NAME, Engine, JobFilter, WORK_LOCATION_KEY};

/// Registry identifier of this backend
pub const BACKEND: &str = "etcd";
