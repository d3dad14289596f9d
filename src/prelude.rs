// Convenience re-exports: use jobstore::prelude::*;
pub use crate::config::{ConfigStore, Configurable, StorageConfig};
pub use crate::driver::StorageDriver;
pub use crate::error::{DriverError, DriverResult};
pub use crate::params::Parameters;
pub use crate::registry::{new_driver, register_builtin_drivers};

pub use jobstore_protocol::{Job, JobLog, SimpleJob, WorkLocation};

pub use async_trait::async_trait;
