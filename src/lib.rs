//! Jobstore
//!
//! Pluggable persistence drivers for the job scheduler cache. A backend is
//! picked by name from the [`registry`], and the cache talks to it only
//! through [`StorageDriver`].

#![forbid(unsafe_code)]

pub mod config;
pub mod driver;
pub mod error;
pub mod etcd;
#[cfg(feature = "etcd")]
pub mod http;
pub mod metrics;
pub mod mock;
pub mod params;
pub mod prelude;
pub mod registry;
pub mod transport;

pub use driver::StorageDriver;
pub use error::{DriverError, DriverResult};
pub use jobstore_protocol as protocol;
pub use params::{EngineConfig, Parameters};
pub use registry::{DriverRegistry, add_driver, new_driver, register_builtin_drivers};
