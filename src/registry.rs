//! Backend registry.
//!
//! Maps a backend identifier to the constructor that builds it, so the
//! cache layer can pick a backend by name from configuration.
//!
//! The process-wide table is meant to be filled during startup, before the
//! first [`new_driver`] call:
//!
//! ```ignore
//! use jobstore::registry::{new_driver, register_builtin_drivers};
//!
//! register_builtin_drivers();
//! let driver = new_driver("etcd", parameters)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    driver::StorageDriver,
    error::{DriverError, DriverResult},
    params::Parameters,
};

/// Backend constructor
pub type Initialize =
    Arc<dyn Fn(Parameters) -> DriverResult<Arc<dyn StorageDriver>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct DriverRegistry {
    initializes: HashMap<String, Initialize>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor. A later registration under the same
    /// identifier replaces the earlier one.
    pub fn register<F>(&mut self, backend: impl Into<String>, init: F)
    where
        F: Fn(Parameters) -> DriverResult<Arc<dyn StorageDriver>> + Send + Sync + 'static,
    {
        let backend = backend.into();
        if self.initializes.insert(backend.clone(), Arc::new(init)).is_some() {
            debug!("Replaced storage driver registration: {}", backend);
        }
    }

    pub fn contains(&self, backend: &str) -> bool {
        self.initializes.contains_key(backend)
    }

    /// Known identifiers, sorted and comma-joined
    pub fn supported_backends(&self) -> String {
        let mut keys: Vec<&str> = self.initializes.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys.join(",")
    }

    pub fn initializer(&self, backend: &str) -> DriverResult<Initialize> {
        self.initializes
            .get(backend)
            .cloned()
            .ok_or_else(|| DriverError::BackendNotSupported {
                backend: backend.to_string(),
                known: self.supported_backends(),
            })
    }

    pub fn resolve(
        &self,
        backend: &str,
        parameters: Parameters,
    ) -> DriverResult<Arc<dyn StorageDriver>> {
        let init = self.initializer(backend)?;
        init(parameters)
    }
}

static REGISTRY: Lazy<RwLock<DriverRegistry>> = Lazy::new(|| RwLock::new(DriverRegistry::new()));

/// Register a constructor in the process-wide table
pub fn add_driver<F>(backend: impl Into<String>, init: F)
where
    F: Fn(Parameters) -> DriverResult<Arc<dyn StorageDriver>> + Send + Sync + 'static,
{
    REGISTRY.write().register(backend, init);
}

/// Build a driver from the process-wide table
pub fn new_driver(backend: &str, parameters: Parameters) -> DriverResult<Arc<dyn StorageDriver>> {
    // Construction may touch the network; don't hold the table lock for it.
    let init = REGISTRY.read().initializer(backend)?;
    info!("Creating storage driver: {}", backend);
    init(parameters)
}

pub fn supported_backends() -> String {
    REGISTRY.read().supported_backends()
}

/// Register every backend compiled into this crate
pub fn register_builtin_drivers() {
    #[cfg(feature = "etcd")]
    add_driver(crate::etcd::BACKEND, crate::etcd::EtcdDriver::initialize);
}
