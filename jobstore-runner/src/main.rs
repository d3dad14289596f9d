//! Jobstore runner - one-shot cache synchronisation
//!
//! This binary:
//! - Loads the `[storage]` section from `config.toml` (or `$JOBSTORE_CONFIG`)
//! - Resolves the configured storage driver
//! - Pulls every location and job the cache would load, logging the counts

use std::path::Path;

use anyhow::{Context, Result};
use jobstore::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = r#"
[storage]
backend = "etcd"

[storage.parameters]
hosts = "127.0.0.1:2379"
apiurl = "http://127.0.0.1:8985/cloudtask/v2"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut store = ConfigStore::parse(DEFAULT_CONFIG)?;
    let path = std::env::var("JOBSTORE_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        store.merge(&ConfigStore::from_file(&path)?);
    } else {
        warn!("{} not found, using built-in defaults", path);
    }
    let storage: StorageConfig = store.get()?;

    register_builtin_drivers();
    let driver = new_driver(&storage.backend, storage.parameters)
        .with_context(|| format!("failed to create `{}` storage driver", storage.backend))?;
    driver.open().await.context("failed to open storage driver")?;

    for name in driver.list_location_names().await {
        match driver.get_location(&name).await {
            Some(location) => info!(
                "location {}: {} metadata fields",
                location.location,
                location.metadata.len()
            ),
            None => warn!("location {} has no stored record", name),
        }

        let jobs = driver.list_simple_jobs_by_location(&name).await;
        let enabled = jobs.iter().filter(|job| job.enabled).count();
        info!("location {}: {} jobs, {} enabled", name, jobs.len(), enabled);
    }

    let jobs = driver.list_all_jobs().await;
    info!("synchronised {} jobs", jobs.len());

    driver.close().await;
    Ok(())
}
