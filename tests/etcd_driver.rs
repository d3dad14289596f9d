use std::collections::HashSet;
use std::sync::Arc;

use jobstore::etcd::{DEFAULT_LOCATION_NAME, EtcdDriver};
use jobstore::metrics::InMemoryMetrics;
use jobstore::mock::{MemoryKeyValue, MockFailure, PagedTransport, sample_jobs};
use jobstore::prelude::*;
use tracing_subscriber::EnvFilter;

fn params() -> Parameters {
    Parameters::new()
        .with("hosts", "127.0.0.1:2379")
        .with("apiurl", "http://registry.local/cloudtask/v2")
        .with("readpagesize", "100")
}

struct Harness {
    driver: Arc<EtcdDriver>,
    transport: PagedTransport,
    store: Arc<MemoryKeyValue>,
    metrics: Arc<InMemoryMetrics>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

fn harness(jobs: usize) -> Harness {
    init_tracing();
    let transport = PagedTransport::new(sample_jobs(jobs));
    let store = Arc::new(MemoryKeyValue::new());
    let metrics = Arc::new(InMemoryMetrics::new());
    let driver = EtcdDriver::with_metrics(
        &params(),
        store.clone(),
        transport.connector(),
        metrics.clone(),
    )
    .unwrap();

    Harness {
        driver: Arc::new(driver),
        transport,
        store,
        metrics,
    }
}

#[tokio::test]
async fn full_scan_returns_every_job_once() {
    let h = harness(1000);

    let jobs = h.driver.list_all_jobs().await;
    assert_eq!(jobs.len(), 1000);

    let ids: Vec<_> = jobs.iter().map(|j| j.job_id.clone()).collect();
    let expected: Vec<_> = sample_jobs(1000).into_iter().map(|j| j.job_id).collect();
    assert_eq!(ids, expected);
    assert_eq!(h.transport.page_indexes().len(), 10);
    assert_eq!(h.metrics.pages().count, 10);
    assert_eq!(h.metrics.collection_pages(), 10);
}

#[tokio::test]
async fn failed_page_degrades_to_empty_and_next_call_restarts() {
    let h = harness(350);
    h.transport.fail_page(3, MockFailure::Transport);

    assert!(h.driver.list_all_jobs().await.is_empty());
    assert_eq!(
        h.metrics.errors("list_all_jobs", "transport"),
        1
    );

    h.transport.clear_failures();
    let before = h.transport.page_indexes().len();
    assert_eq!(h.driver.list_all_jobs().await.len(), 350);
    assert_eq!(h.transport.page_indexes()[before..], [1, 2, 3, 4]);
}

#[tokio::test]
async fn filtered_reads() {
    let h = harness(60);

    let by_location = h.driver.list_jobs_by_location("edge").await;
    assert_eq!(by_location.len(), 30);
    assert!(by_location.iter().all(|j| j.location == "edge"));

    let by_group = h.driver.list_jobs_by_group("g0").await;
    assert_eq!(by_group.len(), 20);

    let by_state = h.driver.list_jobs_by_state(3).await;
    assert_eq!(by_state.len(), 15);
    assert!(by_state.iter().all(|j| j.state == 3));

    let simple = h.driver.list_simple_jobs_by_location(DEFAULT_LOCATION_NAME).await;
    assert_eq!(simple.len(), 30);
}

#[tokio::test]
async fn missing_and_broken_jobs_both_yield_none_but_are_told_apart() {
    let h = harness(5);
    h.transport.fail_job("job-0003", 502);

    assert!(h.driver.get_job("job-0001").await.is_some());
    assert!(h.driver.get_job("job-9999").await.is_none());
    assert!(h.driver.get_job("job-0003").await.is_none());

    assert_eq!(h.metrics.errors("get_job", "not_found"), 1);
    assert_eq!(h.metrics.errors("get_job", "remote_status"), 1);
    assert_eq!(h.metrics.total_errors(), 2);
}

#[tokio::test]
async fn simple_job_matches_full_job() {
    let h = harness(5);

    let job = h.driver.get_job("job-0004").await.unwrap();
    let simple = h.driver.get_simple_job("job-0004").await.unwrap();

    assert_eq!(simple.job_id, job.job_id);
    assert_eq!(simple.name, job.name);
    assert_eq!(simple.location, job.location);
    assert_eq!(simple.group_id, job.group_id);
    assert_eq!(simple.servers, job.servers);
    assert_eq!(simple.enabled, job.enabled);
    assert_eq!(simple.state, job.state);

    assert!(h.driver.get_simple_job("nope").await.is_none());
}

#[tokio::test]
async fn location_round_trip_through_coordination_store() {
    let h = harness(0);

    assert_eq!(
        h.driver.list_location_names().await,
        vec![DEFAULT_LOCATION_NAME.to_string()]
    );
    assert!(h.driver.get_location(DEFAULT_LOCATION_NAME).await.is_none());

    let mut location = WorkLocation::new(DEFAULT_LOCATION_NAME);
    location
        .metadata
        .insert("owner".into(), serde_json::json!("ops"));
    assert!(h.driver.set_location(&location).await);

    assert_eq!(
        h.driver.get_location(DEFAULT_LOCATION_NAME).await,
        Some(location)
    );
}

#[tokio::test]
async fn open_reports_unreachable_coordination_store() {
    let h = harness(0);
    h.driver.open().await.unwrap();

    h.store.set_unavailable(true);
    assert!(matches!(
        h.driver.open().await,
        Err(DriverError::Transport(_))
    ));
    assert!(h.driver.get_location(DEFAULT_LOCATION_NAME).await.is_none());
    h.driver.close().await;
}

#[tokio::test]
async fn writes_succeed_without_counting_errors() {
    let h = harness(1);
    let job = sample_jobs(1).remove(0);

    assert!(h.driver.put_job(&job).await);
    assert!(
        h.driver
            .append_job_log(&JobLog {
                job_id: job.job_id.clone(),
                stdout: "ok".into(),
                ..Default::default()
            })
            .await
    );
    assert_eq!(h.metrics.total_errors(), 0);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn construction_rejects_bad_parameters() {
    let store = Arc::new(MemoryKeyValue::new());
    let transport = PagedTransport::new(Vec::new());

    let no_hosts = Parameters::new().with("apiurl", "http://registry.local");
    assert!(matches!(
        EtcdDriver::with_backends(&no_hosts, store.clone(), transport.connector()),
        Err(DriverError::Construction { key: "hosts", .. })
    ));

    let bad_url = Parameters::new()
        .with("hosts", "127.0.0.1:2379")
        .with("apiurl", "http://");
    assert!(matches!(
        EtcdDriver::with_backends(&bad_url, store, transport.connector()),
        Err(DriverError::Construction { key: "apiurl", .. })
    ));
}

#[tokio::test]
async fn invalid_reconfiguration_keeps_previous_config() {
    let h = harness(10);
    let before = h.driver.config().await;

    h.driver
        .set_config_parameters(Parameters::new().with("readpagesize", "5"))
        .await;
    assert_eq!(h.driver.config().await, before);

    h.transport.refuse_connections(true);
    h.driver
        .set_config_parameters(Parameters::new().with("apiurl", "http://other.local"))
        .await;
    assert_eq!(h.driver.config().await, before);
    h.transport.refuse_connections(false);

    h.driver
        .set_config_parameters(
            Parameters::new()
                .with("apiurl", "http://other.local/v3/")
                .with("readpagesize", 3),
        )
        .await;
    let after = h.driver.config().await;
    assert_eq!(after.api_url.as_str(), "http://other.local/v3");
    assert_eq!(after.read_page_size, 3);
    assert_eq!(
        h.transport.connected_urls().last().map(String::as_str),
        Some("http://other.local/v3")
    );

    assert_eq!(h.driver.list_all_jobs().await.len(), 10);
    assert_eq!(h.transport.page_indexes().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_and_reconfiguration() {
    let h = harness(500);
    let mut handles = Vec::new();

    for _ in 0..8 {
        let driver = h.driver.clone();
        handles.push(tokio::spawn(async move {
            let jobs = driver.list_all_jobs().await;
            let unique: HashSet<_> = jobs.iter().map(|j| j.job_id.clone()).collect();
            (jobs.len(), unique.len())
        }));
    }

    let writer = {
        let driver = h.driver.clone();
        tokio::spawn(async move {
            driver
                .set_config_parameters(
                    Parameters::new()
                        .with("apiurl", "http://registry.local/cloudtask/v3")
                        .with("readpagesize", 50),
                )
                .await;
        })
    };

    for (len, unique) in futures::future::join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
    {
        assert_eq!(len, 500);
        assert_eq!(unique, 500);
    }
    writer.await.unwrap();

    let config = h.driver.config().await;
    assert_eq!(config.read_page_size, 50);
    assert_eq!(config.api_url.path(), "/cloudtask/v3");

    // A scan pinned to one configuration fetches 5 pages of 100 or 10 of 50;
    // a swap mid-scan would leave a partial run of one of the sizes.
    let calls = h.transport.calls();
    let at_100 = calls.iter().filter(|c| c.param("pageSize") == Some("100")).count();
    let at_50 = calls.iter().filter(|c| c.param("pageSize") == Some("50")).count();
    assert_eq!(at_100 + at_50, calls.len());
    assert_eq!(at_100 % 5, 0);
    assert_eq!(at_50 % 10, 0);
    assert_eq!(at_100 / 5 + at_50 / 10, 8);

    assert_eq!(h.metrics.total_errors(), 0);
    assert_eq!(h.metrics.collections().count, 8);
}
