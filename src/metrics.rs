use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;

/// Failure counts and fetch timings reported by drivers.
///
/// Degraded reads look identical to empty ones from the caller's side, so
/// these are the signal operators watch for a failing backend.
pub trait MetricsSink: Send + Sync + 'static {
    /// A driver operation failed and its result was swallowed.
    fn driver_error(&self, op: &'static str, kind: &'static str);

    /// One page request of a paged read completed.
    fn page_fetched(&self, duration_ms: u64);

    /// A paged read finished after `pages` requests.
    fn collection_fetched(&self, pages: usize, duration_ms: u64);
}

pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn driver_error(&self, _op: &'static str, _kind: &'static str) {}

    fn page_fetched(&self, _duration_ms: u64) {}

    fn collection_fetched(&self, _pages: usize, _duration_ms: u64) {}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub count: u64,
    pub total_ms: u64,
}

#[derive(Default)]
struct TimingCell {
    count: AtomicU64,
    total_ms: AtomicU64,
}

impl TimingCell {
    fn record(&self, duration_ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(duration_ms, Ordering::Relaxed);
    }

    fn load(&self) -> Timing {
        Timing {
            count: self.count.load(Ordering::Relaxed),
            total_ms: self.total_ms.load(Ordering::Relaxed),
        }
    }
}

/// Keeps everything in process; tests read it back directly.
#[derive(Default)]
pub struct InMemoryMetrics {
    errors: DashMap<(&'static str, &'static str), u64>,
    pages: TimingCell,
    collections: TimingCell,
    collection_pages: AtomicU64,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self, op: &str, kind: &str) -> u64 {
        self.errors
            .iter()
            .filter(|entry| entry.key().0 == op && entry.key().1 == kind)
            .map(|entry| *entry.value())
            .sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.errors.iter().map(|entry| *entry.value()).sum()
    }

    /// `(op, kind, count)` sorted by op then kind
    pub fn error_counts(&self) -> Vec<(&'static str, &'static str, u64)> {
        let mut items: Vec<_> = self
            .errors
            .iter()
            .map(|entry| (entry.key().0, entry.key().1, *entry.value()))
            .collect();
        items.sort();
        items
    }

    pub fn pages(&self) -> Timing {
        self.pages.load()
    }

    pub fn collections(&self) -> Timing {
        self.collections.load()
    }

    /// Page requests summed over every completed paged read
    pub fn collection_pages(&self) -> u64 {
        self.collection_pages.load(Ordering::Relaxed)
    }
}

impl MetricsSink for InMemoryMetrics {
    fn driver_error(&self, op: &'static str, kind: &'static str) {
        *self.errors.entry((op, kind)).or_insert(0) += 1;
    }

    fn page_fetched(&self, duration_ms: u64) {
        self.pages.record(duration_ms);
    }

    fn collection_fetched(&self, pages: usize, duration_ms: u64) {
        self.collection_pages
            .fetch_add(pages as u64, Ordering::Relaxed);
        self.collections.record(duration_ms);
    }
}

pub fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
