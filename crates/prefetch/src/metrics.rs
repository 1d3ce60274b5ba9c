use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a single item left the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemOutcome {
    /// No fetch needed; shown as-is.
    Passthrough,
    /// Fetched and validated; shown with data attached.
    Prefetched,
    /// Fetched but the payload failed validation; dropped.
    Discarded,
    /// Fetch failed or was cancelled; shown without data.
    Degraded,
}

/// Prefetch operational counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrefetchMetrics {
    pub generations: u64,
    pub categories_ready: u64,
    pub categories_empty: u64,
    pub categories_failed: u64,
    pub items_passthrough: u64,
    pub items_prefetched: u64,
    pub items_discarded: u64,
    pub items_degraded: u64,
    /// Completions that arrived after their generation was superseded.
    pub stale_results_dropped: u64,
    pub last_resolved_at: Option<DateTime<Utc>>,
}

/// Thread-safe handle to prefetch metrics.
pub type SharedMetrics = Arc<RwLock<PrefetchMetrics>>;

/// Create a new shared metrics handle.
pub fn new_shared_metrics() -> SharedMetrics {
    Arc::new(RwLock::new(PrefetchMetrics::default()))
}

impl PrefetchMetrics {
    pub fn record_item(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Passthrough => self.items_passthrough += 1,
            ItemOutcome::Prefetched => self.items_prefetched += 1,
            ItemOutcome::Discarded => self.items_discarded += 1,
            ItemOutcome::Degraded => self.items_degraded += 1,
        }
    }

    /// Record a category reaching a terminal status (`ready` when `valid_count > 0`).
    pub fn record_category(&mut self, valid_count: usize) {
        if valid_count > 0 {
            self.categories_ready += 1;
        } else {
            self.categories_empty += 1;
        }
        self.last_resolved_at = Some(Utc::now());
    }

    pub fn record_failure(&mut self) {
        self.categories_failed += 1;
    }

    pub fn record_stale(&mut self) {
        self.stale_results_dropped += 1;
    }

    pub fn record_generation(&mut self) {
        self.generations += 1;
    }

    pub fn items_total(&self) -> u64 {
        self.items_passthrough + self.items_prefetched + self.items_discarded + self.items_degraded
    }
}
