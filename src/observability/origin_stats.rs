//! Per-origin request statistics.
//!
//! # Responsibilities
//! - Define the [`OriginStatsTracker`] seam the dispatcher reports into
//! - Provide an in-memory registry of atomic counters per origin
//!
//! # Design Decisions
//! - Counters are lock-free atomics; the registry is a DashMap
//! - Stats for an origin are created lazily on first use
//! - Keyed by (application id, origin id), never by object identity

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::Origin;

/// Counters for a single origin.
#[derive(Debug, Default)]
pub struct OriginStats {
    requests_cancelled: AtomicU64,
    error_responses: AtomicU64,
    transport_errors: AtomicU64,
}

impl OriginStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// The consumer cancelled an in-flight request to this origin.
    pub fn request_cancelled(&self) {
        self.requests_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// The origin answered with a 4xx or 5xx status.
    pub fn error_response(&self, _status: u16) {
        self.error_responses.fetch_add(1, Ordering::Relaxed);
    }

    /// The connection client failed for this origin.
    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_cancelled_count(&self) -> u64 {
        self.requests_cancelled.load(Ordering::Relaxed)
    }

    pub fn error_responses_count(&self) -> u64 {
        self.error_responses.load(Ordering::Relaxed)
    }

    pub fn transport_errors_count(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }
}

/// Source of per-origin stats.
pub trait OriginStatsTracker: Send + Sync {
    fn origin_stats(&self, origin: &Origin) -> Arc<OriginStats>;
}

/// Default tracker: one [`OriginStats`] per (application, origin).
#[derive(Debug, Default)]
pub struct OriginStatsRegistry {
    stats: DashMap<(String, String), Arc<OriginStats>>,
}

impl OriginStatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats for an origin if any event was recorded for it.
    pub fn get(&self, origin: &Origin) -> Option<Arc<OriginStats>> {
        self.stats
            .get(&(origin.application_id.clone(), origin.id.clone()))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

impl OriginStatsTracker for OriginStatsRegistry {
    fn origin_stats(&self, origin: &Origin) -> Arc<OriginStats> {
        self.stats
            .entry((origin.application_id.clone(), origin.id.clone()))
            .or_default()
            .value()
            .clone()
    }
}
