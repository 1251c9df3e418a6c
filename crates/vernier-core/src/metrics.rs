//! Global runtime counters.
//!
//! Lock-free `AtomicU64` counters with `Relaxed` ordering, readable as a
//! point-in-time snapshot. Everything here is advisory; no control flow
//! depends on a counter value. The only counter touched on the signal-safe
//! snapshot path is `vernier_snapshots_total` (a single relaxed
//! `fetch_add`, which is async-signal-safe).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static VERNIER_NODES_CREATED_TOTAL: AtomicU64 = AtomicU64::new(0);
static VERNIER_NODE_DEDUP_HITS_TOTAL: AtomicU64 = AtomicU64::new(0);
static VERNIER_SNAPSHOTS_TOTAL: AtomicU64 = AtomicU64::new(0);
static VERNIER_BEGIN_TOTAL: AtomicU64 = AtomicU64::new(0);
static VERNIER_END_TOTAL: AtomicU64 = AtomicU64::new(0);
static VERNIER_SET_TOTAL: AtomicU64 = AtomicU64::new(0);
static VERNIER_OBSERVER_ERRORS_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Point-in-time snapshot of the runtime counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub vernier_nodes_created_total: u64,
    pub vernier_node_dedup_hits_total: u64,
    pub vernier_snapshots_total: u64,
    pub vernier_begin_total: u64,
    pub vernier_end_total: u64,
    pub vernier_set_total: u64,
    pub vernier_observer_errors_total: u64,
}

pub(crate) fn record_node_created() {
    VERNIER_NODES_CREATED_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_node_dedup_hit() {
    VERNIER_NODE_DEDUP_HITS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_snapshot() {
    VERNIER_SNAPSHOTS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_begin() {
    VERNIER_BEGIN_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_end() {
    VERNIER_END_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_set() {
    VERNIER_SET_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_observer_error() {
    VERNIER_OBSERVER_ERRORS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

/// Read all counters.
#[must_use]
pub fn metrics_snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        vernier_nodes_created_total: VERNIER_NODES_CREATED_TOTAL.load(Ordering::Relaxed),
        vernier_node_dedup_hits_total: VERNIER_NODE_DEDUP_HITS_TOTAL.load(Ordering::Relaxed),
        vernier_snapshots_total: VERNIER_SNAPSHOTS_TOTAL.load(Ordering::Relaxed),
        vernier_begin_total: VERNIER_BEGIN_TOTAL.load(Ordering::Relaxed),
        vernier_end_total: VERNIER_END_TOTAL.load(Ordering::Relaxed),
        vernier_set_total: VERNIER_SET_TOTAL.load(Ordering::Relaxed),
        vernier_observer_errors_total: VERNIER_OBSERVER_ERRORS_TOTAL.load(Ordering::Relaxed),
    }
}

/// Reset all counters to zero (tests/diagnostics).
pub fn reset_metrics() {
    VERNIER_NODES_CREATED_TOTAL.store(0, Ordering::Relaxed);
    VERNIER_NODE_DEDUP_HITS_TOTAL.store(0, Ordering::Relaxed);
    VERNIER_SNAPSHOTS_TOTAL.store(0, Ordering::Relaxed);
    VERNIER_BEGIN_TOTAL.store(0, Ordering::Relaxed);
    VERNIER_END_TOTAL.store(0, Ordering::Relaxed);
    VERNIER_SET_TOTAL.store(0, Ordering::Relaxed);
    VERNIER_OBSERVER_ERRORS_TOTAL.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::{metrics_snapshot, record_node_created, record_node_dedup_hit};

    #[test]
    fn counters_accumulate() {
        let before = metrics_snapshot();
        record_node_created();
        record_node_created();
        record_node_dedup_hit();
        let after = metrics_snapshot();
        assert!(after.vernier_nodes_created_total >= before.vernier_nodes_created_total + 2);
        assert!(after.vernier_node_dedup_hits_total >= before.vernier_node_dedup_hits_total + 1);
    }

    #[test]
    fn snapshot_serializes() {
        let snap = metrics_snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("vernier_nodes_created_total"));
    }
}
