use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters shared by the dispatcher façade and its delivery tasks.
///
/// Delivery failures are only visible here and in the log; the producer side
/// never sees them.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Items handed to `dispatch`
    pub items_dispatched: AtomicU64,
    /// Items in batches the sink accepted
    pub items_delivered: AtomicU64,
    /// Batches the sink accepted
    pub batches_delivered: AtomicU64,
    /// Items in batches the sink refused (dropped, never retried)
    pub items_dropped: AtomicU64,
    /// Batches the sink refused
    pub delivery_errors: AtomicU64,
    /// Deliveries currently running
    pub inflight_deliveries: AtomicU64,
}

impl DispatchMetrics {
    pub fn items_dispatched(&self) -> u64 {
        self.items_dispatched.load(Ordering::Relaxed)
    }

    pub fn items_delivered(&self) -> u64 {
        self.items_delivered.load(Ordering::Relaxed)
    }

    pub fn batches_delivered(&self) -> u64 {
        self.batches_delivered.load(Ordering::Relaxed)
    }

    pub fn items_dropped(&self) -> u64 {
        self.items_dropped.load(Ordering::Relaxed)
    }

    pub fn delivery_errors(&self) -> u64 {
        self.delivery_errors.load(Ordering::Relaxed)
    }

    pub fn inflight_deliveries(&self) -> u64 {
        self.inflight_deliveries.load(Ordering::Relaxed)
    }

    pub(crate) fn record_dispatched(&self) {
        self.items_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self, item_count: u64) {
        self.items_delivered.fetch_add(item_count, Ordering::Relaxed);
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self, item_count: u64) {
        self.items_dropped.fetch_add(item_count, Ordering::Relaxed);
        self.delivery_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Items discarded without a delivery attempt.
    pub(crate) fn record_dropped(&self, item_count: u64) {
        self.items_dropped.fetch_add(item_count, Ordering::Relaxed);
    }

    pub(crate) fn inc_inflight(&self) {
        self.inflight_deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dec_inflight(&self) {
        self.inflight_deliveries.fetch_sub(1, Ordering::Relaxed);
    }
}
