//! Debug assertion macros for dispatcher invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// Non-empty deliveries
// =============================================================================

/// Assert that a batch about to be handed to the sink has at least one item.
///
/// **Invariant**: `drain_all() == [] → sink not invoked`
///
/// Used in: `deliver()` before calling the sink
macro_rules! debug_assert_non_empty_batch {
    ($len:expr) => {
        debug_assert!(
            $len > 0,
            "empty batch reached the sink; empty drains must be skipped"
        )
    };
}

// =============================================================================
// Accounting
// =============================================================================

/// Assert that the loop never reports more delivered-or-dropped items than
/// were dispatched.
///
/// **Invariant**: `items_delivered + items_dropped ≤ items_dispatched`
///
/// Used in: `deliver()` after recording the outcome
macro_rules! debug_assert_accounting {
    ($metrics:expr) => {
        debug_assert!(
            $metrics.items_delivered() + $metrics.items_dropped() <= $metrics.items_dispatched(),
            "delivered {} + dropped {} exceeds dispatched {}",
            $metrics.items_delivered(),
            $metrics.items_dropped(),
            $metrics.items_dispatched()
        )
    };
}

pub(crate) use debug_assert_accounting;
pub(crate) use debug_assert_non_empty_batch;
