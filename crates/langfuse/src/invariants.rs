//! Debug assertion macros for correlator invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// Trace linkage
// =============================================================================

/// Assert that an observation about to be emitted is linked to a trace.
///
/// **Invariant**: every span, generation, event and score carries a non-empty trace id
///
/// Used in: every `start_*`, `end_*` and `create_*` before emitting
macro_rules! debug_assert_trace_linked {
    ($trace_id:expr) => {
        debug_assert!(
            $trace_id.is_some_and(|id: &str| !id.is_empty()),
            "observation emitted without a trace id"
        )
    };
}

// =============================================================================
// Identity
// =============================================================================

/// Assert that the body of an emitted event has an id.
///
/// **Invariant**: ids are filled before emission, never left empty
///
/// Used in: `Correlator::emit()`
macro_rules! debug_assert_body_id {
    ($payload:expr) => {
        debug_assert!(
            $payload.body_id().is_some_and(|id: &str| !id.is_empty()),
            "{} emitted without a body id",
            $payload.event_type()
        )
    };
}

pub(crate) use debug_assert_body_id;
pub(crate) use debug_assert_trace_linked;
