use crate::handle::ObservationKind;
use thiserror::Error;

/// A handle or parent does not fit the hierarchy it is used in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("cannot end {kind}: handle has no observation id")]
    MissingId { kind: ObservationKind },

    #[error("cannot end {kind}: handle has no trace id")]
    MissingTraceId { kind: ObservationKind },

    #[error("expected a {expected} handle, got a {found} handle")]
    KindMismatch {
        expected: ObservationKind,
        found: ObservationKind,
    },

    #[error("parent handle is empty")]
    EmptyParent,

    #[error("a {kind} cannot be the parent of another observation")]
    InvalidParent { kind: ObservationKind },

    #[error("observation names trace {requested} but its parent belongs to trace {parent}")]
    TraceMismatch { requested: String, parent: String },
}

/// Errors returned to callers of the observability API.
///
/// Delivery failures are not part of this type: they happen on the background
/// loop and only show up in logs and [`DispatchMetrics`](crate::DispatchMetrics).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error("{kind} needs an existing trace: set trace_id or attach it to a handle")]
    MissingTrace { kind: &'static str },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn is_hierarchy(&self) -> bool {
        matches!(self, Error::Hierarchy(_))
    }

    pub fn is_missing_trace(&self) -> bool {
        matches!(self, Error::MissingTrace { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
