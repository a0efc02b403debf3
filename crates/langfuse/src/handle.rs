use std::fmt;

/// Kind of observation an [`ObservationHandle`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationKind {
    Span,
    Generation,
    Event,
}

impl ObservationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObservationKind::Span => "span",
            ObservationKind::Generation => "generation",
            ObservationKind::Event => "event",
        }
    }

    /// Events are instantaneous and cannot contain other observations.
    pub fn can_parent(self) -> bool {
        !matches!(self, ObservationKind::Event)
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a started trace.
///
/// Returned by `start_trace`. The default value is empty and is treated as
/// "no trace" everywhere it is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TraceHandle {
    id: String,
}

impl TraceHandle {
    pub(crate) fn new(id: String) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// Identifies an open observation and the trace it belongs to.
///
/// Only the correlator hands these out. Pass one as the parent of a nested
/// observation, or give it back to the matching end call to close it.
///
/// End calls take the handle by value, so an observation closes at most once:
///
/// ```compile_fail
/// # use langfuse::{Correlator, EventSink, IngestionEvent, Span};
/// # struct Discard;
/// # impl EventSink for Discard { fn emit(&self, _: IngestionEvent) {} }
/// let correlator = Correlator::new(Discard);
/// let span = correlator.start_span(Span::named("s"), None).unwrap();
/// correlator.end_span(span, Span::default()).unwrap();
/// correlator.end_span(span, Span::default()).unwrap();
/// ```
#[derive(Debug, Default, PartialEq, Eq, Hash)]
pub struct ObservationHandle {
    id: String,
    trace_id: String,
    kind: Option<ObservationKind>,
}

impl ObservationHandle {
    pub(crate) fn new(id: String, trace_id: String, kind: ObservationKind) -> Self {
        Self {
            id,
            trace_id,
            kind: Some(kind),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// `None` for the zero-valued handle.
    pub fn kind(&self) -> Option<ObservationKind> {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}
