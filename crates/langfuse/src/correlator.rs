//! Hierarchy correlator.
//!
//! Turns start/end/create calls into ingestion events whose ids, trace ids and
//! parent observation ids form a consistent tree. The caller holds the state:
//! every start call returns a handle, and that handle is what nested calls and
//! the matching end call receive. Nothing is shared between traces, so any
//! number of tasks can record into one correlator at once.

use crate::error::{Error, HierarchyError, Result};
use crate::event::{IngestionEvent, IngestionPayload};
use crate::handle::{ObservationHandle, ObservationKind, TraceHandle};
use crate::invariants::{debug_assert_body_id, debug_assert_trace_linked};
use crate::model::{Event, Generation, Score, Span, Trace};
use chrono::Utc;
use langfuse_observer::Dispatcher;
use std::sync::Arc;
use uuid::Uuid;

const LOG_TARGET: &str = "langfuse.correlator";

/// Destination of the events the correlator produces.
pub trait EventSink: Send + Sync {
    /// Accepts one event. Must not block on delivery.
    fn emit(&self, event: IngestionEvent);
}

impl EventSink for Dispatcher<IngestionEvent> {
    fn emit(&self, event: IngestionEvent) {
        self.dispatch(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: IngestionEvent) {
        (**self).emit(event);
    }
}

/// Fills an absent or empty id with a fresh uuid and returns it.
fn ensure_id(id: &mut Option<String>) -> String {
    match id {
        Some(existing) if !existing.is_empty() => existing.clone(),
        _ => {
            let generated = Uuid::new_v4().to_string();
            *id = Some(generated.clone());
            generated
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Checks a handle passed to an end call and returns its `(id, trace_id)`.
fn validate_close(handle: &ObservationHandle, expected: ObservationKind) -> Result<(String, String)> {
    let Some(found) = handle.kind().filter(|_| !handle.id().is_empty()) else {
        return Err(HierarchyError::MissingId { kind: expected }.into());
    };
    if handle.trace_id().is_empty() {
        return Err(HierarchyError::MissingTraceId { kind: expected }.into());
    }
    if found != expected {
        return Err(HierarchyError::KindMismatch { expected, found }.into());
    }
    Ok((handle.id().to_string(), handle.trace_id().to_string()))
}

/// Builds consistent trace hierarchies and forwards them to an [`EventSink`].
pub struct Correlator<S> {
    sink: S,
}

impl<S: EventSink> Correlator<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Records the start of a trace. An absent id is generated.
    pub fn start_trace(&self, mut trace: Trace) -> TraceHandle {
        let id = ensure_id(&mut trace.id);
        self.emit(IngestionPayload::TraceCreate(trace));
        TraceHandle::new(id)
    }

    /// Records the start of a span.
    ///
    /// With a `parent`, the span is nested under that observation and inherits
    /// its trace. Without one, the span hangs off its trace directly; if it
    /// names no trace either, a trace with the span's name is started first.
    pub fn start_span(&self, mut span: Span, parent: Option<&ObservationHandle>) -> Result<ObservationHandle> {
        let trace_id = self.link(
            span.name.as_deref(),
            &mut span.trace_id,
            &mut span.parent_observation_id,
            parent,
        )?;
        let id = ensure_id(&mut span.id);
        span.start_time.get_or_insert_with(Utc::now);

        self.emit(IngestionPayload::SpanCreate(span));
        Ok(ObservationHandle::new(id, trace_id, ObservationKind::Span))
    }

    /// Records the end of the span `handle` refers to.
    ///
    /// The handle's ids override any ids in `span`; the remaining fields are
    /// sent as the update.
    pub fn end_span(&self, handle: ObservationHandle, mut span: Span) -> Result<()> {
        let (id, trace_id) = validate_close(&handle, ObservationKind::Span)?;
        span.id = Some(id);
        span.trace_id = Some(trace_id);
        span.end_time.get_or_insert_with(Utc::now);

        self.emit(IngestionPayload::SpanUpdate(span));
        Ok(())
    }

    /// Records the start of a generation. Linking rules match [`start_span`](Self::start_span).
    pub fn start_generation(
        &self,
        mut generation: Generation,
        parent: Option<&ObservationHandle>,
    ) -> Result<ObservationHandle> {
        let trace_id = self.link(
            generation.name.as_deref(),
            &mut generation.trace_id,
            &mut generation.parent_observation_id,
            parent,
        )?;
        let id = ensure_id(&mut generation.id);
        generation.start_time.get_or_insert_with(Utc::now);

        self.emit(IngestionPayload::GenerationCreate(generation));
        Ok(ObservationHandle::new(id, trace_id, ObservationKind::Generation))
    }

    pub fn end_generation(&self, handle: ObservationHandle, mut generation: Generation) -> Result<()> {
        let (id, trace_id) = validate_close(&handle, ObservationKind::Generation)?;
        generation.id = Some(id);
        generation.trace_id = Some(trace_id);
        generation.end_time.get_or_insert_with(Utc::now);

        self.emit(IngestionPayload::GenerationUpdate(generation));
        Ok(())
    }

    /// Records an instantaneous event.
    ///
    /// The returned handle can be used to score the event. It cannot be
    /// closed or used as a parent.
    pub fn create_event(&self, mut event: Event, parent: Option<&ObservationHandle>) -> Result<ObservationHandle> {
        let trace_id = self.link(
            event.name.as_deref(),
            &mut event.trace_id,
            &mut event.parent_observation_id,
            parent,
        )?;
        let id = ensure_id(&mut event.id);
        event.start_time.get_or_insert_with(Utc::now);

        self.emit(IngestionPayload::EventCreate(event));
        Ok(ObservationHandle::new(id, trace_id, ObservationKind::Event))
    }

    /// Records a score. Never starts a trace: the score must already name one,
    /// usually through [`Score::for_trace`] or [`Score::for_observation`].
    pub fn create_score(&self, mut score: Score) -> Result<()> {
        if non_empty(score.trace_id.as_deref()).is_none() {
            return Err(Error::MissingTrace { kind: "score" });
        }
        ensure_id(&mut score.id);

        self.emit(IngestionPayload::ScoreCreate(score));
        Ok(())
    }

    /// Resolves trace and parent ids of a new observation and returns the trace id.
    fn link(
        &self,
        name: Option<&str>,
        trace_id: &mut Option<String>,
        parent_observation_id: &mut Option<String>,
        parent: Option<&ObservationHandle>,
    ) -> Result<String> {
        if let Some(parent) = parent {
            let kind = match parent.kind() {
                Some(kind) if !parent.is_empty() && !parent.trace_id().is_empty() => kind,
                _ => return Err(HierarchyError::EmptyParent.into()),
            };
            if !kind.can_parent() {
                return Err(HierarchyError::InvalidParent { kind }.into());
            }
            if let Some(requested) = non_empty(trace_id.as_deref()) {
                if requested != parent.trace_id() {
                    return Err(HierarchyError::TraceMismatch {
                        requested: requested.to_string(),
                        parent: parent.trace_id().to_string(),
                    }
                    .into());
                }
            }
            *trace_id = Some(parent.trace_id().to_string());
            *parent_observation_id = Some(parent.id().to_string());
            return Ok(parent.trace_id().to_string());
        }

        // Parent links only come from handles.
        *parent_observation_id = None;

        if let Some(existing) = non_empty(trace_id.as_deref()) {
            return Ok(existing.to_string());
        }

        let trace = self.start_trace(Trace {
            name: name.map(str::to_string),
            ..Trace::default()
        });
        tracing::trace!(target: LOG_TARGET, trace_id = trace.id(), "started implicit trace");
        *trace_id = Some(trace.id().to_string());
        Ok(trace.id().to_string())
    }

    fn emit(&self, payload: IngestionPayload) {
        debug_assert_body_id!(payload);
        debug_assert_trace_linked!(payload.trace_id());
        tracing::trace!(
            target: LOG_TARGET,
            event_type = %payload.event_type(),
            trace_id = payload.trace_id().unwrap_or_default(),
            "event emitted"
        );
        self.sink.emit(IngestionEvent::new(payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::IngestionEventType;
    use std::sync::Mutex;

    /// Test sink that records every event in emission order
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<IngestionEvent>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<IngestionEvent> {
            self.events.lock().unwrap().clone()
        }

        fn types(&self) -> Vec<IngestionEventType> {
            self.events().iter().map(IngestionEvent::event_type).collect()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: IngestionEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn correlator() -> Correlator<RecordingSink> {
        Correlator::new(RecordingSink::default())
    }

    #[test]
    fn test_start_trace_generates_id() {
        let c = correlator();
        let trace = c.start_trace(Trace::named("chat"));

        assert!(!trace.is_empty());
        let events = c.sink().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.body_id(), Some(trace.id()));
    }

    #[test]
    fn test_start_trace_keeps_caller_id() {
        let c = correlator();
        let trace = c.start_trace(Trace {
            id: Some("fixed".into()),
            ..Trace::default()
        });
        assert_eq!(trace.id(), "fixed");
    }

    #[test]
    fn test_span_start_end_share_ids() {
        let c = correlator();
        let trace = c.start_trace(Trace::named("t"));
        let span = c.start_span(Span::named("s").in_trace(&trace), None).unwrap();
        let span_id = span.id().to_string();
        c.end_span(span, Span::default()).unwrap();

        let events = c.sink().events();
        assert_eq!(c.sink().types(), vec![
            IngestionEventType::TraceCreate,
            IngestionEventType::SpanCreate,
            IngestionEventType::SpanUpdate,
        ]);
        for event in &events[1..] {
            assert_eq!(event.payload.body_id(), Some(span_id.as_str()));
            assert_eq!(event.payload.trace_id(), Some(trace.id()));
        }
        assert_ne!(events[1].id, events[2].id, "event ids must be distinct");
    }

    #[test]
    fn test_start_and_end_fill_timestamps() {
        let c = correlator();
        let span = c.start_span(Span::named("s"), None).unwrap();
        c.end_span(span, Span::default()).unwrap();

        let events = c.sink().events();
        let IngestionPayload::SpanCreate(created) = &events[1].payload else {
            panic!("expected span-create, got {}", events[1].event_type());
        };
        let IngestionPayload::SpanUpdate(updated) = &events[2].payload else {
            panic!("expected span-update, got {}", events[2].event_type());
        };
        assert!(created.start_time.is_some());
        assert!(updated.end_time.is_some());
    }

    #[test]
    fn test_generation_without_trace_creates_one_first() {
        let c = correlator();
        let generation = c.start_generation(Generation::named("g1"), None).unwrap();

        let events = c.sink().events();
        assert_eq!(c.sink().types(), vec![
            IngestionEventType::TraceCreate,
            IngestionEventType::GenerationCreate,
        ]);
        let IngestionPayload::TraceCreate(trace) = &events[0].payload else {
            panic!("expected trace-create");
        };
        assert_eq!(trace.name.as_deref(), Some("g1"));
        assert_eq!(events[1].payload.trace_id(), trace.id.as_deref());
        assert_eq!(generation.trace_id(), trace.id.as_deref().unwrap());
    }

    #[test]
    fn test_nested_span_inherits_trace_and_parent() {
        let c = correlator();
        let outer = c.start_span(Span::named("outer"), None).unwrap();
        let inner = c.start_generation(Generation::named("inner"), Some(&outer)).unwrap();

        assert_eq!(inner.trace_id(), outer.trace_id());
        let events = c.sink().events();
        let last = events.last().unwrap();
        assert_eq!(last.payload.parent_observation_id(), Some(outer.id()));
        assert_eq!(last.payload.trace_id(), Some(outer.trace_id()));
        // One implicit trace for the outer span only.
        assert_eq!(events.iter().filter(|e| e.event_type() == IngestionEventType::TraceCreate).count(), 1);
    }

    #[test]
    fn test_parent_id_without_handle_is_cleared() {
        let c = correlator();
        let trace = c.start_trace(Trace::named("t"));
        let span = Span {
            parent_observation_id: Some("not-a-handle".into()),
            ..Span::named("s").in_trace(&trace)
        };
        c.start_span(span, None).unwrap();

        let events = c.sink().events();
        assert_eq!(events[1].payload.parent_observation_id(), None);
        let body = serde_json::to_value(&events[1]).unwrap();
        assert!(body["body"].get("parentObservationId").is_none());
    }

    #[test]
    fn test_parent_id_comes_from_handle() {
        let c = correlator();
        let parent = c.start_span(Span::named("p"), None).unwrap();
        let event = Event {
            parent_observation_id: Some("not-a-handle".into()),
            ..Event::named("e")
        };
        c.create_event(event, Some(&parent)).unwrap();

        let events = c.sink().events();
        assert_eq!(events.last().unwrap().payload.parent_observation_id(), Some(parent.id()));
    }

    #[test]
    fn test_end_with_zero_handle_fails_and_emits_nothing() {
        let c = correlator();
        let err = c.end_span(ObservationHandle::default(), Span::default()).unwrap_err();

        assert_eq!(err, Error::Hierarchy(HierarchyError::MissingId { kind: ObservationKind::Span }));
        assert!(c.sink().events().is_empty());
    }

    #[test]
    fn test_end_with_wrong_kind_fails() {
        let c = correlator();
        let generation = c.start_generation(Generation::named("g"), None).unwrap();

        let err = c.end_span(generation, Span::default()).unwrap_err();
        assert_eq!(
            err,
            Error::Hierarchy(HierarchyError::KindMismatch {
                expected: ObservationKind::Span,
                found: ObservationKind::Generation,
            })
        );
    }

    #[test]
    fn test_event_cannot_parent() {
        let c = correlator();
        let event = c.create_event(Event::named("click"), None).unwrap();
        assert_eq!(event.kind(), Some(ObservationKind::Event));

        let err = c.start_span(Span::named("child"), Some(&event)).unwrap_err();
        assert_eq!(err, Error::Hierarchy(HierarchyError::InvalidParent { kind: ObservationKind::Event }));
    }

    #[test]
    fn test_zero_parent_rejected() {
        let c = correlator();
        let err = c
            .create_event(Event::named("e"), Some(&ObservationHandle::default()))
            .unwrap_err();
        assert_eq!(err, Error::Hierarchy(HierarchyError::EmptyParent));
        assert!(c.sink().events().is_empty());
    }

    #[test]
    fn test_conflicting_trace_and_parent_rejected() {
        let c = correlator();
        let parent = c.start_span(Span::named("p"), None).unwrap();
        let other = c.start_trace(Trace::named("other"));
        let before = c.sink().events().len();

        let err = c.start_span(Span::named("child").in_trace(&other), Some(&parent)).unwrap_err();
        assert!(err.is_hierarchy());
        assert_eq!(c.sink().events().len(), before);
    }

    #[test]
    fn test_score_without_trace_is_rejected() {
        let c = correlator();
        let err = c.create_score(Score::new("quality", 1.0)).unwrap_err();

        assert!(err.is_missing_trace());
        assert!(c.sink().events().is_empty(), "a score must never start a trace");
    }

    #[test]
    fn test_score_for_trace_and_observation() {
        let c = correlator();
        let trace = c.start_trace(Trace::named("t"));
        let span = c.start_span(Span::named("s").in_trace(&trace), None).unwrap();

        c.create_score(Score::new("overall", 0.9).for_trace(&trace)).unwrap();
        c.create_score(Score::new("step", 0.5).for_observation(&span)).unwrap();

        let events = c.sink().events();
        let IngestionPayload::ScoreCreate(step) = &events[3].payload else {
            panic!("expected score-create");
        };
        assert_eq!(events[2].payload.trace_id(), Some(trace.id()));
        assert_eq!(step.trace_id.as_deref(), Some(trace.id()));
        assert_eq!(step.observation_id.as_deref(), Some(span.id()));
        assert!(step.id.is_some());
    }

    #[test]
    fn test_empty_ids_are_replaced() {
        let c = correlator();
        let span = c
            .start_span(
                Span {
                    id: Some(String::new()),
                    trace_id: Some(String::new()),
                    ..Span::named("s")
                },
                None,
            )
            .unwrap();

        assert!(!span.id().is_empty());
        assert!(!span.trace_id().is_empty());
    }
}
