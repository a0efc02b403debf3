//! The unit of transmission to the ingestion endpoint.

use crate::model::{Event, Generation, Score, Span, Trace};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Discriminator of an [`IngestionEvent`], serialized in its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestionEventType {
    TraceCreate,
    SpanCreate,
    SpanUpdate,
    GenerationCreate,
    GenerationUpdate,
    EventCreate,
    ScoreCreate,
}

impl IngestionEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            IngestionEventType::TraceCreate => "trace-create",
            IngestionEventType::SpanCreate => "span-create",
            IngestionEventType::SpanUpdate => "span-update",
            IngestionEventType::GenerationCreate => "generation-create",
            IngestionEventType::GenerationUpdate => "generation-update",
            IngestionEventType::EventCreate => "event-create",
            IngestionEventType::ScoreCreate => "score-create",
        }
    }
}

impl fmt::Display for IngestionEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed body of an ingestion event.
///
/// Serializes as `{"type": "<kind>", "body": {...}}`. The variant names map
/// one-to-one onto [`IngestionEventType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "kebab-case")]
pub enum IngestionPayload {
    TraceCreate(Trace),
    SpanCreate(Span),
    SpanUpdate(Span),
    GenerationCreate(Generation),
    GenerationUpdate(Generation),
    EventCreate(Event),
    ScoreCreate(Score),
}

impl IngestionPayload {
    pub fn event_type(&self) -> IngestionEventType {
        match self {
            IngestionPayload::TraceCreate(_) => IngestionEventType::TraceCreate,
            IngestionPayload::SpanCreate(_) => IngestionEventType::SpanCreate,
            IngestionPayload::SpanUpdate(_) => IngestionEventType::SpanUpdate,
            IngestionPayload::GenerationCreate(_) => IngestionEventType::GenerationCreate,
            IngestionPayload::GenerationUpdate(_) => IngestionEventType::GenerationUpdate,
            IngestionPayload::EventCreate(_) => IngestionEventType::EventCreate,
            IngestionPayload::ScoreCreate(_) => IngestionEventType::ScoreCreate,
        }
    }

    /// Id of the trace, observation or score the body describes.
    pub fn body_id(&self) -> Option<&str> {
        match self {
            IngestionPayload::TraceCreate(trace) => trace.id.as_deref(),
            IngestionPayload::SpanCreate(span) | IngestionPayload::SpanUpdate(span) => span.id.as_deref(),
            IngestionPayload::GenerationCreate(generation)
            | IngestionPayload::GenerationUpdate(generation) => generation.id.as_deref(),
            IngestionPayload::EventCreate(event) => event.id.as_deref(),
            IngestionPayload::ScoreCreate(score) => score.id.as_deref(),
        }
    }

    /// Trace the body belongs to. For a trace this is its own id.
    pub fn trace_id(&self) -> Option<&str> {
        match self {
            IngestionPayload::TraceCreate(trace) => trace.id.as_deref(),
            IngestionPayload::SpanCreate(span) | IngestionPayload::SpanUpdate(span) => {
                span.trace_id.as_deref()
            }
            IngestionPayload::GenerationCreate(generation)
            | IngestionPayload::GenerationUpdate(generation) => generation.trace_id.as_deref(),
            IngestionPayload::EventCreate(event) => event.trace_id.as_deref(),
            IngestionPayload::ScoreCreate(score) => score.trace_id.as_deref(),
        }
    }

    /// Parent observation of a span, generation or event, if any.
    pub fn parent_observation_id(&self) -> Option<&str> {
        match self {
            IngestionPayload::SpanCreate(span) | IngestionPayload::SpanUpdate(span) => {
                span.parent_observation_id.as_deref()
            }
            IngestionPayload::GenerationCreate(generation)
            | IngestionPayload::GenerationUpdate(generation) => {
                generation.parent_observation_id.as_deref()
            }
            IngestionPayload::EventCreate(event) => event.parent_observation_id.as_deref(),
            IngestionPayload::TraceCreate(_) | IngestionPayload::ScoreCreate(_) => None,
        }
    }
}

/// One record in an ingestion batch.
///
/// `id` identifies the event itself and is unrelated to the id inside the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: IngestionPayload,
}

impl IngestionEvent {
    /// Wraps a payload with a fresh event id and the current time.
    pub fn new(payload: IngestionPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn event_type(&self) -> IngestionEventType {
        self.payload.event_type()
    }
}
