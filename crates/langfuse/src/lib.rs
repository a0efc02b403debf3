//! Langfuse Tracing Client
//!
//! Records LLM application activity as trees of observations and ships them
//! to a Langfuse ingestion endpoint in background batches.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  start/end/create  ┌────────────┐  IngestionEvent  ┌──────────────┐
//! │ Your tasks │ ─────────────────▶ │ Correlator │ ───────────────▶ │  Dispatcher  │
//! └────────────┘ ◀───────────────── └────────────┘   (never blocks) └──────┬───────┘
//!                  handles                                                │ batches
//!                                                                         ▼
//!                                                              ┌────────────────────┐
//!                                                              │  IngestionClient   │
//!                                                              │ (HTTP / stdout /…) │
//!                                                              └────────────────────┘
//! ```
//!
//! The hierarchy lives in the handles the caller holds, not in the client:
//! a span started with a parent handle is nested under it, and ending a span
//! takes the handle its start returned. Concurrent traces never interfere.
//!
//! # Example
//!
//! ```ignore
//! use langfuse::{Generation, Langfuse, LangfuseConfig, Score, Span, StdoutIngestionClient, Trace};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> langfuse::Result<()> {
//!     let langfuse = Langfuse::new(LangfuseConfig::default(), Arc::new(StdoutIngestionClient::new()));
//!
//!     let trace = langfuse.start_trace(Trace::named("chat"));
//!     let span = langfuse.start_span(Span::named("answer").in_trace(&trace), None)?;
//!     let generation = langfuse.start_generation(Generation::named("llm"), Some(&span))?;
//!     langfuse.end_generation(generation, Generation::default())?;
//!     langfuse.create_score(Score::new("helpful", 1.0).for_observation(&span))?;
//!     langfuse.end_span(span, Span::default())?;
//!
//!     langfuse.shutdown(Duration::from_secs(5)).await;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod correlator;
mod error;
mod event;
mod handle;
mod invariants;
mod langfuse;
mod model;

pub use client::{
    HttpIngestionClient, IngestionBatch, IngestionClient, IngestionClientBoxed, IngestionFailure,
    IngestionResponse, IngestionSink, IngestionSuccess, StdoutIngestionClient,
};
pub use config::{
    HttpConfig, LangfuseConfig, DEFAULT_FLUSH_INTERVAL, DEFAULT_HOST, DEFAULT_TIMEOUT, HOST_ENV,
    INGESTION_PATH, TIMEOUT_ENV,
};
pub use correlator::{Correlator, EventSink};
pub use error::{Error, HierarchyError, Result};
pub use event::{IngestionEvent, IngestionEventType, IngestionPayload};
pub use handle::{ObservationHandle, ObservationKind, TraceHandle};
pub use langfuse::Langfuse;
pub use model::{Event, Generation, ObservationLevel, Score, Span, Trace, Usage, UsageUnit};

pub use langfuse_observer::{DeliveryError, DispatchMetrics, DispatcherConfig, WaitOutcome};
