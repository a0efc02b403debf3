use crate::client::{IngestionClientBoxed, IngestionSink};
use crate::config::LangfuseConfig;
use crate::correlator::Correlator;
use crate::error::Result;
use crate::event::IngestionEvent;
use crate::handle::{ObservationHandle, TraceHandle};
use crate::model::{Event, Generation, Score, Span, Trace};
use langfuse_observer::{DispatchMetrics, Dispatcher, WaitOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Records traces and ships them to an ingestion client in the background.
///
/// Every recording call returns as soon as the event is queued. Delivery
/// happens on the dispatcher's timer, on [`flush`](Self::flush), and on
/// [`shutdown`](Self::shutdown).
///
/// ```ignore
/// let langfuse = Langfuse::new(LangfuseConfig::default(), Arc::new(StdoutIngestionClient::new()));
///
/// let trace = langfuse.start_trace(Trace::named("chat"));
/// let span = langfuse.start_span(Span::named("retrieve").in_trace(&trace), None)?;
/// langfuse.end_span(span, Span::default())?;
///
/// langfuse.shutdown(Duration::from_secs(5)).await;
/// ```
pub struct Langfuse {
    correlator: Correlator<Dispatcher<IngestionEvent>>,
    flush_interval: Duration,
}

impl Langfuse {
    /// Creates the client and starts its dispatch loop on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(config: LangfuseConfig, client: Arc<dyn IngestionClientBoxed>) -> Self {
        let sink = Arc::new(IngestionSink::new(client));
        let dispatcher = Dispatcher::<IngestionEvent>::new(config.dispatcher, sink);
        tracing::debug!(
            target: "langfuse",
            tick_ms = dispatcher.tick().as_millis() as u64,
            "langfuse client started"
        );

        Self {
            correlator: Correlator::new(dispatcher),
            flush_interval: config.flush_interval,
        }
    }

    pub fn start_trace(&self, trace: Trace) -> TraceHandle {
        self.correlator.start_trace(trace)
    }

    pub fn start_span(&self, span: Span, parent: Option<&ObservationHandle>) -> Result<ObservationHandle> {
        self.correlator.start_span(span, parent)
    }

    pub fn end_span(&self, handle: ObservationHandle, span: Span) -> Result<()> {
        self.correlator.end_span(handle, span)
    }

    pub fn start_generation(
        &self,
        generation: Generation,
        parent: Option<&ObservationHandle>,
    ) -> Result<ObservationHandle> {
        self.correlator.start_generation(generation, parent)
    }

    pub fn end_generation(&self, handle: ObservationHandle, generation: Generation) -> Result<()> {
        self.correlator.end_generation(handle, generation)
    }

    pub fn create_event(&self, event: Event, parent: Option<&ObservationHandle>) -> Result<ObservationHandle> {
        self.correlator.create_event(event, parent)
    }

    pub fn create_score(&self, score: Score) -> Result<()> {
        self.correlator.create_score(score)
    }

    /// Asks the dispatcher to deliver what is queued. Returns immediately.
    pub fn flush(&self) {
        self.correlator.sink().flush();
    }

    /// Delivers everything queued and stops the dispatcher, waiting at most `deadline`.
    pub async fn shutdown(&self, deadline: Duration) -> WaitOutcome {
        self.correlator.sink().wait(deadline).await
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        self.correlator.sink().metrics()
    }

    /// Suggested period for application-driven [`flush`](Self::flush) calls.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }
}
