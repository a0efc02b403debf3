use crate::config::DispatcherConfig;
use crate::dispatch_loop::{Command, DispatchLoop, LOG_TARGET};
use crate::metrics::DispatchMetrics;
use crate::queue::Queue;
use crate::sink::BatchSinkBoxed;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

/// How a call to [`Dispatcher::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The loop delivered everything it had and terminated.
    Completed,
    /// The deadline fired first. Delivery may still finish in the background.
    DeadlineElapsed,
    /// The loop had already terminated before this call.
    AlreadyStopped,
}

/// Background batching dispatcher.
///
/// Composes a [`Queue`] with a dispatch loop task that drains it on a timer or
/// on request and hands each non-empty batch to a [`BatchSink`](crate::BatchSink).
///
/// ```ignore
/// let dispatcher = Dispatcher::<u64>::new(DispatcherConfig::default(), Arc::new(MySink));
/// dispatcher.dispatch(event);           // never blocks, never fails
/// dispatcher.flush();                   // ask for a drain now
/// dispatcher.wait(Duration::from_secs(5)).await; // final drain before exit
/// ```
pub struct Dispatcher<T> {
    queue: Arc<Queue<T>>,
    commands: mpsc::UnboundedSender<Command>,
    metrics: Arc<DispatchMetrics>,
    tick: Duration,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Creates a dispatcher and starts its loop on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, like `tokio::spawn`.
    pub fn new(config: DispatcherConfig, sink: Arc<dyn BatchSinkBoxed<T>>) -> Self {
        Self::new_in(config, sink, &Handle::current())
    }

    /// Creates a dispatcher whose loop runs on the given runtime.
    pub fn new_in(
        config: DispatcherConfig,
        sink: Arc<dyn BatchSinkBoxed<T>>,
        runtime: &Handle,
    ) -> Self {
        let queue = Arc::new(Queue::new());
        let metrics = Arc::new(DispatchMetrics::default());
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let tick = config.effective_tick();

        let dispatch_loop = DispatchLoop::new(
            Arc::clone(&queue),
            sink,
            Arc::clone(&metrics),
            commands_rx,
            tick,
        );
        runtime.spawn(dispatch_loop.run());

        Self {
            queue,
            commands,
            metrics,
            tick,
        }
    }
}

impl<T> Dispatcher<T> {
    /// Buffers an item for the next batch. Never blocks on delivery, never fails.
    ///
    /// After the loop has terminated the item is counted as dropped and
    /// discarded.
    pub fn dispatch(&self, item: T) {
        if self.commands.is_closed() {
            self.metrics.record_dispatched();
            self.metrics.record_dropped(1);
            tracing::debug!(target: LOG_TARGET, "dispatch after stop, item dropped");
            return;
        }
        // Count before enqueueing so a concurrent drain never sees more
        // delivered than dispatched.
        self.metrics.record_dispatched();
        self.queue.enqueue(item);
    }

    /// Requests an asynchronous drain. Returns immediately.
    pub fn flush(&self) {
        if self.commands.send(Command::Flush).is_err() {
            tracing::debug!(target: LOG_TARGET, "flush ignored, dispatch loop already stopped");
        }
    }

    /// Flushes, waits for every delivery to finish and stops the loop.
    ///
    /// Returns when the loop confirms or when `deadline` elapses, whichever
    /// comes first. Dropping the returned future (for example as the losing arm
    /// of a `tokio::select!`) cancels only the wait; the loop still finishes
    /// its drain. After this call the dispatcher no longer delivers.
    pub async fn wait(&self, deadline: Duration) -> WaitOutcome {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(Command::FlushAndStop(done_tx)).is_err() {
            return WaitOutcome::AlreadyStopped;
        }

        match tokio::time::timeout(deadline, done_rx).await {
            Ok(Ok(())) => WaitOutcome::Completed,
            Ok(Err(_)) => WaitOutcome::AlreadyStopped,
            Err(_) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    deadline_ms = deadline.as_millis() as u64,
                    pending = self.queue.len(),
                    inflight = self.metrics.inflight_deliveries(),
                    "deadline elapsed before dispatcher finished flushing"
                );
                WaitOutcome::DeadlineElapsed
            }
        }
    }

    /// Returns `true` once the loop has terminated.
    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed()
    }

    /// Items buffered and not yet drained. Diagnostic only.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Timer period the loop runs with.
    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }
}
