//! Background drain-and-deliver loop.
//!
//! One task per [`Dispatcher`](crate::Dispatcher). It wakes on a repeating timer or
//! on a command, drains the whole [`Queue`] and hands the batch to the sink.
//!
//! Timer and `Flush` deliveries are spawned into a `JoinSet` and not awaited by
//! the loop, so several deliveries may overlap when the sink is slow. Batches are
//! disjoint because each comes from its own `drain_all`. `FlushAndStop` delivers
//! the final batch inline, waits for every in-flight delivery, confirms to the
//! caller and ends the loop. There is no way to restart it.

use crate::invariants::{debug_assert_accounting, debug_assert_non_empty_batch};
use crate::metrics::DispatchMetrics;
use crate::queue::Queue;
use crate::sink::BatchSinkBoxed;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};

pub(crate) const LOG_TARGET: &str = "langfuse.observer";

/// Control messages accepted by the loop.
#[derive(Debug)]
pub(crate) enum Command {
    /// Drain and deliver once, without waiting for the delivery.
    Flush,
    /// Drain, deliver, wait for in-flight deliveries, confirm, terminate.
    FlushAndStop(oneshot::Sender<()>),
}

pub(crate) struct DispatchLoop<T> {
    queue: Arc<Queue<T>>,
    sink: Arc<dyn BatchSinkBoxed<T>>,
    metrics: Arc<DispatchMetrics>,
    commands: mpsc::UnboundedReceiver<Command>,
    tick: Duration,
}

impl<T: Send + 'static> DispatchLoop<T> {
    pub(crate) fn new(
        queue: Arc<Queue<T>>,
        sink: Arc<dyn BatchSinkBoxed<T>>,
        metrics: Arc<DispatchMetrics>,
        commands: mpsc::UnboundedReceiver<Command>,
        tick: Duration,
    ) -> Self {
        Self {
            queue,
            sink,
            metrics,
            commands,
            tick,
        }
    }

    pub(crate) async fn run(mut self) {
        // First tick one period from now; `interval` would fire immediately.
        let mut ticker = time::interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deliveries: JoinSet<()> = JoinSet::new();
        let mut stopped_by = None;

        tracing::debug!(
            target: LOG_TARGET,
            sink = self.sink.name(),
            tick_ms = self.tick.as_millis() as u64,
            "dispatch loop started"
        );

        loop {
            tokio::select! {
                // Reap finished deliveries so the JoinSet does not grow unbounded
                Some(joined) = deliveries.join_next(), if !deliveries.is_empty() => {
                    report_join(joined);
                }

                _ = ticker.tick() => {
                    self.spawn_delivery(&mut deliveries);
                }

                command = self.commands.recv() => match command {
                    Some(Command::Flush) => {
                        tracing::debug!(target: LOG_TARGET, pending = self.queue.len(), "flush requested");
                        self.spawn_delivery(&mut deliveries);
                    }
                    Some(Command::FlushAndStop(done)) => {
                        self.drain_and_stop(&mut deliveries).await;
                        stopped_by = Some(done);
                        break;
                    }
                    None => {
                        // Every Dispatcher handle is gone: deliver what is left.
                        self.drain_and_stop(&mut deliveries).await;
                        break;
                    }
                }
            }
        }

        // Closed before confirming, so a waiter never sees a live dispatcher
        // after its stop completed.
        self.commands.close();
        let stragglers = self.queue.drain_all();
        if !stragglers.is_empty() {
            tracing::debug!(target: LOG_TARGET, dropped = stragglers.len(), "items arrived during final drain");
            self.metrics.record_dropped(stragglers.len() as u64);
        }
        if let Some(done) = stopped_by {
            let _ = done.send(());
        }

        // Waiters that queued up behind the first stop see the same completed drain.
        while let Ok(command) = self.commands.try_recv() {
            if let Command::FlushAndStop(done) = command {
                let _ = done.send(());
            }
        }

        tracing::debug!(
            target: LOG_TARGET,
            sink = self.sink.name(),
            "dispatch loop stopped"
        );
    }

    fn spawn_delivery(&self, deliveries: &mut JoinSet<()>) {
        let batch = self.queue.drain_all();
        if batch.is_empty() {
            return;
        }

        let sink = Arc::clone(&self.sink);
        let metrics = Arc::clone(&self.metrics);
        deliveries.spawn(async move {
            deliver(sink.as_ref(), batch, &metrics).await;
        });
    }

    async fn drain_and_stop(&mut self, deliveries: &mut JoinSet<()>) {
        let batch = self.queue.drain_all();
        if !batch.is_empty() {
            deliver(self.sink.as_ref(), batch, &self.metrics).await;
        }

        while let Some(joined) = deliveries.join_next().await {
            report_join(joined);
        }
    }
}

/// Decrements the in-flight gauge even if the sink panics.
struct InFlight<'a>(&'a DispatchMetrics);

impl<'a> InFlight<'a> {
    fn enter(metrics: &'a DispatchMetrics) -> Self {
        metrics.inc_inflight();
        Self(metrics)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.dec_inflight();
    }
}

async fn deliver<T>(sink: &dyn BatchSinkBoxed<T>, batch: Vec<T>, metrics: &DispatchMetrics) {
    debug_assert_non_empty_batch!(batch.len());

    let _inflight = InFlight::enter(metrics);
    let batch_len = batch.len() as u64;
    let started = Instant::now();

    match sink.deliver_boxed(batch).await {
        Ok(()) => {
            metrics.record_success(batch_len);
            tracing::debug!(
                target: LOG_TARGET,
                sink = sink.name(),
                batch_len,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "batch delivered"
            );
        }
        Err(err) => {
            metrics.record_error(batch_len);
            tracing::warn!(
                target: LOG_TARGET,
                sink = sink.name(),
                batch_len,
                transient = err.is_transient(),
                error = %err,
                "batch delivery failed, dropping batch"
            );
        }
    }

    debug_assert_accounting!(metrics);
}

fn report_join(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            tracing::error!(target: LOG_TARGET, error = %err, "delivery task panicked");
        }
    }
}
