//! Configuration for the dispatch loop.

use std::time::Duration;

/// Default period of the dispatch loop's drain timer.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Shortest accepted tick. A zero period would make the timer spin.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
///
/// The config is consumed when the dispatcher starts its loop, so the tick
/// cannot change while the loop is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Period of the timer that drains the queue and delivers in the background.
    ///
    /// Default: 1s
    pub tick: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { tick: DEFAULT_TICK }
    }
}

impl DispatcherConfig {
    /// Sets the drain timer period.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// The tick actually used by the loop (never below [`MIN_TICK`]).
    pub fn effective_tick(&self) -> Duration {
        self.tick.max(MIN_TICK)
    }
}
