//! Background Batching Dispatcher
//!
//! A generic component that accepts a continuous stream of items from any number
//! of producers, buffers them, and periodically (or on demand) hands them as a
//! batch to a delivery sink. Producers never wait on delivery.
//!
//! # Features
//!
//! - **Unbounded queue**: `dispatch` never blocks and never fails
//! - **Timer + commands**: one loop task drains on a fixed tick, on `flush`, or
//!   on `wait` (flush-and-stop)
//! - **Disjoint batches**: each drain swaps the whole buffer, so no item is lost
//!   or delivered twice, even when deliveries overlap
//! - **Fire-and-forget errors**: sink failures are logged through `tracing` and
//!   counted in [`DispatchMetrics`], then the batch is dropped
//!
//! # Example
//!
//! ```ignore
//! use langfuse_observer::{Dispatcher, DispatcherConfig, FnSink};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let sink = FnSink::new("print", |batch: Vec<String>| async move {
//!         println!("delivering {} items", batch.len());
//!         Ok::<(), langfuse_observer::DeliveryError>(())
//!     });
//!     let dispatcher = Dispatcher::new(
//!         DispatcherConfig::default().with_tick(Duration::from_millis(500)),
//!         Arc::new(sink),
//!     );
//!
//!     dispatcher.dispatch("hello".to_string());
//!     dispatcher.wait(Duration::from_secs(2)).await;
//! }
//! ```

mod config;
mod dispatch_loop;
mod dispatcher;
mod error;
mod invariants;
mod metrics;
mod queue;
mod sink;

pub use config::{DispatcherConfig, DEFAULT_TICK, MIN_TICK};
pub use dispatcher::{Dispatcher, WaitOutcome};
pub use error::DeliveryError;
pub use metrics::DispatchMetrics;
pub use queue::Queue;
pub use sink::{BatchSink, BatchSinkBoxed, FnSink};
