//! Delivery callback abstraction.
//!
//! A [`BatchSink`] receives every non-empty batch drained by the dispatch loop.
//! Its result is consumed by the loop (logged and counted), never returned to
//! whoever called [`Dispatcher::dispatch`](crate::Dispatcher::dispatch).

use crate::error::DeliveryError;
use std::future::Future;
use std::pin::Pin;

/// Trait for delivering batches of items to a destination.
///
/// Uses native async fn in traits instead of `#[async_trait]`.
///
/// # Note on Object Safety
///
/// This trait uses `impl Future` return types which are not object-safe.
/// For dynamic dispatch, use `Arc<dyn BatchSinkBoxed<T>>`; every `BatchSink`
/// gets that impl for free.
pub trait BatchSink<T>: Send + Sync {
    /// Delivers one batch. The batch is never empty.
    fn deliver(&self, batch: Vec<T>) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Returns the sink name for log output.
    fn name(&self) -> &str;
}

/// Object-safe version of [`BatchSink`] for dynamic dispatch.
pub trait BatchSinkBoxed<T>: Send + Sync {
    /// Delivers one batch (boxed future for object safety).
    fn deliver_boxed(
        &self,
        batch: Vec<T>,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + '_>>;

    /// Returns the sink name for log output.
    fn name(&self) -> &str;
}

/// Blanket implementation: any BatchSink can be used as BatchSinkBoxed
///
/// The boxed future may only borrow `&self`, so items cannot hold borrows.
impl<T: 'static, S: BatchSink<T>> BatchSinkBoxed<T> for S {
    fn deliver_boxed(
        &self,
        batch: Vec<T>,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + '_>> {
        Box::pin(self.deliver(batch))
    }

    fn name(&self) -> &str {
        BatchSink::name(self)
    }
}

/// Adapts a plain async function into a [`BatchSink`].
///
/// ```ignore
/// let sink = FnSink::new("log", |batch: Vec<u64>| async move {
///     println!("{} items", batch.len());
///     Ok::<(), DeliveryError>(())
/// });
/// ```
pub struct FnSink<F> {
    name: &'static str,
    f: F,
}

impl<F> FnSink<F> {
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<T, F, Fut> BatchSink<T> for FnSink<F>
where
    F: Fn(Vec<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DeliveryError>> + Send,
{
    fn deliver(&self, batch: Vec<T>) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        (self.f)(batch)
    }

    fn name(&self) -> &str {
        self.name
    }
}
