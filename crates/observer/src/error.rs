//! Error types for batch delivery.

use thiserror::Error;

/// Errors a [`BatchSink`](crate::BatchSink) reports for a failed delivery.
///
/// A `DeliveryError` never reaches the producer side. The dispatch loop logs it,
/// counts it in [`DispatchMetrics`](crate::DispatchMetrics) and drops the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Transport-layer error (connection refused, timeout, TLS)
    #[error("transport error: {0}")]
    Transport(String),
    /// The batch could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The remote side refused the whole batch
    #[error("rejected by remote (status {status}): {message}")]
    Rejected { status: u16, message: String },
    /// The remote side accepted the batch but refused some of its items
    #[error("{failed} of {total} items rejected by remote")]
    Partial { failed: usize, total: usize },
}

impl DeliveryError {
    /// Returns `true` if the same batch might succeed on another attempt.
    ///
    /// The dispatcher itself never retries; this is for sinks or callers that
    /// want to classify failures in their own reporting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::Serialization(_) | Self::Partial { .. } => false,
        }
    }
}
