//! Ingestion client boundary.
//!
//! An [`IngestionClient`] takes one batch of events and sends it somewhere.
//! [`IngestionSink`] plugs any client into the background dispatcher.

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::event::IngestionEvent;
use langfuse_observer::{BatchSink, DeliveryError};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

const LOG_TARGET: &str = "langfuse.client";

/// Request body of the ingestion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionBatch {
    pub batch: Vec<IngestionEvent>,
}

/// An event the endpoint accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngestionSuccess {
    pub id: String,
    pub status: u16,
}

/// An event the endpoint refused.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IngestionFailure {
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Per-event outcome reported by the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IngestionResponse {
    #[serde(default)]
    pub successes: Vec<IngestionSuccess>,
    #[serde(default)]
    pub errors: Vec<IngestionFailure>,
}

impl IngestionResponse {
    /// Everything in the batch was accepted.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Sends batches of ingestion events.
///
/// Uses native async fn in traits. For dynamic dispatch use
/// `Arc<dyn IngestionClientBoxed>`; every client gets that impl for free.
pub trait IngestionClient: Send + Sync {
    /// Sends one batch. A `2xx` answer with some refused events is `Ok` here;
    /// deciding what a partial failure means is up to the caller.
    fn ingest(&self, batch: IngestionBatch) -> impl Future<Output = std::result::Result<IngestionResponse, DeliveryError>> + Send;

    /// Returns the client name for log output.
    fn name(&self) -> &str;
}

/// Object-safe version of [`IngestionClient`] for dynamic dispatch.
pub trait IngestionClientBoxed: Send + Sync {
    fn ingest_boxed(
        &self,
        batch: IngestionBatch,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<IngestionResponse, DeliveryError>> + Send + '_>>;

    fn name(&self) -> &str;
}

impl<C: IngestionClient> IngestionClientBoxed for C {
    fn ingest_boxed(
        &self,
        batch: IngestionBatch,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<IngestionResponse, DeliveryError>> + Send + '_>> {
        Box::pin(self.ingest(batch))
    }

    fn name(&self) -> &str {
        IngestionClient::name(self)
    }
}

/// Posts batches as JSON to `{host}/api/public/ingestion`.
///
/// Authentication is not handled here. Pass a preconfigured
/// [`reqwest::Client`] (for example with default headers) to
/// [`with_client`](Self::with_client) when the endpoint needs it.
pub struct HttpIngestionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpIngestionClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    /// Uses `client` as is. The timeout in `config` is ignored.
    pub fn with_client(client: reqwest::Client, config: &HttpConfig) -> Self {
        Self {
            client,
            endpoint: config.ingestion_url(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl IngestionClient for HttpIngestionClient {
    async fn ingest(&self, batch: IngestionBatch) -> std::result::Result<IngestionResponse, DeliveryError> {
        let body = serde_json::to_vec(&batch).map_err(|e| DeliveryError::Serialization(e.to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(IngestionResponse::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| DeliveryError::Serialization(e.to_string()))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Prints every batch as pretty JSON. Reports all events as accepted.
#[derive(Debug, Default)]
pub struct StdoutIngestionClient;

impl StdoutIngestionClient {
    pub fn new() -> Self {
        Self
    }
}

impl IngestionClient for StdoutIngestionClient {
    async fn ingest(&self, batch: IngestionBatch) -> std::result::Result<IngestionResponse, DeliveryError> {
        let json = serde_json::to_string_pretty(&batch).map_err(|e| DeliveryError::Serialization(e.to_string()))?;
        println!("{json}");

        Ok(IngestionResponse {
            successes: batch
                .batch
                .into_iter()
                .map(|event| IngestionSuccess {
                    id: event.id,
                    status: 201,
                })
                .collect(),
            errors: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

/// Adapts an [`IngestionClient`] into the dispatcher's [`BatchSink`].
///
/// Refused events in an otherwise accepted batch are logged one by one and
/// reported as [`DeliveryError::Partial`].
pub struct IngestionSink {
    client: Arc<dyn IngestionClientBoxed>,
}

impl IngestionSink {
    pub fn new(client: Arc<dyn IngestionClientBoxed>) -> Self {
        Self { client }
    }
}

impl BatchSink<IngestionEvent> for IngestionSink {
    async fn deliver(&self, batch: Vec<IngestionEvent>) -> std::result::Result<(), DeliveryError> {
        let total = batch.len();
        let response = self.client.ingest_boxed(IngestionBatch { batch }).await?;
        if response.is_complete() {
            return Ok(());
        }

        for failure in &response.errors {
            tracing::warn!(
                target: LOG_TARGET,
                client = self.client.name(),
                event_id = %failure.id,
                status = failure.status,
                message = failure.message.as_deref().unwrap_or_default(),
                "ingestion endpoint refused event"
            );
        }
        Err(DeliveryError::Partial {
            failed: response.errors.len(),
            total,
        })
    }

    fn name(&self) -> &str {
        self.client.name()
    }
}
