use langfuse::{
    DeliveryError, Generation, HttpConfig, HttpIngestionClient, IngestionBatch, IngestionClient,
    IngestionEvent, IngestionEventType, IngestionPayload, IngestionResponse, IngestionSuccess, Langfuse,
    LangfuseConfig, Score, Span, Trace, WaitOutcome,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Client that records every batch it receives
#[derive(Default)]
struct RecordingClient {
    batches: Mutex<Vec<Vec<IngestionEvent>>>,
}

impl RecordingClient {
    fn events(&self) -> Vec<IngestionEvent> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl IngestionClient for RecordingClient {
    async fn ingest(&self, batch: IngestionBatch) -> Result<IngestionResponse, DeliveryError> {
        let successes = batch
            .batch
            .iter()
            .map(|event| IngestionSuccess {
                id: event.id.clone(),
                status: 201,
            })
            .collect();
        self.batches.lock().unwrap().push(batch.batch);
        Ok(IngestionResponse {
            successes,
            errors: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Client whose endpoint is always down
struct DownClient;

impl IngestionClient for DownClient {
    async fn ingest(&self, _batch: IngestionBatch) -> Result<IngestionResponse, DeliveryError> {
        Err(DeliveryError::Transport("connection refused".into()))
    }

    fn name(&self) -> &str {
        "down"
    }
}

fn observation_ids(events: &[IngestionEvent], kind: IngestionEventType) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.event_type() == kind)
        .filter_map(|e| e.payload.body_id().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_full_hierarchy_is_delivered_in_order() {
    let client = Arc::new(RecordingClient::default());
    let langfuse = Langfuse::new(LangfuseConfig::default(), client.clone());

    let trace = langfuse.start_trace(Trace::named("test-trace"));
    let span = langfuse.start_span(Span::named("test-span").in_trace(&trace), None).unwrap();
    let generation = langfuse
        .start_generation(Generation::named("test-generation"), Some(&span))
        .unwrap();
    langfuse
        .create_score(Score::new("test-score", 0.9).for_observation(&generation))
        .unwrap();
    langfuse.end_generation(generation, Generation::default()).unwrap();
    let span_id = span.id().to_string();
    langfuse.end_span(span, Span::default()).unwrap();

    assert_eq!(langfuse.shutdown(Duration::from_secs(5)).await, WaitOutcome::Completed);

    let events = client.events();
    let types: Vec<_> = events.iter().map(IngestionEvent::event_type).collect();
    assert_eq!(
        types,
        vec![
            IngestionEventType::TraceCreate,
            IngestionEventType::SpanCreate,
            IngestionEventType::GenerationCreate,
            IngestionEventType::ScoreCreate,
            IngestionEventType::GenerationUpdate,
            IngestionEventType::SpanUpdate,
        ]
    );
    for event in &events {
        assert_eq!(event.payload.trace_id(), Some(trace.id()));
    }
    assert_eq!(events[2].payload.parent_observation_id(), Some(span_id.as_str()));
    assert_eq!(langfuse.metrics().items_delivered(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_traces_stay_separate() {
    let client = Arc::new(RecordingClient::default());
    let config = LangfuseConfig::default().with_tick(Duration::from_millis(5));
    let langfuse = Arc::new(Langfuse::new(config, client.clone()));

    let mut tasks = Vec::new();
    for worker in 0..16 {
        let langfuse = Arc::clone(&langfuse);
        tasks.push(tokio::spawn(async move {
            let trace = langfuse.start_trace(Trace::named(format!("worker-{worker}")));
            for step in 0..10 {
                let span = langfuse
                    .start_span(Span::named(format!("step-{step}")).in_trace(&trace), None)
                    .unwrap();
                let generation = langfuse.start_generation(Generation::named("llm"), Some(&span)).unwrap();
                tokio::task::yield_now().await;
                langfuse.end_generation(generation, Generation::default()).unwrap();
                langfuse.end_span(span, Span::default()).unwrap();
            }
            trace
        }));
    }

    let mut traces = Vec::new();
    for task in tasks {
        traces.push(task.await.unwrap());
    }
    assert_eq!(langfuse.shutdown(Duration::from_secs(10)).await, WaitOutcome::Completed);

    let events = client.events();
    // 16 traces × (1 trace-create + 10 × 4 observation events)
    assert_eq!(events.len(), 16 * 41);

    let unique: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(unique.len(), events.len(), "an event was delivered twice");

    // Batches may land out of order, so compare creates and updates as sets:
    // each create is matched by one update with the same id and trace.
    let known: HashSet<&str> = traces.iter().map(|t| t.id()).collect();
    let mut created: HashMap<&str, &str> = HashMap::new();
    let mut updated: HashMap<&str, &str> = HashMap::new();
    for event in &events {
        let trace_id = event.payload.trace_id().unwrap();
        assert!(known.contains(trace_id));
        let id = event.payload.body_id().unwrap();
        let seen = match event.event_type() {
            IngestionEventType::SpanCreate | IngestionEventType::GenerationCreate => &mut created,
            IngestionEventType::SpanUpdate | IngestionEventType::GenerationUpdate => &mut updated,
            _ => continue,
        };
        assert!(seen.insert(id, trace_id).is_none(), "duplicate {} for {id}", event.event_type());
    }
    assert_eq!(created.len(), 16 * 20);
    assert_eq!(created, updated);
}

#[tokio::test]
async fn test_recording_never_waits_for_delivery() {
    let client = Arc::new(RecordingClient::default());
    let langfuse = Langfuse::new(LangfuseConfig::default(), client.clone());

    for _ in 0..100 {
        langfuse.start_span(Span::named("s"), None).unwrap();
    }
    // Nothing delivered yet: the default tick is one second and no flush was asked.
    assert_eq!(client.batch_count(), 0);

    langfuse.flush();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.events().len(), 200);
    assert_eq!(observation_ids(&client.events(), IngestionEventType::SpanCreate).len(), 100);
}

#[tokio::test]
async fn test_delivery_failure_is_counted_not_returned() {
    let langfuse = Langfuse::new(LangfuseConfig::default(), Arc::new(DownClient));

    langfuse.start_trace(Trace::named("t"));
    langfuse.start_span(Span::named("s"), None).unwrap();

    assert_eq!(langfuse.shutdown(Duration::from_secs(1)).await, WaitOutcome::Completed);
    let metrics = langfuse.metrics();
    assert_eq!(metrics.delivery_errors(), 1);
    assert_eq!(metrics.items_dropped(), 3);
    assert_eq!(metrics.items_delivered(), 0);
}

#[tokio::test]
async fn test_shutdown_twice_reports_already_stopped() {
    let langfuse = Langfuse::new(LangfuseConfig::default(), Arc::new(RecordingClient::default()));
    assert_eq!(langfuse.flush_interval(), Duration::from_millis(500));

    assert_eq!(langfuse.shutdown(Duration::from_secs(1)).await, WaitOutcome::Completed);
    assert_eq!(langfuse.shutdown(Duration::from_secs(1)).await, WaitOutcome::AlreadyStopped);
}

// =============================================================================
// HTTP client against a local one-shot server
// =============================================================================

/// Accepts one connection, captures the request body and answers with `status` and `body`.
async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = format!("http://{}", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        let header_end = loop {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            request.extend_from_slice(&buf[..n]);
            if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
        let content_length: usize = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map_or(0, |v| v.trim().parse().unwrap());
        while request.len() < header_end + content_length {
            let n = stream.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();

        let head = headers.lines().next().unwrap_or_default().to_string();
        format!("{head}\n{}", String::from_utf8_lossy(&request[header_end..]))
    });

    (host, server)
}

fn sample_batch() -> IngestionBatch {
    IngestionBatch {
        batch: vec![IngestionEvent::new(IngestionPayload::TraceCreate(Trace::named("http")))],
    }
}

#[tokio::test]
async fn test_http_client_posts_batch() {
    let (host, server) = serve_once("207 Multi-Status", r#"{"successes":[{"id":"e1","status":201}],"errors":[]}"#).await;
    let client = HttpIngestionClient::new(&HttpConfig::default().with_host(host)).unwrap();

    let response = client.ingest(sample_batch()).await.unwrap();
    assert!(response.is_complete());
    assert_eq!(response.successes.len(), 1);

    let captured = server.await.unwrap();
    let (request_line, body) = captured.split_once('\n').unwrap();
    assert_eq!(request_line, "post /api/public/ingestion http/1.1");
    let body: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(body["batch"][0]["type"], "trace-create");
    assert_eq!(body["batch"][0]["body"]["name"], "http");
}

#[tokio::test]
async fn test_http_client_maps_rejection() {
    let (host, server) = serve_once("500 Internal Server Error", r#"{"message":"boom"}"#).await;
    let client = HttpIngestionClient::new(&HttpConfig::default().with_host(host)).unwrap();

    let err = client.ingest(sample_batch()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { status: 500, .. }));
    assert!(err.is_transient());
    server.await.unwrap();
}

#[tokio::test]
async fn test_http_client_unreachable_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = HttpIngestionClient::new(&HttpConfig::default().with_host(host)).unwrap();
    let err = client.ingest(sample_batch()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transport(_)));
}
