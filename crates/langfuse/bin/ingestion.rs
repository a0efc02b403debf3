//! # Ingestion Demo
//!
//! Records one trace with two spans, each holding a generation, an event and a
//! score, then shuts down with a deadline so every batch is delivered.
//!
//! Batches go to `$LANGFUSE_HOST/api/public/ingestion` when `LANGFUSE_HOST` is
//! set, otherwise they are printed to stdout.
//!
//! ## Running
//!
//! ```bash
//! # Print batches
//! cargo run -p langfuse --bin ingestion
//!
//! # Send to a local server, with client logs
//! RUST_LOG=langfuse=debug LANGFUSE_HOST=http://localhost:3000 cargo run -p langfuse --bin ingestion
//! ```

use anyhow::Context;
use langfuse::{
    Event, Generation, HttpConfig, HttpIngestionClient, IngestionClientBoxed, Langfuse, LangfuseConfig,
    ObservationHandle, Score, Span, StdoutIngestionClient, Trace, Usage, WaitOutcome, HOST_ENV,
};
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("langfuse=info")))
        .init();

    let client: Arc<dyn IngestionClientBoxed> = if std::env::var_os(HOST_ENV).is_some() {
        let config = HttpConfig::from_env().context("reading Langfuse endpoint settings")?;
        let client = HttpIngestionClient::new(&config)?;
        println!("Sending batches to {}", client.endpoint());
        Arc::new(client)
    } else {
        println!("{HOST_ENV} not set, printing batches to stdout");
        Arc::new(StdoutIngestionClient::new())
    };

    let langfuse = Langfuse::new(LangfuseConfig::default(), client);

    // =========================================================================
    // Record
    // =========================================================================

    let trace = langfuse.start_trace(Trace::named("test-trace"));

    for _ in 0..2 {
        let span = langfuse.start_span(Span::named("test-span").in_trace(&trace), None)?;
        summarize(&langfuse, &span)?;
        langfuse.create_event(
            Event {
                metadata: Some(json!({"key": "value"})),
                input: Some(json!({"key": "value"})),
                output: Some(json!({"key": "value"})),
                ..Event::named("test-event")
            },
            Some(&span),
        )?;
        langfuse.create_score(Score::new("test-score", 0.9).for_observation(&span))?;
        langfuse.end_span(span, Span::default())?;
        langfuse.flush();
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    let outcome = langfuse.shutdown(SHUTDOWN_DEADLINE).await;
    let metrics = langfuse.metrics();
    println!(
        "Shutdown {:?}: {} events recorded, {} delivered in {} batches, {} dropped",
        outcome,
        metrics.items_dispatched(),
        metrics.items_delivered(),
        metrics.batches_delivered(),
        metrics.items_dropped(),
    );

    if outcome == WaitOutcome::DeadlineElapsed {
        anyhow::bail!("delivery did not finish within {SHUTDOWN_DEADLINE:?}");
    }
    Ok(())
}

/// Records one simulated model call under `parent`.
fn summarize(langfuse: &Langfuse, parent: &ObservationHandle) -> langfuse::Result<()> {
    let generation = langfuse.start_generation(
        Generation {
            model: Some("gpt-3.5-turbo".into()),
            model_parameters: Some(json!({"maxTokens": "1000", "temperature": "0.9"})),
            input: Some(json!([
                {"role": "system", "content": "You are a helpful assistant."},
                {
                    "role": "user",
                    "content": "Please generate a summary of the following documents \nThe engineering department defined the following OKR goals...\nThe marketing department defined the following OKR goals..."
                }
            ])),
            metadata: Some(json!({"key": "value"})),
            ..Generation::named("test-generation")
        },
        Some(parent),
    )?;

    let mut rng = rand::thread_rng();
    langfuse.end_generation(
        generation,
        Generation {
            output: Some(json!({"completion": "The Q3 OKRs contain goals for multiple teams..."})),
            usage: Some(Usage::tokens(rng.gen_range(40..120), rng.gen_range(20..80))),
            ..Generation::default()
        },
    )
}
