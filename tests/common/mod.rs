//! Common test utilities for jobsai-client integration tests

#![allow(dead_code)]

use std::time::Duration;

use jobsai_client::config::{Config, RetryConfig};
use jobsai_client::{ClientJobState, ClientPhase, DeliveryMethod, FieldValue, JobRequest, Orchestrator};

/// Install a fmt subscriber honouring `RUST_LOG`; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("jobsai_client=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Questionnaire answers that pass validation
pub fn sample_request(method: DeliveryMethod) -> JobRequest {
    let request = JobRequest::new(method)
        .answer("general", "job-level", FieldValue::choices(["Intermediate", "Entry"]))
        .answer("general", "job-boards", FieldValue::choices(["Duunitori", "Indeed"]))
        .answer("general", "deep-mode", FieldValue::Text("No".into()))
        .answer("general", "cover-letter-num", FieldValue::Level(2))
        .answer("general", "cover-letter-style", FieldValue::choices(["Professional"]))
        .answer("languages", "rust", FieldValue::Level(6))
        .answer("databases", "postgresql", FieldValue::Level(4))
        .answer(
            "additional-info",
            "additional-info",
            FieldValue::Text("Backend developer, four years of async Rust.".into()),
        );
    match method {
        DeliveryMethod::Email => request.with_email("applicant@example.fi"),
        DeliveryMethod::Download => request,
    }
}

/// Configuration pointing at `base_url` with fast polling
pub fn fast_config(base_url: &str, download_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.polling.interval = Duration::from_millis(20);
    config.delivery.download_dir = download_dir.to_path_buf();
    config.delivery.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Wait until the orchestrator publishes `phase`, or panic after `timeout`
pub async fn wait_for_phase(
    orchestrator: &Orchestrator,
    phase: ClientPhase,
    timeout: Duration,
) -> ClientJobState {
    let mut rx = orchestrator.watch();
    let result = tokio::time::timeout(timeout, rx.wait_for(|s| s.phase == phase)).await;
    match result {
        Ok(Ok(state)) => state.clone(),
        Ok(Err(_)) => panic!("orchestrator stopped before reaching {phase}"),
        Err(_) => panic!(
            "timed out waiting for {phase}, last state: {:?}",
            orchestrator.state()
        ),
    }
}
