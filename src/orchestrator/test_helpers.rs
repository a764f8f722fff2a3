//! Scripted transport and recording sink for orchestrator tests.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::config::{Config, RetryConfig};
use crate::delivery::{DocumentSink, ScrollPosition};
use crate::error::{DownloadError, TransportError};
use crate::orchestrator::Orchestrator;
use crate::transport::{PollResponse, Transport};
use crate::types::{ClientJobState, ClientPhase, DeliveryMethod, Document, JobHandle};
use crate::validation::{ADDITIONAL_INFO, FieldValue, GENERAL_SET, JobRequest};

/// Transport whose responses are queued up front
///
/// Empty start queue answers with a fresh handle; empty poll queue answers
/// `running` with no progress, so an unscripted job simply keeps polling.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    starts: Mutex<VecDeque<Result<JobHandle, TransportError>>>,
    polls: Mutex<VecDeque<Result<PollResponse, TransportError>>>,
    missing_documents: Mutex<HashSet<String>>,
    cancel_fails: Mutex<bool>,
    poll_gate: Mutex<Option<Arc<Notify>>>,
    pub(crate) poll_entered: Notify,
    pub(crate) start_calls: AtomicUsize,
    pub(crate) poll_calls: AtomicUsize,
    pub(crate) cancel_calls: AtomicUsize,
    pub(crate) download_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_start(&self, result: Result<JobHandle, TransportError>) {
        self.starts.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_poll(&self, result: Result<PollResponse, TransportError>) {
        self.polls.lock().unwrap().push_back(result);
    }

    pub(crate) fn missing_document(&self, filename: &str) {
        self.missing_documents
            .lock()
            .unwrap()
            .insert(filename.to_string());
    }

    pub(crate) fn fail_cancel(&self) {
        *self.cancel_fails.lock().unwrap() = true;
    }

    /// Make the next poll wait until the returned gate is notified
    pub(crate) fn hold_next_poll(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.poll_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn start(&self, _request: &JobRequest) -> Result<JobHandle, TransportError> {
        let n = self.start_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.starts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(JobHandle::new(format!("job-{n}"))))
    }

    async fn poll_progress(&self, _handle: &JobHandle) -> Result<PollResponse, TransportError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.poll_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.poll_entered.notify_one();
            gate.notified().await;
        }
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PollResponse::Running(None)))
    }

    async fn cancel(&self, _handle: &JobHandle) -> Result<(), TransportError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if *self.cancel_fails.lock().unwrap() {
            return Err(TransportError::Http {
                status: 502,
                message: "Bad Gateway".into(),
            });
        }
        Ok(())
    }

    async fn download(
        &self,
        _handle: &JobHandle,
        index: usize,
        filename: &str,
    ) -> Result<Document, TransportError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing_documents.lock().unwrap().contains(filename) {
            return Err(TransportError::NotFound(format!("/api/download?index={index}")));
        }
        Ok(Document {
            filename: filename.to_string(),
            content_type: None,
            bytes: format!("document {index}").into_bytes(),
        })
    }

    async fn submit_sync(&self, _request: &JobRequest) -> Result<Document, TransportError> {
        Err(TransportError::NotFound("/api/endpoint".into()))
    }
}

/// Sink that keeps saved documents in memory and records scroll restores
pub(crate) struct MemorySink {
    pub(crate) saved: Mutex<Vec<Document>>,
    pub(crate) restored: Mutex<Vec<ScrollPosition>>,
    position: ScrollPosition,
}

impl MemorySink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            saved: Mutex::new(Vec::new()),
            restored: Mutex::new(Vec::new()),
            position: ScrollPosition { x: 0.0, y: 480.0 },
        })
    }

    pub(crate) fn saved_names(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.filename.clone())
            .collect()
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn save(&self, document: &Document) -> Result<PathBuf, DownloadError> {
        self.saved.lock().unwrap().push(document.clone());
        Ok(PathBuf::from("/memory").join(&document.filename))
    }

    fn scroll_position(&self) -> Option<ScrollPosition> {
        Some(self.position)
    }

    fn restore_scroll_position(&self, position: ScrollPosition) {
        self.restored.lock().unwrap().push(position);
    }
}

/// A request that passes validation
pub(crate) fn valid_request(method: DeliveryMethod) -> JobRequest {
    let request = JobRequest::new(method)
        .answer(GENERAL_SET, "job-level", FieldValue::choices(["Entry", "Intern"]))
        .answer(GENERAL_SET, "job-boards", FieldValue::choices(["Duunitori"]))
        .answer(GENERAL_SET, "deep-mode", FieldValue::Text("No".into()))
        .answer(GENERAL_SET, "cover-letter-num", FieldValue::Level(3))
        .answer(GENERAL_SET, "cover-letter-style", FieldValue::choices(["Friendly"]))
        .answer("languages", "rust", FieldValue::Level(5))
        .answer(
            ADDITIONAL_INFO,
            ADDITIONAL_INFO,
            FieldValue::Text("Looking for a first backend role.".into()),
        );
    match method {
        DeliveryMethod::Email => request.with_email("applicant@example.fi"),
        DeliveryMethod::Download => request,
    }
}

/// Fast polling and download retries so tests finish quickly
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.polling.interval = Duration::from_millis(10);
    config.delivery.retry = RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

pub(crate) fn spawn_orchestrator(transport: Arc<ScriptedTransport>) -> (Orchestrator, Arc<MemorySink>) {
    let sink = MemorySink::new();
    let orchestrator = Orchestrator::new(test_config(), transport, sink.clone()).unwrap();
    (orchestrator, sink)
}

/// Wait until the published state reaches `phase`
pub(crate) async fn wait_for_phase(orchestrator: &Orchestrator, phase: ClientPhase) -> ClientJobState {
    let mut rx = orchestrator.watch();
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.phase == phase))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {phase}, state: {:?}", orchestrator.state()))
        .unwrap()
        .clone();
    state
}
