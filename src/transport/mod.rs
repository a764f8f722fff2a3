//! Backend transport
//!
//! One method per backend endpoint, each returning a typed result. The
//! transport never retries; retry and escalation policy belong to the
//! orchestrator, so any implementation (HTTP, scripted test double) can be
//! swapped in behind the [`Transport`] trait.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TransportError;
use crate::types::{Document, JobHandle, JobOutcome, ProgressSnapshot};
use crate::validation::JobRequest;

/// Result of one progress poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResponse {
    /// The job is still running; progress may not have been reported yet
    Running(Option<ProgressSnapshot>),
    /// The job reached a terminal outcome
    Finished(JobOutcome),
}

/// Operations the orchestrator needs from the backend
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit a validated request; `POST /api/start`
    async fn start(&self, request: &JobRequest) -> Result<JobHandle, TransportError>;

    /// Fetch current progress; `GET /api/progress/{job_id}`
    async fn poll_progress(&self, handle: &JobHandle) -> Result<PollResponse, TransportError>;

    /// Ask the backend to stop the job; `POST /api/cancel/{job_id}`
    async fn cancel(&self, handle: &JobHandle) -> Result<(), TransportError>;

    /// Fetch one generated document by 1-based index; `GET /api/download/{job_id}`
    async fn download(
        &self,
        handle: &JobHandle,
        index: usize,
        filename: &str,
    ) -> Result<Document, TransportError>;

    /// Legacy synchronous submit returning the document directly; `POST /api/endpoint`
    async fn submit_sync(&self, request: &JobRequest) -> Result<Document, TransportError>;
}

/// Body of `POST /api/start`
#[derive(Debug, Deserialize)]
pub(crate) struct StartResponse {
    pub(crate) job_id: String,
}

/// Status field of the progress response
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum WireStatus {
    Running,
    /// Cancel requested, worker not yet stopped
    Cancelling,
    Complete,
    Error,
    Cancelled,
}

/// Body of `GET /api/progress/{job_id}`
#[derive(Debug, Deserialize)]
pub(crate) struct ProgressResponse {
    #[serde(default)]
    pub(crate) job_id: Option<String>,
    pub(crate) status: WireStatus,
    #[serde(default)]
    pub(crate) progress: Option<ProgressSnapshot>,
    #[serde(default)]
    pub(crate) filenames: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) filename: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

impl From<ProgressResponse> for PollResponse {
    fn from(response: ProgressResponse) -> Self {
        match response.status {
            WireStatus::Running | WireStatus::Cancelling => {
                PollResponse::Running(response.progress)
            }
            WireStatus::Complete => {
                let filenames = match (response.filenames, response.filename) {
                    (Some(names), _) if !names.is_empty() => names,
                    (_, Some(name)) => vec![name],
                    (Some(names), None) => names,
                    (None, None) => Vec::new(),
                };
                PollResponse::Finished(JobOutcome::Complete { filenames })
            }
            WireStatus::Error => PollResponse::Finished(JobOutcome::Error {
                error: response
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            }),
            WireStatus::Cancelled => PollResponse::Finished(JobOutcome::Cancelled),
        }
    }
}

/// JSON body of `GET /api/download/{job_id}` when the backend hands out a presigned URL
#[derive(Debug, Deserialize)]
pub(crate) struct DownloadLink {
    pub(crate) download_url: String,
    #[serde(default)]
    pub(crate) filename: Option<String>,
}
