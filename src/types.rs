//! Core types for jobsai-client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DownloadError, ValidationErrors};

/// Identity of one backend job, returned by the start operation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    /// Backend-assigned job identifier (UUID string)
    pub job_id: String,
}

impl JobHandle {
    /// Create a handle from a backend job id
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.job_id)
    }
}

/// Backend pipeline phase
///
/// Declaration order is pipeline order; the derived `Ord` is what keeps the
/// displayed phase from moving backwards.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePhase {
    /// Building the candidate profile from the form
    Profiling,
    /// Querying job boards
    Searching,
    /// Scoring job relevance
    Scoring,
    /// Analyzing the best matches
    Analyzing,
    /// Writing cover letters
    Generating,
}

impl PipelinePhase {
    /// All phases in pipeline order
    pub const ALL: [PipelinePhase; 5] = [
        PipelinePhase::Profiling,
        PipelinePhase::Searching,
        PipelinePhase::Scoring,
        PipelinePhase::Analyzing,
        PipelinePhase::Generating,
    ];

    /// 1-based position in the pipeline
    pub fn step(self) -> usize {
        self as usize + 1
    }

    /// Wire name of the phase
    pub fn as_str(self) -> &'static str {
        match self {
            PipelinePhase::Profiling => "profiling",
            PipelinePhase::Searching => "searching",
            PipelinePhase::Scoring => "scoring",
            PipelinePhase::Analyzing => "analyzing",
            PipelinePhase::Generating => "generating",
        }
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known progress of a running job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Current pipeline phase
    pub phase: PipelinePhase,
    /// Human-readable progress message from the backend
    #[serde(default)]
    pub message: String,
}

impl ProgressSnapshot {
    /// Create a snapshot
    pub fn new(phase: PipelinePhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

/// Terminal result of a backend job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    /// Documents were generated
    Complete {
        /// Names of the generated documents, in download-index order
        filenames: Vec<String>,
    },
    /// The pipeline failed
    Error {
        /// Backend error message
        error: String,
    },
    /// The pipeline stopped after a cancel request
    Cancelled,
}

impl JobOutcome {
    /// Wire status name
    pub fn status(&self) -> &'static str {
        match self {
            JobOutcome::Complete { .. } => "complete",
            JobOutcome::Error { .. } => "error",
            JobOutcome::Cancelled => "cancelled",
        }
    }
}

/// How generated documents reach the user, fixed per submission
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    /// The backend emails the documents itself
    Email,
    /// The client downloads each document
    #[default]
    Download,
}

impl DeliveryMethod {
    /// Wire name of the method
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMethod::Email => "email",
            DeliveryMethod::Download => "download",
        }
    }
}

/// Orchestrator phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientPhase {
    /// Nothing submitted
    #[default]
    Idle,
    /// Start request in flight
    Submitting,
    /// Job running, progress being polled
    Polling,
    /// Job complete, documents being downloaded
    Downloading,
    /// Job complete and delivered
    Succeeded,
    /// User cancelled the job
    Cancelled,
    /// Backend refused the job under its rate-limit policy
    RateLimited,
    /// Job failed or was lost
    Errored,
}

impl ClientPhase {
    /// Name used in logs and error messages
    pub fn as_str(self) -> &'static str {
        match self {
            ClientPhase::Idle => "idle",
            ClientPhase::Submitting => "submitting",
            ClientPhase::Polling => "polling",
            ClientPhase::Downloading => "downloading",
            ClientPhase::Succeeded => "succeeded",
            ClientPhase::Cancelled => "cancelled",
            ClientPhase::RateLimited => "rate_limited",
            ClientPhase::Errored => "errored",
        }
    }

    /// No further automatic transition happens from a terminal phase
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ClientPhase::Succeeded
                | ClientPhase::Cancelled
                | ClientPhase::RateLimited
                | ClientPhase::Errored
        )
    }

    /// A new job may only start from idle or a terminal phase
    pub fn accepts_submission(self) -> bool {
        self == ClientPhase::Idle || self.is_terminal()
    }
}

impl std::fmt::Display for ClientPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full orchestrator state; the presentation layer reads snapshots of it
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClientJobState {
    /// Current phase
    pub phase: ClientPhase,
    /// Delivery method of the current submission
    pub delivery_method: Option<DeliveryMethod>,
    /// Active job identity
    pub handle: Option<JobHandle>,
    /// Furthest progress seen for the active job
    pub last_snapshot: Option<ProgressSnapshot>,
    /// Terminal result reported by the backend
    pub outcome: Option<JobOutcome>,
    /// Per-file delivery results once the job is finalized
    pub delivery: Option<DeliveryReport>,
    /// Client-side reason for `errored` when the backend gave none
    pub error: Option<String>,
    /// Field errors from the last rejected submit
    pub field_errors: Option<ValidationErrors>,
    /// Monotonic counter of accepted submissions
    pub submission: u64,
    /// When the current submission was accepted
    pub started_at: Option<DateTime<Utc>>,
    /// When the current submission reached a terminal phase
    pub finished_at: Option<DateTime<Utc>>,
}

impl ClientJobState {
    /// Human-readable failure reason, preferring the backend's message
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Some(JobOutcome::Error { error }) => Some(error.as_str()),
            _ => self.error.as_deref(),
        }
    }
}

/// A fetched document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    /// File name to save under
    pub filename: String,
    /// Content type reported by the server
    pub content_type: Option<String>,
    /// Document bytes
    pub bytes: Vec<u8>,
}

/// Result of delivering one document
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileDelivery {
    /// Document name from the job outcome
    pub filename: String,
    /// Where it was saved, or why it was not
    pub result: std::result::Result<PathBuf, DownloadError>,
}

/// Outcome of the delivery step for one completed job
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Method the documents were delivered by
    pub method: DeliveryMethod,
    /// Per-file results (empty for email delivery)
    pub files: Vec<FileDelivery>,
    /// Count shown to the user
    pub delivered: usize,
}

impl DeliveryReport {
    /// Files that failed to download
    pub fn failures(&self) -> impl Iterator<Item = &DownloadError> {
        self.files.iter().filter_map(|f| f.result.as_ref().err())
    }

    /// Number of documents the job produced
    pub fn expected(&self) -> usize {
        match self.method {
            DeliveryMethod::Email => self.delivered,
            DeliveryMethod::Download => self.files.len(),
        }
    }
}

/// Event emitted by the orchestrator
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A validated request was accepted for submission
    Submitted {
        /// Submission counter
        submission: u64,
        /// Chosen delivery method
        delivery_method: DeliveryMethod,
    },

    /// The backend accepted the job
    JobStarted {
        /// Backend job id
        job_id: String,
    },

    /// Displayed progress advanced
    Progress {
        /// Backend job id
        job_id: String,
        /// Pipeline phase
        phase: PipelinePhase,
        /// Progress message
        message: String,
    },

    /// A poll failed and will be retried
    PollFailed {
        /// Backend job id
        job_id: String,
        /// Consecutive failures so far
        consecutive: u32,
        /// Error message
        error: String,
    },

    /// The user cancelled the job
    CancelRequested {
        /// Backend job id
        job_id: String,
    },

    /// The cancel request did not reach the backend
    CancelFailed {
        /// Backend job id
        job_id: String,
        /// Error message
        error: String,
    },

    /// A document was saved
    FileDelivered {
        /// Backend job id
        job_id: String,
        /// Document name
        filename: String,
        /// Where it was saved
        location: PathBuf,
    },

    /// A document could not be delivered
    FileFailed {
        /// Backend job id
        job_id: String,
        /// The failure
        error: DownloadError,
    },

    /// The submission reached a terminal phase
    Finished {
        /// Backend job id, if the job started
        job_id: Option<String>,
        /// Terminal phase
        phase: ClientPhase,
    },

    /// State was reset by Find Again
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_phases_order_by_pipeline_position() {
        assert!(PipelinePhase::Profiling < PipelinePhase::Searching);
        assert!(PipelinePhase::Analyzing < PipelinePhase::Generating);
        let steps: Vec<usize> = PipelinePhase::ALL.iter().map(|p| p.step()).collect();
        assert_eq!(steps, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn terminal_phases_accept_submission() {
        for phase in [
            ClientPhase::Idle,
            ClientPhase::Succeeded,
            ClientPhase::Cancelled,
            ClientPhase::RateLimited,
            ClientPhase::Errored,
        ] {
            assert!(phase.accepts_submission(), "{phase} should accept");
        }
        for phase in [
            ClientPhase::Submitting,
            ClientPhase::Polling,
            ClientPhase::Downloading,
        ] {
            assert!(!phase.accepts_submission(), "{phase} should reject");
        }
        assert!(!ClientPhase::Idle.is_terminal());
    }

    #[test]
    fn job_outcome_uses_status_tag() {
        let json = serde_json::to_value(JobOutcome::Complete {
            filenames: vec!["a.docx".into()],
        })
        .unwrap_or_default();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["filenames"][0], "a.docx");
    }

    #[test]
    fn error_message_prefers_backend_error() {
        let state = ClientJobState {
            outcome: Some(JobOutcome::Error {
                error: "scraper failed".into(),
            }),
            error: Some("local".into()),
            ..Default::default()
        };
        assert_eq!(state.error_message(), Some("scraper failed"));

        let state = ClientJobState {
            error: Some("job lost".into()),
            ..Default::default()
        };
        assert_eq!(state.error_message(), Some("job lost"));
    }
}
