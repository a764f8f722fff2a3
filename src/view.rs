//! Presentation projection
//!
//! [`StatusView::project`] turns a [`ClientJobState`] into everything a front
//! end needs to render the status area and enable its buttons. It is a pure
//! function of the state; no rendering happens here.

use serde::Serialize;

use crate::error::ValidationErrors;
use crate::types::{
    ClientJobState, ClientPhase, DeliveryMethod, DeliveryReport, JobOutcome, PipelinePhase,
};

/// Fixed advisory shown when the backend rate-limits a submission
pub const RATE_LIMIT_ADVISORY: &str =
    "Too many searches right now. Please wait a few minutes before trying again.";

/// Shown for email-delivery jobs both on success and on a silent failure
const EMAIL_RECEIVED: &str = "Request received. Your cover letters will be sent to your email.";

/// Position of the running pipeline phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PhaseStep {
    /// Current phase
    pub phase: PipelinePhase,
    /// 1-based position of the phase
    pub current: usize,
    /// Number of phases in the pipeline
    pub total: usize,
}

impl std::fmt::Display for PhaseStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Step {} of {}: {}", self.current, self.total, self.phase)
    }
}

/// What the status area shows and which actions are enabled
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusView {
    /// Main status line
    pub headline: String,
    /// Secondary line (error reason, failed documents, email notice)
    pub detail: Option<String>,
    /// Pipeline position while the job runs
    pub step: Option<PhaseStep>,
    /// Submit button enabled
    pub can_submit: bool,
    /// Cancel button enabled
    pub can_cancel: bool,
    /// Find Again button enabled
    pub can_find_again: bool,
    /// Retry button enabled
    pub can_retry: bool,
    /// Fields to highlight in the form
    pub field_errors: Option<ValidationErrors>,
}

impl StatusView {
    /// Project a state snapshot
    pub fn project(state: &ClientJobState) -> Self {
        let email = state.delivery_method == Some(DeliveryMethod::Email);
        let mut view = StatusView {
            headline: String::new(),
            detail: None,
            step: None,
            can_submit: state.phase == ClientPhase::Idle,
            can_cancel: state.phase == ClientPhase::Polling && !email,
            can_find_again: state.phase.is_terminal(),
            can_retry: false,
            field_errors: state.field_errors.clone(),
        };

        match state.phase {
            ClientPhase::Idle => {
                view.headline = "Ready to search".to_string();
            }
            ClientPhase::Submitting => {
                view.headline = "Starting your search...".to_string();
            }
            ClientPhase::Polling => match &state.last_snapshot {
                Some(snapshot) => {
                    view.headline = snapshot.message.clone();
                    view.step = Some(PhaseStep {
                        phase: snapshot.phase,
                        current: snapshot.phase.step(),
                        total: PipelinePhase::ALL.len(),
                    });
                }
                None => view.headline = "Waiting for the search to start...".to_string(),
            },
            ClientPhase::Downloading => {
                let count = match &state.outcome {
                    Some(JobOutcome::Complete { filenames }) => filenames.len(),
                    _ => 0,
                };
                view.headline = format!("Downloading {}...", documents(count));
            }
            ClientPhase::Succeeded if email => {
                view.headline = EMAIL_RECEIVED.to_string();
                if let Some(report) = &state.delivery {
                    view.detail = Some(format!(
                        "{} on the way.",
                        capitalize(&documents(report.delivered))
                    ));
                }
            }
            ClientPhase::Succeeded => match &state.delivery {
                Some(report) => {
                    view.headline = download_headline(report);
                    view.detail = failure_detail(report);
                }
                None => view.headline = "Search complete".to_string(),
            },
            ClientPhase::Cancelled => {
                view.headline = "Search cancelled".to_string();
            }
            ClientPhase::RateLimited => {
                view.headline = RATE_LIMIT_ADVISORY.to_string();
            }
            ClientPhase::Errored if email => {
                // Email failures are never surfaced; the user was already told to expect mail
                view.headline = EMAIL_RECEIVED.to_string();
            }
            ClientPhase::Errored => {
                view.headline = "Something went wrong".to_string();
                view.detail = state.error_message().map(str::to_string);
                view.can_retry = true;
            }
        }

        view
    }
}

fn download_headline(report: &DeliveryReport) -> String {
    let expected = report.expected();
    if expected == 0 {
        "Search complete, but no cover letters were generated".to_string()
    } else if report.delivered == expected {
        format!("Downloaded {}", documents(expected))
    } else {
        format!("Downloaded {} of {}", report.delivered, documents(expected))
    }
}

fn failure_detail(report: &DeliveryReport) -> Option<String> {
    let failures: Vec<String> = report.failures().map(ToString::to_string).collect();
    if failures.is_empty() {
        None
    } else {
        Some(format!("Failed: {}", failures.join("; ")))
    }
}

fn documents(count: usize) -> String {
    if count == 1 {
        "1 cover letter".to_string()
    } else {
        format!("{count} cover letters")
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DownloadError;
    use crate::types::{FileDelivery, JobHandle, ProgressSnapshot};
    use std::path::PathBuf;

    fn state(phase: ClientPhase, method: DeliveryMethod) -> ClientJobState {
        ClientJobState {
            phase,
            delivery_method: Some(method),
            handle: Some(JobHandle::new("job-1")),
            ..Default::default()
        }
    }

    fn report(ok: usize, failed: usize) -> DeliveryReport {
        let mut files = Vec::new();
        for i in 0..ok {
            files.push(FileDelivery {
                filename: format!("ok_{i}.docx"),
                result: Ok(PathBuf::from(format!("/tmp/ok_{i}.docx"))),
            });
        }
        for i in 0..failed {
            files.push(FileDelivery {
                filename: format!("bad_{i}.docx"),
                result: Err(DownloadError::NotFound {
                    filename: format!("bad_{i}.docx"),
                }),
            });
        }
        DeliveryReport {
            method: DeliveryMethod::Download,
            files,
            delivered: ok,
        }
    }

    #[test]
    fn idle_allows_only_submit() {
        let view = StatusView::project(&ClientJobState::default());
        assert!(view.can_submit);
        assert!(!view.can_cancel && !view.can_find_again && !view.can_retry);
    }

    #[test]
    fn polling_shows_step_and_cancel_for_downloads_only() {
        let mut running = state(ClientPhase::Polling, DeliveryMethod::Download);
        running.last_snapshot = Some(ProgressSnapshot::new(
            PipelinePhase::Scoring,
            "Scoring 40 jobs",
        ));

        let view = StatusView::project(&running);
        assert_eq!(view.headline, "Scoring 40 jobs");
        assert_eq!(view.step.unwrap().to_string(), "Step 3 of 5: scoring");
        assert!(view.can_cancel);
        assert!(!view.can_submit);

        running.delivery_method = Some(DeliveryMethod::Email);
        assert!(!StatusView::project(&running).can_cancel);
    }

    #[test]
    fn partial_download_reports_counts_and_failures() {
        let mut done = state(ClientPhase::Succeeded, DeliveryMethod::Download);
        done.delivery = Some(report(2, 1));

        let view = StatusView::project(&done);
        assert_eq!(view.headline, "Downloaded 2 of 3 cover letters");
        assert!(view.detail.unwrap().contains("bad_0.docx"));
        assert!(view.can_find_again);

        done.delivery = Some(report(3, 0));
        let view = StatusView::project(&done);
        assert_eq!(view.headline, "Downloaded 3 cover letters");
        assert_eq!(view.detail, None);
    }

    #[test]
    fn rate_limited_shows_fixed_advisory() {
        let view = StatusView::project(&state(ClientPhase::RateLimited, DeliveryMethod::Download));
        assert_eq!(view.headline, RATE_LIMIT_ADVISORY);
        assert!(!view.can_submit);
        assert!(view.can_find_again);
        assert!(!view.can_retry);
    }

    #[test]
    fn download_error_is_surfaced_with_retry() {
        let mut failed = state(ClientPhase::Errored, DeliveryMethod::Download);
        failed.outcome = Some(JobOutcome::Error {
            error: "LLM quota exceeded".into(),
        });

        let view = StatusView::project(&failed);
        assert_eq!(view.detail.as_deref(), Some("LLM quota exceeded"));
        assert!(view.can_retry);
    }

    #[test]
    fn email_error_is_silent() {
        let mut failed = state(ClientPhase::Errored, DeliveryMethod::Email);
        failed.error = Some("Lost contact with the server".into());

        let view = StatusView::project(&failed);
        assert_eq!(view.headline, EMAIL_RECEIVED);
        assert_eq!(view.detail, None);
        assert!(!view.can_retry);
        assert_eq!(
            view.headline,
            StatusView::project(&state(ClientPhase::Succeeded, DeliveryMethod::Email)).headline
        );
    }

    #[test]
    fn email_success_mentions_count() {
        let mut done = state(ClientPhase::Succeeded, DeliveryMethod::Email);
        done.delivery = Some(DeliveryReport {
            method: DeliveryMethod::Email,
            files: Vec::new(),
            delivered: 1,
        });
        assert_eq!(
            StatusView::project(&done).detail.as_deref(),
            Some("1 cover letter on the way.")
        );
    }
}
