//! Job lifecycle state machine
//!
//! Pure and synchronous: every user command and every I/O completion is a
//! method call that mutates [`ClientJobState`] and returns the single [`Action`]
//! the driver must perform next. Email and download submissions share every
//! transition; `delivery_method` only changes which actions are permitted.

use std::sync::Arc;

use chrono::Utc;

use crate::config::PollingConfig;
use crate::error::{Error, Result, TransportError};
use crate::transport::PollResponse;
use crate::types::{
    ClientJobState, ClientPhase, DeliveryMethod, DeliveryReport, Event, JobHandle, JobOutcome,
    ProgressSnapshot,
};
use crate::validation::{JobRequest, validate};

/// I/O the driver performs on the machine's behalf
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Action {
    /// Nothing to do
    None,
    /// Call `Transport::start` with the normalized request
    Start(Arc<JobRequest>),
    /// Poll again after one interval
    SchedulePoll,
    /// Stop polling and send a best-effort cancel request
    Cancel(JobHandle),
    /// Hand the completed job's documents to the deliverer
    Deliver {
        handle: JobHandle,
        filenames: Vec<String>,
        method: DeliveryMethod,
    },
}

pub(crate) struct JobMachine {
    state: ClientJobState,
    policy: PollingConfig,
    request: Option<Arc<JobRequest>>,
    network_failures: u32,
    not_found: u32,
    /// Cancelled locally while a poll was still in flight
    awaiting_reconcile: bool,
    events: Vec<Event>,
}

impl JobMachine {
    pub(crate) fn new(policy: PollingConfig) -> Self {
        Self {
            state: ClientJobState::default(),
            policy,
            request: None,
            network_failures: 0,
            not_found: 0,
            awaiting_reconcile: false,
            events: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> &ClientJobState {
        &self.state
    }

    /// Events produced since the last call
    pub(crate) fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Handle to poll when the poll timer fires, if polling is still wanted
    pub(crate) fn poll_target(&self) -> Option<JobHandle> {
        match self.state.phase {
            ClientPhase::Polling => self.state.handle.clone(),
            _ => None,
        }
    }

    /// User submit: validate, then start a fresh submission
    pub(crate) fn submit(&mut self, raw: &JobRequest) -> Result<Action> {
        self.ensure(self.state.phase.accepts_submission(), "submit")?;

        match validate(raw) {
            Ok(request) => Ok(self.begin(Arc::new(request))),
            Err(errors) => {
                tracing::debug!(fields = errors.len(), "submission rejected by validation");
                self.state.field_errors = Some(errors.clone());
                Err(Error::Validation(errors))
            }
        }
    }

    /// Resubmit the last request after a download-mode failure
    pub(crate) fn retry(&mut self) -> Result<Action> {
        let allowed = self.state.phase == ClientPhase::Errored
            && self.state.delivery_method == Some(DeliveryMethod::Download);
        self.ensure(allowed, "retry")?;

        match self.request.clone() {
            Some(request) => Ok(self.begin(request)),
            None => Err(Error::Other("no previous request to retry".to_string())),
        }
    }

    /// User cancel while polling a download-mode job
    pub(crate) fn cancel(&mut self) -> Result<Action> {
        let is_email = self.state.delivery_method == Some(DeliveryMethod::Email);
        if self.state.phase == ClientPhase::Polling && is_email {
            return Err(Error::InvalidState {
                operation: "cancel".to_string(),
                current_state: "delivering by email".to_string(),
            });
        }
        self.ensure(self.state.phase == ClientPhase::Polling, "cancel")?;

        let Some(handle) = self.state.handle.clone() else {
            return Err(Error::Other("polling without a job handle".to_string()));
        };

        tracing::info!(job_id = %handle, "cancel requested");
        self.awaiting_reconcile = true;
        self.events.push(Event::CancelRequested {
            job_id: handle.job_id.clone(),
        });
        self.finish(ClientPhase::Cancelled);
        Ok(Action::Cancel(handle))
    }

    /// Find Again: back to idle with no trace of the previous job
    pub(crate) fn find_again(&mut self) -> Result<()> {
        let phase = self.state.phase;
        self.ensure(phase == ClientPhase::Idle || phase.is_terminal(), "find again")?;

        if let Some(handle) = &self.state.handle {
            tracing::debug!(job_id = %handle, "discarding finished job");
        }
        self.state = ClientJobState {
            submission: self.state.submission,
            ..ClientJobState::default()
        };
        self.request = None;
        self.reset_counters();
        self.awaiting_reconcile = false;
        self.events.push(Event::Reset);
        Ok(())
    }

    /// Completion of `Transport::start`
    pub(crate) fn on_started(&mut self, result: std::result::Result<JobHandle, TransportError>) -> Action {
        if self.state.phase != ClientPhase::Submitting {
            return Action::None;
        }

        match result {
            Ok(handle) => {
                tracing::info!(job_id = %handle, "job started, polling for progress");
                self.events.push(Event::JobStarted {
                    job_id: handle.job_id.clone(),
                });
                self.state.handle = Some(handle);
                self.state.phase = ClientPhase::Polling;
                Action::SchedulePoll
            }
            Err(TransportError::RateLimited) => {
                tracing::warn!("start rejected by rate limit");
                self.finish(ClientPhase::RateLimited);
                Action::None
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start job");
                self.state.error = Some(e.to_string());
                self.finish(ClientPhase::Errored);
                Action::None
            }
        }
    }

    /// Completion of `Transport::poll_progress`
    pub(crate) fn on_polled(&mut self, result: std::result::Result<PollResponse, TransportError>) -> Action {
        match self.state.phase {
            ClientPhase::Polling => self.apply_poll(result),
            ClientPhase::Cancelled if self.awaiting_reconcile => {
                self.awaiting_reconcile = false;
                self.reconcile_after_cancel(result)
            }
            _ => Action::None,
        }
    }

    /// Completion of the delivery step
    pub(crate) fn on_delivered(&mut self, report: DeliveryReport) -> Action {
        let waiting = match self.state.phase {
            ClientPhase::Downloading => true,
            ClientPhase::Succeeded => self.state.delivery.is_none(),
            _ => false,
        };
        if !waiting {
            return Action::None;
        }

        self.state.delivery = Some(report);
        self.finish(ClientPhase::Succeeded);
        Action::None
    }

    fn apply_poll(&mut self, result: std::result::Result<PollResponse, TransportError>) -> Action {
        let job_id = self
            .state
            .handle
            .as_ref()
            .map(|h| h.job_id.clone())
            .unwrap_or_default();

        match result {
            Ok(PollResponse::Running(snapshot)) => {
                self.reset_counters();
                if let Some(snapshot) = snapshot {
                    self.record_snapshot(&job_id, snapshot);
                }
                Action::SchedulePoll
            }
            Ok(PollResponse::Finished(outcome)) => {
                self.reset_counters();
                self.apply_outcome(outcome)
            }
            Err(TransportError::RateLimited) => {
                tracing::warn!(job_id = %job_id, "progress polling rate limited");
                self.finish(ClientPhase::RateLimited);
                Action::None
            }
            // Only a successful poll clears the counters, so alternating
            // failure kinds still escalate
            Err(TransportError::NotFound(_)) => {
                self.not_found += 1;
                if self.not_found > self.policy.max_consecutive_not_found {
                    tracing::error!(job_id = %job_id, attempts = self.not_found, "job no longer known to backend");
                    self.state.error = Some("The search job was lost by the server".to_string());
                    self.finish(ClientPhase::Errored);
                    return Action::None;
                }
                self.poll_failed(job_id, self.not_found, "job not found".to_string())
            }
            Err(e) => {
                self.network_failures += 1;
                if self.network_failures > self.policy.max_consecutive_network_errors {
                    tracing::error!(
                        job_id = %job_id,
                        attempts = self.network_failures,
                        error = %e,
                        "giving up on progress polling"
                    );
                    self.state.error = Some(format!("Lost contact with the server: {e}"));
                    self.finish(ClientPhase::Errored);
                    return Action::None;
                }
                self.poll_failed(job_id, self.network_failures, e.to_string())
            }
        }
    }

    /// A poll that was in flight when the user cancelled has come back
    fn reconcile_after_cancel(
        &mut self,
        result: std::result::Result<PollResponse, TransportError>,
    ) -> Action {
        match result {
            Ok(PollResponse::Finished(JobOutcome::Complete { filenames })) => {
                tracing::info!(
                    job_id = ?self.state.handle.as_ref().map(|h| h.job_id.as_str()),
                    "job completed before the cancel took effect"
                );
                self.state.finished_at = None;
                self.apply_outcome(JobOutcome::Complete { filenames })
            }
            Ok(PollResponse::Finished(outcome)) => {
                tracing::debug!(outcome = ?outcome, "recording late outcome for cancelled job");
                self.state.outcome = Some(outcome);
                Action::None
            }
            _ => Action::None,
        }
    }

    fn apply_outcome(&mut self, outcome: JobOutcome) -> Action {
        let Some(handle) = self.state.handle.clone() else {
            return Action::None;
        };
        let method = self.state.delivery_method.unwrap_or_default();

        match &outcome {
            JobOutcome::Complete { filenames } => {
                tracing::info!(job_id = %handle, documents = filenames.len(), "job complete");
                let filenames = filenames.clone();
                self.state.outcome = Some(outcome);
                self.state.phase = match method {
                    DeliveryMethod::Download => ClientPhase::Downloading,
                    DeliveryMethod::Email => ClientPhase::Succeeded,
                };
                Action::Deliver {
                    handle,
                    filenames,
                    method,
                }
            }
            JobOutcome::Error { error } => {
                tracing::error!(job_id = %handle, error = %error, "job failed on the server");
                self.state.outcome = Some(outcome);
                self.finish(ClientPhase::Errored);
                Action::None
            }
            JobOutcome::Cancelled => {
                tracing::info!(job_id = %handle, "job cancelled on the server");
                self.state.outcome = Some(outcome);
                self.finish(ClientPhase::Cancelled);
                Action::None
            }
        }
    }

    fn record_snapshot(&mut self, job_id: &str, snapshot: ProgressSnapshot) {
        if let Some(last) = &self.state.last_snapshot {
            if snapshot.phase < last.phase {
                tracing::debug!(
                    job_id,
                    shown = %last.phase,
                    received = %snapshot.phase,
                    "discarding out-of-order progress"
                );
                return;
            }
            if *last == snapshot {
                return;
            }
        }

        tracing::debug!(job_id, phase = %snapshot.phase, message = %snapshot.message, "progress");
        self.events.push(Event::Progress {
            job_id: job_id.to_string(),
            phase: snapshot.phase,
            message: snapshot.message.clone(),
        });
        self.state.last_snapshot = Some(snapshot);
    }

    fn poll_failed(&mut self, job_id: String, consecutive: u32, error: String) -> Action {
        tracing::warn!(job_id = %job_id, consecutive, error = %error, "poll failed, will retry");
        self.events.push(Event::PollFailed {
            job_id,
            consecutive,
            error,
        });
        Action::SchedulePoll
    }

    fn begin(&mut self, request: Arc<JobRequest>) -> Action {
        let submission = self.state.submission + 1;
        self.state = ClientJobState {
            phase: ClientPhase::Submitting,
            delivery_method: Some(request.delivery_method),
            submission,
            started_at: Some(Utc::now()),
            ..ClientJobState::default()
        };
        self.request = Some(request.clone());
        self.reset_counters();
        self.awaiting_reconcile = false;

        tracing::info!(submission, delivery_method = request.delivery_method.as_str(), "submitting job");
        self.events.push(Event::Submitted {
            submission,
            delivery_method: request.delivery_method,
        });
        Action::Start(request)
    }

    fn finish(&mut self, phase: ClientPhase) {
        self.state.phase = phase;
        self.state.finished_at = Some(Utc::now());
        self.events.push(Event::Finished {
            job_id: self.state.handle.as_ref().map(|h| h.job_id.clone()),
            phase,
        });
    }

    fn reset_counters(&mut self) {
        self.network_failures = 0;
        self.not_found = 0;
    }

    fn ensure(&self, allowed: bool, operation: &str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation: operation.to_string(),
                current_state: self.state.phase.to_string(),
            })
        }
    }
}
