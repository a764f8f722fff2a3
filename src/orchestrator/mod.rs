//! Job lifecycle orchestrator
//!
//! [`Orchestrator`] is a cheap, clonable handle to a background task that owns
//! the single in-flight job. User actions are sent to that task as commands;
//! state comes back as [`ClientJobState`] snapshots on a `watch` channel and as
//! [`Event`]s on a broadcast channel.
//!
//! - [`machine`] - transitions, policy thresholds and the cancel race
//! - [`driver`] - the task that performs I/O and runs the poll timer

mod driver;
mod machine;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::delivery::{Deliverer, DirectorySink, DocumentSink};
use crate::error::{Error, Result};
use crate::transport::{HttpTransport, Transport};
use crate::types::{ClientJobState, Event};
use crate::validation::JobRequest;
use crate::view::StatusView;

use driver::{Command, Driver};
use machine::JobMachine;

/// Buffered user commands before `submit`/`cancel` callers start waiting
const COMMAND_BUFFER: usize = 32;

/// Events kept for slow subscribers before they start lagging
const EVENT_BUFFER: usize = 256;

/// Handle to a running job orchestrator
///
/// Cloning is cheap; every clone talks to the same background task.
#[derive(Clone)]
pub struct Orchestrator {
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ClientJobState>,
    event_tx: broadcast::Sender<Event>,
    shutdown: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Orchestrator {
    /// Spawn an orchestrator on the current Tokio runtime
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the configuration is invalid.
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn DocumentSink>,
    ) -> Result<Self> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(ClientJobState::default());
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let shutdown = CancellationToken::new();

        let deliverer = Deliverer::new(
            transport.clone(),
            sink,
            config.delivery.retry.clone(),
            event_tx.clone(),
        );
        let driver = Driver {
            machine: JobMachine::new(config.polling.clone()),
            transport,
            deliverer: Arc::new(deliverer),
            poll_interval: config.polling.interval,
            commands: command_rx,
            state_tx,
            event_tx: event_tx.clone(),
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(driver.run());

        tracing::debug!(
            poll_interval_ms = config.polling.interval.as_millis(),
            max_network_errors = config.polling.max_consecutive_network_errors,
            max_not_found = config.polling.max_consecutive_not_found,
            "orchestrator started"
        );

        Ok(Self {
            commands: command_tx,
            state_rx,
            event_tx,
            shutdown,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }

    /// Spawn an orchestrator talking HTTP to the configured backend and
    /// saving documents into the configured download directory
    pub fn connect(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.api)?;
        let sink = DirectorySink::from_config(&config.delivery);
        tracing::info!(base_url = %transport.base_url(), "connecting to backend");
        Self::new(config, Arc::new(transport), Arc::new(sink))
    }

    /// Validate and submit a new job
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] with every offending field; the errors are also
    ///   recorded on the state so the form can highlight them
    /// - [`Error::InvalidState`] while another job is still active
    pub async fn submit(&self, request: JobRequest) -> Result<()> {
        self.send(|reply| Command::Submit { request, reply }).await
    }

    /// Cancel the running job
    ///
    /// Polling stops immediately; the cancel request itself is best-effort.
    /// Email-delivery jobs cannot be cancelled.
    pub async fn cancel(&self) -> Result<()> {
        self.send(|reply| Command::Cancel { reply }).await
    }

    /// Resubmit the last request after a failed download-mode job
    pub async fn retry(&self) -> Result<()> {
        self.send(|reply| Command::Retry { reply }).await
    }

    /// Discard the finished job and return to idle
    pub async fn find_again(&self) -> Result<()> {
        self.send(|reply| Command::FindAgain { reply }).await
    }

    /// Latest state snapshot
    pub fn state(&self) -> ClientJobState {
        self.state_rx.borrow().clone()
    }

    /// Presentation view of the latest state
    pub fn view(&self) -> StatusView {
        StatusView::project(&self.state_rx.borrow())
    }

    /// Receiver that observes every published state snapshot
    pub fn watch(&self) -> watch::Receiver<ClientJobState> {
        self.state_rx.clone()
    }

    /// Subscribe to orchestrator events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Stop the orchestrator task, abandoning any in-flight request
    ///
    /// The job itself keeps running on the server. Later commands fail with
    /// [`Error::ShuttingDown`]. Calling this more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            task.await
                .map_err(|e| Error::Other(format!("orchestrator task failed: {e}")))?;
            tracing::info!("orchestrator stopped");
        }
        Ok(())
    }

    async fn send<F>(&self, build: F) -> Result<()>
    where
        F: FnOnce(oneshot::Sender<Result<()>>) -> Command,
    {
        if self.shutdown.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| Error::ShuttingDown)?;
        reply_rx.await.map_err(|_| Error::ShuttingDown)?
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("phase", &self.state_rx.borrow().phase)
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish()
    }
}
