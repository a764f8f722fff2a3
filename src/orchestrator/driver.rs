//! Single-task driver for the job machine
//!
//! One spawned task owns the [`JobMachine`] and is the only writer of job
//! state. It multiplexes user commands, the one in-flight I/O operation and the
//! poll timer; a new poll is only scheduled after the previous one completed,
//! so requests never pile up on a slow network.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;

use super::machine::{Action, JobMachine};
use crate::delivery::Deliverer;
use crate::error::{Result, TransportError};
use crate::transport::{PollResponse, Transport};
use crate::types::{ClientJobState, DeliveryReport, Event, JobHandle};
use crate::validation::JobRequest;

/// User action delivered to the driver task
pub(crate) enum Command {
    Submit {
        request: JobRequest,
        reply: oneshot::Sender<Result<()>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<()>>,
    },
    Retry {
        reply: oneshot::Sender<Result<()>>,
    },
    FindAgain {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Result of the in-flight I/O operation
enum Completion {
    Started(std::result::Result<JobHandle, TransportError>),
    Polled(std::result::Result<PollResponse, TransportError>),
    Delivered(DeliveryReport),
}

pub(crate) struct Driver {
    pub(crate) machine: JobMachine,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) deliverer: Arc<Deliverer>,
    pub(crate) poll_interval: Duration,
    pub(crate) commands: mpsc::Receiver<Command>,
    pub(crate) state_tx: watch::Sender<ClientJobState>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) shutdown: CancellationToken,
}

impl Driver {
    pub(crate) async fn run(mut self) {
        let mut pending: Option<BoxFuture<'static, Completion>> = None;
        let mut timer: Option<Pin<Box<Sleep>>> = None;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::debug!("orchestrator shutting down");
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("all orchestrator handles dropped");
                        break;
                    };
                    self.handle_command(command, &mut pending, &mut timer);
                }
                completion = next_completion(&mut pending) => {
                    pending = None;
                    let action = match completion {
                        Completion::Started(result) => self.machine.on_started(result),
                        Completion::Polled(result) => self.machine.on_polled(result),
                        Completion::Delivered(report) => self.machine.on_delivered(report),
                    };
                    self.perform(action, &mut pending, &mut timer);
                }
                _ = poll_timer(&mut timer) => {
                    timer = None;
                    if let Some(handle) = self.machine.poll_target() {
                        let transport = self.transport.clone();
                        pending = Some(
                            async move {
                                tracing::debug!(job_id = %handle, "polling progress");
                                Completion::Polled(transport.poll_progress(&handle).await)
                            }
                            .boxed(),
                        );
                    }
                }
            }
            self.publish();
        }
    }

    fn handle_command(
        &mut self,
        command: Command,
        pending: &mut Option<BoxFuture<'static, Completion>>,
        timer: &mut Option<Pin<Box<Sleep>>>,
    ) {
        match command {
            Command::Submit { request, reply } => {
                let result = self.machine.submit(&request);
                self.reply_with(result, reply, pending, timer);
            }
            Command::Cancel { reply } => {
                let result = self.machine.cancel();
                self.reply_with(result, reply, pending, timer);
            }
            Command::Retry { reply } => {
                let result = self.machine.retry();
                self.reply_with(result, reply, pending, timer);
            }
            Command::FindAgain { reply } => {
                let result = self.machine.find_again();
                if result.is_ok() {
                    // A late poll from a cancelled job must not land on the fresh state
                    *pending = None;
                    *timer = None;
                }
                self.publish();
                reply.send(result).ok();
            }
        }
    }

    fn reply_with(
        &mut self,
        result: Result<Action>,
        reply: oneshot::Sender<Result<()>>,
        pending: &mut Option<BoxFuture<'static, Completion>>,
        timer: &mut Option<Pin<Box<Sleep>>>,
    ) {
        // Callers see the new state as soon as their command returns
        let result = result.map(|action| self.perform(action, pending, timer));
        self.publish();
        reply.send(result).ok();
    }

    fn perform(
        &mut self,
        action: Action,
        pending: &mut Option<BoxFuture<'static, Completion>>,
        timer: &mut Option<Pin<Box<Sleep>>>,
    ) {
        match action {
            Action::None => {}
            Action::Start(request) => {
                *timer = None;
                let transport = self.transport.clone();
                // Replacing the slot drops whatever the previous job left in flight
                *pending = Some(
                    async move { Completion::Started(transport.start(&request).await) }.boxed(),
                );
            }
            Action::SchedulePoll => {
                *timer = Some(Box::pin(tokio::time::sleep(self.poll_interval)));
            }
            Action::Cancel(handle) => {
                *timer = None;
                let transport = self.transport.clone();
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = transport.cancel(&handle).await {
                        tracing::warn!(job_id = %handle, error = %e, "cancel request failed");
                        event_tx
                            .send(Event::CancelFailed {
                                job_id: handle.job_id.clone(),
                                error: e.to_string(),
                            })
                            .ok();
                    }
                });
            }
            Action::Deliver {
                handle,
                filenames,
                method,
            } => {
                *timer = None;
                let deliverer = self.deliverer.clone();
                *pending = Some(
                    async move {
                        Completion::Delivered(deliverer.deliver(&handle, &filenames, method).await)
                    }
                    .boxed(),
                );
            }
        }
    }

    /// Broadcast new events and publish the state snapshot if it changed
    fn publish(&mut self) {
        for event in self.machine.drain_events() {
            // send() returns Err if there are no receivers, which is fine
            self.event_tx.send(event).ok();
        }

        let state = self.machine.state();
        self.state_tx.send_if_modified(|current| {
            if *current == *state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
    }
}

async fn next_completion(pending: &mut Option<BoxFuture<'static, Completion>>) -> Completion {
    match pending {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn poll_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
