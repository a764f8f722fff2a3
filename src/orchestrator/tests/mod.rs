use super::machine::{Action, JobMachine};
use super::test_helpers::*;
use crate::config::PollingConfig;
use crate::error::{Error, TransportError};
use crate::transport::PollResponse;
use crate::types::{
    ClientPhase, DeliveryMethod, DeliveryReport, Event, JobHandle, JobOutcome, PipelinePhase,
    ProgressSnapshot,
};
use std::sync::atomic::Ordering;
use std::time::Duration;


fn running(phase: PipelinePhase, message: &str) -> Result<PollResponse, TransportError> {
    Ok(PollResponse::Running(Some(ProgressSnapshot::new(phase, message))))
}

fn complete(filenames: &[&str]) -> Result<PollResponse, TransportError> {
    Ok(PollResponse::Finished(JobOutcome::Complete {
        filenames: filenames.iter().map(|s| s.to_string()).collect(),
    }))
}

fn server_down() -> TransportError {
    TransportError::Http {
        status: 503,
        message: "Service Unavailable".into(),
    }
}
