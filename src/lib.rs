//! # jobsai-client
//!
//! Client-side lifecycle orchestrator for the JobsAI job-search and
//! cover-letter pipeline.
//!
//! The backend runs a long, multi-phase pipeline (profiling, searching,
//! scoring, analyzing, generating). This crate drives one job of that pipeline
//! from the client side: it validates the questionnaire, starts the job, polls
//! its progress, handles cancellation and rate limiting, and delivers the
//! generated cover letters either by downloading them or by leaving the
//! backend to email them.
//!
//! ## Design
//!
//! - **One writer** - a single background task owns the job state; user actions
//!   are commands sent to it
//! - **Pure core** - every transition lives in a synchronous state machine that
//!   is tested without any I/O
//! - **Swappable edges** - the backend sits behind [`Transport`] and file
//!   output behind [`DocumentSink`]
//! - **Observable** - hosts read [`ClientJobState`] snapshots or the derived
//!   [`StatusView`], and can subscribe to [`Event`]s
//!
//! ## Quick Start
//!
//! ```no_run
//! use jobsai_client::{Config, DeliveryMethod, FieldValue, JobRequest, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let orchestrator = Orchestrator::connect(config)?;
//!
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = JobRequest::new(DeliveryMethod::Download)
//!         .answer("general", "job-level", FieldValue::choices(["Entry"]))
//!         .answer("general", "job-boards", FieldValue::choices(["Duunitori"]))
//!         .answer("general", "deep-mode", FieldValue::Text("No".into()))
//!         .answer("general", "cover-letter-num", FieldValue::Level(1))
//!         .answer("general", "cover-letter-style", FieldValue::choices(["Professional"]))
//!         .answer("additional-info", "additional-info", FieldValue::Text("Rust developer".into()));
//!     orchestrator.submit(request).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Document delivery and output sinks
pub mod delivery;
/// Error types
pub mod error;
/// Job lifecycle orchestrator
pub mod orchestrator;
/// Retry logic with exponential backoff
pub mod retry;
/// Backend transport
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Questionnaire model and validation
pub mod validation;
/// Presentation projection
pub mod view;

// Re-export commonly used types
pub use config::{Config, Environment, FileCollisionAction};
pub use delivery::{DirectorySink, DocumentSink, ScrollPosition};
pub use error::{DownloadError, Error, Result, TransportError, ValidationErrors};
pub use orchestrator::Orchestrator;
pub use transport::{HttpTransport, PollResponse, Transport};
pub use types::{
    ClientJobState, ClientPhase, DeliveryMethod, DeliveryReport, Document, Event, JobHandle,
    JobOutcome, PipelinePhase, ProgressSnapshot,
};
pub use validation::{FieldValue, JobRequest, validate};
pub use view::StatusView;

/// Run until a termination signal arrives, then shut the orchestrator down.
///
/// The orchestrator task is stopped and in-flight requests are abandoned; the
/// backend job itself is not cancelled.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use jobsai_client::{Config, Orchestrator, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = Orchestrator::connect(Config::from_env()?)?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(orchestrator).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(orchestrator: Orchestrator) -> Result<()> {
    wait_for_signal().await;
    orchestrator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("received SIGINT");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("received SIGTERM");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
