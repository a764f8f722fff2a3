//! Find jobs and fetch cover letters
//!
//! This demo drives one job against a running backend:
//! - Loading configuration from the environment (and `.env`)
//! - Subscribing to lifecycle events
//! - Submitting a questionnaire
//! - Cancelling on Ctrl+C
//! - Printing the status view until the job ends
//!
//! ```bash
//! JOBSAI_API_BASE_URL=http://localhost:8000 cargo run --example find_jobs
//! JOBSAI_DELIVERY_EMAIL=me@example.fi cargo run --example find_jobs
//! cargo run --example find_jobs -- --sync     # legacy single-request endpoint
//! ```

use jobsai_client::transport::HttpTransport;
use jobsai_client::{
    ClientPhase, Config, DeliveryMethod, DirectorySink, DocumentSink, Event, FieldValue, JobRequest,
    Orchestrator, StatusView, Transport,
};

const ENV_DELIVERY_EMAIL: &str = "JOBSAI_DELIVERY_EMAIL";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("jobsai_client=info")),
        )
        .init();

    let config = Config::from_env()?;
    let email = std::env::var(ENV_DELIVERY_EMAIL).ok();
    let request = questionnaire(email);

    if std::env::args().any(|arg| arg == "--sync") {
        return submit_sync(&config, &request).await;
    }

    let orchestrator = Orchestrator::connect(config)?;

    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::JobStarted { job_id } => println!("✓ Job started: {}", job_id),
                Event::Progress { phase, message, .. } => println!("  [{}] {}", phase, message),
                Event::PollFailed {
                    consecutive, error, ..
                } => println!("  ! poll failed ({} in a row): {}", consecutive, error),
                Event::FileDelivered {
                    filename, location, ..
                } => println!("✓ Saved {} to {}", filename, location.display()),
                Event::FileFailed { error, .. } => println!("✗ {}", error),
                Event::Finished { phase, .. } => println!("Finished: {}", phase),
                _ => {}
            }
        }
    });

    if let Err(e) = orchestrator.submit(request).await {
        print_view(&orchestrator.view());
        orchestrator.shutdown().await?;
        return Err(e.into());
    }

    let mut state = orchestrator.watch();
    tokio::select! {
        // Email jobs reach succeeded before the delivery report is attached
        result = state.wait_for(|s| {
            s.phase.is_terminal() && !(s.phase == ClientPhase::Succeeded && s.delivery.is_none())
        }) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Cancelling...");
            if let Err(e) = orchestrator.cancel().await {
                println!("Could not cancel: {}", e);
            }
        }
    }

    print_view(&orchestrator.view());
    orchestrator.shutdown().await?;
    Ok(())
}

/// A small questionnaire; swap in your own answers
fn questionnaire(email: Option<String>) -> JobRequest {
    let method = if email.is_some() {
        DeliveryMethod::Email
    } else {
        DeliveryMethod::Download
    };

    let request = JobRequest::new(method)
        .answer("general", "job-level", FieldValue::choices(["Entry", "Intermediate"]))
        .answer("general", "job-boards", FieldValue::choices(["Duunitori", "Jobly"]))
        .answer("general", "deep-mode", FieldValue::Text("No".into()))
        .answer("general", "cover-letter-num", FieldValue::Level(1))
        .answer("general", "cover-letter-style", FieldValue::choices(["Professional"]))
        .answer("languages", "rust", FieldValue::Level(5))
        .answer("web-frameworks", "axum", FieldValue::Level(3))
        .answer(
            "additional-info",
            "additional-info",
            FieldValue::Text("Systems programmer looking for backend roles.".into()),
        );

    match email {
        Some(address) => request.with_email(address),
        None => request,
    }
}

async fn submit_sync(config: &Config, request: &JobRequest) -> Result<(), Box<dyn std::error::Error>> {
    let request = jobsai_client::validate(request).map_err(jobsai_client::Error::from)?;
    let transport = HttpTransport::new(&config.api)?;
    let sink = DirectorySink::from_config(&config.delivery);

    println!("Waiting for the backend to finish the whole pipeline...");
    let document = transport.submit_sync(&request).await?;
    let path = sink.save(&document).await?;
    println!("✓ Saved {} ({} bytes)", path.display(), document.bytes.len());
    Ok(())
}

fn print_view(view: &StatusView) {
    println!();
    println!("{}", view.headline);
    if let Some(step) = view.step {
        println!("{}", step);
    }
    if let Some(detail) = &view.detail {
        println!("{}", detail);
    }
    if let Some(errors) = &view.field_errors {
        for field in errors.fields() {
            for message in errors.messages(field) {
                println!("  - {}: {}", field, message);
            }
        }
    }
}
