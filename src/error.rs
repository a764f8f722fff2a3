//! Error types for jobsai-client
//!
//! This module provides the error taxonomy for the client, including:
//! - The crate-wide [`Error`] returned by orchestrator commands and setup
//! - [`TransportError`] for the typed outcomes of a single HTTP operation
//! - [`DownloadError`] for per-file delivery failures (cloneable, kept in state)
//! - [`ValidationErrors`] collecting every offending form field in one pass

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias for jobsai-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for jobsai-client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "JOBSAI_API_BASE_URL")
        key: Option<String>,
    },

    /// Form input failed validation; nothing was submitted
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A backend operation failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The requested action is not permitted in the current state
    #[error("cannot {operation} while {current_state}")]
    InvalidState {
        /// The action that was attempted (e.g., "submit", "cancel")
        operation: String,
        /// The phase that prevents the action (e.g., "polling")
        current_state: String,
    },

    /// HTTP client construction or request error outside a transport operation
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The orchestrator task has stopped and no longer accepts commands
    #[error("orchestrator is shut down")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

/// Typed failure of one backend operation
///
/// Expected failure modes (rate limiting, unknown job) are variants rather than
/// generic HTTP errors so callers can apply policy without inspecting status codes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP 429: the backend refused the request under its rate-limit policy
    #[error("rate limited by backend")]
    RateLimited,

    /// HTTP 404: the job (or document) is not known to the backend
    #[error("not found: {0}")]
    NotFound(String),

    /// Connection, timeout, or body transfer failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http {
        /// The HTTP status code returned
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The response body did not match the expected wire format
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl TransportError {
    /// True for server-side 5xx responses
    pub fn is_server_error(&self) -> bool {
        matches!(self, TransportError::Http { status, .. } if *status >= 500)
    }
}

/// Per-file delivery failure
///
/// Failures are independent: one failed document never discards its siblings.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadError {
    /// The backend has no document for this index
    #[error("{filename}: not found on server")]
    NotFound {
        /// Document the failure refers to
        filename: String,
    },

    /// Fetching the document failed
    #[error("{filename}: {message}")]
    Transport {
        /// Document the failure refers to
        filename: String,
        /// Transport error message
        message: String,
    },

    /// Writing the document to its destination failed
    #[error("{filename}: could not save ({message})")]
    Save {
        /// Document the failure refers to
        filename: String,
        /// I/O error message
        message: String,
    },

    /// A file with this name exists and the collision policy is `skip`
    #[error("{filename}: already exists")]
    Collision {
        /// Document the failure refers to
        filename: String,
    },
}

impl DownloadError {
    /// Name of the document this error belongs to
    pub fn filename(&self) -> &str {
        match self {
            DownloadError::NotFound { filename }
            | DownloadError::Transport { filename, .. }
            | DownloadError::Save { filename, .. }
            | DownloadError::Collision { filename } => filename,
        }
    }

    pub(crate) fn from_transport(filename: &str, error: &TransportError) -> Self {
        match error {
            TransportError::NotFound(_) => DownloadError::NotFound {
                filename: filename.to_string(),
            },
            other => DownloadError::Transport {
                filename: filename.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Every violated form field, keyed by question key
///
/// A field may carry several messages (e.g. too many options and an invalid option).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Create an empty error set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// True if no field failed
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of offending fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the given field failed
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Messages recorded for a field
    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Offending field keys in sorted order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_collect_multiple_messages_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("job-level", "must contain at most 2 options");
        errors.add("job-level", "invalid option: Senior");
        errors.add("email", "invalid email address");

        assert_eq!(errors.len(), 2);
        assert!(errors.contains("job-level"));
        assert_eq!(errors.messages("job-level").len(), 2);
        assert!(errors.messages("deep-mode").is_empty());
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["email", "job-level"]);
    }

    #[test]
    fn validation_errors_display_lists_every_message() {
        let mut errors = ValidationErrors::new();
        errors.add("deep-mode", "must be Yes or No");
        errors.add("additional-info", "cannot be empty");

        assert_eq!(
            errors.to_string(),
            "additional-info: cannot be empty; deep-mode: must be Yes or No"
        );
    }

    #[test]
    fn download_error_from_not_found_keeps_filename() {
        let err = DownloadError::from_transport(
            "letter_2.docx",
            &TransportError::NotFound("job abc".into()),
        );
        assert_eq!(
            err,
            DownloadError::NotFound {
                filename: "letter_2.docx".into()
            }
        );
        assert_eq!(err.filename(), "letter_2.docx");
    }

    #[test]
    fn download_error_from_http_failure_carries_message() {
        let err = DownloadError::from_transport(
            "letter.docx",
            &TransportError::Http {
                status: 500,
                message: "boom".into(),
            },
        );
        assert_eq!(err.to_string(), "letter.docx: HTTP 500: boom");
    }

    #[test]
    fn server_error_classification() {
        assert!(
            TransportError::Http {
                status: 503,
                message: String::new()
            }
            .is_server_error()
        );
        assert!(
            !TransportError::Http {
                status: 400,
                message: String::new()
            }
            .is_server_error()
        );
        assert!(!TransportError::RateLimited.is_server_error());
    }

    #[test]
    fn invalid_state_message_names_operation_and_phase() {
        let err = Error::InvalidState {
            operation: "submit".into(),
            current_state: "polling".into(),
        };
        assert_eq!(err.to_string(), "cannot submit while polling");
    }
}
