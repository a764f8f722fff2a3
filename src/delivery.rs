//! Document delivery
//!
//! Completed download-mode jobs fetch each generated document through the
//! [`Transport`] and hand it to a host-provided [`DocumentSink`]. Documents are
//! fetched one at a time in index order; a failed document is recorded and the
//! next one is still attempted. Email-mode jobs only record the count, since the
//! backend has already sent the mail.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::config::{DeliveryConfig, FileCollisionAction, RetryConfig};
use crate::error::DownloadError;
use crate::retry::with_retry;
use crate::transport::Transport;
use crate::types::{DeliveryMethod, DeliveryReport, Document, Event, FileDelivery, JobHandle};
use crate::utils::{get_unique_path, sanitize_filename};

/// Viewport position the host restores after a batch of downloads
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollPosition {
    /// Horizontal offset
    pub x: f64,
    /// Vertical offset
    pub y: f64,
}

/// Destination for fetched documents
///
/// Hosts with a viewport (a web view, a TUI) override the scroll methods so a
/// burst of file saves does not leave the user somewhere else on the page.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Persist one document, returning where it ended up
    async fn save(&self, document: &Document) -> Result<PathBuf, DownloadError>;

    /// Current scroll position, if the host has one
    fn scroll_position(&self) -> Option<ScrollPosition> {
        None
    }

    /// Put the viewport back where it was before delivery started
    fn restore_scroll_position(&self, _position: ScrollPosition) {}
}

/// Writes documents into a directory on disk
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    collision: FileCollisionAction,
}

impl DirectorySink {
    /// Create a sink writing into `dir`
    pub fn new(dir: impl Into<PathBuf>, collision: FileCollisionAction) -> Self {
        Self {
            dir: dir.into(),
            collision,
        }
    }

    /// Create a sink from delivery configuration
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new(config.download_dir.clone(), config.file_collision)
    }

    /// Directory documents are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DocumentSink for DirectorySink {
    async fn save(&self, document: &Document) -> Result<PathBuf, DownloadError> {
        let save_error = |e: std::io::Error| DownloadError::Save {
            filename: document.filename.clone(),
            message: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(save_error)?;

        let target = self.dir.join(sanitize_filename(&document.filename));
        let target = get_unique_path(&target, self.collision)?;

        tokio::fs::write(&target, &document.bytes)
            .await
            .map_err(save_error)?;

        tracing::debug!(
            filename = %document.filename,
            path = %target.display(),
            bytes = document.bytes.len(),
            "document saved"
        );
        Ok(target)
    }
}

/// Fetches and saves the documents of one completed job
pub struct Deliverer {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn DocumentSink>,
    retry: RetryConfig,
    event_tx: broadcast::Sender<Event>,
}

impl Deliverer {
    /// Create a deliverer; per-file downloads are retried according to `retry`
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn DocumentSink>,
        retry: RetryConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            transport,
            sink,
            retry,
            event_tx,
        }
    }

    /// Deliver every document named by a completed job
    ///
    /// Never fails as a whole: per-file failures are part of the report.
    pub async fn deliver(
        &self,
        handle: &JobHandle,
        filenames: &[String],
        method: DeliveryMethod,
    ) -> DeliveryReport {
        if method == DeliveryMethod::Email {
            tracing::info!(job_id = %handle, count = filenames.len(), "documents delivered by email");
            return DeliveryReport {
                method,
                files: Vec::new(),
                delivered: filenames.len(),
            };
        }

        let scroll = self.sink.scroll_position();
        let mut files = Vec::with_capacity(filenames.len());

        for (i, filename) in filenames.iter().enumerate() {
            let result = self.deliver_one(handle, i + 1, filename).await;
            match &result {
                Ok(location) => {
                    self.event_tx
                        .send(Event::FileDelivered {
                            job_id: handle.job_id.clone(),
                            filename: filename.clone(),
                            location: location.clone(),
                        })
                        .ok();
                }
                Err(e) => {
                    tracing::warn!(job_id = %handle, error = %e, "document delivery failed");
                    self.event_tx
                        .send(Event::FileFailed {
                            job_id: handle.job_id.clone(),
                            error: e.clone(),
                        })
                        .ok();
                }
            }
            files.push(FileDelivery {
                filename: filename.clone(),
                result,
            });
        }

        if let Some(position) = scroll {
            self.sink.restore_scroll_position(position);
        }

        let delivered = files.iter().filter(|f| f.result.is_ok()).count();
        tracing::info!(
            job_id = %handle,
            delivered,
            expected = files.len(),
            "document delivery finished"
        );
        DeliveryReport {
            method,
            files,
            delivered,
        }
    }

    async fn deliver_one(
        &self,
        handle: &JobHandle,
        index: usize,
        filename: &str,
    ) -> Result<PathBuf, DownloadError> {
        let document = with_retry(&self.retry, || {
            self.transport.download(handle, index, filename)
        })
        .await
        .map_err(|e| DownloadError::from_transport(filename, &e))?;

        self.sink.save(&document).await
    }
}
