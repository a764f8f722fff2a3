//! reqwest-backed transport for the JobsAI backend.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use url::Url;

use super::{DownloadLink, PollResponse, ProgressResponse, StartResponse, Transport};
use crate::config::ApiConfig;
use crate::error::{Error, Result, TransportError};
use crate::types::{Document, JobHandle};
use crate::utils::{extract_filename_from_response, filename_from_content_disposition};
use crate::validation::JobRequest;

/// Name for a legacy document when the server does not supply one
const LEGACY_FILENAME: &str = "cover_letter.docx";

/// HTTP transport talking to the backend's `/api` endpoints
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    download_timeout: std::time::Duration,
}

impl HttpTransport {
    /// Create a transport for the configured backend
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL '{}': {e}", config.base_url),
            key: Some("api.base_url".to_string()),
        })?;
        // Url::join replaces the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("jobsai-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            download_timeout: config.download_timeout,
        })
    }

    /// Base URL all endpoint paths are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::Decode(format!("invalid endpoint '{path}': {e}")))
    }

    fn job_endpoint(
        &self,
        prefix: &str,
        handle: &JobHandle,
    ) -> std::result::Result<Url, TransportError> {
        let id = urlencoding::encode(&handle.job_id);
        self.endpoint(&format!("api/{prefix}/{id}"))
    }

    /// Fetch a document body, following a JSON presigned-URL indirection if present
    async fn fetch_document(
        &self,
        response: Response,
        requested_name: &str,
    ) -> std::result::Result<Document, TransportError> {
        let response = check_status(response).await?;

        if is_json(&response) {
            let link: DownloadLink = response
                .json()
                .await
                .map_err(|e| TransportError::Decode(format!("download link: {e}")))?;
            tracing::debug!(url = %link.download_url, "following presigned download URL");

            let redirected = self
                .client
                .get(&link.download_url)
                .timeout(self.download_timeout)
                .send()
                .await?;
            let redirected = check_status(redirected).await?;
            let fallback = link.filename.unwrap_or_else(|| requested_name.to_string());
            return read_document(redirected, &link.download_url, &fallback).await;
        }

        let url = response.url().to_string();
        read_document(response, &url, requested_name).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(&self, request: &JobRequest) -> std::result::Result<JobHandle, TransportError> {
        let url = self.endpoint("api/start")?;
        let response = self.client.post(url).json(request).send().await?;
        let response = check_status(response).await?;

        let body: StartResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(format!("start response: {e}")))?;
        tracing::info!(job_id = %body.job_id, "backend accepted job");
        Ok(JobHandle::new(body.job_id))
    }

    async fn poll_progress(
        &self,
        handle: &JobHandle,
    ) -> std::result::Result<PollResponse, TransportError> {
        let url = self.job_endpoint("progress", handle)?;
        let response = self.client.get(url).send().await?;
        let response = check_status(response).await?;

        let body: ProgressResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(format!("progress response: {e}")))?;
        if let Some(reported) = &body.job_id
            && reported != &handle.job_id
        {
            tracing::warn!(job_id = %handle, reported = %reported, "progress response names a different job");
        }
        Ok(body.into())
    }

    async fn cancel(&self, handle: &JobHandle) -> std::result::Result<(), TransportError> {
        let url = self.job_endpoint("cancel", handle)?;
        let response = self.client.post(url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn download(
        &self,
        handle: &JobHandle,
        index: usize,
        filename: &str,
    ) -> std::result::Result<Document, TransportError> {
        let mut url = self.job_endpoint("download", handle)?;
        url.query_pairs_mut()
            .append_pair("index", &index.to_string());

        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await?;
        self.fetch_document(response, filename).await
    }

    async fn submit_sync(
        &self,
        request: &JobRequest,
    ) -> std::result::Result<Document, TransportError> {
        let url = self.endpoint("api/endpoint")?;
        let response = self
            .client
            .post(url)
            .json(request)
            .timeout(self.download_timeout)
            .send()
            .await?;
        let name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| LEGACY_FILENAME.to_string());
        self.fetch_document(response, &name).await
    }
}

/// Map non-success statuses to typed transport errors
async fn check_status(response: Response) -> std::result::Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(TransportError::RateLimited),
        StatusCode::NOT_FOUND => Err(TransportError::NotFound(response.url().path().to_string())),
        _ => {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.trim().is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            Err(TransportError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

async fn read_document(
    response: Response,
    url: &str,
    fallback_name: &str,
) -> std::result::Result<Document, TransportError> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = if fallback_name.is_empty() {
        extract_filename_from_response(&response, url).unwrap_or_else(|| "document".to_string())
    } else {
        fallback_name.to_string()
    };
    let bytes = response.bytes().await?;
    Ok(Document {
        filename,
        content_type,
        bytes: bytes.to_vec(),
    })
}
