use reqwest::{Client, RequestBuilder, multipart};
use shared::{AnalysisRequest, DetectionReport, SubmissionOutcome, TaskHandle};
use std::time::Duration;

use super::{Delay, DetectionTransport, interpret_result, interpret_submission, result_path};
use crate::config::{ApiVariant, ClientConfig, ConfigError};
use crate::error::TransportError;

/// Native transport over reqwest. The request timeout is set once on the
/// client and applies to every call.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn api(&self) -> ApiVariant {
        self.config.api
    }

    async fn exchange(&self, request: RequestBuilder) -> Result<(u16, String), TransportError> {
        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        Ok((status, body))
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            log::error!("Request timed out after {:?}: {}", self.config.timeout(), error);
            return TransportError::timeout(self.config.timeout());
        }
        if error.is_decode() {
            return TransportError::InvalidResponse(error.to_string());
        }
        log::error!("Network error: {}", error);
        TransportError::Network {
            message: error.to_string(),
            timed_out: false,
        }
    }
}

impl DetectionTransport for HttpTransport {
    async fn submit(&self, request: &AnalysisRequest) -> Result<SubmissionOutcome, TransportError> {
        let part = multipart::Part::bytes(request.bytes().to_vec())
            .file_name(request.file_name().to_string())
            .mime_str(request.media_type())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let url = self.config.endpoint(self.config.api.upload_path());
        log::info!(
            "Uploading {} ({} bytes, {}) to {}",
            request.file_name(),
            request.size(),
            request.media_type(),
            url
        );

        let (status, body) = self.exchange(self.http.post(url).multipart(form)).await?;
        interpret_submission(status, &body)
    }

    async fn fetch_result(&self, handle: &TaskHandle) -> Result<DetectionReport, TransportError> {
        let url = self.config.endpoint(&result_path(&handle.task_id));
        log::debug!("Fetching result for task {} from {}", handle.task_id, url);

        let (status, body) = self.exchange(self.http.get(url)).await?;
        interpret_result(handle, status, &body)
    }
}

/// Delay backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
