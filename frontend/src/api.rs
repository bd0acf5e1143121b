use deepguard::transport::{interpret_result, interpret_submission, result_path};
use deepguard::{ClientConfig, Delay, DetectionTransport, TransportError};
use futures::future::{Either, select};
use gloo_file::Blob;
use gloo_net::http::Request;
use gloo_timers::future::TimeoutFuture;
use shared::{AnalysisRequest, DetectionReport, SubmissionOutcome, TaskHandle};
use std::time::Duration;
use web_sys::FormData;

/// Browser transport over `fetch`. A call that outlives the configured
/// timeout is abandoned and reported as a timed-out network failure.
#[derive(Debug, Clone)]
pub struct GlooTransport {
    config: ClientConfig,
}

impl GlooTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    async fn exchange(&self, request: Request) -> Result<(u16, String), TransportError> {
        let timeout = self.config.timeout();
        let send = async move {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, gloo_net::Error>((status, body))
        };
        let limit = TimeoutFuture::new(self.config.timeout_millis());
        futures::pin_mut!(send, limit);

        match select(send, limit).await {
            Either::Left((Ok(exchange), _)) => Ok(exchange),
            Either::Left((Err(error), _)) => Err(classify(error)),
            Either::Right(((), _)) => {
                log::error!("Request timed out after {:?}", timeout);
                Err(TransportError::timeout(timeout))
            }
        }
    }
}

fn classify(error: gloo_net::Error) -> TransportError {
    match error {
        gloo_net::Error::SerdeError(e) => TransportError::InvalidResponse(e.to_string()),
        other => {
            log::error!("Network error: {}", other);
            TransportError::Network {
                message: other.to_string(),
                timed_out: false,
            }
        }
    }
}

fn js_error(context: &str, value: wasm_bindgen::JsValue) -> TransportError {
    TransportError::InvalidRequest(format!("{}: {:?}", context, value))
}

impl DetectionTransport for GlooTransport {
    async fn submit(&self, request: &AnalysisRequest) -> Result<SubmissionOutcome, TransportError> {
        let blob = Blob::new_with_options(request.bytes(), Some(request.media_type()));
        let form_data = FormData::new().map_err(|e| js_error("FormData", e))?;
        form_data
            .append_with_blob_and_filename("file", blob.as_ref(), request.file_name())
            .map_err(|e| js_error("FormData.append", e))?;

        let url = self.config.endpoint(self.config.api.upload_path());
        log::info!(
            "Uploading {} ({} bytes, {}) to {}",
            request.file_name(),
            request.size(),
            request.media_type(),
            url
        );

        let http_request = Request::post(&url)
            .body(form_data)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let (status, body) = self.exchange(http_request).await?;
        interpret_submission(status, &body)
    }

    async fn fetch_result(&self, handle: &TaskHandle) -> Result<DetectionReport, TransportError> {
        let url = self.config.endpoint(&result_path(&handle.task_id));
        log::debug!("Fetching result for task {} from {}", handle.task_id, url);

        let http_request = Request::get(&url)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let (status, body) = self.exchange(http_request).await?;
        interpret_result(handle, status, &body)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GlooDelay;

impl Delay for GlooDelay {
    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}
