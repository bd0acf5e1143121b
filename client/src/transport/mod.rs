//! Remote calls to the detection service.
//!
//! A transport performs exactly one HTTP exchange per call and never retries;
//! waiting and re-fetching belong to the controller. Both implementations
//! (reqwest natively, gloo-net in the browser) turn the raw status and body
//! into outcomes with the functions in this module so they agree on what a
//! response means.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpTransport, TokioDelay};

use shared::{
    AnalysisRequest, DetectionReport, ErrorBody, SubmissionOutcome, TaskHandle, TaskId,
    TaskProgress,
};
use std::time::Duration;

use crate::error::TransportError;

const HTTP_ACCEPTED: u16 = 202;

#[allow(async_fn_in_trait)]
pub trait DetectionTransport {
    /// Uploads the file as multipart field `file`.
    async fn submit(&self, request: &AnalysisRequest) -> Result<SubmissionOutcome, TransportError>;

    /// Fetches the result of a submitted task. Returns
    /// [`TransportError::NotReady`] while the task is still running.
    async fn fetch_result(&self, handle: &TaskHandle) -> Result<DetectionReport, TransportError>;
}

/// Timer used between result fetches.
#[allow(async_fn_in_trait)]
pub trait Delay {
    async fn sleep(&self, duration: Duration);
}

pub fn result_path(task_id: &TaskId) -> String {
    format!(
        "/api/inference/result/{}",
        urlencoding::encode(task_id.as_str())
    )
}

pub fn interpret_submission(status: u16, body: &str) -> Result<SubmissionOutcome, TransportError> {
    if !is_success(status) {
        return Err(service_error(status, body));
    }

    serde_json::from_str::<SubmissionOutcome>(body).map_err(|e| {
        log::error!("Unrecognised upload response ({}): {}", e, truncate(body));
        TransportError::InvalidResponse(format!("unrecognised upload response: {e}"))
    })
}

pub fn interpret_result(
    handle: &TaskHandle,
    status: u16,
    body: &str,
) -> Result<DetectionReport, TransportError> {
    if status == HTTP_ACCEPTED {
        return Err(TransportError::NotReady {
            task_id: handle.task_id.clone(),
        });
    }
    if !is_success(status) {
        return Err(service_error(status, body));
    }

    match serde_json::from_str::<DetectionReport>(body) {
        Ok(report) => Ok(report),
        Err(decode_error) => {
            if let Ok(progress) = serde_json::from_str::<TaskProgress>(body) {
                if progress.is_pending() {
                    return Err(TransportError::NotReady {
                        task_id: handle.task_id.clone(),
                    });
                }
            }
            if let Ok(error_body) = serde_json::from_str::<ErrorBody>(body) {
                return Err(TransportError::Service {
                    status,
                    detail: error_body.detail_text(),
                });
            }
            log::error!(
                "Unrecognised result for task {} ({}): {}",
                handle.task_id,
                decode_error,
                truncate(body)
            );
            Err(TransportError::InvalidResponse(format!(
                "unrecognised result response: {decode_error}"
            )))
        }
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn service_error(status: u16, body: &str) -> TransportError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|error_body| error_body.detail_text());
    log::warn!("Service answered {}: {}", status, truncate(body));
    TransportError::Service { status, detail }
}

fn truncate(body: &str) -> &str {
    const LIMIT: usize = 256;
    match body.char_indices().nth(LIMIT) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn handle() -> TaskHandle {
        TaskHandle {
            task_id: TaskId::from("abc123"),
            status: "queued".into(),
            message: None,
        }
    }

    const RESULT_BODY: &str = r#"{
        "task_id": "abc123",
        "filename": "face.jpg",
        "file_size": 2097152,
        "timestamp": "2025-11-02T10:00:00Z",
        "detection_result": {
            "is_fake": true,
            "confidence": 0.93,
            "fake_probability": 0.93,
            "real_probability": 0.07,
            "verdict": "FAKE"
        }
    }"#;

    #[test]
    fn upload_answer_with_task_id_is_pending() {
        let outcome = interpret_submission(
            200,
            r#"{"task_id":"abc123","status":"queued","message":"queued for analysis"}"#,
        )
        .unwrap();
        assert_eq!(
            outcome,
            SubmissionOutcome::Pending(TaskHandle {
                task_id: TaskId::from("abc123"),
                status: "queued".into(),
                message: Some("queued for analysis".into()),
            })
        );
    }

    #[test]
    fn upload_answer_with_result_is_completed() {
        let outcome = interpret_submission(200, RESULT_BODY).unwrap();
        assert!(matches!(outcome, SubmissionOutcome::Completed(_)));
    }

    #[test]
    fn structured_error_keeps_detail() {
        let err = interpret_submission(400, r#"{"detail":"Invalid file type"}"#).unwrap_err();
        assert_eq!(
            err,
            TransportError::Service {
                status: 400,
                detail: Some("Invalid file type".into())
            }
        );

        let err = interpret_submission(500, "Internal Server Error").unwrap_err();
        assert_eq!(err, TransportError::Service { status: 500, detail: None });
    }

    #[test]
    fn garbage_success_body_is_invalid_response() {
        let err = interpret_submission(200, "<html>ok</html>").unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(_)));
    }

    #[test]
    fn accepted_or_pending_result_is_not_ready() {
        let err = interpret_result(&handle(), 202, "Logging to the DB...").unwrap_err();
        assert_eq!(err, TransportError::NotReady { task_id: TaskId::from("abc123") });

        let err = interpret_result(&handle(), 200, r#"{"task_id":"abc123","status":"processing"}"#)
            .unwrap_err();
        assert!(matches!(err, TransportError::NotReady { .. }));
    }

    #[test]
    fn finished_result_decodes() {
        let report = interpret_result(&handle(), 200, RESULT_BODY).unwrap();
        assert_eq!(report.detection_result.verdict, "FAKE");
        assert_eq!(report.file_size, Some(2_097_152));
    }

    #[test]
    fn failed_task_and_missing_task() {
        let err = interpret_result(&handle(), 200, r#"{"status":"failed","detail":"No face found"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::Service {
                status: 200,
                detail: Some("No face found".into())
            }
        );

        let err = interpret_result(&handle(), 404, r#"{"detail":"Task not found"}"#).unwrap_err();
        assert_eq!(
            err,
            TransportError::Service {
                status: 404,
                detail: Some("Task not found".into())
            }
        );
    }

    #[test]
    fn task_ids_are_percent_encoded() {
        assert_eq!(result_path(&TaskId::from("abc123")), "/api/inference/result/abc123");
        assert_eq!(result_path(&TaskId::from("a/b c")), "/api/inference/result/a%2Fb%20c");
    }
}
