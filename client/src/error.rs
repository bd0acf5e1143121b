use serde::Serialize;
use shared::{InvalidInput, TaskId};
use strum_macros::AsRefStr;

use crate::config::Locale;

/// Failures of a single remote call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {message}")]
    Network { message: String, timed_out: bool },
    #[error("service error {status}: {}", .detail.as_deref().unwrap_or("<no detail>"))]
    Service { status: u16, detail: Option<String> },
    #[error("task {task_id} is still processing")]
    NotReady { task_id: TaskId },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn timeout(after: std::time::Duration) -> Self {
        TransportError::Network {
            message: format!("request timed out after {}s", after.as_secs()),
            timed_out: true,
        }
    }
}

/// Rejections at the controller boundary. Remote failures never surface
/// here; they become a `Failed` state instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    #[error("The terms of use must be accepted before files can be analyzed.")]
    ConsentRequired,
    #[error("There is no previous file to retry.")]
    NothingToRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Network,
    Service,
    NotReady,
    InvalidResponse,
    /// The upload could not be built locally; nothing reached the service.
    InvalidRequest,
}

/// A failed request as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    /// User-facing text: the service detail verbatim, or the localized fallback.
    pub message: String,
    pub status: Option<u16>,
    pub timed_out: bool,
    /// Technical description for logs.
    pub cause: String,
}

impl Failure {
    pub fn from_transport(error: &TransportError, locale: Locale) -> Self {
        let fallback = || locale.fallback_message().to_string();
        let cause = error.to_string();

        match error {
            TransportError::Network { timed_out, .. } => Failure {
                kind: FailureKind::Network,
                message: fallback(),
                status: None,
                timed_out: *timed_out,
                cause,
            },
            TransportError::Service { status, detail } => Failure {
                kind: FailureKind::Service,
                message: detail.clone().unwrap_or_else(fallback),
                status: Some(*status),
                timed_out: false,
                cause,
            },
            TransportError::NotReady { .. } => Failure {
                kind: FailureKind::NotReady,
                message: fallback(),
                status: None,
                timed_out: false,
                cause,
            },
            TransportError::InvalidResponse(_) => Failure {
                kind: FailureKind::InvalidResponse,
                message: fallback(),
                status: None,
                timed_out: false,
                cause,
            },
            TransportError::InvalidRequest(_) => Failure {
                kind: FailureKind::InvalidRequest,
                message: fallback(),
                status: None,
                timed_out: false,
                cause,
            },
        }
    }
}
