use shared::{DetectionReport, DetectionResult, TaskHandle};
use std::sync::Arc;

use crate::controller::{WorkflowSnapshot, WorkflowState};
use crate::error::Failure;

/// The screen an adapter should show for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum View<'a> {
    Empty,
    Uploading {
        task: Option<&'a TaskHandle>,
        attempt: u32,
    },
    Result(&'a Arc<DetectionReport>),
    Error(&'a Failure),
}

impl WorkflowSnapshot {
    pub fn view(&self) -> View<'_> {
        match &self.state {
            WorkflowState::Idle => View::Empty,
            WorkflowState::Submitting => View::Uploading {
                task: None,
                attempt: 0,
            },
            WorkflowState::AwaitingResult { task, attempt } => View::Uploading {
                task: Some(task),
                attempt: *attempt,
            },
            WorkflowState::Succeeded(report) => View::Result(report),
            WorkflowState::Failed(failure) => View::Error(failure),
        }
    }
}

/// Whether a newly chosen file must be turned away: one is still being read,
/// or the current selection is being analyzed.
pub fn selection_locked(snapshot: &WorkflowSnapshot, reading_file: bool) -> bool {
    reading_file || snapshot.is_loading()
}

/// `0.934` -> `"93.4%"`.
pub fn percent(probability: f32) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// Headline for a result, e.g. `"Likely deepfake (93.4% confidence)"`.
pub fn verdict_headline(result: &DetectionResult) -> String {
    let label = if result.is_fake {
        "Likely deepfake"
    } else {
        "Likely authentic"
    };
    format!("{} ({} confidence)", label, percent(result.confidence))
}

pub fn file_size_label(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let bytes = bytes as f64;
    if bytes >= MB {
        format!("{:.2} MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes / KB)
    } else {
        format!("{} B", bytes)
    }
}
