use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{AsRefStr, EnumString};

/// Allowed drift between `real_probability + fake_probability` and 1.0.
const PROBABILITY_TOLERANCE: f32 = 0.01;

const PENDING_STATUSES: [&str; 5] = ["queued", "pending", "processing", "running", "started"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        TaskId(value.to_string())
    }
}

/// Receipt for an accepted asynchronous submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: TaskId,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Verdict {
    Fake,
    Real,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub is_fake: bool,
    pub confidence: f32,
    pub fake_probability: f32,
    pub real_probability: f32,
    pub verdict: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_img: Option<String>,
}

impl DetectionResult {
    /// The verdict label when it is one of the known classifications.
    pub fn verdict_kind(&self) -> Option<Verdict> {
        self.verdict.trim().parse().ok()
    }

    pub fn probabilities_consistent(&self) -> bool {
        let in_range = |p: f32| (0.0..=1.0).contains(&p);
        in_range(self.fake_probability)
            && in_range(self.real_probability)
            && in_range(self.confidence)
            && (self.fake_probability + self.real_probability - 1.0).abs() <= PROBABILITY_TOLERANCE
    }

    pub fn original_image(&self) -> Result<Option<Vec<u8>>, base64::DecodeError> {
        decode_image(self.orig_img.as_deref())
    }

    pub fn annotated_image(&self) -> Result<Option<Vec<u8>>, base64::DecodeError> {
        decode_image(self.result_img.as_deref())
    }
}

fn decode_image(encoded: Option<&str>) -> Result<Option<Vec<u8>>, base64::DecodeError> {
    match encoded {
        Some(data) if !data.is_empty() => {
            // Accept data URLs as well as bare base64.
            let data = data.split_once("base64,").map_or(data, |(_, rest)| rest);
            STANDARD.decode(data.trim()).map(Some)
        }
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVote {
    pub fake_probability: f32,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleAnalysis {
    pub ensemble_method: String,
    pub models_used: u32,
    pub fake_votes: u32,
    #[serde(default)]
    pub model_results: BTreeMap<String, ModelVote>,
}

impl EnsembleAnalysis {
    /// Share of models that voted "fake", in 0.0..=1.0.
    pub fn fake_vote_share(&self) -> f32 {
        if self.models_used == 0 {
            return 0.0;
        }
        self.fake_votes.min(self.models_used) as f32 / self.models_used as f32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Full success payload of an analysis.
///
/// The task-based result endpoint and the single-call upload endpoint both
/// decode into this type; fields one of them omits are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub detection_result: DetectionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<EnsembleAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
}

/// What a submission produced: the finished report, or a task to fetch later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmissionOutcome {
    Completed(DetectionReport),
    Pending(TaskHandle),
}

/// Body of a 2xx result response for a task that has not finished.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskProgress {
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub status: String,
}

impl TaskProgress {
    pub fn is_pending(&self) -> bool {
        let status = self.status.to_ascii_lowercase();
        PENDING_STATUSES.contains(&status.as_str())
    }
}

/// Structured error body: `{"detail": ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// Detail text to show the user verbatim, if there is any.
    pub fn detail_text(&self) -> Option<String> {
        match &self.detail {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) if text.trim().is_empty() => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_json() -> serde_json::Value {
        json!({
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
            },
            "analysis": {
                "ensemble_method": "soft_voting",
                "models_used": 3,
                "fake_votes": 2,
                "model_results": {
                    "xception": { "fake_probability": 0.97, "confidence": 0.97 },
                    "efficientnet": { "fake_probability": 0.88, "confidence": 0.88 },
                    "meso4": { "fake_probability": 0.41, "confidence": 0.59 }
                }
            },
            "model_info": { "name": "ensemble-v2" }
        })
    }

    #[test]
    fn decodes_task_result() {
        let report: DetectionReport = serde_json::from_value(result_json()).unwrap();
        assert_eq!(report.task_id, Some(TaskId::from("abc123")));
        assert_eq!(report.detection_result.verdict_kind(), Some(Verdict::Fake));
        assert!(report.detection_result.probabilities_consistent());

        let analysis = report.analysis.unwrap();
        assert_eq!(analysis.model_results.len(), 3);
        assert!((analysis.fake_vote_share() - 2.0 / 3.0).abs() < f32::EPSILON);
        assert_eq!(report.model_info.unwrap().name, "ensemble-v2");
    }

    #[test]
    fn submission_shape_is_discriminated() {
        let pending: SubmissionOutcome = serde_json::from_value(json!({
            "task_id": "abc123",
            "status": "queued",
            "message": "File uploaded"
        }))
        .unwrap();
        assert!(matches!(pending, SubmissionOutcome::Pending(ref h) if h.task_id.as_str() == "abc123"));

        let completed: SubmissionOutcome = serde_json::from_value(json!({
            "success": true,
            "filename": "face.jpg",
            "detection_result": {
                "is_fake": false,
                "confidence": 0.8,
                "fake_probability": 0.2,
                "real_probability": 0.8,
                "verdict": "REAL"
            }
        }))
        .unwrap();
        match completed {
            SubmissionOutcome::Completed(report) => {
                assert_eq!(report.task_id, None);
                assert_eq!(report.detection_result.verdict_kind(), Some(Verdict::Real));
            }
            other => panic!("expected inline result, got {other:?}"),
        }
    }

    #[test]
    fn inconsistent_probabilities_are_flagged() {
        let mut result: DetectionResult =
            serde_json::from_value(result_json()["detection_result"].clone()).unwrap();
        result.real_probability = 0.5;
        assert!(!result.probabilities_consistent());
        result.verdict = "uncertain".into();
        assert_eq!(result.verdict_kind(), None);
    }

    #[test]
    fn decodes_embedded_images() {
        let mut result: DetectionResult =
            serde_json::from_value(result_json()["detection_result"].clone()).unwrap();
        assert_eq!(result.original_image().unwrap(), None);

        result.orig_img = Some(STANDARD.encode(b"jpeg-bytes"));
        result.result_img = Some(format!("data:image/jpeg;base64,{}", STANDARD.encode(b"overlay")));
        assert_eq!(result.original_image().unwrap(), Some(b"jpeg-bytes".to_vec()));
        assert_eq!(result.annotated_image().unwrap(), Some(b"overlay".to_vec()));

        result.orig_img = Some("not base64!".into());
        assert!(result.original_image().is_err());
    }

    #[test]
    fn error_detail_text() {
        let body: ErrorBody = serde_json::from_value(json!({ "detail": "Invalid file type" })).unwrap();
        assert_eq!(body.detail_text().as_deref(), Some("Invalid file type"));

        let body: ErrorBody = serde_json::from_value(json!({ "detail": [{ "msg": "field required" }] })).unwrap();
        assert_eq!(body.detail_text().as_deref(), Some(r#"[{"msg":"field required"}]"#));

        let body: ErrorBody = serde_json::from_value(json!({ "detail": null })).unwrap();
        assert_eq!(body.detail_text(), None);
    }

    #[test]
    fn pending_progress_statuses() {
        let progress: TaskProgress = serde_json::from_value(json!({ "status": "Processing" })).unwrap();
        assert!(progress.is_pending());
        let progress: TaskProgress = serde_json::from_value(json!({ "status": "failed" })).unwrap();
        assert!(!progress.is_pending());
    }
}
