mod report;
mod request;

pub use report::{
    DetectionReport, DetectionResult, EnsembleAnalysis, ErrorBody, ModelInfo, ModelVote,
    SubmissionOutcome, TaskHandle, TaskId, TaskProgress, Verdict,
};
pub use request::{AnalysisRequest, InvalidInput, MAX_UPLOAD_BYTES, MediaFormat, MediaKind};
