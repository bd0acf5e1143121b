//! Client for a remote deepfake-detection service.
//!
//! [`DetectionController`] drives one request at a time through a
//! [`DetectionTransport`]; adapters render from [`WorkflowSnapshot::view`].

pub mod config;
pub mod controller;
pub mod error;
pub mod preview;
pub mod transport;
pub mod view;

pub use config::{ApiVariant, ClientConfig, ConfigError, Locale, PollPolicy};
pub use controller::{DetectionController, Status, WorkflowSnapshot, WorkflowState};
pub use error::{DetectError, Failure, FailureKind, TransportError};
pub use preview::PreviewSlot;
pub use transport::{Delay, DetectionTransport};
pub use view::View;

#[cfg(feature = "http")]
pub use transport::{HttpTransport, TokioDelay};
