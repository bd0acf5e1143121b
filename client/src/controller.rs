//! Detection workflow controller.
//!
//! Owns the lifecycle of one detection request at a time:
//!
//! ```text
//! Idle -> Submitting -> AwaitingResult -> Succeeded | Failed
//!                  \-> Succeeded | Failed            (inline result)
//! ```
//!
//! `Succeeded` and `Failed` end the request, not the controller; `start` or
//! `retry` begins a new one. The controller is single-threaded (`RefCell`
//! state, `!Send`) and never holds a borrow across an `.await`.

use chrono::{DateTime, Utc};
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use shared::{AnalysisRequest, DetectionReport, InvalidInput, SubmissionOutcome, TaskHandle};
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use strum_macros::{AsRefStr, Display};

use crate::config::{ClientConfig, Locale, PollPolicy};
use crate::error::{DetectError, Failure, TransportError};
use crate::transport::{Delay, DetectionTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum Status {
    Idle,
    Submitting,
    AwaitingResult,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    Submitting,
    AwaitingResult { task: TaskHandle, attempt: u32 },
    Succeeded(Arc<DetectionReport>),
    Failed(Failure),
}

impl WorkflowState {
    pub fn status(&self) -> Status {
        match self {
            WorkflowState::Idle => Status::Idle,
            WorkflowState::Submitting => Status::Submitting,
            WorkflowState::AwaitingResult { .. } => Status::AwaitingResult,
            WorkflowState::Succeeded(_) => Status::Succeeded,
            WorkflowState::Failed(_) => Status::Failed,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            WorkflowState::Submitting | WorkflowState::AwaitingResult { .. }
        )
    }
}

/// Read-only view of the controller handed to presentation code.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    /// The request being processed, or the last one, kept for retry.
    pub request: Option<AnalysisRequest>,
    pub generation: u64,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowSnapshot {
    pub fn status(&self) -> Status {
        self.state.status()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_in_flight()
    }

    pub fn result(&self) -> Option<&Arc<DetectionReport>> {
        match &self.state {
            WorkflowState::Succeeded(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Failure> {
        match &self.state {
            WorkflowState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn task(&self) -> Option<&TaskHandle> {
        match &self.state {
            WorkflowState::AwaitingResult { task, .. } => Some(task),
            _ => None,
        }
    }
}

type Listener = Box<dyn Fn(&WorkflowSnapshot)>;

struct Inner {
    state: WorkflowState,
    retained: Option<AnalysisRequest>,
    generation: u64,
    abort: Option<AbortHandle>,
    updated_at: DateTime<Utc>,
}

impl Inner {
    fn set_state(&mut self, state: WorkflowState) {
        self.state = state;
        self.updated_at = Utc::now();
    }
}

pub struct DetectionController<T, D> {
    transport: T,
    delay: D,
    poll: PollPolicy,
    locale: Locale,
    terms_accepted: Cell<bool>,
    inner: RefCell<Inner>,
    listeners: RefCell<Vec<Listener>>,
}

impl<T, D> DetectionController<T, D>
where
    T: DetectionTransport,
    D: Delay,
{
    pub fn new(transport: T, delay: D, config: &ClientConfig) -> Self {
        Self {
            transport,
            delay,
            poll: config.poll.clone(),
            locale: config.locale,
            terms_accepted: Cell::new(config.terms_accepted),
            inner: RefCell::new(Inner {
                state: WorkflowState::Idle,
                retained: None,
                generation: 0,
                abort: None,
                updated_at: Utc::now(),
            }),
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let inner = self.inner.borrow();
        WorkflowSnapshot {
            state: inner.state.clone(),
            request: inner.retained.clone(),
            generation: inner.generation,
            updated_at: inner.updated_at,
        }
    }

    /// Registers a callback run with the new snapshot after every transition.
    /// Listeners must not subscribe further listeners from inside the callback.
    pub fn subscribe(&self, listener: impl Fn(&WorkflowSnapshot) + 'static) {
        self.listeners.borrow_mut().push(Box::new(listener));
    }

    pub fn set_terms_accepted(&self, accepted: bool) {
        self.terms_accepted.set(accepted);
    }

    pub fn terms_accepted(&self) -> bool {
        self.terms_accepted.get()
    }

    /// Runs one detection request to completion.
    ///
    /// Returns `Err` only when the request is rejected before anything is
    /// sent: another request is in flight, or the terms were not accepted.
    /// Remote failures end in [`WorkflowState::Failed`] and are returned as
    /// part of the snapshot.
    pub async fn start(&self, request: AnalysisRequest) -> Result<WorkflowSnapshot, DetectError> {
        let (generation, registration) = self.begin(&request)?;
        let _in_flight = InFlight {
            controller: self,
            generation,
        };
        self.notify();

        let work = Abortable::new(self.run(&request, generation), registration);
        match work.await {
            Ok(Ok(report)) => {
                log::info!(
                    "Detection finished for {}: {} (confidence {:.2})",
                    request.file_name(),
                    report.detection_result.verdict,
                    report.detection_result.confidence
                );
                self.finish(generation, WorkflowState::Succeeded(Arc::new(report)));
            }
            Ok(Err(error)) => {
                log::error!("Detection failed for {}: {}", request.file_name(), error);
                let failure = Failure::from_transport(&error, self.locale);
                self.finish(generation, WorkflowState::Failed(failure));
            }
            Err(_aborted) => {
                log::info!("Detection for {} was cancelled", request.file_name());
            }
        }

        Ok(self.snapshot())
    }

    /// Starts again with the request that was last started.
    pub async fn retry(&self) -> Result<WorkflowSnapshot, DetectError> {
        let retained = self.inner.borrow().retained.clone();
        let request = retained.ok_or(DetectError::NothingToRetry)?;
        log::info!("Retrying detection for {}", request.file_name());
        self.start(request).await
    }

    /// Aborts the in-flight request, if any, and returns to `Idle`. The last
    /// request stays available to [`retry`](Self::retry).
    pub fn cancel(&self) -> bool {
        let cancelled = {
            let mut inner = self.inner.borrow_mut();
            match inner.abort.take() {
                Some(handle) => {
                    handle.abort();
                    inner.generation += 1;
                    inner.set_state(WorkflowState::Idle);
                    true
                }
                None => false,
            }
        };

        if cancelled {
            self.notify();
        }
        cancelled
    }

    /// Resets a request whose `start` future was dropped before it settled.
    fn abandon(&self, generation: u64) {
        let abandoned = {
            let mut inner = self.inner.borrow_mut();
            if inner.generation == generation && inner.state.is_in_flight() {
                inner.abort = None;
                inner.generation += 1;
                inner.set_state(WorkflowState::Idle);
                true
            } else {
                false
            }
        };

        if abandoned {
            log::warn!("Request (generation {}) was dropped before it finished", generation);
            self.notify();
        }
    }

    fn begin(&self, request: &AnalysisRequest) -> Result<(u64, AbortRegistration), DetectError> {
        if !self.terms_accepted.get() {
            log::warn!("Rejected {}: terms of use not accepted", request.file_name());
            return Err(DetectError::ConsentRequired);
        }

        let mut inner = self.inner.borrow_mut();
        if inner.state.is_in_flight() {
            log::warn!(
                "Rejected {}: a request is already in flight",
                request.file_name()
            );
            return Err(InvalidInput::RequestInFlight.into());
        }

        let (handle, registration) = AbortHandle::new_pair();
        inner.generation += 1;
        inner.retained = Some(request.clone());
        inner.abort = Some(handle);
        inner.set_state(WorkflowState::Submitting);
        log::debug!(
            "Request {} for {} started (generation {})",
            request.id(),
            request.file_name(),
            inner.generation
        );

        Ok((inner.generation, registration))
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        generation: u64,
    ) -> Result<DetectionReport, TransportError> {
        match self.transport.submit(request).await? {
            SubmissionOutcome::Completed(report) => Ok(report),
            SubmissionOutcome::Pending(handle) => {
                log::info!(
                    "Task {} accepted ({}){}",
                    handle.task_id,
                    handle.status,
                    handle
                        .message
                        .as_deref()
                        .map(|m| format!(": {m}"))
                        .unwrap_or_default()
                );
                self.await_result(handle, generation).await
            }
        }
    }

    async fn await_result(
        &self,
        handle: TaskHandle,
        generation: u64,
    ) -> Result<DetectionReport, TransportError> {
        let max_attempts = self.poll.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.advance(
                generation,
                WorkflowState::AwaitingResult {
                    task: handle.clone(),
                    attempt,
                },
            );

            match self.transport.fetch_result(&handle).await {
                Err(TransportError::NotReady { .. }) if attempt < max_attempts => {
                    let wait = self.poll.backoff(attempt);
                    log::debug!(
                        "Task {} not ready (attempt {}/{}), next fetch in {:?}",
                        handle.task_id,
                        attempt,
                        max_attempts,
                        wait
                    );
                    self.delay.sleep(wait).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Moves an in-flight request to a new intermediate state.
    fn advance(&self, generation: u64, state: WorkflowState) {
        if self.apply(generation, state, false) {
            self.notify();
        }
    }

    /// Moves a request to its terminal state.
    fn finish(&self, generation: u64, state: WorkflowState) {
        if self.apply(generation, state, true) {
            self.notify();
        }
    }

    fn apply(&self, generation: u64, state: WorkflowState, terminal: bool) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.generation != generation {
            log::warn!(
                "Discarding {} from stale request (generation {}, current {})",
                state.status(),
                generation,
                inner.generation
            );
            return false;
        }
        if terminal {
            inner.abort = None;
        }
        inner.set_state(state);
        true
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        for listener in self.listeners.borrow().iter() {
            listener(&snapshot);
        }
    }
}

/// Held by `start` for the lifetime of one request. Dropping it while the
/// request is still in flight returns the controller to `Idle`.
struct InFlight<'a, T, D>
where
    T: DetectionTransport,
    D: Delay,
{
    controller: &'a DetectionController<T, D>,
    generation: u64,
}

impl<T, D> Drop for InFlight<'_, T, D>
where
    T: DetectionTransport,
    D: Delay,
{
    fn drop(&mut self) {
        self.controller.abandon(self.generation);
    }
}
