//! Request/response lifecycle shared by every workflow.
//!
//! A [`WorkflowMachine`] owns one workflow instance: its current
//! [`WorkflowState`], its single-flight guard and the transport it submits
//! through. State transitions replace the whole state value through a
//! [`tokio::sync::watch`] channel, so observers only ever see complete states.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::{Duration, Instant},
};

use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    errors::{Error, Result, ValidationError},
    guard::{FlightPermit, SubmissionGuard},
    http::RequestOptions,
    kind::WorkflowKind,
    packager::{package, TransportBody},
    reports::{ReportSchema, WorkflowResponse},
    telemetry::{MetricsCallbacks, SettlementMetrics, SettlementOutcome, Telemetry},
    transport::Transport,
    request::WorkflowRequest,
    view::{project, ViewModel},
};

/// Current lifecycle state of a workflow instance.
#[derive(Debug, Clone, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    Loading {
        /// Report kept on screen while the new one is fetched.
        previous: Option<Arc<WorkflowResponse>>,
        submission_id: String,
    },
    Success(Arc<WorkflowResponse>),
    Failed(ErrorInfo),
}

impl WorkflowState {
    pub fn is_loading(&self) -> bool {
        matches!(self, WorkflowState::Loading { .. })
    }

    pub fn report(&self) -> Option<&Arc<WorkflowResponse>> {
        match self {
            WorkflowState::Success(report) => Some(report),
            _ => None,
        }
    }

    fn retained(&self) -> Option<Arc<WorkflowResponse>> {
        match self {
            WorkflowState::Idle => None,
            WorkflowState::Loading { previous, .. } => previous.clone(),
            WorkflowState::Success(report) => Some(report.clone()),
            WorkflowState::Failed(info) => info.previous.clone(),
        }
    }
}

/// A failed submission. Only `message` is meant for display.
#[derive(Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub cause: Arc<Error>,
    pub schema: ReportSchema,
    pub previous: Option<Arc<WorkflowResponse>>,
}

impl ErrorInfo {
    pub fn new(
        message: impl Into<String>,
        cause: Error,
        schema: ReportSchema,
        previous: Option<Arc<WorkflowResponse>>,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Arc::new(cause),
            schema,
            previous,
        }
    }
}

impl fmt::Debug for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorInfo")
            .field("message", &self.message)
            .field("cause", &self.cause.to_string())
            .field("schema", &self.schema)
            .field("has_previous", &self.previous.is_some())
            .finish()
    }
}

/// Whether the last report stays visible while a new submission is loading
/// or after it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetainPolicy {
    #[default]
    Keep,
    Clear,
}

/// Per-instance machine settings.
#[derive(Clone, Debug, Default)]
pub struct MachineOptions {
    pub retain: RetainPolicy,
    /// Request timeout applied when a submission does not set its own.
    pub request_timeout: Option<Duration>,
    pub metrics: Option<MetricsCallbacks>,
}

/// How an admitted submission settled.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(Arc<WorkflowResponse>),
    Failed(ErrorInfo),
    /// The instance was unmounted or dropped first; nothing was applied.
    Discarded,
}

/// Result of [`WorkflowMachine::submit`].
#[derive(Debug, Clone)]
pub enum Submission {
    Settled(Outcome),
    /// Another submission was in flight (or the instance is unmounted).
    Ignored,
}

impl Submission {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Submission::Ignored)
    }
}

/// Result of [`WorkflowMachine::trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Triggered {
    Accepted,
    Ignored,
}

/// One workflow instance.
///
/// Cloning yields another handle to the same instance. When every handle is
/// gone, a call still in flight settles without touching any state.
pub struct WorkflowMachine<T: Transport + 'static> {
    inner: Arc<MachineInner<T>>,
}

impl<T: Transport + 'static> Clone for WorkflowMachine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct MachineInner<T> {
    kind: WorkflowKind,
    transport: Arc<T>,
    state: watch::Sender<WorkflowState>,
    guard: SubmissionGuard,
    mounted: AtomicBool,
    options: MachineOptions,
    telemetry: Telemetry,
}

impl<T: Transport + 'static> WorkflowMachine<T> {
    pub fn new(kind: WorkflowKind, transport: T) -> Self {
        Self::with_options(kind, transport, MachineOptions::default())
    }

    pub fn with_options(kind: WorkflowKind, transport: T, options: MachineOptions) -> Self {
        Self::from_shared(kind, Arc::new(transport), options)
    }

    /// Build an instance over a transport shared with other workflows.
    pub fn from_shared(kind: WorkflowKind, transport: Arc<T>, options: MachineOptions) -> Self {
        let (state, _) = watch::channel(WorkflowState::Idle);
        let telemetry = Telemetry::new(options.metrics.clone());
        Self {
            inner: Arc::new(MachineInner {
                kind,
                transport,
                state,
                guard: SubmissionGuard::new(),
                mounted: AtomicBool::new(true),
                options,
                telemetry,
            }),
        }
    }

    pub fn kind(&self) -> WorkflowKind {
        self.inner.kind
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> WorkflowState {
        self.inner.state.borrow().clone()
    }

    /// Render-ready view of the current state.
    pub fn view(&self) -> ViewModel {
        project(&self.inner.state.borrow())
    }

    /// Observe state changes. Each received value is a complete state.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.inner.state.subscribe()
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.guard.in_flight()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::Acquire)
    }

    /// Tear the instance down. Any call still in flight is discarded when it
    /// settles, and later submissions are ignored.
    pub fn unmount(&self) {
        if self.inner.mounted.swap(false, Ordering::AcqRel) {
            self.inner.state.send_replace(WorkflowState::Idle);
            #[cfg(feature = "tracing")]
            tracing::debug!(workflow = %self.inner.kind, "workflow unmounted");
        }
    }

    /// Submit and wait for the call to settle.
    ///
    /// Validation failures are returned as `Err` and leave the state untouched.
    pub async fn submit(&self, request: WorkflowRequest) -> Result<Submission> {
        self.submit_with_options(request, RequestOptions::default())
            .await
    }

    pub async fn submit_with_options(
        &self,
        request: WorkflowRequest,
        options: RequestOptions,
    ) -> Result<Submission> {
        match self.admit(request, options)? {
            Some(pending) => Ok(Submission::Settled(pending.settle().await)),
            None => Ok(Submission::Ignored),
        }
    }

    /// Submit without waiting: the call runs on the current tokio runtime and
    /// its result lands in the state when it settles.
    pub fn trigger(&self, request: WorkflowRequest) -> Result<Triggered> {
        self.trigger_with_options(request, RequestOptions::default())
    }

    pub fn trigger_with_options(
        &self,
        request: WorkflowRequest,
        options: RequestOptions,
    ) -> Result<Triggered> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| Error::Config(format!("trigger requires a tokio runtime: {err}")))?;
        match self.admit(request, options)? {
            Some(pending) => {
                runtime.spawn(pending.settle());
                Ok(Triggered::Accepted)
            }
            None => Ok(Triggered::Ignored),
        }
    }

    /// Validate and package `request`, take the guard and enter `Loading`.
    ///
    /// Returns `Ok(None)` when the trigger is ignored. The returned
    /// [`PendingSubmission`] must be settled; dropping it unsettled puts the
    /// state back to what it was before admission.
    pub fn admit(
        &self,
        request: WorkflowRequest,
        mut options: RequestOptions,
    ) -> Result<Option<PendingSubmission<T>>> {
        let inner = &self.inner;
        if request.kind != inner.kind {
            return Err(ValidationError::new(format!(
                "{} request submitted to the {} workflow",
                request.kind, inner.kind
            ))
            .with_field("kind")
            .into());
        }
        let body = package(&request)?;
        let schema = request.response_schema();

        if !self.is_mounted() {
            #[cfg(feature = "tracing")]
            tracing::debug!(workflow = %inner.kind, "submission to unmounted workflow ignored");
            return Ok(None);
        }
        let Some(permit) = inner.guard.try_acquire() else {
            #[cfg(feature = "tracing")]
            tracing::debug!(workflow = %inner.kind, "submission ignored: request in flight");
            return Ok(None);
        };

        let submission_id = options
            .request_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        options.request_id = Some(submission_id.clone());
        if options.timeout.is_none() {
            options.timeout = inner.options.request_timeout;
        }

        let previous = match inner.options.retain {
            RetainPolicy::Keep => inner.state.borrow().retained(),
            RetainPolicy::Clear => None,
        };
        let prior = inner.state.send_replace(WorkflowState::Loading {
            previous: previous.clone(),
            submission_id: submission_id.clone(),
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(
            workflow = %inner.kind,
            submission_id = %submission_id,
            multipart = body.is_multipart(),
            "workflow loading"
        );

        Ok(Some(PendingSubmission {
            machine: Arc::downgrade(inner),
            transport: inner.transport.clone(),
            telemetry: inner.telemetry.clone(),
            kind: inner.kind,
            schema,
            body: Some(body),
            options,
            previous,
            prior,
            submission_id,
            permit: Some(permit),
            started: Instant::now(),
        }))
    }
}

impl<T: Transport + 'static> fmt::Debug for WorkflowMachine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowMachine")
            .field("kind", &self.inner.kind)
            .field("state", &*self.inner.state.borrow())
            .field("in_flight", &self.inner.guard.in_flight())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

/// An admitted submission. Holds the in-flight slot until it settles or is
/// dropped.
#[must_use = "an admitted submission does nothing until it is settled"]
pub struct PendingSubmission<T: Transport + 'static> {
    machine: Weak<MachineInner<T>>,
    transport: Arc<T>,
    telemetry: Telemetry,
    kind: WorkflowKind,
    schema: ReportSchema,
    body: Option<TransportBody>,
    options: RequestOptions,
    previous: Option<Arc<WorkflowResponse>>,
    /// State before admission, restored if this is dropped unsettled.
    prior: WorkflowState,
    submission_id: String,
    permit: Option<FlightPermit>,
    started: Instant,
}

impl Outcome {
    fn settled_state(&self) -> Option<WorkflowState> {
        match self {
            Outcome::Success(report) => Some(WorkflowState::Success(report.clone())),
            Outcome::Failed(info) => Some(WorkflowState::Failed(info.clone())),
            Outcome::Discarded => None,
        }
    }
}

impl<T: Transport + 'static> PendingSubmission<T> {
    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    /// Run the transport call and apply its result.
    pub async fn settle(mut self) -> Outcome {
        let kind = self.kind;
        let Some(body) = self.body.take() else {
            return Outcome::Discarded;
        };
        let options = std::mem::take(&mut self.options);

        let outcome = match self.transport.send(kind, body, options).await {
            Ok(raw) => Outcome::Success(Arc::new(self.schema.normalize(&raw))),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    workflow = %kind,
                    submission_id = %self.submission_id,
                    error = %err,
                    "workflow submission failed"
                );
                Outcome::Failed(ErrorInfo::new(
                    kind.failure_message(),
                    err,
                    self.schema,
                    self.previous.take(),
                ))
            }
        };

        let permit = self.permit.take();
        let applied = match (self.machine.upgrade(), outcome.settled_state()) {
            (Some(inner), Some(next)) => inner.state.send_if_modified(|current| {
                // Released under the write lock: a new submission can only
                // enter Loading once this result is visible.
                drop(permit);
                if !inner.mounted.load(Ordering::Acquire) {
                    return false;
                }
                *current = next;
                true
            }),
            _ => false,
        };
        let outcome = if applied {
            #[cfg(feature = "tracing")]
            tracing::debug!(workflow = %kind, submission_id = %self.submission_id, "workflow settled");
            outcome
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                workflow = %kind,
                submission_id = %self.submission_id,
                "stale completion dropped: workflow no longer mounted"
            );
            Outcome::Discarded
        };

        self.telemetry.record_settlement(SettlementMetrics {
            kind,
            outcome: match &outcome {
                Outcome::Success(_) => SettlementOutcome::Success,
                Outcome::Failed(_) => SettlementOutcome::Failed,
                Outcome::Discarded => SettlementOutcome::Discarded,
            },
            latency: self.started.elapsed(),
            submission_id: self.submission_id.clone(),
        });
        outcome
    }
}

impl<T: Transport + 'static> Drop for PendingSubmission<T> {
    fn drop(&mut self) {
        // Settled, or abandoned after the instance went away.
        let Some(permit) = self.permit.take() else {
            return;
        };
        let Some(inner) = self.machine.upgrade() else {
            return;
        };
        let prior = std::mem::take(&mut self.prior);
        let id = self.submission_id.as_str();
        inner.state.send_if_modified(|current| {
            drop(permit);
            let ours = matches!(
                current,
                WorkflowState::Loading { submission_id, .. } if submission_id == id
            );
            if ours && inner.mounted.load(Ordering::Acquire) {
                *current = prior;
                true
            } else {
                false
            }
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(workflow = %self.kind, submission_id = %id, "submission abandoned before settling");
    }
}

impl<T: Transport + 'static> fmt::Debug for PendingSubmission<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSubmission")
            .field("kind", &self.kind)
            .field("submission_id", &self.submission_id)
            .finish()
    }
}
