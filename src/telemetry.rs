use std::{fmt, sync::Arc, time::Duration};

use crate::kind::WorkflowKind;

/// User-provided callbacks for emitting metrics without taking on a tracing dependency.
#[derive(Clone, Default)]
pub struct MetricsCallbacks {
    pub http_request: Option<Arc<dyn Fn(HttpRequestMetrics) + Send + Sync>>,
    pub settlement: Option<Arc<dyn Fn(SettlementMetrics) + Send + Sync>>,
}

impl fmt::Debug for MetricsCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCallbacks")
            .field(
                "http_request",
                &self.http_request.as_ref().map(|_| "callback"),
            )
            .field("settlement", &self.settlement.as_ref().map(|_| "callback"))
            .finish()
    }
}

/// Common request metadata shared by telemetry events.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub kind: WorkflowKind,
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn new(kind: WorkflowKind, method: impl Into<String>) -> Self {
        Self {
            kind,
            method: method.into(),
            path: kind.path(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        if let Some(id) = request_id {
            if !id.trim().is_empty() {
                self.request_id = Some(id);
            }
        }
        self
    }
}

/// HTTP request latency and outcome.
#[derive(Clone, Debug)]
pub struct HttpRequestMetrics {
    pub latency: Duration,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub context: RequestContext,
}

/// How a submission ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementOutcome {
    Success,
    Failed,
    /// The workflow was unmounted before the call settled; the result was discarded.
    Discarded,
}

/// Time from submission to settlement of one workflow call.
#[derive(Clone, Debug)]
pub struct SettlementMetrics {
    pub kind: WorkflowKind,
    pub outcome: SettlementOutcome,
    pub latency: Duration,
    pub submission_id: String,
}

/// Internal helper that owns the registered callbacks (if any).
#[derive(Clone, Default)]
pub(crate) struct Telemetry {
    callbacks: MetricsCallbacks,
}

impl Telemetry {
    pub fn new(callbacks: Option<MetricsCallbacks>) -> Self {
        Self {
            callbacks: callbacks.unwrap_or_default(),
        }
    }

    pub fn http_enabled(&self) -> bool {
        self.callbacks.http_request.is_some()
    }

    pub fn record_http(&self, metrics: HttpRequestMetrics) {
        if let Some(cb) = &self.callbacks.http_request {
            cb(metrics);
        }
    }

    pub fn record_settlement(&self, metrics: SettlementMetrics) {
        if let Some(cb) = &self.callbacks.settlement {
            cb(metrics);
        }
    }
}
