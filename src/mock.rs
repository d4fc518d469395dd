use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use serde_json::Value;
use tokio::sync::Semaphore;

use crate::{
    errors::{Error, Result, TransportError, TransportErrorKind},
    http::RequestOptions,
    kind::WorkflowKind,
    packager::TransportBody,
    transport::{BoxFuture, Transport},
};

/// In-memory mock configuration for offline tests.
#[derive(Default)]
pub struct MockConfig {
    pub responses: Vec<Result<Value>>,
    /// When set, every call waits for [`MockTransport::release`] before
    /// answering.
    pub hold: bool,
}

impl MockConfig {
    pub fn with_response(mut self, raw: Value) -> Self {
        self.responses.push(Ok(raw));
        self
    }

    pub fn with_error(mut self, err: Error) -> Self {
        self.responses.push(Err(err));
        self
    }

    pub fn held(mut self) -> Self {
        self.hold = true;
        self
    }
}

/// A call the mock received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: WorkflowKind,
    pub body: TransportBody,
    pub options: RequestOptions,
}

/// Queue-driven [`Transport`]: each call pops the next queued response.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl MockTransport {
    pub fn new(cfg: MockConfig) -> Self {
        Self {
            inner: Arc::new(MockInner::new(cfg)),
        }
    }

    /// Queue another response after construction.
    pub fn push_response(&self, raw: Value) {
        self.inner.push(Ok(raw));
    }

    pub fn push_error(&self, err: Error) {
        self.inner.push(Err(err));
    }

    /// Let `n` held calls answer.
    pub fn release(&self, n: usize) {
        self.inner.gate.add_permits(n);
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.inner.recorded.lock().expect("lock poisoned").clone()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("calls", &self.call_count())
            .field("hold", &self.inner.hold)
            .finish()
    }
}

struct MockInner {
    responses: Mutex<VecDeque<Result<Value>>>,
    recorded: Mutex<Vec<RecordedCall>>,
    calls: AtomicUsize,
    hold: bool,
    gate: Semaphore,
}

impl MockInner {
    fn new(cfg: MockConfig) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(cfg.responses)),
            recorded: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            hold: cfg.hold,
            gate: Semaphore::new(0),
        }
    }

    fn push(&self, entry: Result<Value>) {
        self.responses
            .lock()
            .expect("lock poisoned")
            .push_back(entry);
    }

    fn next_response(&self) -> Result<Value> {
        self.responses
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::new(TransportErrorKind::Other, "no mock response queued").into())
            })
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        kind: WorkflowKind,
        body: TransportBody,
        options: RequestOptions,
    ) -> BoxFuture<'_, Result<Value>> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .recorded
            .lock()
            .expect("lock poisoned")
            .push(RecordedCall {
                kind,
                body,
                options,
            });
        Box::pin(async move {
            if self.inner.hold {
                let permit = self
                    .inner
                    .gate
                    .acquire()
                    .await
                    .map_err(|_| TransportError::new(TransportErrorKind::Other, "mock gate closed"))?;
                permit.forget();
            }
            self.inner.next_response()
        })
    }
}

/// Sample raw reports, shaped the way the analysis service answers.
pub mod fixtures {
    use serde_json::{json, Value};

    pub fn safety_report() -> Value {
        json!({
            "hazards": ["Unprotected edge on level 3", "Loose scaffolding plank"],
            "risk_level": "High",
            "missing_ppe": ["Harness"],
            "osha_standards": ["1926.501"],
            "corrective_actions": ["Install guardrails", "Secure planks"],
            "recommendations": ["Daily scaffold inspection"]
        })
    }

    pub fn crack_report() -> Value {
        json!({
            "crack_type": "Diagonal shear crack",
            "cause": "Differential settlement",
            "severity": "Moderate",
            "structural_risk": "Medium",
            "repair_method": "Epoxy injection",
            "material_recommendation": "Low-viscosity epoxy",
            "prevention_advice": "Improve drainage around footing"
        })
    }

    pub fn valuation_report() -> Value {
        json!({
            "market_value_range": 8_500_000,
            "price_per_sqft": 6_800,
            "rent_estimate": 28_000,
            "roi_percentage": 4.2,
            "appreciation_forecast": 6.5
        })
    }

    pub fn project_plan() -> Value {
        json!({
            "materials": {
                "cement_bags": 420,
                "sand_tons": 38.5,
                "aggregate_tons": 55,
                "steel_kg": 3200,
                "concrete_volume_m3": 64
            },
            "cost_estimation": {
                "total_cost": 2_450_000,
                "material_cost": 1_500_000,
                "labour_cost": 650_000,
                "finishing_cost": 300_000
            },
            "task_schedule": [
                {"week": 1, "tasks": ["Site clearing", "Excavation"]},
                {"week": 2, "tasks": ["Footing"]}
            ]
        })
    }

    pub fn chat_reply() -> Value {
        json!({
            "reply": "Cure the slab for at least 7 days.",
            "related_domain": "materials",
            "action_suggestions": ["Keep the surface wet", "Cover with hessian"]
        })
    }

    pub fn daily_site_plan() -> Value {
        json!({
            "tasks_today": ["Slab casting"],
            "materials_required": ["Ready-mix M25"],
            "safety_checks": ["Formwork props"],
            "risk_alerts": ["Afternoon rain"]
        })
    }

    pub fn weather_advice() -> Value {
        json!({
            "go_no_go": "PROCEED WITH CAUTION",
            "weather_risks": ["Wind gusts 40 km/h"],
            "precautions": ["Tie down sheets"],
            "recommendation": "Avoid crane lifts after noon."
        })
    }
}
