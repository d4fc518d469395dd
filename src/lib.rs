//! Client core for the ConstructAI construction analysis workflows.
//!
//! Each of the eight workflows (safety monitor, crack detection, valuation,
//! project planner, knowledge assistant, chatbot, site assistant, weather
//! advisor) runs on the same [`WorkflowMachine`]: requests are validated and
//! packaged, submitted one at a time, and the service's reply is normalized
//! into a typed report that always matches its declared shape.
//!
//! ```no_run
//! # async fn run() -> constructai::Result<()> {
//! use constructai::{Client, Config, WorkflowKind, WorkflowRequest};
//!
//! let client = Client::new(Config::default())?;
//! let safety = client.workflow(WorkflowKind::SafetyMonitor);
//! safety
//!     .submit(WorkflowRequest::safety_monitor("Scaffold on the north face, level 3"))
//!     .await?;
//! if let Some(report) = safety.view().report().and_then(|r| r.as_safety()) {
//!     println!("risk: {:?}", report.risk_level);
//! }
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::result_large_err)]

/// Default service origin.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default client identification header value.
pub(crate) const DEFAULT_CLIENT_HEADER: &str =
    concat!("constructai-rust/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Default request timeout (120 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// HTTP header name for request ID tracing.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

mod boundary;
#[cfg(feature = "client")]
mod client;
mod conversation;
mod errors;
mod guard;
mod http;
mod kind;
mod machine;
pub mod mock;
pub mod normalize;
mod packager;
mod page;
mod reports;
mod request;
mod telemetry;
mod transport;
mod view;

pub use boundary::{RenderBoundary, Rendered};
#[cfg(feature = "client")]
pub use client::{Client, Config, BASE_URL_ENV, TIMEOUT_ENV};
pub use conversation::{ChatMessage, Conversation, Speaker};
pub use errors::{
    APIError, Error, FieldError, Result, TransportError, TransportErrorKind, ValidationError,
};
pub use guard::{admit, Admission, FlightPermit, SubmissionGuard};
pub use http::{HeaderEntry, HeaderList, RequestOptions};
pub use kind::{BodyEncoding, ContextType, InputField, InputKind, WorkflowKind, CONTEXT_TYPES};
pub use machine::{
    ErrorInfo, MachineOptions, Outcome, PendingSubmission, RetainPolicy, Submission, Triggered,
    WorkflowMachine, WorkflowState,
};
pub use mock::{fixtures, MockConfig, MockTransport, RecordedCall};
pub use packager::{package, MultipartPart, TransportBody};
pub use page::WorkflowPage;
pub use reports::{
    ChatReply, CostEstimate, CrackReport, DailySitePlan, GeneratedDocument, GoNoGo,
    KnowledgeReport, MaterialEstimate, ProjectPlan, RelatedDomain, Report, ReportSchema,
    RiskLevel, SafetyProcedure, SafetyReport, TechniqueBrief, ValuationReport, WeatherAdvice,
    WeekPlan, WorkflowResponse,
};
pub use request::{Attachment, FieldValue, WorkflowRequest};
pub use telemetry::{
    HttpRequestMetrics, MetricsCallbacks, RequestContext, SettlementMetrics, SettlementOutcome,
};
pub use transport::{BoxFuture, Transport};
pub use view::{project, Phase, ViewModel};
