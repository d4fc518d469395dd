//! Render-ready projection of workflow state.

use std::sync::Arc;

use serde::Serialize;

use crate::machine::WorkflowState;
use crate::reports::{ReportSchema, WorkflowResponse};

/// Coarse phase of a workflow, as the presentation layer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Loading,
    Success,
    Error,
}

/// Guard-free view of a workflow. Reports are always normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum ViewModel {
    Idle,
    Loading {
        #[serde(skip_serializing_if = "Option::is_none")]
        retained: Option<Arc<WorkflowResponse>>,
    },
    Success {
        report: Arc<WorkflowResponse>,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        retained: Option<Arc<WorkflowResponse>>,
        #[serde(skip)]
        schema: ReportSchema,
    },
}

impl ViewModel {
    pub fn phase(&self) -> Phase {
        match self {
            ViewModel::Idle => Phase::Idle,
            ViewModel::Loading { .. } => Phase::Loading,
            ViewModel::Success { .. } => Phase::Success,
            ViewModel::Error { .. } => Phase::Error,
        }
    }

    /// Report to display, if any: the fresh one on success, otherwise the
    /// retained previous report.
    pub fn report(&self) -> Option<&WorkflowResponse> {
        match self {
            ViewModel::Idle => None,
            ViewModel::Success { report } => Some(report),
            ViewModel::Loading { retained } | ViewModel::Error { retained, .. } => {
                retained.as_deref()
            }
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ViewModel::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// On error, the retained report or the workflow's zero-valued report.
    pub fn report_or_empty(&self) -> Option<WorkflowResponse> {
        match self {
            ViewModel::Error {
                retained, schema, ..
            } => Some(
                retained
                    .as_deref()
                    .cloned()
                    .unwrap_or_else(|| schema.empty()),
            ),
            other => other.report().cloned(),
        }
    }

    /// Whether a submit affordance should be enabled.
    pub fn can_submit(&self) -> bool {
        !matches!(self, ViewModel::Loading { .. })
    }
}

/// Pure projection of a state into its view model.
pub fn project(state: &WorkflowState) -> ViewModel {
    match state {
        WorkflowState::Idle => ViewModel::Idle,
        WorkflowState::Loading { previous, .. } => ViewModel::Loading {
            retained: previous.clone(),
        },
        WorkflowState::Success(report) => ViewModel::Success {
            report: report.clone(),
        },
        WorkflowState::Failed(info) => ViewModel::Error {
            message: info.message.clone(),
            retained: info.previous.clone(),
            schema: info.schema,
        },
    }
}
