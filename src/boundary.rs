//! Containment for render defects.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Mutex,
};

use crate::{errors::Error, kind::WorkflowKind};

/// What a render through the boundary produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    View(T),
    /// Static per-workflow text shown after a render defect.
    Fallback(String),
}

impl<T> Rendered<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Rendered::Fallback(_))
    }

    pub fn view(self) -> Option<T> {
        match self {
            Rendered::View(v) => Some(v),
            Rendered::Fallback(_) => None,
        }
    }
}

/// Wraps the render of one mounted workflow.
///
/// The first panic or [`Error::Render`] trips the boundary; from then on
/// every render returns the fallback without calling the closure again,
/// until [`RenderBoundary::reset`] (a remount).
#[derive(Debug)]
pub struct RenderBoundary {
    kind: WorkflowKind,
    tripped: Mutex<Option<String>>,
}

impl RenderBoundary {
    pub fn new(kind: WorkflowKind) -> Self {
        Self {
            kind,
            tripped: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    pub fn is_tripped(&self) -> bool {
        self.lock().is_some()
    }

    /// Description of the defect that tripped the boundary, if any.
    pub fn defect(&self) -> Option<String> {
        self.lock().clone()
    }

    pub fn fallback_message(&self) -> String {
        self.kind.fallback_message()
    }

    pub fn render<T, F>(&self, render: F) -> Rendered<T>
    where
        F: FnOnce() -> Result<T, Error>,
    {
        if self.is_tripped() {
            return Rendered::Fallback(self.fallback_message());
        }
        let defect = match panic::catch_unwind(AssertUnwindSafe(render)) {
            Ok(Ok(view)) => return Rendered::View(view),
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        #[cfg(feature = "tracing")]
        tracing::error!(workflow = %self.kind, defect = %defect, "render failed; showing fallback");
        *self.lock() = Some(defect);
        Rendered::Fallback(self.fallback_message())
    }

    /// Clear the tripped flag, as a fresh mount would.
    pub fn reset(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned flag still holds a valid Option.
        self.tripped
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "render panicked".to_string()
    }
}
