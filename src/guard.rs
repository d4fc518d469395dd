//! Single-flight submission guard.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Outcome of asking the guard whether a trigger may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    /// A request is already in flight; the trigger has no effect.
    Ignored,
}

/// Decide whether a trigger may proceed given the in-flight flag.
pub fn admit(in_flight: bool) -> Admission {
    if in_flight {
        Admission::Ignored
    } else {
        Admission::Allow
    }
}

/// Allows at most one in-flight request per workflow instance.
///
/// [`SubmissionGuard::try_acquire`] hands out a [`FlightPermit`]; the flag is
/// cleared when the permit is dropped, whichever way the call settled.
#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard {
    in_flight: Arc<AtomicBool>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn try_acquire(&self) -> Option<FlightPermit> {
        let acquired = self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        match admit(!acquired) {
            Admission::Allow => Some(FlightPermit {
                in_flight: self.in_flight.clone(),
            }),
            Admission::Ignored => None,
        }
    }
}

/// Proof that the holder owns the single in-flight slot.
#[derive(Debug)]
#[must_use = "dropping the permit immediately releases the in-flight slot"]
pub struct FlightPermit {
    in_flight: Arc<AtomicBool>,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}
