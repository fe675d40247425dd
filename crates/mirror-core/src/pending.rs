//! Single-slot holder for the one action deferred behind an authorization.
//!
//! Despite the "queue" name this is a slot: at most one action may wait at
//! a time. Deferring into an occupied slot is a caller bug and is reported
//! as [`SessionError::InvariantViolation`]; the waiting action is kept.

use std::fmt;

use crate::error::SessionError;
use crate::types::RequestKind;

/// Deferred zero-argument unit of work.
pub type DeferredFn = Box<dyn FnOnce() + Send + 'static>;

/// An action parked until the result of `waiting_on` arrives.
pub struct PendingAction {
    waiting_on: RequestKind,
    action: DeferredFn,
}

impl PendingAction {
    pub fn new(waiting_on: RequestKind, action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            waiting_on,
            action: Box::new(action),
        }
    }

    pub fn waiting_on(&self) -> RequestKind {
        self.waiting_on
    }
}

impl fmt::Debug for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAction")
            .field("waiting_on", &self.waiting_on)
            .finish_non_exhaustive()
    }
}

/// What a resume attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The slot held an action; it was cleared and executed.
    Ran(RequestKind),
    /// Nothing was pending.
    Empty,
    /// The pending action waits on a different request kind and was left in place.
    WaitingOnOther(RequestKind),
}

#[derive(Debug, Default)]
pub struct PendingJobQueue {
    slot: Option<PendingAction>,
}

impl PendingJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `pending` in the empty slot.
    ///
    /// Fails with `InvariantViolation` if an action is already waiting; the
    /// rejected action is dropped without running and the first one stays.
    pub fn defer(&mut self, pending: PendingAction) -> Result<(), SessionError> {
        if let Some(existing) = &self.slot {
            return Err(SessionError::InvariantViolation(format!(
                "cannot defer an action waiting on {}: an action waiting on {} is already pending",
                pending.waiting_on, existing.waiting_on
            )));
        }
        self.slot = Some(pending);
        Ok(())
    }

    /// Run whatever is pending, regardless of the kind it waits on.
    ///
    /// The slot is cleared before the action executes. Calling this with
    /// nothing pending is a no-op.
    pub fn resume(&mut self) -> ResumeOutcome {
        match self.slot.take() {
            Some(pending) => {
                let kind = pending.waiting_on;
                (pending.action)();
                ResumeOutcome::Ran(kind)
            }
            None => ResumeOutcome::Empty,
        }
    }

    /// Run the pending action only if it waits on `kind`.
    pub fn resume_for(&mut self, kind: RequestKind) -> ResumeOutcome {
        if let Some(other) = self.waiting_on().filter(|&waiting| waiting != kind) {
            return ResumeOutcome::WaitingOnOther(other);
        }
        self.resume()
    }

    /// Clear the slot without running the action.
    pub fn discard(&mut self) -> Option<RequestKind> {
        self.slot.take().map(|pending| pending.waiting_on)
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    pub fn waiting_on(&self) -> Option<RequestKind> {
        self.slot.as_ref().map(PendingAction::waiting_on)
    }
}

// ─── Tests ───────────────────────────────────────────────────────
