//! Decoded lock traffic exchanged with clients.
//!
//! The wire encoding lives elsewhere; these types are what a codec hands to
//! the engine and what the engine hands back.

use serde::{Deserialize, Serialize};

use crate::mode::LockMode;

/// LOCK request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSpec {
    /// Resource name as sent by the client.
    pub name: String,
    /// Lock mode (simple and hierarchical resources only).
    pub mode: LockMode,
    /// Quantity to lock (numeric resources only).
    pub quantity: u32,
    /// May the request be queued if it cannot be granted immediately?
    pub wait: bool,
}

impl LockSpec {
    /// Creates an exclusive, waiting request for one unit of `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: LockMode::Exclusive,
            quantity: 1,
            wait: true,
        }
    }

    /// Sets the lock mode.
    pub fn mode(mut self, mode: LockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the quantity.
    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets whether the request may wait.
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }
}

/// UNLOCK request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockSpec {
    /// Resource name; must match the locked resource.
    pub name: String,
    /// Recycle the issued value (transactional sequences only).
    pub rollback: bool,
}

impl UnlockSpec {
    /// Creates a committing unlock of `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rollback: false,
        }
    }

    /// Sets the rollback flag.
    pub fn rollback(mut self, rollback: bool) -> Self {
        self.rollback = rollback;
        self
    }
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockRequest {
    Lock(LockSpec),
    Unlock(UnlockSpec),
}

impl LockRequest {
    /// Resource name the request refers to.
    pub fn resource_name(&self) -> &str {
        match self {
            LockRequest::Lock(spec) => &spec.name,
            LockRequest::Unlock(spec) => &spec.name,
        }
    }
}

impl From<LockSpec> for LockRequest {
    fn from(spec: LockSpec) -> Self {
        LockRequest::Lock(spec)
    }
}

impl From<UnlockSpec> for LockRequest {
    fn from(spec: UnlockSpec) -> Self {
        LockRequest::Unlock(spec)
    }
}

/// Outcome of a LOCK request as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerStatus {
    /// Lock granted.
    Ok,
    /// Request queued; a grant follows asynchronously.
    LockEnqueued,
    /// Resource busy and the client did not want to wait.
    LockBusy,
    /// Request can never be satisfied.
    LockImpossible,
}

/// Whether an answer is the direct reply to a request or a deferred grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerKind {
    /// Reply to the request being handled.
    Immediate,
    /// Grant pushed after the request had been enqueued.
    Deferred,
}

/// Answer to a LOCK request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockAnswer {
    pub status: AnswerStatus,
    pub kind: AnswerKind,
    /// Generated value: sequence number, timestamp or set element.
    pub element: Option<String>,
}

impl LockAnswer {
    /// Immediate answer with the given status and no payload.
    pub fn immediate(status: AnswerStatus) -> Self {
        Self {
            status,
            kind: AnswerKind::Immediate,
            element: None,
        }
    }

    /// Immediate grant carrying an optional generated value.
    pub fn granted(element: Option<String>) -> Self {
        Self {
            status: AnswerStatus::Ok,
            kind: AnswerKind::Immediate,
            element,
        }
    }

    /// Deferred grant pushed to a former waiter.
    pub fn deferred(element: Option<String>) -> Self {
        Self {
            status: AnswerStatus::Ok,
            kind: AnswerKind::Deferred,
            element,
        }
    }

    pub fn is_granted(&self) -> bool {
        self.status == AnswerStatus::Ok
    }
}
