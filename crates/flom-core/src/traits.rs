//! Core traits for the boundary between the locking engine and its host.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::FlomResult;
use crate::message::LockAnswer;
use crate::timeout::Timeval;

// ============================================================================
// Connection Identity
// ============================================================================

/// Opaque identity of a client connection.
///
/// The engine only ever stores this value as a back-reference: it never owns,
/// opens or closes the underlying connection. Lifetime is governed by the
/// transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ============================================================================
// Answer Sink Trait
// ============================================================================

/// Outbound channel used to push asynchronous answers to clients.
///
/// Waiters promoted by a reactivation do not get their grant as a return
/// value: the engine hands it to the sink instead. Implementations must not
/// block; a failed delivery is reported as an error that the engine logs and
/// otherwise ignores (the disconnect cleanup reclaims whatever was granted).
///
/// # Example
///
/// ```rust,ignore
/// struct Printer;
///
/// impl AnswerSink for Printer {
///     fn deliver(&self, connection: ConnectionId, answer: LockAnswer) -> FlomResult<()> {
///         println!("{connection} <- {answer:?}");
///         Ok(())
///     }
/// }
/// ```
pub trait AnswerSink {
    /// Delivers `answer` to `connection`, best effort.
    fn deliver(&self, connection: ConnectionId, answer: LockAnswer) -> FlomResult<()>;
}

impl<S: AnswerSink + ?Sized> AnswerSink for &S {
    fn deliver(&self, connection: ConnectionId, answer: LockAnswer) -> FlomResult<()> {
        (**self).deliver(connection, answer)
    }
}

// ============================================================================
// Clock Trait
// ============================================================================

/// Source of the current wall-clock time.
///
/// Timestamp resources read the time through this trait so the host (or a
/// test) decides what "now" means.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timeval;
}

/// [`Clock`] backed by [`SystemTime::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timeval {
        Timeval::from(SystemTime::now())
    }
}
