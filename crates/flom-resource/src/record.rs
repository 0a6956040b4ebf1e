//! Per-connection lock records.

use flom_core::mode::LockMode;
use flom_core::timeout::Timeval;
use flom_core::traits::ConnectionId;

/// Variant specific payload of a lock record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockInfo {
    /// Simple and hierarchical resources.
    Mode(LockMode),
    /// Numeric resources.
    Quantity(u32),
    /// Sequence value; `None` while waiting.
    Sequence(Option<u32>),
    /// Granted timestamp; `None` while waiting.
    Timestamp(Option<Timeval>),
    /// Index of the granted set element; `None` while waiting.
    Element(Option<usize>),
}

/// One lock held or requested by one connection.
///
/// The connection is a back-reference only; the record never owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionLockRecord {
    pub connection: ConnectionId,
    pub info: LockInfo,
    /// Recycle the value on release (transactional sequences only).
    pub rollback: bool,
    /// Full path requested (hierarchical resources only).
    pub resource_path: Option<String>,
}

impl ConnectionLockRecord {
    pub fn new(connection: ConnectionId, info: LockInfo) -> Self {
        Self {
            connection,
            info,
            // A connection that disappears without unlocking gives its value back.
            rollback: true,
            resource_path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.resource_path = Some(path.into());
        self
    }

    pub fn mode(&self) -> Option<LockMode> {
        match self.info {
            LockInfo::Mode(mode) => Some(mode),
            _ => None,
        }
    }

    /// Units this record counts against a numeric, sequence or timestamp total.
    pub fn quantity(&self) -> u32 {
        match self.info {
            LockInfo::Quantity(quantity) => quantity,
            _ => 1,
        }
    }
}
