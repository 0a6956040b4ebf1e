//! Numeric resource: a counted pool of interchangeable units.

use std::collections::VecDeque;

use flom_core::error::{FlomError, FlomResult};
use flom_core::message::LockSpec;
use flom_core::traits::ConnectionId;
use tracing::trace;

use crate::reactivate::Resource;
use crate::record::{ConnectionLockRecord, LockInfo};

/// Pool of `total_quantity` units; a holder takes any number of them.
///
/// `locked_quantity` is always the sum of the holders' quantities and never
/// exceeds `total_quantity`.
#[derive(Debug)]
pub struct NumericResource {
    name: String,
    total_quantity: u32,
    locked_quantity: u32,
    holders: Vec<ConnectionLockRecord>,
    waiters: VecDeque<ConnectionLockRecord>,
}

impl NumericResource {
    pub fn new(name: impl Into<String>, total_quantity: u32) -> Self {
        Self {
            name: name.into(),
            total_quantity,
            locked_quantity: 0,
            holders: Vec::new(),
            waiters: VecDeque::new(),
        }
    }

    pub fn total_quantity(&self) -> u32 {
        self.total_quantity
    }

    pub fn locked_quantity(&self) -> u32 {
        self.locked_quantity
    }

    pub fn holders(&self) -> &[ConnectionLockRecord] {
        &self.holders
    }

    pub(crate) fn clear(&mut self) {
        self.holders.clear();
        self.waiters.clear();
        self.locked_quantity = 0;
    }
}

impl Resource for NumericResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn waiters(&self) -> &VecDeque<ConnectionLockRecord> {
        &self.waiters
    }

    fn waiters_mut(&mut self) -> &mut VecDeque<ConnectionLockRecord> {
        &mut self.waiters
    }

    fn new_record(
        &self,
        spec: &LockSpec,
        connection: ConnectionId,
    ) -> FlomResult<ConnectionLockRecord> {
        if spec.quantity == 0 {
            return Err(FlomError::Protocol(format!(
                "{connection} requested zero units of '{}'",
                self.name
            )));
        }
        Ok(ConnectionLockRecord::new(
            connection,
            LockInfo::Quantity(spec.quantity),
        ))
    }

    fn can_lock(&self, record: &ConnectionLockRecord) -> bool {
        let available = self.total_quantity - self.locked_quantity;
        trace!(available, requested = record.quantity(), "numeric capacity check");
        available >= record.quantity()
    }

    fn is_impossible(&self, record: &ConnectionLockRecord) -> bool {
        record.quantity() > self.total_quantity
    }

    fn grant(&mut self, record: ConnectionLockRecord) -> FlomResult<Option<String>> {
        let quantity = record.quantity();
        if quantity > self.total_quantity - self.locked_quantity {
            return Err(FlomError::Internal(format!(
                "granting {quantity} units of '{}' would exceed its capacity",
                self.name
            )));
        }
        self.locked_quantity += quantity;
        self.holders.push(record);
        Ok(None)
    }

    fn release(
        &mut self,
        connection: ConnectionId,
        _rollback: Option<bool>,
    ) -> Option<ConnectionLockRecord> {
        let position = self.holders.iter().position(|h| h.connection == connection)?;
        let record = self.holders.remove(position);
        self.locked_quantity = self.locked_quantity.saturating_sub(record.quantity());
        Some(record)
    }

    fn holds(&self, connection: ConnectionId) -> bool {
        self.holders.iter().any(|h| h.connection == connection)
    }

    fn has_holders(&self) -> bool {
        !self.holders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivate::lock;
    use flom_core::message::AnswerStatus;

    #[test]
    fn test_oversized_request_is_impossible() {
        let mut resource = NumericResource::new("pool[3]", 3);
        let answer = lock(&mut resource, &LockSpec::new("pool[3]").quantity(4), ConnectionId(1))
            .unwrap();
        assert_eq!(answer.status, AnswerStatus::LockImpossible);
        assert!(resource.waiters().is_empty());
        assert_eq!(resource.locked_quantity(), 0);
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let mut resource = NumericResource::new("pool[3]", 3);
        let err = lock(&mut resource, &LockSpec::new("pool[3]").quantity(0), ConnectionId(1))
            .unwrap_err();
        assert!(matches!(err, FlomError::Protocol(_)));
    }
}
