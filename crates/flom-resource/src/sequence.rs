//! Sequence resource: hands out increasing numbers, one per holder.

use std::collections::VecDeque;

use flom_core::error::{FlomError, FlomResult};
use flom_core::message::LockSpec;
use flom_core::traits::ConnectionId;
use tracing::debug;

use crate::reactivate::Resource;
use crate::record::{ConnectionLockRecord, LockInfo};

/// Generator of unique numbers with at most `total_quantity` outstanding.
///
/// Values start at 1 and wrap around without ever producing 0. A
/// transactional sequence takes back the value of a holder that releases
/// with rollback and reissues it before any new value.
#[derive(Debug)]
pub struct SequenceResource {
    name: String,
    total_quantity: u32,
    locked_quantity: u32,
    next_value: u32,
    rolled_back: Option<VecDeque<u32>>,
    holders: Vec<ConnectionLockRecord>,
    waiters: VecDeque<ConnectionLockRecord>,
}

impl SequenceResource {
    pub fn new(name: impl Into<String>, total_quantity: u32, transactional: bool) -> Self {
        Self {
            name: name.into(),
            total_quantity,
            locked_quantity: 0,
            next_value: 1,
            rolled_back: transactional.then(VecDeque::new),
            holders: Vec::new(),
            waiters: VecDeque::new(),
        }
    }

    pub fn is_transactional(&self) -> bool {
        self.rolled_back.is_some()
    }

    pub fn locked_quantity(&self) -> u32 {
        self.locked_quantity
    }

    pub fn total_quantity(&self) -> u32 {
        self.total_quantity
    }

    /// Value the next grant issues when nothing has been rolled back.
    pub fn next_value(&self) -> u32 {
        self.next_value
    }

    /// Values waiting to be reissued, oldest first.
    pub fn rolled_back(&self) -> impl Iterator<Item = u32> + '_ {
        self.rolled_back.iter().flatten().copied()
    }

    /// Value held by `connection`.
    pub fn held_value(&self, connection: ConnectionId) -> Option<u32> {
        self.holders
            .iter()
            .find(|h| h.connection == connection)
            .and_then(|h| match h.info {
                LockInfo::Sequence(value) => value,
                _ => None,
            })
    }

    pub(crate) fn clear(&mut self) {
        self.holders.clear();
        self.waiters.clear();
        self.locked_quantity = 0;
    }

    fn take_value(&mut self) -> u32 {
        if let Some(value) = self.rolled_back.as_mut().and_then(VecDeque::pop_front) {
            return value;
        }
        let value = self.next_value;
        self.next_value = match self.next_value.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        value
    }
}

impl Resource for SequenceResource {
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
        _spec: &LockSpec,
        connection: ConnectionId,
    ) -> FlomResult<ConnectionLockRecord> {
        Ok(ConnectionLockRecord::new(connection, LockInfo::Sequence(None)))
    }

    fn can_lock(&self, _record: &ConnectionLockRecord) -> bool {
        self.locked_quantity < self.total_quantity
    }

    fn grant(&mut self, mut record: ConnectionLockRecord) -> FlomResult<Option<String>> {
        if self.locked_quantity >= self.total_quantity {
            return Err(FlomError::Internal(format!(
                "sequence '{}' has no free slot",
                self.name
            )));
        }
        let value = self.take_value();
        record.info = LockInfo::Sequence(Some(value));
        self.locked_quantity += 1;
        self.holders.push(record);
        Ok(Some(value.to_string()))
    }

    fn release(
        &mut self,
        connection: ConnectionId,
        rollback: Option<bool>,
    ) -> Option<ConnectionLockRecord> {
        let position = self.holders.iter().position(|h| h.connection == connection)?;
        let mut record = self.holders.remove(position);
        self.locked_quantity = self.locked_quantity.saturating_sub(1);
        if let Some(rollback) = rollback {
            record.rollback = rollback;
        }

        if let (true, Some(queue), LockInfo::Sequence(Some(value))) =
            (record.rollback, self.rolled_back.as_mut(), &record.info)
        {
            debug!(resource = %self.name, value, "sequence value rolled back");
            queue.push_back(*value);
        }
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

    #[test]
    fn test_values_wrap_without_zero() {
        let mut resource = SequenceResource::new("_s_wrap", 1, false);
        resource.next_value = u32::MAX;
        assert_eq!(resource.take_value(), u32::MAX);
        assert_eq!(resource.take_value(), 1);
    }

    #[test]
    fn test_rolled_back_values_come_first() {
        let mut resource = SequenceResource::new("_S_tx", 5, true);
        assert_eq!(resource.take_value(), 1);
        assert_eq!(resource.take_value(), 2);
        resource.rolled_back.as_mut().unwrap().extend([2, 1]);
        assert_eq!(resource.take_value(), 2);
        assert_eq!(resource.take_value(), 1);
        assert_eq!(resource.take_value(), 3);
    }
}
