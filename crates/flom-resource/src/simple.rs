//! Simple resource: one name, lock modes checked against every holder.

use std::collections::VecDeque;

use flom_core::error::FlomResult;
use flom_core::message::LockSpec;
use flom_core::mode::LockMode;
use flom_core::traits::ConnectionId;

use crate::reactivate::Resource;
use crate::record::{ConnectionLockRecord, LockInfo};

#[derive(Debug)]
pub struct SimpleResource {
    name: String,
    holders: Vec<ConnectionLockRecord>,
    waiters: VecDeque<ConnectionLockRecord>,
}

impl SimpleResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            holders: Vec::new(),
            waiters: VecDeque::new(),
        }
    }

    pub fn holders(&self) -> &[ConnectionLockRecord] {
        &self.holders
    }

    /// Mode held by `connection`, if it holds the resource.
    pub fn held_mode(&self, connection: ConnectionId) -> Option<LockMode> {
        self.holders
            .iter()
            .find(|h| h.connection == connection)
            .and_then(ConnectionLockRecord::mode)
    }

    pub(crate) fn clear(&mut self) {
        self.holders.clear();
        self.waiters.clear();
    }
}

impl Resource for SimpleResource {
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
        Ok(ConnectionLockRecord::new(connection, LockInfo::Mode(spec.mode)))
    }

    fn can_lock(&self, record: &ConnectionLockRecord) -> bool {
        let Some(requested) = record.mode() else {
            return false;
        };
        self.holders
            .iter()
            .filter_map(ConnectionLockRecord::mode)
            .all(|held| requested.is_compatible_with(held))
    }

    fn grant(&mut self, record: ConnectionLockRecord) -> FlomResult<Option<String>> {
        self.holders.push(record);
        Ok(None)
    }

    fn release(
        &mut self,
        connection: ConnectionId,
        _rollback: Option<bool>,
    ) -> Option<ConnectionLockRecord> {
        let position = self.holders.iter().position(|h| h.connection == connection)?;
        Some(self.holders.remove(position))
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
    fn test_shared_modes_coexist() {
        let mut resource = SimpleResource::new("printer");
        let read = LockSpec::new("printer").mode(LockMode::ProtectedRead);

        let a = lock(&mut resource, &read, ConnectionId(1)).unwrap();
        let b = lock(&mut resource, &read, ConnectionId(2)).unwrap();
        assert!(a.is_granted());
        assert!(b.is_granted());
        assert_eq!(resource.holders().len(), 2);

        let write = LockSpec::new("printer").wait(false);
        let c = lock(&mut resource, &write, ConnectionId(3)).unwrap();
        assert_eq!(c.status, AnswerStatus::LockBusy);
        assert_eq!(resource.held_mode(ConnectionId(1)), Some(LockMode::ProtectedRead));
    }
}
