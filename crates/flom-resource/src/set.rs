//! Set resource: a pool of named elements, each held by at most one
//! connection.

use std::collections::VecDeque;

use flom_core::error::{FlomError, FlomResult};
use flom_core::message::LockSpec;
use flom_core::traits::ConnectionId;

use crate::reactivate::Resource;
use crate::record::{ConnectionLockRecord, LockInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SetElement {
    name: String,
    holder: Option<ConnectionId>,
}

/// Named elements handed out round robin.
///
/// The search for a free element starts at `index`, which advances by one
/// after every grant whichever element was picked.
#[derive(Debug)]
pub struct SetResource {
    name: String,
    elements: Vec<SetElement>,
    index: usize,
    holders: Vec<ConnectionLockRecord>,
    waiters: VecDeque<ConnectionLockRecord>,
}

impl SetResource {
    pub fn new(name: impl Into<String>, elements: Vec<String>) -> FlomResult<Self> {
        let name = name.into();
        if elements.is_empty() {
            return Err(FlomError::InvalidResourceName(format!(
                "set '{name}' has no element"
            )));
        }
        Ok(Self {
            name,
            elements: elements
                .into_iter()
                .map(|name| SetElement { name, holder: None })
                .collect(),
            index: 0,
            holders: Vec::new(),
            waiters: VecDeque::new(),
        })
    }

    /// Element names in declaration order.
    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|e| e.name.as_str())
    }

    /// Element held by `connection`.
    pub fn held_element(&self, connection: ConnectionId) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| e.holder == Some(connection))
            .map(|e| e.name.as_str())
    }

    pub fn free_count(&self) -> usize {
        self.elements.iter().filter(|e| e.holder.is_none()).count()
    }

    pub(crate) fn clear(&mut self) {
        for element in &mut self.elements {
            element.holder = None;
        }
        self.holders.clear();
        self.waiters.clear();
        self.index = 0;
    }

    fn find_free(&self) -> Option<usize> {
        let len = self.elements.len();
        (0..len)
            .map(|offset| (self.index + offset) % len)
            .find(|&j| self.elements[j].holder.is_none())
    }
}

impl Resource for SetResource {
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
        Ok(ConnectionLockRecord::new(connection, LockInfo::Element(None)))
    }

    fn can_lock(&self, _record: &ConnectionLockRecord) -> bool {
        self.find_free().is_some()
    }

    fn grant(&mut self, mut record: ConnectionLockRecord) -> FlomResult<Option<String>> {
        let slot = self.find_free().ok_or_else(|| {
            FlomError::Internal(format!("set '{}' has no free element", self.name))
        })?;
        let element = &mut self.elements[slot];
        element.holder = Some(record.connection);
        let granted = element.name.clone();

        self.index = (self.index + 1) % self.elements.len();
        record.info = LockInfo::Element(Some(slot));
        self.holders.push(record);
        Ok(Some(granted))
    }

    fn release(
        &mut self,
        connection: ConnectionId,
        _rollback: Option<bool>,
    ) -> Option<ConnectionLockRecord> {
        let position = self.holders.iter().position(|h| h.connection == connection)?;
        let record = self.holders.remove(position);
        if let LockInfo::Element(Some(slot)) = record.info {
            if let Some(element) = self.elements.get_mut(slot) {
                element.holder = None;
            }
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
