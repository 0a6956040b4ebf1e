//! Shared LOCK / UNLOCK / disconnect flows and the wait queue reactivator.
//!
//! Every resource variant implements [`Resource`]; the flows below are written
//! once against it so the variants only describe what differs: how a record is
//! built, when it can be granted, and what a grant or a release does.

use std::collections::VecDeque;

use tracing::{debug, error, warn};

use flom_core::error::{FlomError, FlomResult};
use flom_core::message::{AnswerStatus, LockAnswer, LockSpec, UnlockSpec};
use flom_core::traits::{AnswerSink, ConnectionId};

use crate::record::ConnectionLockRecord;

// ============================================================================
// Resource Trait
// ============================================================================

/// Operations every resource variant provides to the shared flows.
pub(crate) trait Resource {
    /// Canonical name of the resource.
    fn name(&self) -> &str;

    fn waiters(&self) -> &VecDeque<ConnectionLockRecord>;

    fn waiters_mut(&mut self) -> &mut VecDeque<ConnectionLockRecord>;

    /// Builds the record a LOCK request would be stored as.
    fn new_record(
        &self,
        spec: &LockSpec,
        connection: ConnectionId,
    ) -> FlomResult<ConnectionLockRecord>;

    /// Can `record` be granted right now?
    fn can_lock(&self, record: &ConnectionLockRecord) -> bool;

    /// Can `record` never be granted, whatever is released?
    fn is_impossible(&self, _record: &ConnectionLockRecord) -> bool {
        false
    }

    /// Moves `record` into the holders and returns the generated value, if
    /// any. Callers check [`Resource::can_lock`] first.
    fn grant(&mut self, record: ConnectionLockRecord) -> FlomResult<Option<String>>;

    /// Removes the holder record of `connection`.
    ///
    /// `rollback` carries the UNLOCK flag; `None` keeps the record's default.
    fn release(
        &mut self,
        connection: ConnectionId,
        rollback: Option<bool>,
    ) -> Option<ConnectionLockRecord>;

    fn holds(&self, connection: ConnectionId) -> bool;

    fn has_holders(&self) -> bool;

    /// Does `name` designate this resource? Hierarchical resources also adopt
    /// the path as their current name.
    fn accept_name(&mut self, name: &str) -> bool {
        self.name() == name
    }

    /// Housekeeping after any removal.
    fn after_release(&mut self) {}
}

// ============================================================================
// Flows
// ============================================================================

/// Handles a LOCK request.
pub(crate) fn lock<R: Resource + ?Sized>(
    resource: &mut R,
    spec: &LockSpec,
    connection: ConnectionId,
) -> FlomResult<LockAnswer> {
    if resource.holds(connection) || is_waiting(resource, connection) {
        return Err(FlomError::Protocol(format!(
            "{connection} already holds or waits for '{}'",
            resource.name()
        )));
    }

    let record = resource.new_record(spec, connection)?;

    if resource.is_impossible(&record) {
        debug!(resource = resource.name(), %connection, "lock impossible");
        return Ok(LockAnswer::immediate(AnswerStatus::LockImpossible));
    }

    if resource.can_lock(&record) {
        let element = resource.grant(record)?;
        debug!(resource = resource.name(), %connection, ?element, "lock granted");
        return Ok(LockAnswer::granted(element));
    }

    if spec.wait {
        resource.waiters_mut().push_back(record);
        debug!(resource = resource.name(), %connection, "lock enqueued");
        Ok(LockAnswer::immediate(AnswerStatus::LockEnqueued))
    } else {
        debug!(resource = resource.name(), %connection, "lock busy");
        Ok(LockAnswer::immediate(AnswerStatus::LockBusy))
    }
}

/// Handles an UNLOCK request. Holders are released and the waiters rescanned;
/// waiters are just dropped from the queue.
pub(crate) fn unlock<R: Resource + ?Sized>(
    resource: &mut R,
    spec: &UnlockSpec,
    connection: ConnectionId,
    sink: &dyn AnswerSink,
) -> FlomResult<()> {
    if !resource.accept_name(&spec.name) {
        warn!(
            resource = resource.name(),
            requested = %spec.name,
            %connection,
            "unlock name does not match resource"
        );
        return Err(FlomError::InvalidResourceName(format!(
            "'{}' does not match resource '{}'",
            spec.name,
            resource.name()
        )));
    }

    release_connection(resource, connection, Some(spec.rollback), sink);
    Ok(())
}

/// Removes every trace of `connection`; calling it twice is harmless.
pub(crate) fn disconnect<R: Resource + ?Sized>(
    resource: &mut R,
    connection: ConnectionId,
    sink: &dyn AnswerSink,
) {
    release_connection(resource, connection, None, sink);
}

fn release_connection<R: Resource + ?Sized>(
    resource: &mut R,
    connection: ConnectionId,
    rollback: Option<bool>,
    sink: &dyn AnswerSink,
) {
    if resource.release(connection, rollback).is_some() {
        debug!(resource = resource.name(), %connection, "holder released");
        reactivate(resource, sink);
    } else if remove_waiter(resource, connection) {
        debug!(resource = resource.name(), %connection, "waiter removed");
    } else {
        debug!(resource = resource.name(), %connection, "nothing to release");
    }
    resource.after_release();
}

// ============================================================================
// Reactivation
// ============================================================================

/// Grants every waiter that has become satisfiable and pushes the grant to
/// its connection. Returns the number of promoted waiters.
///
/// The whole queue is scanned: a blocked waiter does not stop later, smaller
/// requests from being granted.
pub(crate) fn reactivate<R: Resource + ?Sized>(resource: &mut R, sink: &dyn AnswerSink) -> usize {
    let mut promoted = 0;
    let mut index = 0;

    while index < resource.waiters().len() {
        if !resource.can_lock(&resource.waiters()[index]) {
            index += 1;
            continue;
        }

        let removed = resource.waiters_mut().remove(index);
        debug_assert!(removed.is_some(), "waiter {index} vanished before removal");
        let Some(record) = removed else {
            let err = FlomError::Internal(format!(
                "waiter {index} of '{}' vanished between check and removal",
                resource.name()
            ));
            error!(%err, "reactivation aborted");
            break;
        };

        let connection = record.connection;
        match resource.grant(record.clone()) {
            Ok(element) => {
                promoted += 1;
                debug!(resource = resource.name(), %connection, ?element, "waiter promoted");
                if let Err(err) = sink.deliver(connection, LockAnswer::deferred(element)) {
                    warn!(%err, "grant not delivered");
                }
            }
            Err(err) => {
                error!(resource = resource.name(), %connection, %err, "waiter promotion failed");
                // keeps its place in the queue
                resource.waiters_mut().insert(index, record);
                index += 1;
            }
        }
    }

    promoted
}

fn is_waiting<R: Resource + ?Sized>(resource: &R, connection: ConnectionId) -> bool {
    resource
        .waiters()
        .iter()
        .any(|waiter| waiter.connection == connection)
}

fn remove_waiter<R: Resource + ?Sized>(resource: &mut R, connection: ConnectionId) -> bool {
    let waiters = resource.waiters_mut();
    match waiters.iter().position(|w| w.connection == connection) {
        Some(position) => waiters.remove(position).is_some(),
        None => false,
    }
}
