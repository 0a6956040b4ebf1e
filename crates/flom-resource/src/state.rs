//! The closed set of resource kinds and their entry points.

use std::sync::Arc;

use tracing::{debug, instrument};

use flom_core::error::{FlomError, FlomResult};
use flom_core::message::{AnswerStatus, LockAnswer, LockRequest};
use flom_core::timeout::{Deadline, Timeval};
use flom_core::traits::{AnswerSink, Clock, ConnectionId};

use crate::config::RegistryConfig;
use crate::hier::HierResource;
use crate::name::{ResourceKind, ResourceSpec};
use crate::numeric::NumericResource;
use crate::reactivate::{self, Resource};
use crate::sequence::SequenceResource;
use crate::set::SetResource;
use crate::simple::SimpleResource;
use crate::timestamp::TimestampResource;

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageOutcome {
    /// Reply for the requesting connection; UNLOCK has none.
    pub answer: Option<LockAnswer>,
    /// When the host must call [`ResourceState::on_timeout`].
    pub next_deadline: Option<Deadline>,
}

impl MessageOutcome {
    fn reply(answer: LockAnswer) -> Self {
        Self {
            answer: Some(answer),
            next_deadline: None,
        }
    }

    fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.next_deadline = deadline;
        self
    }
}

/// State of one lockable resource.
#[derive(Debug)]
pub enum ResourceState {
    Simple(SimpleResource),
    Numeric(NumericResource),
    Hierarchical(HierResource),
    Sequence(SequenceResource),
    Timestamp(TimestampResource),
    Set(SetResource),
}

impl ResourceState {
    /// Builds an empty resource for `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`FlomError::InvalidResourceName`] or
    /// [`FlomError::InvalidTimestampFormat`] when the name cannot describe a
    /// resource of its kind.
    pub fn new(
        spec: &ResourceSpec,
        config: &RegistryConfig,
        clock: Arc<dyn Clock>,
    ) -> FlomResult<Self> {
        let quantity = || {
            spec.total_quantity.ok_or_else(|| {
                FlomError::InvalidResourceName(format!("'{}' has no quantity", spec.name))
            })
        };
        let infix = || {
            spec.infix.clone().ok_or_else(|| {
                FlomError::InvalidResourceName(format!("'{}' has no infix", spec.name))
            })
        };

        let state = match spec.kind {
            ResourceKind::Simple => ResourceState::Simple(SimpleResource::new(&spec.name)),
            ResourceKind::Numeric => {
                ResourceState::Numeric(NumericResource::new(&spec.name, quantity()?))
            }
            ResourceKind::Hierarchical => ResourceState::Hierarchical(HierResource::new(
                &spec.name,
                &config.path_separator,
            )?),
            ResourceKind::Sequence => ResourceState::Sequence(SequenceResource::new(
                &spec.name,
                quantity()?,
                spec.transactional,
            )),
            ResourceKind::Timestamp => ResourceState::Timestamp(TimestampResource::new(
                &spec.name,
                infix()?,
                quantity()?,
                config.timestamp_utc,
                clock,
            )?),
            ResourceKind::Set => {
                ResourceState::Set(SetResource::new(&spec.name, spec.set_elements())?)
            }
        };
        debug!(resource = %spec.name, kind = %spec.kind, "resource created");
        Ok(state)
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceState::Simple(_) => ResourceKind::Simple,
            ResourceState::Numeric(_) => ResourceKind::Numeric,
            ResourceState::Hierarchical(_) => ResourceKind::Hierarchical,
            ResourceState::Sequence(_) => ResourceKind::Sequence,
            ResourceState::Timestamp(_) => ResourceKind::Timestamp,
            ResourceState::Set(_) => ResourceKind::Set,
        }
    }

    /// Current name; a hierarchical resource reports the last unlocked path.
    pub fn name(&self) -> &str {
        self.resource().name()
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Handles a LOCK or UNLOCK from `connection`.
    ///
    /// Waiters promoted by an UNLOCK receive their grant through `sink`.
    ///
    /// # Errors
    ///
    /// - [`FlomError::Protocol`] if `connection` already holds or waits for
    ///   this resource and sends another LOCK.
    /// - [`FlomError::InvalidResourceName`] if an UNLOCK names another
    ///   resource.
    #[instrument(skip(self, request, sink), fields(resource.name = %self.name(), resource.kind = %self.kind()))]
    pub fn handle_message(
        &mut self,
        request: &LockRequest,
        connection: ConnectionId,
        sink: &dyn AnswerSink,
    ) -> FlomResult<MessageOutcome> {
        if let ResourceState::Timestamp(ts) = self {
            ts.observe_clock();
        }

        match request {
            LockRequest::Lock(spec) => {
                let answer = reactivate::lock(self.resource_mut(), spec, connection)?;
                let deadline = if answer.status == AnswerStatus::LockEnqueued {
                    self.pending_deadline()
                } else {
                    None
                };
                Ok(MessageOutcome::reply(answer).with_deadline(deadline))
            }
            LockRequest::Unlock(spec) => {
                reactivate::unlock(self.resource_mut(), spec, connection, sink)?;
                Ok(MessageOutcome::default().with_deadline(self.pending_deadline()))
            }
        }
    }

    /// Drops everything `connection` holds or waits for, then promotes the
    /// waiters that became satisfiable. Calling it again is a no-op.
    #[instrument(skip(self, sink), fields(resource.name = %self.name()))]
    pub fn on_disconnect(&mut self, connection: ConnectionId, sink: &dyn AnswerSink) {
        if let ResourceState::Timestamp(ts) = self {
            ts.observe_clock();
        }
        reactivate::disconnect(self.resource_mut(), connection, sink);
    }

    /// Timer callback. Only timestamp resources react: waiters that fit in
    /// the current interval are promoted and the next deadline is returned
    /// while any remain and a slot is free.
    #[instrument(skip(self, sink), fields(resource.name = %self.name()))]
    pub fn on_timeout(&mut self, now: Timeval, sink: &dyn AnswerSink) -> Option<Deadline> {
        let ResourceState::Timestamp(ts) = self else {
            return None;
        };
        if ts.waiters().is_empty() {
            return None;
        }
        ts.observe(now);
        let promoted = reactivate::reactivate(ts, sink);
        debug!(promoted, "timer reactivation");
        self.pending_deadline()
    }

    /// Removes all holders and waiters without notifying anyone.
    pub fn flush(&mut self) {
        match self {
            ResourceState::Simple(r) => r.clear(),
            ResourceState::Numeric(r) => r.clear(),
            ResourceState::Hierarchical(r) => r.clear(),
            ResourceState::Sequence(r) => r.clear(),
            ResourceState::Timestamp(r) => r.clear(),
            ResourceState::Set(r) => r.clear(),
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// No holders and no waiters.
    pub fn is_idle(&self) -> bool {
        let resource = self.resource();
        !resource.has_holders() && resource.waiters().is_empty()
    }

    pub fn holds(&self, connection: ConnectionId) -> bool {
        self.resource().holds(connection)
    }

    pub fn is_waiting(&self, connection: ConnectionId) -> bool {
        self.resource()
            .waiters()
            .iter()
            .any(|w| w.connection == connection)
    }

    /// Waiting connections, oldest first.
    pub fn waiters(&self) -> Vec<ConnectionId> {
        self.resource()
            .waiters()
            .iter()
            .map(|w| w.connection)
            .collect()
    }

    pub fn as_numeric(&self) -> Option<&NumericResource> {
        match self {
            ResourceState::Numeric(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_hierarchical(&self) -> Option<&HierResource> {
        match self {
            ResourceState::Hierarchical(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceResource> {
        match self {
            ResourceState::Sequence(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&TimestampResource> {
        match self {
            ResourceState::Timestamp(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&SetResource> {
        match self {
            ResourceState::Set(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_simple(&self) -> Option<&SimpleResource> {
        match self {
            ResourceState::Simple(r) => Some(r),
            _ => None,
        }
    }

    /// Next timer deadline of a timestamp resource. With every slot taken
    /// only a release can serve a waiter, so no timer is needed.
    fn pending_deadline(&self) -> Option<Deadline> {
        match self {
            ResourceState::Timestamp(ts) if !ts.waiters().is_empty() && ts.has_free_slot() => {
                Some(ts.next_deadline())
            }
            _ => None,
        }
    }

    fn resource(&self) -> &dyn Resource {
        match self {
            ResourceState::Simple(r) => r,
            ResourceState::Numeric(r) => r,
            ResourceState::Hierarchical(r) => r,
            ResourceState::Sequence(r) => r,
            ResourceState::Timestamp(r) => r,
            ResourceState::Set(r) => r,
        }
    }

    fn resource_mut(&mut self) -> &mut dyn Resource {
        match self {
            ResourceState::Simple(r) => r,
            ResourceState::Numeric(r) => r,
            ResourceState::Hierarchical(r) => r,
            ResourceState::Sequence(r) => r,
            ResourceState::Timestamp(r) => r,
            ResourceState::Set(r) => r,
        }
    }
}
