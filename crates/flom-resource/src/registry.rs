//! Registry of live resources and the connections bound to them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use flom_core::error::{FlomError, FlomResult};
use flom_core::message::LockRequest;
use flom_core::timeout::{Deadline, Timeval};
use flom_core::traits::{AnswerSink, Clock, ConnectionId, SystemClock};

use crate::config::RegistryConfig;
use crate::name::{split_path, ResourceSpec};
use crate::state::{MessageOutcome, ResourceState};

/// Owns every [`ResourceState`] of one lock manager.
///
/// Resources are created on first reference and, unless configured
/// otherwise, destroyed as soon as they have neither holders nor waiters.
/// Hierarchical names are stored under their root segment so `/a/b` and
/// `/a/c` share one tree.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = ResourceRegistry::new(RegistryConfig::default())?;
/// let outcome = registry.handle_message(
///     &LockSpec::new("pool[3]").quantity(2).into(),
///     ConnectionId(1),
///     &sink,
/// )?;
/// assert!(outcome.answer.unwrap().is_granted());
/// ```
pub struct ResourceRegistry {
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    resources: HashMap<String, ResourceState>,
    bindings: HashMap<ConnectionId, String>,
    /// Last value issued by reclaimed timestamp resources, with the start of
    /// the following bucket. Entries expire once the clock reaches it.
    retired_timestamps: HashMap<String, (Timeval, Deadline)>,
}

impl ResourceRegistry {
    /// Creates an empty registry reading time from the system clock.
    pub fn new(config: RegistryConfig) -> FlomResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty registry reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`FlomError::Config`] if `config` does not validate.
    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> FlomResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            resources: HashMap::new(),
            bindings: HashMap::new(),
            retired_timestamps: HashMap::new(),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the resource for `spec`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Construction errors of [`ResourceState::new`]; nothing is stored then.
    pub fn create(&mut self, spec: &ResourceSpec) -> FlomResult<&mut ResourceState> {
        let key = spec.registry_key(&self.config.path_separator);
        if !self.resources.contains_key(&key) {
            let mut state = ResourceState::new(spec, &self.config, Arc::clone(&self.clock))?;
            if let (ResourceState::Timestamp(ts), Some((last, _))) =
                (&mut state, self.retired_timestamps.remove(&key))
            {
                ts.resume_after(last);
            }
            self.resources.insert(key.clone(), state);
        }
        self.resources
            .get_mut(&key)
            .ok_or_else(|| FlomError::Internal(format!("resource '{key}' vanished after insert")))
    }

    /// Looks a resource up by name; any path of a hierarchical resource finds it.
    pub fn get(&self, name: &str) -> Option<&ResourceState> {
        self.resources.get(&self.key_for(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ResourceState> {
        let key = self.key_for(name);
        self.resources.get_mut(&key)
    }

    /// Destroys a resource, dropping its holders and waiters without
    /// notifying them. Returns whether it existed.
    #[instrument(skip(self))]
    pub fn destroy(&mut self, name: &str) -> bool {
        let key = self.key_for(name);
        let Some(mut state) = self.resources.remove(&key) else {
            return false;
        };
        state.flush();
        self.retire(&key, &state);
        self.bindings.retain(|_, bound| *bound != key);
        debug!(resource = %key, "resource destroyed");
        true
    }

    /// Routes a request to its resource.
    ///
    /// LOCK creates the resource if needed and binds `connection` to it;
    /// UNLOCK goes to the resource the connection is bound to.
    ///
    /// # Errors
    ///
    /// - [`FlomError::InvalidResourceName`] for a malformed name.
    /// - [`FlomError::Protocol`] for a LOCK from a connection bound to another
    ///   resource, or an UNLOCK from an unbound one.
    /// - Anything [`ResourceState::handle_message`] returns.
    #[instrument(skip(self, request, sink), fields(resource.name = %request.resource_name()))]
    pub fn handle_message(
        &mut self,
        request: &LockRequest,
        connection: ConnectionId,
        sink: &dyn AnswerSink,
    ) -> FlomResult<MessageOutcome> {
        let key = match request {
            LockRequest::Lock(lock) => {
                let spec = ResourceSpec::parse(&lock.name, &self.config.path_separator)?;
                let key = spec.registry_key(&self.config.path_separator);
                if let Some(bound) = self.bindings.get(&connection).filter(|b| **b != key) {
                    return Err(FlomError::Protocol(format!(
                        "{connection} is bound to '{bound}' and cannot lock '{}'",
                        lock.name
                    )));
                }
                self.create(&spec)?;
                key
            }
            LockRequest::Unlock(unlock) => {
                self.bindings.get(&connection).cloned().ok_or_else(|| {
                    FlomError::Protocol(format!(
                        "{connection} holds nothing to unlock as '{}'",
                        unlock.name
                    ))
                })?
            }
        };

        let state = self
            .resources
            .get_mut(&key)
            .ok_or_else(|| FlomError::Internal(format!("no resource bound as '{key}'")))?;
        let result = state.handle_message(request, connection, sink);

        if state.holds(connection) || state.is_waiting(connection) {
            self.bindings.insert(connection, key.clone());
        } else {
            self.bindings.remove(&connection);
        }
        self.reclaim_if_idle(&key);
        result
    }

    /// Cleans up after a connection that went away. Safe to call for unknown
    /// or already cleaned connections.
    #[instrument(skip(self, sink))]
    pub fn on_disconnect(&mut self, connection: ConnectionId, sink: &dyn AnswerSink) {
        let Some(key) = self.bindings.remove(&connection) else {
            debug!("connection not bound to any resource");
            return;
        };
        match self.resources.get_mut(&key) {
            Some(state) => state.on_disconnect(connection, sink),
            None => warn!(resource = %key, "binding points to a missing resource"),
        }
        self.reclaim_if_idle(&key);
    }

    /// Forwards a timer tick to every resource and returns the earliest
    /// deadline any of them still needs.
    #[instrument(skip(self, sink))]
    pub fn on_timeout(&mut self, now: Timeval, sink: &dyn AnswerSink) -> Option<Deadline> {
        self.expire_retired(now);
        self.resources
            .values_mut()
            .filter_map(|state| state.on_timeout(now, sink))
            .min()
    }

    /// No resource is alive.
    pub fn is_idle(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Reclaimed timestamp resources whose last value is still remembered.
    pub fn retired_count(&self) -> usize {
        self.retired_timestamps.len()
    }

    /// Resource `connection` currently holds or waits for.
    pub fn binding(&self, connection: ConnectionId) -> Option<&str> {
        self.bindings.get(&connection).map(String::as_str)
    }

    fn key_for(&self, name: &str) -> String {
        let separator = &self.config.path_separator;
        match split_path(name, separator) {
            Ok(segments) => format!("{separator}{}", segments[0]),
            Err(_) => name.to_string(),
        }
    }

    fn reclaim_if_idle(&mut self, key: &str) {
        if !self.config.reclaim_idle {
            return;
        }
        if !self.resources.get(key).is_some_and(ResourceState::is_idle) {
            return;
        }
        if let Some(state) = self.resources.remove(key) {
            self.retire(key, &state);
            debug!(resource = %key, "idle resource reclaimed");
        }
    }

    fn retire(&mut self, key: &str, state: &ResourceState) {
        let now = self.clock.now();
        self.expire_retired(now);
        if let Some(ts) = state.as_timestamp() {
            let expires = ts.next_deadline();
            if expires > now {
                self.retired_timestamps
                    .insert(key.to_string(), (ts.last_timestamp(), expires));
            }
        }
    }

    /// Forgets retired values whose bucket has passed; a new resource under
    /// the same name cannot repeat them any more.
    fn expire_retired(&mut self, now: Timeval) {
        let before = self.retired_timestamps.len();
        self.retired_timestamps.retain(|_, (_, expires)| *expires > now);
        let expired = before - self.retired_timestamps.len();
        if expired > 0 {
            debug!(expired, "retired timestamps forgotten");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flom_core::message::{LockSpec, UnlockSpec};

    struct Discard;

    impl AnswerSink for Discard {
        fn deliver(&self, _connection: ConnectionId, _answer: flom_core::LockAnswer) -> FlomResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_hierarchical_paths_share_one_state() {
        let mut registry = ResourceRegistry::new(RegistryConfig::default()).unwrap();
        registry
            .handle_message(&LockSpec::new("/a/b").into(), ConnectionId(1), &Discard)
            .unwrap();
        registry
            .handle_message(&LockSpec::new("/a/c").into(), ConnectionId(2), &Discard)
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.binding(ConnectionId(2)), Some("/a"));
        assert!(registry.get("/a/zzz").is_some());
    }

    #[test]
    fn test_unlock_from_unbound_connection_is_a_protocol_error() {
        let mut registry = ResourceRegistry::new(RegistryConfig::default()).unwrap();
        let err = registry
            .handle_message(&UnlockSpec::new("printer").into(), ConnectionId(1), &Discard)
            .unwrap_err();
        assert!(matches!(err, FlomError::Protocol(_)));
    }

    #[test]
    fn test_idle_resources_are_kept_when_reclaim_is_off() {
        let config = RegistryConfig::builder().reclaim_idle(false).build().unwrap();
        let mut registry = ResourceRegistry::new(config).unwrap();
        registry
            .handle_message(&LockSpec::new("printer").into(), ConnectionId(1), &Discard)
            .unwrap();
        registry
            .handle_message(&UnlockSpec::new("printer").into(), ConnectionId(1), &Discard)
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("printer").unwrap().is_idle());
        assert!(registry.destroy("printer"));
        assert!(registry.is_idle());
    }
}
