//! Recording sink and manual clock for driving the engine in tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flom_core::error::{FlomError, FlomResult};
use flom_core::message::LockAnswer;
use flom_core::timeout::Timeval;
use flom_core::traits::{AnswerSink, Clock, ConnectionId};

/// Sink that keeps every delivered answer in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(ConnectionId, LockAnswer)>>,
    unreachable: Mutex<HashSet<ConnectionId>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes deliveries to `connection` fail.
    pub fn cut(&self, connection: ConnectionId) {
        self.unreachable.lock().unwrap().insert(connection);
    }

    /// Drains and returns everything delivered so far.
    pub fn take(&self) -> Vec<(ConnectionId, LockAnswer)> {
        std::mem::take(&mut *self.delivered.lock().unwrap())
    }

    /// Connections that received something, in delivery order.
    pub fn recipients(&self) -> Vec<ConnectionId> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(connection, _)| *connection)
            .collect()
    }

    pub fn answers_for(&self, connection: ConnectionId) -> Vec<LockAnswer> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == connection)
            .map(|(_, answer)| answer.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.lock().unwrap().is_empty()
    }
}

impl AnswerSink for RecordingSink {
    fn deliver(&self, connection: ConnectionId, answer: LockAnswer) -> FlomResult<()> {
        if self.unreachable.lock().unwrap().contains(&connection) {
            return Err(FlomError::Delivery {
                connection,
                reason: "connection cut by test".to_string(),
            });
        }
        self.delivered.lock().unwrap().push((connection, answer));
        Ok(())
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<Timeval>,
}

impl ManualClock {
    pub fn at(sec: i64, usec: i64) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Timeval::new(sec, usec)),
        })
    }

    pub fn set(&self, now: Timeval) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = now.plus(by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timeval {
        *self.now.lock().unwrap()
    }
}
