//! Channel backed answer sink.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::error::{FlomError, FlomResult};
use crate::message::LockAnswer;
use crate::traits::{AnswerSink, ConnectionId};

/// [`AnswerSink`] that forwards answers to per-connection unbounded channels.
///
/// A tokio transport registers one channel per accepted connection and drains
/// the receiving half from the connection task. Sending never blocks; if the
/// connection task has gone away the delivery fails and the engine logs it.
#[derive(Debug, Default)]
pub struct ChannelSink {
    senders: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<LockAnswer>>>,
}

impl ChannelSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `connection` and returns the receiver for its answers.
    ///
    /// Registering the same connection twice replaces the previous channel.
    pub fn register(&self, connection: ConnectionId) -> mpsc::UnboundedReceiver<LockAnswer> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_senders().insert(connection, tx);
        rx
    }

    /// Forgets `connection`; later deliveries to it fail.
    pub fn unregister(&self, connection: ConnectionId) -> bool {
        self.lock_senders().remove(&connection).is_some()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.lock_senders().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_senders(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, mpsc::UnboundedSender<LockAnswer>>> {
        // A poisoned map is still structurally valid.
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AnswerSink for ChannelSink {
    #[instrument(skip(self, answer), fields(status = ?answer.status))]
    fn deliver(&self, connection: ConnectionId, answer: LockAnswer) -> FlomResult<()> {
        let senders = self.lock_senders();
        let sender = senders.get(&connection).ok_or_else(|| FlomError::Delivery {
            connection,
            reason: "connection is not registered".to_string(),
        })?;
        sender.send(answer).map_err(|_| FlomError::Delivery {
            connection,
            reason: "connection channel is closed".to_string(),
        })?;
        debug!(%connection, "answer queued for delivery");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::AnswerStatus;

    #[tokio::test]
    async fn test_deliver_to_registered_connection() {
        let sink = ChannelSink::new();
        let mut rx = sink.register(ConnectionId(7));

        sink.deliver(ConnectionId(7), LockAnswer::deferred(Some("3".into())))
            .unwrap();

        let answer = rx.recv().await.unwrap();
        assert_eq!(answer.status, AnswerStatus::Ok);
        assert_eq!(answer.element.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_deliver_to_unknown_or_closed_connection_fails() {
        let sink = ChannelSink::new();
        let err = sink
            .deliver(ConnectionId(1), LockAnswer::deferred(None))
            .unwrap_err();
        assert!(matches!(err, FlomError::Delivery { .. }));

        let rx = sink.register(ConnectionId(2));
        drop(rx);
        assert!(sink.deliver(ConnectionId(2), LockAnswer::deferred(None)).is_err());

        assert!(sink.unregister(ConnectionId(2)));
        assert!(sink.is_empty());
    }
}
