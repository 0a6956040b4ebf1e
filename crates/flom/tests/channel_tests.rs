//! End to end flows through the channel sink.

use flom::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_waiter_receives_deferred_grant() {
    init_tracing();
    let sink = ChannelSink::new();
    let mut first = sink.register(ConnectionId(1));
    let mut second = sink.register(ConnectionId(2));
    let mut registry = ResourceRegistry::new(RegistryConfig::default()).unwrap();

    let granted = registry
        .handle_message(&LockSpec::new("_S_order[1]").into(), ConnectionId(1), &sink)
        .unwrap();
    assert_eq!(granted.answer.unwrap().element.as_deref(), Some("1"));

    let queued = registry
        .handle_message(&LockSpec::new("_S_order[1]").into(), ConnectionId(2), &sink)
        .unwrap();
    assert_eq!(queued.answer.unwrap().status, AnswerStatus::LockEnqueued);

    registry
        .handle_message(
            &UnlockSpec::new("_S_order[1]").rollback(true).into(),
            ConnectionId(1),
            &sink,
        )
        .unwrap();

    let deferred = second.recv().await.unwrap();
    assert_eq!(deferred.kind, AnswerKind::Deferred);
    assert_eq!(deferred.element.as_deref(), Some("1"));
    assert!(first.try_recv().is_err());
}

#[tokio::test]
async fn test_connection_tasks_share_registry() {
    init_tracing();
    let sink = std::sync::Arc::new(ChannelSink::new());
    let registry = std::sync::Arc::new(tokio::sync::Mutex::new(
        ResourceRegistry::new(RegistryConfig::default()).unwrap(),
    ));

    let mut receivers = Vec::new();
    for id in 0..4u64 {
        receivers.push(sink.register(ConnectionId(id)));
    }

    let mut immediate = Vec::new();
    for id in 0..4u64 {
        let mut registry = registry.lock().await;
        let outcome = registry
            .handle_message(&LockSpec::new("pool[2]").into(), ConnectionId(id), sink.as_ref())
            .unwrap();
        immediate.push(outcome.answer.unwrap().status);
    }
    assert_eq!(
        immediate,
        vec![
            AnswerStatus::Ok,
            AnswerStatus::Ok,
            AnswerStatus::LockEnqueued,
            AnswerStatus::LockEnqueued,
        ]
    );

    let tasks: Vec<_> = (0..2u64)
        .map(|id| {
            let registry = registry.clone();
            let sink = sink.clone();
            tokio::spawn(async move {
                registry
                    .lock()
                    .await
                    .on_disconnect(ConnectionId(id), sink.as_ref());
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    for receiver in receivers.iter_mut().skip(2) {
        let answer = receiver.recv().await.unwrap();
        assert!(answer.is_granted());
        assert_eq!(answer.kind, AnswerKind::Deferred);
    }
    assert_eq!(registry.lock().await.len(), 1);
}

#[test]
fn test_config_from_toml_drives_separator() {
    let config = RegistryConfig::from_toml_str("path_separator = \"::\"\n").unwrap();
    let sink = ChannelSink::new();
    let _rx = sink.register(ConnectionId(1));
    let mut registry = ResourceRegistry::new(config).unwrap();

    registry
        .handle_message(&LockSpec::new("::a::b").into(), ConnectionId(1), &sink)
        .unwrap();
    let state = registry.get("::a").unwrap();
    assert_eq!(state.kind(), ResourceKind::Hierarchical);
    assert!(state.as_hierarchical().unwrap().has_node("::a::b"));
}
