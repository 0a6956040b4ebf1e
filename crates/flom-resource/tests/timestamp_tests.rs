//! Timestamp resource behaviour, driven by a manual clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::mock_sink::{ManualClock, RecordingSink};
use flom_core::prelude::*;
use flom_resource::{MessageOutcome, RegistryConfig, ResourceRegistry, ResourceSpec, ResourceState};

fn utc_config() -> RegistryConfig {
    RegistryConfig::builder().timestamp_utc(true).build().unwrap()
}

fn stamp(name: &str, clock: &Arc<ManualClock>) -> ResourceState {
    let spec = ResourceSpec::parse(name, "/").unwrap();
    ResourceState::new(&spec, &utc_config(), clock.clone()).unwrap()
}

fn lock(state: &mut ResourceState, sink: &RecordingSink, conn: u64, wait: bool) -> MessageOutcome {
    let name = state.name().to_string();
    state
        .handle_message(&LockSpec::new(name).wait(wait).into(), ConnectionId(conn), sink)
        .unwrap()
}

fn unlock(state: &mut ResourceState, sink: &RecordingSink, conn: u64) -> MessageOutcome {
    let name = state.name().to_string();
    state
        .handle_message(&UnlockSpec::new(name).into(), ConnectionId(conn), sink)
        .unwrap()
}

#[test]
fn test_formats_second_resolution_in_utc() {
    let sink = RecordingSink::new();
    let clock = ManualClock::at(1_000_000_000, 0);
    let mut state = stamp("_t_%Y-%m-%dT%H:%M:%S", &clock);

    let answer = lock(&mut state, &sink, 1, true).answer.unwrap();
    assert_eq!(answer.element.as_deref(), Some("2001-09-09T01:46:40"));
}

#[test]
fn test_no_two_grants_share_a_bucket() {
    let sink = RecordingSink::new();
    let clock = ManualClock::at(100, 123_456);
    let mut state = stamp("_t_%s#fff[5]", &clock);

    let first = lock(&mut state, &sink, 1, false).answer.unwrap();
    assert_eq!(first.element.as_deref(), Some("100.123"));

    clock.advance(Duration::from_micros(500));
    let busy = lock(&mut state, &sink, 2, false).answer.unwrap();
    assert_eq!(busy.status, AnswerStatus::LockBusy);

    clock.advance(Duration::from_micros(500));
    let second = lock(&mut state, &sink, 2, false).answer.unwrap();
    assert_eq!(second.element.as_deref(), Some("100.124"));

    clock.set(Timeval::new(101, 0));
    let third = lock(&mut state, &sink, 3, false).answer.unwrap();
    assert_eq!(third.element.as_deref(), Some("101.000"));
}

#[test]
fn test_waiter_is_served_by_the_timer() {
    let sink = RecordingSink::new();
    let clock = ManualClock::at(100, 500_400);
    let mut state = stamp("_t_%s#fff[2]", &clock);

    assert!(lock(&mut state, &sink, 1, true).answer.unwrap().is_granted());
    let queued = lock(&mut state, &sink, 2, true);
    assert_eq!(queued.answer.unwrap().status, AnswerStatus::LockEnqueued);
    assert_eq!(queued.next_deadline, Some(Timeval::new(100, 501_000)));

    let early = state.on_timeout(Timeval::new(100, 500_900), &sink);
    assert_eq!(early, Some(Timeval::new(100, 501_000)));
    assert!(sink.is_empty());

    let due = state.on_timeout(Timeval::new(100, 501_000), &sink);
    assert_eq!(due, None);
    assert_eq!(
        sink.take(),
        vec![(ConnectionId(2), LockAnswer::deferred(Some("100.501".into())))]
    );
}

#[test]
fn test_unlock_reports_deadline_while_waiters_remain() {
    let sink = RecordingSink::new();
    let clock = ManualClock::at(60, 0);
    let mut state = stamp("_t_%H:%M[1]", &clock);

    assert!(lock(&mut state, &sink, 1, true).answer.unwrap().is_granted());
    assert_eq!(
        lock(&mut state, &sink, 2, true).answer.unwrap().status,
        AnswerStatus::LockEnqueued
    );

    clock.advance(Duration::from_secs(30));
    let outcome = unlock(&mut state, &sink, 1);
    assert!(outcome.answer.is_none());
    assert_eq!(outcome.next_deadline, Some(Timeval::new(120, 0)));
    assert!(sink.is_empty());

    assert_eq!(state.on_timeout(Timeval::new(120, 0), &sink), None);
    assert_eq!(sink.recipients(), vec![ConnectionId(2)]);
}

#[test]
fn test_invalid_formats_are_rejected() {
    let clock = ManualClock::at(0, 0);
    for name in ["_t_%Y-%m-%d", "_t_%Q%S"] {
        let spec = ResourceSpec::parse(name, "/").unwrap();
        let err = ResourceState::new(&spec, &utc_config(), clock.clone()).unwrap_err();
        assert!(matches!(err, FlomError::InvalidTimestampFormat(_)), "{name}");
    }
}

#[test]
fn test_recreated_resource_does_not_repeat_a_bucket() {
    let sink = RecordingSink::new();
    let clock = ManualClock::at(500, 0);
    let mut registry = ResourceRegistry::with_clock(utc_config(), clock.clone()).unwrap();
    let name = "_t_%s";

    let first = registry
        .handle_message(&LockSpec::new(name).into(), ConnectionId(1), &sink)
        .unwrap();
    assert_eq!(first.answer.unwrap().element.as_deref(), Some("500"));
    registry
        .handle_message(&UnlockSpec::new(name).into(), ConnectionId(1), &sink)
        .unwrap();
    assert!(registry.is_idle());

    let again = registry
        .handle_message(&LockSpec::new(name).wait(false).into(), ConnectionId(2), &sink)
        .unwrap();
    assert_eq!(again.answer.unwrap().status, AnswerStatus::LockBusy);

    clock.advance(Duration::from_secs(1));
    let later = registry
        .handle_message(&LockSpec::new(name).wait(false).into(), ConnectionId(2), &sink)
        .unwrap();
    assert_eq!(later.answer.unwrap().element.as_deref(), Some("501"));
}

#[test]
fn test_full_slots_need_no_timer() {
    let sink = RecordingSink::new();
    let clock = ManualClock::at(100, 0);
    let mut state = stamp("_t_%s[1]", &clock);

    assert!(lock(&mut state, &sink, 1, true).answer.unwrap().is_granted());
    clock.set(Timeval::new(200, 0));
    let queued = lock(&mut state, &sink, 2, true);
    assert_eq!(queued.answer.unwrap().status, AnswerStatus::LockEnqueued);
    assert_eq!(queued.next_deadline, None);

    for usec in 0..3 {
        assert_eq!(state.on_timeout(Timeval::new(200, usec), &sink), None);
    }
    assert!(sink.is_empty());

    let outcome = unlock(&mut state, &sink, 1);
    assert_eq!(outcome.next_deadline, None);
    assert_eq!(
        sink.take(),
        vec![(ConnectionId(2), LockAnswer::deferred(Some("200".into())))]
    );
}

#[test]
fn test_failed_grant_keeps_waiter_queued() {
    let sink = RecordingSink::new();
    let clock = ManualClock::at(100, 0);
    let mut state = stamp("_t_%s[1]", &clock);

    assert!(lock(&mut state, &sink, 1, true).answer.unwrap().is_granted());
    assert_eq!(
        lock(&mut state, &sink, 2, true).answer.unwrap().status,
        AnswerStatus::LockEnqueued
    );

    // far outside the range chrono can render
    clock.set(Timeval::new(i64::MAX / 2, 0));
    unlock(&mut state, &sink, 1);
    assert!(sink.is_empty());
    assert_eq!(state.waiters(), vec![ConnectionId(2)]);

    state.on_timeout(Timeval::new(101, 0), &sink);
    assert_eq!(
        sink.take(),
        vec![(ConnectionId(2), LockAnswer::deferred(Some("101".into())))]
    );
    assert!(state.holds(ConnectionId(2)));
}
