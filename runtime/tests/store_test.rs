//! Integration tests for Store action processing, notices and recovery

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{TallyAction, TallyReducer, TallyState, WAIT, tally_store};
use mvi_core::{effect::Effect, fault::Fault, reducer::{Effects, Reducer}, smallvec};
use mvi_runtime::{Store, StoreConfig, StoreError};
use mvi_testing::helpers::{init_tracing, next_state_matching};
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

#[tokio::test]
async fn test_actions_apply_in_order() {
    init_tracing();
    let store = tally_store().await;
    let mut subscription = store.subscribe();

    for _ in 0..100 {
        store.send(TallyAction::Add(1)).unwrap();
    }

    let state = next_state_matching(&mut subscription, WAIT, |s| s.total() == 100).await;
    assert_eq!(state, Some(TallyState::Ready { total: 100 }));
    assert_eq!(store.state(TallyState::total), 100);
}

#[tokio::test]
async fn test_concurrent_senders_are_serialized() {
    let store = tally_store().await;
    let mut subscription = store.subscribe();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    store.send(TallyAction::Add(1)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let state = next_state_matching(&mut subscription, WAIT, |s| s.total() == 100).await;
    assert!(state.is_some(), "all 100 increments should be applied exactly once");
}

#[tokio::test]
async fn test_notice_follows_state_commit() {
    let store = tally_store().await;
    let mut notices = store.subscribe_notices();

    store.send(TallyAction::Add(2)).unwrap();

    let notice = tokio::time::timeout(WAIT, notices.recv()).await.unwrap().unwrap();
    assert_eq!(notice, "added 2");
    assert_eq!(store.state(TallyState::total), 2);
}

#[tokio::test]
async fn test_each_notice_delivered_once_to_each_subscriber() {
    let store = tally_store().await;
    let mut first = store.subscribe_notices();
    let mut second = store.subscribe_notices();

    store.send(TallyAction::Add(1)).unwrap();
    store.send(TallyAction::Add(2)).unwrap();

    for receiver in [&mut first, &mut second] {
        assert_eq!(receiver.recv().await.unwrap(), "added 1");
        assert_eq!(receiver.recv().await.unwrap(), "added 2");
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));
    }
}

#[tokio::test]
async fn test_notices_are_not_replayed() {
    let store = tally_store().await;
    let mut subscription = store.subscribe();

    store.send(TallyAction::Add(1)).unwrap();
    next_state_matching(&mut subscription, WAIT, |s| s.total() == 1).await.unwrap();

    let mut late = store.subscribe_notices();
    assert_eq!(late.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_silent_actions_emit_no_notice() {
    let store = tally_store().await;
    let mut notices = store.subscribe_notices();
    let mut subscription = store.subscribe();

    store.send(TallyAction::Tick).unwrap();
    next_state_matching(&mut subscription, WAIT, |s| s.total() == common::TICK_AMOUNT)
        .await
        .unwrap();

    assert_eq!(notices.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_fault_becomes_error_state() {
    let store = tally_store().await;
    let mut subscription = store.subscribe();

    store.send(TallyAction::Add(4)).unwrap();
    store.send(TallyAction::Boom).unwrap();

    let state = next_state_matching(&mut subscription, WAIT, |s| matches!(s, TallyState::Failed { .. })).await;
    assert_eq!(
        state,
        Some(TallyState::Failed {
            message: "boom".to_string(),
            total: 4,
        })
    );
}

#[tokio::test]
async fn test_reducer_panic_is_recovered() {
    let store = tally_store().await;
    let mut subscription = store.subscribe();

    store.send(TallyAction::Explode).unwrap();

    let state = next_state_matching(&mut subscription, WAIT, |s| matches!(s, TallyState::Failed { .. })).await;
    assert_eq!(
        state,
        Some(TallyState::Failed {
            message: "exploded".to_string(),
            total: 0,
        })
    );

    // The loop survived and keeps accepting actions
    store.send(TallyAction::Add(1)).unwrap();
    store.send(TallyAction::Boom).unwrap();
    store.shutdown(WAIT).await.unwrap();
    assert!(matches!(store.state(TallyState::clone), TallyState::Failed { total: 0, .. }));
}

#[tokio::test]
async fn test_fault_without_hook_keeps_state() {
    let store = Store::builder(TallyReducer, ()).start(TallyState::default()).await;
    let mut subscription = store.subscribe();

    store.send(TallyAction::Add(3)).unwrap();
    store.send(TallyAction::Boom).unwrap();
    store.send(TallyAction::Add(1)).unwrap();

    let state = next_state_matching(&mut subscription, WAIT, |s| s.total() == 4).await;
    assert_eq!(state, Some(TallyState::Ready { total: 4 }));
}

#[tokio::test]
async fn test_overflow_fault_does_not_commit_partial_state() {
    let store = Store::builder(TallyReducer, ())
        .recover(common::to_failed)
        .start(TallyState::Ready { total: i64::MAX - 1 })
        .await;
    let mut subscription = store.subscribe();

    store.send(TallyAction::Add(5)).unwrap();

    let state = next_state_matching(&mut subscription, WAIT, |_| true).await;
    assert_eq!(
        state,
        Some(TallyState::Failed {
            message: "total overflow".to_string(),
            total: i64::MAX - 1,
        })
    );
}

#[tokio::test]
async fn test_future_and_delay_effects_feed_back() {
    let store = tally_store().await;
    let mut subscription = store.subscribe();

    store.send(TallyAction::Fetch).unwrap();
    store.send(TallyAction::Later).unwrap();

    let state = next_state_matching(&mut subscription, WAIT, |s| s.total() == 11).await;
    assert_eq!(state, Some(TallyState::Ready { total: 11 }));
}

#[tokio::test]
async fn test_shutdown_applies_queued_actions_then_closes() {
    let store = tally_store().await;
    let mut subscription = store.subscribe();
    let mut notices = store.subscribe_notices();

    for _ in 0..5 {
        store.send(TallyAction::Add(1)).unwrap();
    }
    store.shutdown(WAIT).await.unwrap();

    assert_eq!(store.state(TallyState::total), 5);
    assert!(store.is_shutting_down());

    // Drain what was published, then the streams end
    while subscription.next().await.is_some() {}
    let mut received = 0;
    loop {
        match notices.recv().await {
            Ok(_) => received += 1,
            Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(_)) => continue,
        }
    }
    assert_eq!(received, 5);
}

#[tokio::test]
async fn test_send_after_shutdown_is_rejected() {
    let store = tally_store().await;
    store.shutdown(WAIT).await.unwrap();

    assert!(matches!(store.send(TallyAction::Add(1)), Err(StoreError::ShutdownInProgress)));

    let mut notices = store.subscribe_notices();
    assert_eq!(notices.recv().await, Err(RecvError::Closed));

    // A second shutdown is a no-op
    store.shutdown(Duration::from_millis(10)).await.unwrap();
}

#[tokio::test]
async fn test_subscriber_count_tracks_live_subscriptions() {
    let store = tally_store().await;
    assert_eq!(store.subscriber_count(), 0);

    let first = store.subscribe();
    let second = store.subscribe();
    assert_eq!(store.subscriber_count(), 2);

    drop(first);
    assert_eq!(store.subscriber_count(), 1);
    assert_eq!(second.current(), TallyState::default());

    drop(second);
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn test_store_reports_configured_name() {
    let store = tally_store().await;
    assert_eq!(store.name(), "tally");

    let unnamed = Store::builder(TallyReducer, ()).start(TallyState::default()).await;
    assert_eq!(unnamed.name(), StoreConfig::default().name);
}

/// A state that cannot be copied, so the loop fails outside the reducer
#[derive(Debug)]
struct Uncopyable;

impl Clone for Uncopyable {
    fn clone(&self) -> Self {
        panic!("state cannot be copied")
    }
}

struct UncopyableReducer;

impl Reducer for UncopyableReducer {
    type State = Uncopyable;
    type Action = ();
    type Notice = ();
    type Environment = ();

    fn reduce(&self, _state: &mut Uncopyable, (): (), _env: &()) -> Result<Effects<(), ()>, Fault> {
        Ok(smallvec![Effect::None])
    }
}

#[tokio::test]
async fn test_shutdown_reports_failed_loop() {
    let store = Store::builder(UncopyableReducer, ()).start(Uncopyable).await;

    store.send(()).unwrap();
    let result = store.shutdown(WAIT).await;

    assert!(matches!(result, Err(StoreError::LoopFailed(_))), "got {result:?}");
}
