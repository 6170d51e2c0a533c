//! Integration Tests for Ephemeral Stores
//!
//! These tests exercise the public API end to end: ordering, expiry, reset,
//! snapshot isolation and validation, plus the filters layered on top.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use ripple_core::{
    debounce, event_store, readonly, throttle, EphemeralStore, EventEmitter, Readable, Signal,
    StoreConfig, StoreError, Subscription, Ttl, Writable,
};

type Seen<T> = Arc<Mutex<Vec<Vec<T>>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Subscribe a callback that records every snapshot it receives.
fn record<T>(store: &EphemeralStore<T>) -> (Seen<T>, Subscription)
where
    T: Clone + Send + Sync + 'static,
{
    let seen: Seen<T> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = store.subscribe(move |values: &Vec<T>| {
        sink.lock().push(values.clone());
    });
    (seen, subscription)
}

/// Every subscriber, whenever it joined, ends up with all values in order.
#[test]
fn subscribers_see_values_in_insertion_order() {
    init_tracing();
    let store = EphemeralStore::new();

    let (early, _early_subscription) = record(&store);
    store.set("v1");
    store.set("v2");
    let (late, _late_subscription) = record(&store);
    store.set("v3");

    let expected = vec!["v1", "v2", "v3"];
    assert_eq!(early.lock().last(), Some(&expected));
    assert_eq!(late.lock().last(), Some(&expected));
    assert_eq!(late.lock().first(), Some(&vec!["v1", "v2"]));
}

/// Equal values are distinct entries.
#[test]
fn equal_values_are_kept_separately() {
    let store = EphemeralStore::new();
    store.set(7);
    store.set(7);
    assert_eq!(store.values(), vec![7, 7]);
}

/// Subscribing the same callback twice yields two independent registrations.
#[test]
fn duplicate_subscriptions_are_independent() {
    let store = EphemeralStore::new();
    let calls = Arc::new(Mutex::new(0));

    let callback = {
        let calls = calls.clone();
        move |_: &Vec<i32>| *calls.lock() += 1
    };
    let first = store.subscribe(callback.clone());
    let second = store.subscribe(callback);
    assert_eq!(*calls.lock(), 2);
    assert_eq!(store.subscriber_count(), 2);

    first.unsubscribe();
    assert_eq!(store.subscriber_count(), 1);

    store.set(1);
    assert_eq!(*calls.lock(), 3);

    drop(second);
    assert_eq!(store.subscriber_count(), 0);
}

/// A fresh subscriber sees a value before its ttl elapses but not after.
#[tokio::test(start_paused = true)]
async fn values_expire_after_ttl() {
    let store = EphemeralStore::from_millis(None, Some(100.0)).unwrap();
    store.set("v");

    let (seen, subscription) = record(&store);
    assert_eq!(*seen.lock(), vec![vec!["v"]]);
    drop(subscription);

    let store = EphemeralStore::from_millis(None, Some(100.0)).unwrap();
    store.set("v");
    tokio::time::sleep(Duration::from_millis(101)).await;

    let (seen, _subscription) = record(&store);
    assert_eq!(*seen.lock(), vec![Vec::<&str>::new()]);
}

/// The initial value expires like any other.
#[tokio::test(start_paused = true)]
async fn initial_value_is_subject_to_ttl() {
    let store = EphemeralStore::with_ttl(Some(1), Duration::from_millis(30)).unwrap();
    let (seen, _subscription) = record(&store);

    tokio::time::sleep(Duration::from_millis(31)).await;
    assert_eq!(*seen.lock(), vec![vec![1], vec![]]);
}

/// With a ttl, the last subscriber leaving clears the store.
#[tokio::test(start_paused = true)]
async fn reset_when_last_subscriber_leaves() {
    let store = EphemeralStore::with_ttl(None, Duration::from_secs(60)).unwrap();
    let (_, first) = record(&store);
    let (_, second) = record(&store);
    store.set('a');

    drop(first);
    drop(second);

    let (seen, _subscription) = record(&store);
    assert_eq!(*seen.lock(), vec![Vec::<char>::new()]);
    assert_eq!(store.pending_evictions(), 0);
}

/// A reset cancels pending evictions: no late broadcast arrives.
#[tokio::test(start_paused = true)]
async fn reset_cancels_pending_evictions() {
    let store = EphemeralStore::with_ttl(None, Duration::from_millis(50)).unwrap();
    let (_, subscription) = record(&store);
    store.set(1);
    subscription.unsubscribe();

    let (seen, _subscription) = record(&store);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(*seen.lock(), vec![Vec::<i32>::new()]);
}

/// Without a ttl there is no reset.
#[test]
fn no_reset_without_ttl() {
    let store = EphemeralStore::new();
    let (_, subscription) = record(&store);
    store.set('a');
    subscription.unsubscribe();

    let (seen, _subscription) = record(&store);
    assert_eq!(*seen.lock(), vec![vec!['a']]);
}

/// Delivered snapshots are never mutated by later changes.
#[test]
fn snapshots_are_isolated() {
    let store = EphemeralStore::new();
    let (seen, _subscription) = record(&store);

    store.set(1);
    let delivered = seen.lock()[1].clone();
    store.set(2);

    assert_eq!(delivered, vec![1]);
    assert_eq!(seen.lock().len(), 3);
    assert_eq!(seen.lock()[1], vec![1]);
    assert_eq!(seen.lock()[2], vec![1, 2]);
}

/// Invalid ttls are rejected, whatever form they arrive in.
#[test]
fn invalid_ttl_is_rejected() {
    assert!(matches!(
        EphemeralStore::from_millis(Some("x"), Some(-5.0)),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        "abc".parse::<Ttl>(),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        StoreConfig::from_json(r#"{"ttl_ms": "abc"}"#),
        Err(StoreError::InvalidArgument(_))
    ));
}

/// A configuration loaded from JSON drives expiry.
#[tokio::test(start_paused = true)]
async fn store_from_json_config() {
    let config = StoreConfig::from_json(r#"{"ttl_ms": 20}"#).unwrap();
    let store = EphemeralStore::with_config(Some("x"), config).unwrap();
    assert_eq!(store.ttl().map(|ttl| ttl.as_millis()), Some(20));
    let (_seen, _subscription) = record(&store);

    tokio::time::sleep(Duration::from_millis(25)).await;
    assert!(store.is_empty());
}

/// A panicking subscriber does not starve the ones after it.
#[test]
fn panicking_subscriber_is_isolated() {
    init_tracing();
    let store = EphemeralStore::new();
    let _bad = store.subscribe(|values: &Vec<i32>| {
        if !values.is_empty() {
            panic!("subscriber failure");
        }
    });
    let (seen, _good) = record(&store);

    store.set(1);
    assert_eq!(*seen.lock(), vec![vec![], vec![1]]);
}

/// Subscribers may write back into the store they observe.
#[test]
fn reentrant_set_from_subscriber() {
    let store = EphemeralStore::new();
    let echo = store.clone();
    let _echo = store.subscribe(move |values: &Vec<u32>| {
        if values.last() == Some(&1) {
            echo.set(2);
        }
    });
    let (seen, _subscription) = record(&store);

    store.set(1);
    assert_eq!(store.values(), vec![1, 2]);
    // The nested broadcast for `2` completes before the outer one for `1`
    // reaches later subscribers.
    assert_eq!(*seen.lock(), vec![vec![], vec![1, 2], vec![1]]);
}

/// The store works through the generic contract.
#[test]
fn generic_writable_contract() {
    fn push_all<S: Writable<Input = i32>>(store: &S, values: &[i32]) {
        for value in values {
            store.set(*value);
        }
    }

    let store = EphemeralStore::new();
    push_all(&store, &[3, 1, 2]);
    assert_eq!(store.values(), vec![3, 1, 2]);
}

/// Expiry works when timers fire on a multi-threaded runtime.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn expiry_on_multi_thread_runtime() {
    let store = EphemeralStore::with_ttl(None, Duration::from_millis(20)).unwrap();
    let (seen, _subscription) = record(&store);
    store.set(1);
    store.set(2);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(store.is_empty());
    assert_eq!(seen.lock().last(), Some(&Vec::<i32>::new()));
}

/// Filters compose with the ephemeral store.
#[tokio::test(start_paused = true)]
async fn debounced_view_of_ephemeral_store() {
    let store = EphemeralStore::new();
    let quiet = debounce(readonly(store.clone()), Duration::from_millis(50)).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _subscription = quiet.subscribe(move |values: &Vec<i32>| {
        sink.lock().push(values.len());
    });

    store.set(1);
    store.set(2);
    store.set(3);
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(*seen.lock(), vec![0, 3]);
}

/// Throttling a signal fed by an event bridge.
#[tokio::test(start_paused = true)]
async fn throttled_events() {
    let emitter = Arc::new(EventEmitter::<u32>::new());
    let moves = throttle(
        event_store(Arc::clone(&emitter), "move"),
        Duration::from_millis(100),
    )
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = moves.subscribe(move |value: &Option<u32>| sink.lock().push(*value));

    emitter.emit("move", 1);
    emitter.emit("move", 2);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(*seen.lock(), vec![None, Some(2)]);

    subscription.unsubscribe();
    assert_eq!(emitter.listener_count("move"), 0);
}

/// A signal can be read through the generic contract as well.
#[test]
fn signal_through_contract() {
    let signal = Signal::new(1);
    signal.update(|v| v * 10);
    assert_eq!(ripple_core::get(&signal), Some(10));
}
