// SPDX-License-Identifier: LGPL-3.0-or-later

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Tick(u32);
struct Tock;

#[test]
fn subscribe_to_an_unregistered_type_fails() {
    let bus = EventBus::new();
    let err = bus.subscribe::<Tick, _>(|_| Ok(())).unwrap_err();
    assert!(matches!(err, Error::Key { .. }));
}

#[test]
fn send_to_an_unregistered_type_fails() {
    let bus = EventBus::new();
    let err = bus.send(&Tick(1)).unwrap_err();
    assert!(matches!(err, Error::Key { .. }));
}

#[test]
fn register_twice_fails() {
    let bus = EventBus::new();
    bus.register::<Tick>().unwrap();
    let err = bus.register::<Tick>().unwrap_err();
    assert!(matches!(err, Error::Key { .. }));
}

#[test]
fn send_delivers_to_live_subscribers_in_order() {
    let bus = EventBus::new();
    bus.register::<Tick>().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let a = Arc::clone(&seen);
    let b = Arc::clone(&seen);
    let _sub1 = bus.subscribe::<Tick, _>(move |t: &Tick| {
        a.lock().push(("first", t.0));
        Ok(())
    }).unwrap();
    let _sub2 = bus.subscribe::<Tick, _>(move |t: &Tick| {
        b.lock().push(("second", t.0));
        Ok(())
    }).unwrap();

    bus.send(&Tick(7)).unwrap();

    assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);
}

#[test]
fn dropping_the_subscription_stops_delivery() {
    let bus = EventBus::new();
    bus.register::<Tock>().unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&count);
    let sub = bus.subscribe::<Tock, _>(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }).unwrap();

    bus.send(&Tock).unwrap();
    drop(sub);
    bus.send(&Tock).unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn a_failing_handler_stops_the_send_and_propagates() {
    let bus = EventBus::new();
    bus.register::<Tick>().unwrap();

    let second_ran = Arc::new(AtomicUsize::new(0));
    let marker = Arc::clone(&second_ran);
    let _sub1 = bus.subscribe::<Tick, _>(|_: &Tick| Err(Error::Runtime("boom".into()))).unwrap();
    let _sub2 = bus.subscribe::<Tick, _>(move |_: &Tick| {
        marker.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }).unwrap();

    let result = bus.send(&Tick(1));

    assert!(result.is_err());
    assert_eq!(second_ran.load(Ordering::SeqCst), 0);
}

#[test]
fn cleanup_removes_dead_slots() {
    let bus = EventBus::new();
    bus.register::<Tock>().unwrap();
    let sub = bus.subscribe::<Tock, _>(|_| Ok(())).unwrap();
    assert_eq!(bus.subscriber_count::<Tock>(), 1);
    drop(sub);
    bus.cleanup();
    assert_eq!(bus.subscriber_count::<Tock>(), 0);
}
