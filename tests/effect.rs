//! End-to-end scenarios 1-2 from the spec: basic tracking and dependency
//! swapping, driven against `ReactiveObject` with a scheduler that re-runs
//! the effect immediately (so these tests don't need to drive a real
//! microtask queue).

use std::cell::RefCell;
use std::rc::Rc;

use vue_reactive_core::{effect, EffectOptions, ReactiveObject};

fn rerunning_effect(
    obj: &ReactiveObject<i64>,
    sink: &Rc<RefCell<Vec<i64>>>,
    body: impl Fn(&ReactiveObject<i64>, &Rc<RefCell<Vec<i64>>>) + 'static,
) -> vue_reactive_core::EffectHandle {
    let (o1, s1) = (obj.clone(), Rc::clone(sink));
    let (o2, s2) = (obj.clone(), Rc::clone(sink));
    let body = Rc::new(body);
    let b1 = Rc::clone(&body);
    effect(
        move || b1(&o1, &s1),
        EffectOptions {
            scheduler: Some(Rc::new(move || body(&o2, &s2))),
            ..EffectOptions::default()
        },
    )
}

#[test]
fn basic_tracking() {
    let w = ReactiveObject::new([("a".into(), 1i64)]);
    let sink = Rc::new(RefCell::new(Vec::new()));
    let handle = rerunning_effect(&w, &sink, |w, sink| {
        sink.borrow_mut().push(w.get(&"a".into()).unwrap());
    });
    assert_eq!(*sink.borrow(), vec![1]);

    w.set("a".into(), 2);
    assert_eq!(*sink.borrow(), vec![1, 2]);

    handle.stop();
    w.set("a".into(), 3);
    assert_eq!(*sink.borrow(), vec![1, 2]);
}

#[test]
fn dependency_swap() {
    let w = ReactiveObject::new([
        ("x".into(), 1i64),
        ("y".into(), 10i64),
        ("flag".into(), 1i64), // 1 = true, 0 = false
    ]);
    let sink = Rc::new(RefCell::new(Vec::new()));
    let handle = rerunning_effect(&w, &sink, |w, sink| {
        let picked = if w.get(&"flag".into()).unwrap() != 0 {
            w.get(&"x".into()).unwrap()
        } else {
            w.get(&"y".into()).unwrap()
        };
        sink.borrow_mut().push(picked);
    });
    assert_eq!(*sink.borrow(), vec![1]);

    w.set("y".into(), 11);
    assert_eq!(*sink.borrow(), vec![1], "no edge to y while flag is true");

    w.set("flag".into(), 0);
    assert_eq!(*sink.borrow(), vec![1, 11]);

    w.set("x".into(), 99);
    assert_eq!(
        *sink.borrow(),
        vec![1, 11],
        "edge to x was cleaned up when the branch swapped"
    );

    handle.stop();
}

#[test]
fn repeated_reads_of_the_same_key_produce_one_subscription_edge() {
    let w = ReactiveObject::new([("a".into(), 1i64)]);
    let runs = Rc::new(std::cell::Cell::new(0));
    let (w1, r1) = (w.clone(), Rc::clone(&runs));
    let (w2, r2) = (w.clone(), Rc::clone(&runs));
    let handle = effect(
        move || {
            w1.get(&"a".into());
            w1.get(&"a".into());
            w1.get(&"a".into());
            r1.set(r1.get() + 1);
        },
        EffectOptions {
            scheduler: Some(Rc::new(move || {
                w2.get(&"a".into());
                r2.set(r2.get() + 1);
            })),
            ..EffectOptions::default()
        },
    );
    assert_eq!(runs.get(), 1);
    assert_eq!(w.dep(&"a".into()).unwrap().subscriber_count(), 1);
    w.set("a".into(), 2);
    assert_eq!(runs.get(), 2);
    handle.stop();
}

#[test]
fn stop_is_idempotent() {
    let w = ReactiveObject::new([("a".into(), 1i64)]);
    let runs = Rc::new(std::cell::Cell::new(0));
    let (w1, r1) = (w.clone(), Rc::clone(&runs));
    let handle = effect(
        move || {
            w1.get(&"a".into());
            r1.set(r1.get() + 1);
        },
        EffectOptions::default(),
    );
    assert_eq!(runs.get(), 1);
    handle.stop();
    handle.stop();
    w.set("a".into(), 2);
    assert_eq!(runs.get(), 1);
}
