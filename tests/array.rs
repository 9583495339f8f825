//! End-to-end scenario 3 from the spec: shrinking an array's length notifies
//! effects that read indices the shrink drops, not just a `length` reader.

use std::cell::RefCell;
use std::rc::Rc;

use vue_reactive_core::{effect, EffectOptions, ReactiveArray};

#[test]
fn array_length_shrink_notifies_dropped_index() {
    let a = ReactiveArray::new([10i64, 20, 30]);
    let sink = Rc::new(RefCell::new(Vec::new()));
    let (a1, s1) = (a.clone(), Rc::clone(&sink));
    let (a2, s2) = (a.clone(), Rc::clone(&sink));
    let handle = effect(
        move || s1.borrow_mut().push(a1.get(1)),
        EffectOptions {
            scheduler: Some(Rc::new(move || s2.borrow_mut().push(a2.get(1)))),
            ..EffectOptions::default()
        },
    );
    assert_eq!(*sink.borrow(), vec![Some(20)]);

    a.set_len(1);
    assert_eq!(*sink.borrow(), vec![Some(20), None]);

    handle.stop();
}

#[test]
fn includes_tracks_every_index_so_a_later_push_is_observed() {
    let a = ReactiveArray::new([1i64, 2, 3]);
    let runs = Rc::new(std::cell::Cell::new(0));
    let (a1, r1) = (a.clone(), Rc::clone(&runs));
    let (a2, r2) = (a.clone(), Rc::clone(&runs));
    let handle = effect(
        move || {
            a1.includes(&4);
            r1.set(r1.get() + 1);
        },
        EffectOptions {
            scheduler: Some(Rc::new(move || {
                a2.includes(&4);
                r2.set(r2.get() + 1);
            })),
            ..EffectOptions::default()
        },
    );
    assert_eq!(runs.get(), 1);
    a.push(4);
    assert_eq!(runs.get(), 2, "push changes what `includes(&4)` would answer");
    handle.stop();
}
