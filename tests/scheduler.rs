//! End-to-end scenarios 4-6 from the spec: `(id, pre)` flush ordering,
//! post-flush callbacks running strictly after the main queue, and the
//! recursion-limit guard on a self-requeuing job.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use vue_reactive_core::{
    next_tick, queue_job, queue_post_flush_cb, set_error_handler, ErrorCode, SchedulerJob,
};

#[test]
fn jobs_flush_in_id_then_pre_order() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let push = |label: &'static str| {
        let order = Rc::clone(&order);
        move || order.borrow_mut().push(label)
    };
    queue_job(SchedulerJob::new(Some(2), false, false, push("2")));
    queue_job(SchedulerJob::new(Some(1), false, false, push("1")));
    queue_job(SchedulerJob::new(Some(2), true, false, push("2pre")));
    queue_job(SchedulerJob::new(None, false, false, push("null")));

    futures::executor::block_on(next_tick());

    assert_eq!(*order.borrow(), vec!["1", "2pre", "2", "null"]);
}

#[test]
fn post_flush_callback_runs_after_every_main_job() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let o1 = Rc::clone(&order);
    // Registered from inside a main job: must still land after *all* main
    // jobs in this flush, not interleaved with them.
    queue_job(SchedulerJob::new(Some(1), false, false, move || {
        o1.borrow_mut().push("main-1");
        let o2 = Rc::clone(&o1);
        queue_post_flush_cb(SchedulerJob::new(None, false, false, move || {
            o2.borrow_mut().push("post");
        }));
    }));
    let o3 = Rc::clone(&order);
    queue_job(SchedulerJob::new(Some(2), false, false, move || {
        o3.borrow_mut().push("main-2");
    }));

    futures::executor::block_on(next_tick());

    assert_eq!(*order.borrow(), vec!["main-1", "main-2", "post"]);
}

#[test]
fn recursive_job_is_capped_and_reported() {
    let errors = Rc::new(Cell::new(0));
    let e = Rc::clone(&errors);
    set_error_handler(move |_msg, code| {
        assert_eq!(code, ErrorCode::Scheduler);
        e.set(e.get() + 1);
    });

    let runs = Rc::new(Cell::new(0));
    let runs_for_job: Rc<RefCell<Option<SchedulerJob>>> = Rc::new(RefCell::new(None));
    let runs2 = Rc::clone(&runs);
    let job_slot = Rc::clone(&runs_for_job);
    let job = SchedulerJob::new(Some(1), false, true, move || {
        runs2.set(runs2.get() + 1);
        if let Some(job) = job_slot.borrow().as_ref() {
            queue_job(job.clone());
        }
    });
    *runs_for_job.borrow_mut() = Some(job.clone());
    queue_job(job);

    futures::executor::block_on(next_tick());

    assert!(
        runs.get() <= 101,
        "a self-requeuing job must not run more than 101 times in one flush, ran {}",
        runs.get()
    );
    assert!(errors.get() >= 1, "recursion-limit breach must be reported");
}
