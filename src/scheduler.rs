//! The job scheduler: `queue_job`/`queue_post_flush_cb`/`flush_jobs`, the
//! pause/reset-scheduling deferred buffer, and `next_tick`.
//!
//! Grounded on the spec's scheduler design directly (no teacher analogue -
//! `leptos_reactive` drives effects synchronously through its DAG instead of
//! batching into a queue). Flush-loop shape cross-checked against
//! `other_examples/0de8ae23_RLabs-Inc-spark-signals__src-reactivity-scheduling.rs.rs`
//! (max-iteration recursion guard) and
//! `other_examples/a4cac197_PainStaker0331-dioxus__packages-core-src-scheduler.rs.rs`
//! (id-ordered job queue). `next_tick`'s future plumbing reuses the teacher's
//! `spawn_microtask`/`spawn_local` platform switch plus a `futures::channel::oneshot`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::oneshot;

use crate::error::{report_error, ErrorCode};
use crate::spawn_microtask::queue_microtask;

/// A job may run up to `RECURSION_LIMIT + 1` times within one flush before
/// it's treated as a runaway recursive update: the 101st run is still
/// allowed, and only the 102nd attempt is reported as an error and skipped,
/// matching the spec's literal recursion-limit scenario.
const RECURSION_LIMIT: u32 = 100;

struct JobInner {
    id: Option<i64>,
    pre: bool,
    active: std::cell::Cell<bool>,
    allow_recurse: bool,
    run: RefCell<Box<dyn FnMut()>>,
}

/// A unit of deferred work. Identity is the `Rc` allocation, so the same
/// logical job queued twice compares equal via `SchedulerJob::same_job`.
#[derive(Clone)]
pub struct SchedulerJob(Rc<JobInner>);

impl SchedulerJob {
    pub fn new(id: Option<i64>, pre: bool, allow_recurse: bool, run: impl FnMut() + 'static) -> Self {
        SchedulerJob(Rc::new(JobInner {
            id,
            pre,
            active: std::cell::Cell::new(true),
            allow_recurse,
            run: RefCell::new(Box::new(run)),
        }))
    }

    pub fn invalidate(&self) {
        self.0.active.set(false);
    }

    fn same_job(&self, other: &SchedulerJob) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn ptr_key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

struct State {
    queue: Vec<SchedulerJob>,
    flush_index: isize,
    pending_post: Vec<SchedulerJob>,
    active_post: Vec<SchedulerJob>,
    is_flushing: bool,
    is_flush_pending: bool,
    pause_depth: u32,
    deferred: Vec<Rc<dyn Fn()>>,
    next_tick_waiters: Vec<oneshot::Sender<()>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            flush_index: 0,
            pending_post: Vec::new(),
            active_post: Vec::new(),
            is_flushing: false,
            is_flush_pending: false,
            pause_depth: 0,
            deferred: Vec::new(),
            next_tick_waiters: Vec::new(),
        }
    }
}

thread_local! {
    static STATE: RefCell<State> = RefCell::new(State::default());
}

/// Pushes onto the main job queue, skipping if an equal job is already
/// queued from `flush_index` onward (or from `flush_index - 1` when the job
/// is its own currently-running occurrence and `!allow_recurse` - that slot
/// still holds this exact job until the flush clears the queue, so
/// including it in the search is what stops a non-recursive job from
/// re-adding itself mid-run).
pub fn queue_job(job: SchedulerJob) {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        let dedup_start = if job.0.allow_recurse {
            s.flush_index.max(0) as usize
        } else {
            (s.flush_index - 1).max(0) as usize
        };
        let already_queued = s.queue[dedup_start..].iter().any(|q| q.same_job(&job));
        if !already_queued {
            s.queue.push(job);
        }
        let pending = s.is_flush_pending;
        let flushing = s.is_flushing;
        drop(s);
        if !pending && !flushing {
            queue_flush();
        }
    });
}

pub fn queue_post_flush_cb(job: SchedulerJob) {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        if !s.pending_post.iter().any(|q| q.same_job(&job)) {
            s.pending_post.push(job);
        }
        let pending = s.is_flush_pending;
        let flushing = s.is_flushing;
        drop(s);
        if !pending && !flushing {
            queue_flush();
        }
    });
}

/// Marks a flush as pending and parks the actual drain behind the
/// microtask boundary (`SPEC_FULL.md` §5's one suspension point): this must
/// only ever *schedule* `flush_jobs`, never call it inline, or every
/// `queue_job` would flush-and-clear before the next one runs and batching
/// would never happen.
fn queue_flush() {
    STATE.with(|s| s.borrow_mut().is_flush_pending = true);
    queue_microtask(flush_jobs);
}

/// `pauseScheduling`/`resetScheduling`: while `pause_depth > 0`, schedulers
/// pushed via [`defer`] are buffered instead of run; once the depth returns
/// to zero they drain in FIFO order.
pub fn pause_scheduling() {
    STATE.with(|s| s.borrow_mut().pause_depth += 1);
}

pub fn reset_scheduling() {
    let drained = STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.pause_depth = s.pause_depth.saturating_sub(1);
        if s.pause_depth == 0 && !s.deferred.is_empty() {
            Some(std::mem::take(&mut s.deferred))
        } else {
            None
        }
    });
    if let Some(schedulers) = drained {
        for scheduler in schedulers {
            scheduler();
        }
    }
}

/// Pushes an effect's scheduler closure into the deferred buffer. Called
/// only from inside a `pause_scheduling`/`reset_scheduling` bracket (see
/// `target_map.rs::DepMap::notify`), so it never runs the closure directly.
pub(crate) fn defer(scheduler: Rc<dyn Fn()>) {
    STATE.with(|s| s.borrow_mut().deferred.push(scheduler));
}

/// `(id, !pre)`: ascending id first, and at equal id a `pre` job sorts
/// before a non-`pre` one. Jobs with no id (`None`) sort last, after every
/// id-bearing job, and tie amongst themselves in insertion order (the sort
/// is stable).
fn job_sort_key(job: &SchedulerJob) -> (i64, bool) {
    (job.0.id.unwrap_or(i64::MAX), !job.0.pre)
}

/// Runs every queued pre-flush job to completion before the main component
/// of a flush starts; pre-jobs may themselves enqueue more pre-jobs.
pub fn flush_pre_flush_cbs() {
    STATE.with(|s| {
        let mut i = 0;
        loop {
            let job = {
                let st = s.borrow();
                st.queue[i..]
                    .iter()
                    .find(|j| j.0.pre && j.0.active.get())
                    .cloned()
            };
            let Some(job) = job else { break };
            {
                let mut st = s.borrow_mut();
                if let Some(pos) = st.queue.iter().position(|j| j.same_job(&job)) {
                    st.queue.remove(pos);
                }
            }
            run_job(&job);
            i = 0;
        }
    });
}

/// Invokes `job`, catching a panic and routing it to the error handler with
/// `ErrorCode::Scheduler` instead of letting it unwind out of `flush_jobs` -
/// per spec §7, a failing job must not take the rest of the flush down with
/// it.
fn run_job(job: &SchedulerJob) {
    if !job.0.active.get() {
        return;
    }
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        (job.0.run.borrow_mut())();
    }));
    if let Err(payload) = result {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "scheduler job panicked".to_string());
        report_error(message, ErrorCode::Scheduler);
    }
}

/// Drains the main queue (sorted ascending by id, unordered jobs last),
/// then the post-flush callback queue, looping while either keeps refilling
/// - up to [`RECURSION_LIMIT`] times per job, matching the spec's
/// runaway-update guard.
#[cfg_attr(
    any(debug_assertions, feature = "tracing"),
    tracing::instrument(level = "trace")
)]
pub fn flush_jobs() {
    let already_flushing = STATE.with(|s| {
        let mut st = s.borrow_mut();
        if st.is_flushing {
            true
        } else {
            st.is_flushing = true;
            st.is_flush_pending = false;
            false
        }
    });
    if already_flushing {
        return;
    }

    flush_pre_flush_cbs();

    let mut seen: HashMap<usize, u32> = HashMap::new();

    loop {
        STATE.with(|s| {
            let mut st = s.borrow_mut();
            // Only the not-yet-run suffix is sorted: jobs at or before
            // `flush_index` have already executed (or been skipped) and
            // must keep their slot, or a later job we haven't visited yet
            // could get shuffled in front of `flush_index` and never run.
            let start = st.flush_index.max(0) as usize;
            st.queue[start..].sort_by_key(job_sort_key);
        });

        let job = STATE.with(|s| {
            let mut st = s.borrow_mut();
            while (st.flush_index as usize) < st.queue.len() {
                let idx = st.flush_index as usize;
                let job = st.queue[idx].clone();
                st.flush_index += 1;
                if job.0.active.get() {
                    return Some(job);
                }
            }
            None
        });

        let Some(job) = job else { break };

        let count = seen.entry(job.ptr_key()).or_insert(0);
        *count += 1;
        if *count > RECURSION_LIMIT + 1 {
            report_error(
                format!(
                    "job exceeded recursion limit of {RECURSION_LIMIT} within a single flush"
                ),
                ErrorCode::Scheduler,
            );
            job.invalidate();
            continue;
        }

        run_job(&job);

        if job.0.allow_recurse {
            // allow a job that re-queues itself to run again within this flush
        }
    }

    STATE.with(|s| {
        let mut st = s.borrow_mut();
        st.queue.clear();
        st.flush_index = 0;
    });

    flush_post_flush_cbs();

    let more_pending = STATE.with(|s| {
        let st = s.borrow();
        !st.queue.is_empty() || !st.pending_post.is_empty()
    });

    STATE.with(|s| s.borrow_mut().is_flushing = false);

    if more_pending {
        flush_jobs();
        return;
    }

    let waiters = STATE.with(|s| std::mem::take(&mut s.borrow_mut().next_tick_waiters));
    for waiter in waiters {
        let _ = waiter.send(());
    }
}

/// Drains and runs the post-flush callback queue directly, outside of a
/// `flush_jobs` cycle. Exposed alongside [`flush_pre_flush_cbs`] as part of
/// the scheduler's external surface (`SPEC_FULL.md` §6).
pub fn flush_post_flush_cbs() {
    STATE.with(|s| {
        let mut st = s.borrow_mut();
        if st.pending_post.is_empty() {
            return;
        }
        let mut dedup: Vec<SchedulerJob> = Vec::new();
        for job in st.pending_post.drain(..) {
            if !dedup.iter().any(|q| q.same_job(&job)) {
                dedup.push(job);
            }
        }
        st.active_post.extend(dedup);
        st.active_post.sort_by_key(job_sort_key);
        let jobs = std::mem::take(&mut st.active_post);
        drop(st);
        for job in jobs {
            run_job(&job);
        }
    });
}

/// Resolves once the current (or next, if none is in progress) flush has
/// fully drained, including post-flush callbacks. This is this crate's one
/// genuine suspension point: awaiting it is what actually drives the
/// `flush_jobs` call `queue_flush` parked on `spawn_local`'s executor,
/// the equivalent of a JS caller awaiting past the microtask boundary to
/// observe a batch's effects.
pub async fn next_tick() {
    let (tx, rx) = oneshot::channel();
    let needs_kick = STATE.with(|s| {
        let mut st = s.borrow_mut();
        st.next_tick_waiters.push(tx);
        !st.is_flushing && !st.is_flush_pending && st.queue.is_empty() && st.pending_post.is_empty()
    });
    if needs_kick {
        queue_microtask(flush_jobs);
    }
    crate::spawn::drive_pending_tasks();
    let _ = rx.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn jobs_run_in_id_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = Rc::clone(&order);
        let o2 = Rc::clone(&order);
        queue_job(SchedulerJob::new(Some(2), false, false, move || {
            o1.borrow_mut().push(2)
        }));
        queue_job(SchedulerJob::new(Some(1), false, false, move || {
            o2.borrow_mut().push(1)
        }));
        flush_jobs();
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn duplicate_job_only_runs_once_per_flush() {
        let runs = Rc::new(Cell::new(0));
        let r = Rc::clone(&runs);
        let job = SchedulerJob::new(Some(1), false, false, move || r.set(r.get() + 1));
        queue_job(job.clone());
        queue_job(job);
        flush_jobs();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn post_flush_runs_after_main_queue() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = Rc::clone(&order);
        let o2 = Rc::clone(&order);
        queue_post_flush_cb(SchedulerJob::new(None, false, false, move || {
            o1.borrow_mut().push("post")
        }));
        queue_job(SchedulerJob::new(Some(1), false, false, move || {
            o2.borrow_mut().push("main")
        }));
        flush_jobs();
        assert_eq!(*order.borrow(), vec!["main", "post"]);
    }

    #[test]
    fn pause_and_reset_scheduling_drains_in_fifo_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        pause_scheduling();
        pause_scheduling();
        let o1 = Rc::clone(&order);
        defer(Rc::new(move || o1.borrow_mut().push(1)));
        let o2 = Rc::clone(&order);
        defer(Rc::new(move || o2.borrow_mut().push(2)));
        reset_scheduling();
        assert!(order.borrow().is_empty());
        reset_scheduling();
        assert_eq!(*order.borrow(), vec![1, 2]);
    }
}
