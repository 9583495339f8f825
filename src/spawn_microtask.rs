#![forbid(unsafe_code)]

use crate::spawn::spawn_local;

/// Parks `task` behind this crate's one genuine suspension point instead of
/// running it inline: outside of a browser there is no ambient microtask
/// queue to hook into, so this spawns `task` onto [`spawn_local`]'s
/// thread-local executor, where it sits until something actually drives that
/// executor forward (the scheduler does this exactly once, from
/// `next_tick`). Calling this must never itself run `task` synchronously -
/// `queueJob`/`queuePostFlushCb` rely on that to batch everything queued
/// before the next real suspension point into one flush.
///
/// Grounded on the teacher's `spawn_microtask`/`spawn_local` platform split;
/// the wasm `queueMicrotask` branch (DOM-only, no bearing on this crate's
/// scope) was dropped along with the `csr`/`hydrate` features it was gated
/// behind.
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    spawn_local(async move { task() });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::drive_pending_tasks;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn does_not_run_inline() {
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        queue_microtask(move || r.set(true));
        assert!(!ran.get(), "queue_microtask must defer, not run synchronously");
        drive_pending_tasks();
        assert!(ran.get());
    }
}
