#![forbid(unsafe_code)]
use std::cell::RefCell;
use std::future::Future;

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "tokio")] {
        /// Spawns a thread-local [`Future`] onto the ambient `tokio`
        /// `LocalSet`, used by the scheduler to park the flush behind a
        /// genuine async boundary instead of running it inline (see
        /// `SPEC_FULL.md` §1.1, §4.6). Platform switch kept from the
        /// teacher's `spawn_local`, minus the wasm branch (no DOM target in
        /// this crate) and with `ssr` renamed `tokio` - the "ssr" framing
        /// doesn't apply outside a web framework. Requires the caller to be
        /// running inside a `LocalSet`, same contract `tokio::task::spawn_local`
        /// always has.
        pub fn spawn_local<F>(fut: F)
        where
            F: Future<Output = ()> + 'static,
        {
            tokio::task::spawn_local(fut);
        }

        /// No-op under `tokio`: the ambient runtime polls spawned tasks on
        /// its own schedule as the caller's `LocalSet` is driven.
        pub(crate) fn drive_pending_tasks() {}
    } else {
        use futures::executor::LocalPool;
        use futures::task::LocalSpawnExt;

        thread_local! {
            static POOL: RefCell<LocalPool> = RefCell::new(LocalPool::new());
        }

        /// Spawns a thread-local [`Future`] onto this thread's fallback
        /// executor, used by the scheduler to park the flush behind a
        /// genuine async boundary instead of running it inline (see
        /// `SPEC_FULL.md` §1.1, §4.6). Nothing drives the future until
        /// [`drive_pending_tasks`] is called - by design, the scheduler only
        /// calls that from `next_tick`, the crate's one public suspension
        /// point.
        pub fn spawn_local<F>(fut: F)
        where
            F: Future<Output = ()> + 'static,
        {
            let spawner = POOL.with(|p| p.borrow().spawner());
            spawner
                .spawn_local(fut)
                .expect("local task spawn failed (pool is gone)");
        }

        /// Runs every task spawned via [`spawn_local`] until none can make
        /// further progress without external input. The tasks this crate
        /// spawns (flush cycles) are synchronous work wrapped in an `async`
        /// block, so they resolve on their first poll - this never blocks
        /// waiting on a genuinely pending future.
        pub(crate) fn drive_pending_tasks() {
            POOL.with(|p| p.borrow_mut().run_until_stalled());
        }
    }
}
