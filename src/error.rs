//! Error types and the pluggable error-handler callback the scheduler and
//! trap layer funnel failures through instead of panicking.
//!
//! Grounded on `src/oco.rs`'s `#[derive(thiserror::Error)]` enum (the only
//! `thiserror` usage in the teacher) for the derive style.

use std::cell::RefCell;

use thiserror::Error;

/// Where a reported error originated, mirroring the handful of call sites
/// that funnel through [`report_error`] rather than panicking.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Scheduler,
    AppErrorHandler,
}

#[derive(Debug, Error)]
pub enum ReactiveError {
    #[error("scheduler job failed: {0}")]
    Scheduler(String),

    #[error("operation attempted on a disposed effect scope")]
    ScopeDisposed,
}

thread_local! {
    static HANDLER: RefCell<Option<Box<dyn Fn(&str, ErrorCode)>>> = RefCell::new(None);
}

/// Installs a callback invoked whenever [`report_error`] fires. Replaces
/// whatever handler (if any) was previously installed.
pub fn set_error_handler(handler: impl Fn(&str, ErrorCode) + 'static) {
    HANDLER.with(|h| *h.borrow_mut() = Some(Box::new(handler)));
}

pub fn clear_error_handler() {
    HANDLER.with(|h| *h.borrow_mut() = None);
}

/// Routes a failure to the installed handler, or logs it via `tracing` if
/// none is installed. Used by the scheduler's recursion guard and by
/// anything else that fails outside of a caller's direct control.
pub(crate) fn report_error(message: impl Into<String>, code: ErrorCode) {
    let message = message.into();
    let handled = HANDLER.with(|h| {
        if let Some(handler) = h.borrow().as_ref() {
            handler(&message, code);
            true
        } else {
            false
        }
    });
    if !handled {
        tracing::error!(?code, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn handler_receives_reported_errors() {
        let seen = Rc::new(Cell::new(false));
        let seen2 = Rc::clone(&seen);
        set_error_handler(move |_msg, code| {
            assert_eq!(code, ErrorCode::Scheduler);
            seen2.set(true);
        });
        report_error("boom", ErrorCode::Scheduler);
        assert!(seen.get());
        clear_error_handler();
    }
}
