//! Process-wide (thread-local) tracking state: which effect, if any, is
//! currently collecting dependencies, and whether collection is paused.
//!
//! Grounded on the save/restore-observer discipline in the teacher's
//! `runtime.rs` (`Runtime::untrack`, `SetObserverOnDrop`), reworked from a
//! full signal/scope arena into a flags-only struct.

use std::cell::RefCell;
use std::rc::Rc;

use crate::effect::EffectState;

struct TrackingState {
    active_effect: Option<Rc<EffectState>>,
    should_track: bool,
    track_stack: Vec<bool>,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            active_effect: None,
            should_track: true,
            track_stack: Vec::new(),
        }
    }
}

thread_local! {
    static STATE: RefCell<TrackingState> = RefCell::new(TrackingState::default());
}

/// Effect currently collecting dependencies, if any.
pub(crate) fn active_effect() -> Option<Rc<EffectState>> {
    STATE.with(|s| s.borrow().active_effect.clone())
}

/// Installs `effect` as the active effect, returning whoever was active
/// before (so the caller can restore it once the run completes).
pub(crate) fn set_active_effect(effect: Option<Rc<EffectState>>) -> Option<Rc<EffectState>> {
    STATE.with(|s| std::mem::replace(&mut s.borrow_mut().active_effect, effect))
}

pub(crate) fn should_track() -> bool {
    STATE.with(|s| s.borrow().should_track)
}

/// Pushes the current `should_track` flag and turns tracking off.
pub fn pause_tracking() {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        let cur = s.should_track;
        s.track_stack.push(cur);
        s.should_track = false;
    });
}

/// Pushes the current `should_track` flag and turns tracking on.
pub fn enable_tracking() {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        let cur = s.should_track;
        s.track_stack.push(cur);
        s.should_track = true;
    });
}

/// Pops the last pushed `should_track` flag, restoring it. A no-op, rather
/// than a panic, if the stack is already empty - mirrors the teacher's
/// `untrack` guard, which tolerates unbalanced calls during unwinding.
pub fn reset_tracking() {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.should_track = s.track_stack.pop().unwrap_or(true);
    });
}

/// Runs `f` with tracking disabled, always restoring the previous state
/// afterwards even if `f` panics.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    pause_tracking();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    reset_tracking();
    match result {
        Ok(v) => v,
        Err(e) => std::panic::resume_unwind(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_defaults_to_on() {
        assert!(should_track());
    }

    #[test]
    fn pause_and_reset_restore_previous_value() {
        assert!(should_track());
        pause_tracking();
        assert!(!should_track());
        enable_tracking();
        assert!(should_track());
        reset_tracking();
        assert!(!should_track());
        reset_tracking();
        assert!(should_track());
    }

    #[test]
    fn untrack_restores_even_on_panic() {
        let prev = should_track();
        let result = std::panic::catch_unwind(|| {
            untrack(|| panic!("boom"));
        });
        assert!(result.is_err());
        assert_eq!(should_track(), prev);
    }
}
