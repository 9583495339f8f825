//! Effect scopes: a disposal grouping that stops every effect created
//! within it in one call, plus arbitrary `on_cleanup` callbacks.
//!
//! Grounded on the teacher's disposer idiom (`ScopeDisposer`, a
//! push-cleanup-callback list consumed once on dispose), trimmed down from
//! the teacher's full signal/context/arena-owning `Scope` to pure effect
//! disposal grouping - everything else the teacher's `Scope` carries
//! (contexts, resources, suspense, hydration) has no counterpart here.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::effect::{EffectHandle, EffectState};
use crate::error::ReactiveError;

pub(crate) struct ScopeRecord {
    effects: RefCell<Vec<Weak<EffectState>>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    children: RefCell<Vec<Rc<ScopeRecord>>>,
    active: std::cell::Cell<bool>,
}

impl ScopeRecord {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            effects: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            active: std::cell::Cell::new(true),
        })
    }

    pub(crate) fn track(&self, effect: Rc<EffectState>) {
        self.effects.borrow_mut().push(Rc::downgrade(&effect));
    }

    fn stop(&self) {
        if !self.active.get() {
            return;
        }
        self.active.set(false);
        for child in self.children.borrow_mut().drain(..) {
            child.stop();
        }
        for effect in self.effects.borrow_mut().drain(..) {
            if let Some(effect) = effect.upgrade() {
                effect.stop();
            }
        }
        for cleanup in self.cleanups.borrow_mut().drain(..) {
            cleanup();
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<Rc<ScopeRecord>>> = RefCell::new(Vec::new());
}

pub(crate) fn current_scope_record() -> Option<Rc<ScopeRecord>> {
    CURRENT.with(|c| c.borrow().last().cloned())
}

/// A disposal grouping for effects. Every effect created (directly or
/// transitively) while a scope's `run` is on the call stack is tracked by
/// it; calling `stop` tears down all of them, their nested child scopes,
/// and any `on_cleanup` callbacks registered within, in that order.
#[derive(Clone)]
pub struct EffectScope(Rc<ScopeRecord>);

impl EffectScope {
    pub fn new() -> Self {
        let record = ScopeRecord::new();
        if let Some(parent) = current_scope_record() {
            parent.children.borrow_mut().push(Rc::clone(&record));
        }
        EffectScope(record)
    }

    /// Runs `f` with this scope active, so that any `effect(...)` call made
    /// during `f` (directly, or by code `f` calls) is tracked by this scope.
    ///
    /// Panics if the scope has already been stopped; use [`try_run`][Self::try_run]
    /// to handle that case without unwinding.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        self.try_run(f)
            .expect("tried to run a disposed effect scope")
    }

    /// Like [`run`][Self::run], but returns `Err(ReactiveError::ScopeDisposed)`
    /// instead of panicking if this scope has already been stopped.
    pub fn try_run<T>(&self, f: impl FnOnce() -> T) -> Result<T, ReactiveError> {
        if !self.0.active.get() {
            return Err(ReactiveError::ScopeDisposed);
        }
        CURRENT.with(|c| c.borrow_mut().push(Rc::clone(&self.0)));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
        CURRENT.with(|c| {
            c.borrow_mut().pop();
        });
        match result {
            Ok(v) => Ok(v),
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    pub fn stop(&self) {
        self.0.stop();
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    pub(crate) fn track_state(&self, state: Rc<EffectState>) {
        self.0.track(state);
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers `f` to run when the nearest enclosing [`EffectScope`] (the one
/// whose `run` is currently on the call stack) is stopped. A no-op if
/// called outside any scope's `run`.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) {
    if let Some(scope) = current_scope_record() {
        scope.cleanups.borrow_mut().push(Box::new(f));
    }
}

/// Associates `effect` with `scope`, so the scope's `stop` tears it down
/// too - the explicit counterpart to the implicit ambient association
/// `effect(...)` performs against whichever scope's `run` is on the call
/// stack. Passing `None` falls back to that ambient scope, if any; a
/// no-op if there is neither an explicit scope nor an ambient one.
pub fn record_effect_scope(effect: &EffectHandle, scope: Option<&EffectScope>) {
    let record = match scope {
        Some(scope) => Some(Rc::clone(&scope.0)),
        None => current_scope_record(),
    };
    if let Some(record) = record {
        record.track(Rc::clone(&effect.0));
    }
}
