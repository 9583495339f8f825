//! The effect engine: `EffectState`, the trackId reconciliation protocol, and
//! the public `effect()`/`EffectHandle` surface.
//!
//! Grounded on the teacher's `src/effect.rs` for the public-function shape
//! (`#[track_caller]`, `defined_at` diagnostics, `#[instrument]` placement);
//! the trackId protocol itself has no teacher analogue (the teacher marks a
//! DAG dirty top-down instead) and is written directly from the reconciliation
//! algorithm this crate implements, in the teacher's `Rc`/`RefCell`/`Cell` idiom.

use std::cell::{Cell, RefCell};
use std::panic::Location;
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};

use crate::dep::Dep;
use crate::diagnostics::SpecialNonReactiveZone;
use crate::scope::{current_scope_record, EffectScope};
use crate::tracking;

new_key_type! {
    /// Stable identity for an effect, independent of its `Rc` allocation.
    /// Deps key their subscriber map by this rather than by pointer so that
    /// stale `Weak<EffectState>` entries can be detected and skipped cheaply.
    pub struct EffectId;
}

thread_local! {
    static EFFECTS: RefCell<SlotMap<EffectId, Weak<EffectState>>> = RefCell::new(SlotMap::with_key());
}

/// Looks up a still-live effect by id. Returns `None` once the effect has
/// been dropped - deps treat that the same as an explicit `stop()`.
pub(crate) fn resolve(id: EffectId) -> Option<Rc<EffectState>> {
    EFFECTS.with(|e| e.borrow().get(id).and_then(Weak::upgrade))
}

/// Three-state dirtiness, ordered so that `trigger_effects` can use `<` to
/// decide whether a notification actually raises the effect's dirty level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirtyLevel {
    NotDirty,
    MaybeDirty,
    Dirty,
}

/// Everything mutated while running an effect or deciding whether to run it.
/// Lives behind an `Rc` so deps can hold a back-reference to it via
/// [`EffectId`] (not a direct `Weak<EffectState>` - see the module docs).
pub(crate) struct EffectState {
    id: Cell<Option<EffectId>>,
    f: RefCell<Box<dyn FnMut()>>,
    scheduler: RefCell<Option<Rc<dyn Fn()>>>,
    active: Cell<bool>,
    allow_recurse: Cell<bool>,
    deps: RefCell<Vec<Rc<Dep>>>,
    deps_length: Cell<usize>,
    track_id: Cell<u64>,
    runnings: Cell<u32>,
    should_schedule: Cell<bool>,
    dirty_level: Cell<DirtyLevel>,
    on_track: Option<Box<dyn Fn()>>,
    on_trigger: Option<Box<dyn Fn()>>,
    on_stop: Option<Box<dyn Fn()>>,
    #[cfg(debug_assertions)]
    #[allow(dead_code)]
    defined_at: &'static Location<'static>,
}

impl EffectState {
    pub(crate) fn id(&self) -> EffectId {
        self.id
            .get()
            .expect("EffectState used before registration")
    }

    pub(crate) fn dirty_level(&self) -> DirtyLevel {
        self.dirty_level.get()
    }

    pub(crate) fn set_dirty_level(&self, level: DirtyLevel) {
        self.dirty_level.set(level);
    }

    pub(crate) fn should_schedule(&self) -> bool {
        self.should_schedule.get()
    }

    pub(crate) fn set_should_schedule(&self, v: bool) {
        self.should_schedule.set(v);
    }

    pub(crate) fn runnings(&self) -> u32 {
        self.runnings.get()
    }

    pub(crate) fn allow_recurse(&self) -> bool {
        self.allow_recurse.get()
    }

    pub(crate) fn on_trigger(&self) {
        if let Some(cb) = &self.on_trigger {
            cb();
        }
    }

    pub(crate) fn scheduler(&self) -> Option<Rc<dyn Fn()>> {
        self.scheduler.borrow().clone()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Implements the trackId reconciliation protocol for a single edge:
    /// if this dep hasn't already been touched during the current run,
    /// record the current trackId on it and place it in this effect's deps
    /// vector at `_deps_length`, retiring whatever dep previously occupied
    /// that slot if it's a different dep and wasn't already retouched.
    pub(crate) fn link_dep(self: &Rc<Self>, dep: &Rc<Dep>) {
        let id = self.id();
        let current_track_id = self.track_id.get();
        if dep.track_id_for(id) == Some(current_track_id) {
            return;
        }
        dep.insert(id, current_track_id);
        let idx = self.deps_length.get();
        let mut deps = self.deps.borrow_mut();
        let same_as_slot = deps.get(idx).map(|d| Rc::ptr_eq(d, dep)).unwrap_or(false);
        if same_as_slot {
            self.deps_length.set(idx + 1);
            return;
        }
        if let Some(old) = deps.get(idx).cloned() {
            if let Some(old_track_id) = old.track_id_for(id) {
                if old_track_id != current_track_id {
                    old.remove(id);
                }
            }
        }
        if idx < deps.len() {
            deps[idx] = Rc::clone(dep);
        } else {
            deps.push(Rc::clone(dep));
        }
        self.deps_length.set(idx + 1);
    }

    /// Runs the effect body once, with this effect installed as the active
    /// tracker. Returns `false` without tracking if the effect was stopped.
    #[cfg_attr(
        any(debug_assertions, feature = "tracing"),
        tracing::instrument(level = "trace", skip_all)
    )]
    pub(crate) fn run(self: &Rc<Self>) -> bool {
        if !self.active.get() {
            (self.f.borrow_mut())();
            return false;
        }
        let prev = tracking::set_active_effect(Some(Rc::clone(self)));
        tracking::enable_tracking();
        self.track_id.set(self.track_id.get() + 1);
        self.deps_length.set(0);
        self.runnings.set(self.runnings.get() + 1);
        self.dirty_level.set(DirtyLevel::NotDirty);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (self.f.borrow_mut())();
        }));
        self.runnings.set(self.runnings.get() - 1);
        self.truncate_stale_deps();
        tracking::reset_tracking();
        tracking::set_active_effect(prev);
        match result {
            Ok(()) => true,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// After a run, any dep still sitting past `_deps_length` was not
    /// re-touched this time around and is unsubscribed.
    fn truncate_stale_deps(&self) {
        let id = self.id();
        let cut = self.deps_length.get();
        let mut deps = self.deps.borrow_mut();
        if deps.len() > cut {
            for dep in deps.drain(cut..) {
                dep.remove(id);
            }
        }
    }

    pub(crate) fn stop(self: &Rc<Self>) {
        if !self.active.get() {
            return;
        }
        let id = self.id();
        for dep in self.deps.borrow_mut().drain(..) {
            dep.remove(id);
        }
        self.deps_length.set(0);
        self.active.set(false);
        if let Some(cb) = &self.on_stop {
            cb();
        }
    }

    /// The "probe": is this effect currently dirty (or possibly dirty, in
    /// which case the caller forces its upstream computed to re-evaluate to
    /// find out for sure)? Called with `_runnings == 0`, i.e. probing the
    /// dirty level left behind by the effect's last completed run.
    pub(crate) fn dirty(&self) -> bool {
        if self.dirty_level.get() >= DirtyLevel::MaybeDirty {
            tracking::pause_tracking();
            let still_dirty = self.deps.borrow().iter().any(|dep| {
                dep.computed
                    .borrow()
                    .as_ref()
                    .map(|c| c.refresh())
                    .unwrap_or(false)
            });
            tracking::reset_tracking();
            if self.dirty_level.get() == DirtyLevel::Dirty || still_dirty {
                return true;
            }
            self.dirty_level.set(DirtyLevel::NotDirty);
        }
        false
    }
}

/// Snapshot of a dep's subscribers, then the two-pass notification protocol:
/// first raise dirty levels and fire `on_trigger`, then decide which of
/// those subscribers actually get scheduled.
pub(crate) fn trigger_effects(dep: &Rc<Dep>, level: DirtyLevel) {
    let subs = dep.snapshot();
    for (effect_id, track_id) in &subs {
        if dep.track_id_for(*effect_id) != Some(*track_id) {
            continue;
        }
        if let Some(effect) = resolve(*effect_id) {
            if effect.dirty_level() < level {
                let last_dirty = effect.dirty_level();
                effect.set_dirty_level(level);
                if last_dirty == DirtyLevel::NotDirty {
                    effect.set_should_schedule(true);
                    effect.on_trigger();
                }
            }
        }
    }
    for (effect_id, _) in &subs {
        if let Some(effect) = resolve(*effect_id) {
            if effect.should_schedule() && (effect.runnings() == 0 || effect.allow_recurse()) {
                effect.set_should_schedule(false);
                match effect.scheduler() {
                    // a scheduler-backed effect defers through the job queue
                    Some(scheduler) => crate::scheduler::defer(scheduler),
                    // the default: re-run synchronously, right here
                    None => {
                        effect.run();
                    }
                }
            }
        }
    }
}

/// Options controlling how an [`effect`] is constructed. `scheduler`, when
/// set, makes the effect reactive-but-deferred: on trigger it is pushed onto
/// the job queue via the scheduler closure instead of being re-run inline.
pub struct EffectOptions {
    pub lazy: bool,
    pub allow_recurse: bool,
    pub scheduler: Option<Rc<dyn Fn()>>,
    /// Explicit dispose scope to record this effect with, overriding
    /// whichever scope's `run` is ambiently on the call stack (if any). See
    /// [`crate::scope::record_effect_scope`] for attaching after construction.
    pub scope: Option<EffectScope>,
    pub on_track: Option<Box<dyn Fn()>>,
    pub on_trigger: Option<Box<dyn Fn()>>,
    pub on_stop: Option<Box<dyn Fn()>>,
}

impl Default for EffectOptions {
    fn default() -> Self {
        Self {
            lazy: false,
            allow_recurse: false,
            scheduler: None,
            scope: None,
            on_track: None,
            on_trigger: None,
            on_stop: None,
        }
    }
}

/// A handle to a running (or stopped) effect. Dropping it does not stop the
/// effect - the only strong owner is whatever keeps `EffectHandle` alive
/// (typically the caller, or an [`crate::scope::EffectScope`]); the
/// thread-local registry only ever holds a `Weak` reference.
#[derive(Clone)]
pub struct EffectHandle(pub(crate) Rc<EffectState>);

impl EffectHandle {
    pub fn id(&self) -> EffectId {
        self.0.id()
    }

    pub fn run(&self) {
        self.0.run();
    }

    pub fn stop(&self) {
        self.0.stop();
    }

    pub fn is_active(&self) -> bool {
        self.0.is_active()
    }

    pub fn set_allow_recurse(&self, v: bool) {
        self.0.allow_recurse.set(v);
    }
}

/// Registers `f` as a reactive effect: runs it immediately (unless `lazy`),
/// tracking whichever signals it reads, and re-running it (or invoking its
/// scheduler) whenever one of them changes.
///
/// ```
/// # use vue_reactive_core::{effect, EffectOptions, ReactiveObject};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let obj = ReactiveObject::new([("count".into(), 0i64)]);
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let seen2 = seen.clone();
/// let obj2 = obj.clone();
/// let handle = effect(
///     move || seen2.borrow_mut().push(obj2.get(&"count".into()).unwrap()),
///     EffectOptions::default(),
/// );
/// obj.set("count".into(), 1);
/// assert_eq!(*seen.borrow(), vec![0, 1]);
/// handle.stop();
/// ```
#[track_caller]
pub fn effect(f: impl FnMut() + 'static, options: EffectOptions) -> EffectHandle {
    #[cfg(debug_assertions)]
    let defined_at = Location::caller();
    let state = Rc::new(EffectState {
        id: Cell::new(None),
        f: RefCell::new(Box::new(f)),
        scheduler: RefCell::new(options.scheduler),
        active: Cell::new(true),
        allow_recurse: Cell::new(options.allow_recurse),
        deps: RefCell::new(Vec::new()),
        deps_length: Cell::new(0),
        track_id: Cell::new(0),
        runnings: Cell::new(0),
        should_schedule: Cell::new(false),
        dirty_level: Cell::new(DirtyLevel::NotDirty),
        on_track: options.on_track,
        on_trigger: options.on_trigger,
        on_stop: options.on_stop,
        #[cfg(debug_assertions)]
        defined_at,
    });
    let id = EFFECTS.with(|e| e.borrow_mut().insert(Rc::downgrade(&state)));
    state.id.set(Some(id));
    match &options.scope {
        Some(scope) => scope.track_state(Rc::clone(&state)),
        None => {
            if let Some(scope) = current_scope_record() {
                scope.track(Rc::clone(&state));
            }
        }
    }
    if !options.lazy && !SpecialNonReactiveZone::is_inside() {
        state.run();
    }
    EffectHandle(state)
}

/// Called from the trap layer on a `get`/`has`/`ownKeys` access: records the
/// dependency edge if tracking is currently enabled and an effect is active.
pub(crate) fn track_in_active_effect(dep: &Rc<Dep>) {
    if !tracking::should_track() {
        return;
    }
    if let Some(effect) = tracking::active_effect() {
        if let Some(cb) = &effect.on_track {
            cb();
        }
        effect.link_dep(dep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target_map::{DepMap, Key};

    #[test]
    fn run_tracks_and_reruns_on_relink() {
        let depmap = DepMap::new();
        let dep = depmap.get_or_create(Key::Str("x".into()));
        let runs = Rc::new(Cell::new(0));
        let runs2 = Rc::clone(&runs);
        let dep2 = Rc::clone(&dep);
        let handle = effect(
            move || {
                runs2.set(runs2.get() + 1);
                track_in_active_effect(&dep2);
            },
            EffectOptions::default(),
        );
        assert_eq!(runs.get(), 1);
        trigger_effects(&dep, DirtyLevel::Dirty);
        // no scheduler set, so the default applies: re-run synchronously
        assert_eq!(runs.get(), 2);
        handle.stop();
        assert!(dep.is_empty());
    }

    #[test]
    fn stop_unsubscribes_from_all_deps() {
        let depmap = DepMap::new();
        let dep = depmap.get_or_create(Key::Str("y".into()));
        let dep2 = Rc::clone(&dep);
        let handle = effect(
            move || track_in_active_effect(&dep2),
            EffectOptions::default(),
        );
        assert!(!dep.is_empty());
        handle.stop();
        assert!(dep.is_empty());
    }

    #[test]
    fn track_id_reuse_drops_untouched_branch_deps() {
        let depmap = DepMap::new();
        let cond = Rc::new(Cell::new(true));
        let dep_a = depmap.get_or_create(Key::Str("a".into()));
        let dep_b = depmap.get_or_create(Key::Str("b".into()));
        let (da, db, c) = (Rc::clone(&dep_a), Rc::clone(&dep_b), Rc::clone(&cond));
        let handle = effect(
            move || {
                if c.get() {
                    track_in_active_effect(&da);
                } else {
                    track_in_active_effect(&db);
                }
            },
            EffectOptions::default(),
        );
        assert!(!dep_a.is_empty());
        assert!(dep_b.is_empty());
        cond.set(false);
        handle.run();
        assert!(dep_a.is_empty());
        assert!(!dep_b.is_empty());
    }
}
