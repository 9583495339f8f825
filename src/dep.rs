use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::cell::RefCell;

use crate::effect::EffectId;

/// External collaborator interface for computed refs (see `SPEC_FULL.md` §6).
///
/// A computed value sets `Dep::computed` to `Some(self)` when it constructs its
/// own dep, so that [`crate::effect::EffectState::dirty`]'s `MaybeDirty` probe
/// knows it can force re-evaluation instead of merely reading a stale value.
/// No concrete `computed` primitive ships in this crate; see `SPEC_FULL.md` §1.
pub trait ComputedRef {
    /// Forces (re-)evaluation of the computed, returning whether the dirty
    /// level it leaves behind is at least `Dirty`.
    fn refresh(&self) -> bool;
}

/// The subscription set for a single `(target, key)` pair.
///
/// Ordered mapping `effect -> track_id`. Iteration order is not semantically
/// meaningful to consumers but is what `trigger` walks. `cleanup` fires exactly
/// once, the instant the map becomes empty.
pub(crate) struct Dep {
    subscribers: RefCell<IndexMap<EffectId, u64, FxBuildHasher>>,
    cleanup: RefCell<Option<Box<dyn FnMut()>>>,
    pub(crate) computed: RefCell<Option<Rc<dyn ComputedRef>>>,
}

impl Dep {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: RefCell::new(IndexMap::default()),
            cleanup: RefCell::new(None),
            computed: RefCell::new(None),
        }
    }

    pub(crate) fn set_cleanup(&self, f: impl FnMut() + 'static) {
        *self.cleanup.borrow_mut() = Some(Box::new(f));
    }

    /// The trackId this dep has recorded for `effect`, if it is currently subscribed.
    pub(crate) fn track_id_for(&self, effect: EffectId) -> Option<u64> {
        self.subscribers.borrow().get(&effect).copied()
    }

    pub(crate) fn insert(&self, effect: EffectId, track_id: u64) {
        self.subscribers.borrow_mut().insert(effect, track_id);
    }

    /// Unsubscribes `effect`. If the map transitions to empty, fires `cleanup`
    /// exactly once (the callback is taken, not merely borrowed, so a second
    /// empty transition - which cannot happen without a fresh subscriber being
    /// added first - would not re-fire it).
    pub(crate) fn remove(&self, effect: EffectId) {
        let became_empty = {
            let mut subs = self.subscribers.borrow_mut();
            subs.shift_remove(&effect);
            subs.is_empty()
        };
        if became_empty {
            if let Some(mut cb) = self.cleanup.borrow_mut().take() {
                cb();
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    /// Snapshot of `(effect, track_id)` pairs, taken up front so that callers
    /// may run effects (which can add/remove subscribers on this very dep)
    /// without holding a borrow across re-entrant mutation.
    pub(crate) fn snapshot(&self) -> Vec<(EffectId, u64)> {
        self.subscribers
            .borrow()
            .iter()
            .map(|(id, track_id)| (*id, *track_id))
            .collect()
    }
}

/// Opaque handle returned by `get_dep_from_reactive`-style accessors on the
/// concrete containers (`ReactiveObject`/`ReactiveArray`/`ReactiveCollection`).
#[derive(Clone)]
pub struct DepHandle(pub(crate) Rc<Dep>);

impl DepHandle {
    /// Number of effects currently subscribed to this dep.
    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wires an external computed ref into this dep, so a `MaybeDirty` probe
    /// against any effect subscribed here can force it to re-evaluate
    /// instead of reading a stale value (see [`ComputedRef`] and
    /// `SPEC_FULL.md` §6). Replaces whatever was set previously.
    pub fn set_computed(&self, computed: Rc<dyn ComputedRef>) {
        *self.0.computed.borrow_mut() = Some(computed);
    }
}
