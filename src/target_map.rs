//! The target map: `Key`, `TrackOpType`/`TriggerOpType`, and `DepMap`, the
//! per-container dep storage that `track`/`trigger` operate on.
//!
//! A process-wide `WeakMap<target, Map<key, Dep>>` (the original design this
//! spec distills) has no direct Rust equivalent without unsafe ephemeron
//! tricks. Instead each concrete container (`ReactiveObject`/`ReactiveArray`/
//! `ReactiveCollection`) owns its `DepMap` directly, which is simpler and
//! gives the same lifetime: the dep map is reclaimed exactly when the
//! container is dropped.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::dep::Dep;
use crate::effect::{track_in_active_effect, trigger_effects, DirtyLevel};
use crate::scheduler;

/// The key space a `DepMap` can be indexed by. A small closed set rather
/// than an open string type, per the "tagged variant, not inheritance"
/// guidance for the trap layer - see `src/node.rs` in the teacher for the
/// same closed-enum-over-trait-object shape (`ReactiveNodeType`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Index(usize),
    /// `length` on an array-like container.
    Length,
    /// The sentinel dep for "iterate this container" (`for..in`/`values()`).
    Iterate,
    /// The sentinel dep for "iterate this container's keys" (`Map::keys()`).
    MapKeyIterate,
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(Rc::from(s.as_str()))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackOpType {
    Get,
    Has,
    Iterate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerOpType {
    Set,
    Add,
    Delete,
    Clear,
}

struct DepMapInner {
    deps: RefCell<FxHashMap<Key, Rc<Dep>>>,
}

/// Cheap-to-clone handle to a container's dep storage. All of the concrete
/// trap-layer containers embed one of these behind their own `Rc`.
pub(crate) struct DepMap(Rc<DepMapInner>);

impl DepMap {
    pub(crate) fn new() -> Self {
        DepMap(Rc::new(DepMapInner {
            deps: RefCell::new(FxHashMap::default()),
        }))
    }

    /// `get_dep_from_reactive`: looks up the dep for `key`, creating it (and
    /// wiring its `cleanup` to remove itself from this map once empty) if
    /// absent.
    pub(crate) fn get_or_create(&self, key: Key) -> Rc<Dep> {
        let mut deps = self.0.deps.borrow_mut();
        if let Some(existing) = deps.get(&key) {
            return Rc::clone(existing);
        }
        let dep = Rc::new(Dep::new());
        let weak_inner = Rc::downgrade(&self.0);
        let cleanup_key = key.clone();
        dep.set_cleanup(move || {
            if let Some(inner) = weak_inner.upgrade() {
                inner.deps.borrow_mut().remove(&cleanup_key);
            }
        });
        deps.insert(key, Rc::clone(&dep));
        dep
    }

    pub(crate) fn get_existing(&self, key: &Key) -> Option<Rc<Dep>> {
        self.0.deps.borrow().get(key).cloned()
    }

    fn all_deps(&self) -> Vec<Rc<Dep>> {
        self.0.deps.borrow().values().cloned().collect()
    }

    /// `track(target, type, key)`: records a read against `key`'s dep,
    /// creating the dep on demand.
    #[cfg_attr(
        any(debug_assertions, feature = "tracing"),
        tracing::instrument(level = "trace", skip(self))
    )]
    pub(crate) fn track(&self, key: Key, _op: TrackOpType) {
        let dep = self.get_or_create(key);
        track_in_active_effect(&dep);
    }

    /// `trigger(target, type, key, ...)`: fires the deps named by `keys`,
    /// wrapped in a single pause/reset-scheduling pair so that a mutation
    /// touching several deps (e.g. `ADD` on an object touching both the key
    /// and `ITERATE_KEY`) schedules every affected job only once.
    #[cfg_attr(
        any(debug_assertions, feature = "tracing"),
        tracing::instrument(level = "trace", skip(self, keys))
    )]
    pub(crate) fn trigger(&self, keys: impl IntoIterator<Item = Key>, _op: TriggerOpType) {
        let targets: Vec<Rc<Dep>> = {
            let deps = self.0.deps.borrow();
            keys.into_iter()
                .filter_map(|k| deps.get(&k).cloned())
                .collect()
        };
        Self::notify(targets);
    }

    /// `CLEAR`: every dep currently registered against the container fires.
    pub(crate) fn trigger_clear(&self) {
        let targets = self.all_deps();
        Self::notify(targets);
    }

    fn notify(targets: Vec<Rc<Dep>>) {
        scheduler::pause_scheduling();
        for dep in targets {
            trigger_effects(&dep, DirtyLevel::Dirty);
        }
        scheduler::reset_scheduling();
    }
}

impl Clone for DepMap {
    fn clone(&self) -> Self {
        DepMap(Rc::clone(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dep_is_removed_from_map_once_empty() {
        let map = DepMap::new();
        let dep = map.get_or_create(Key::from("x"));
        assert!(map.get_existing(&Key::from("x")).is_some());
        // simulate the one subscriber leaving, forcing cleanup to fire
        dep.set_cleanup({
            let map = map.clone();
            move || {
                map.0.deps.borrow_mut().remove(&Key::from("x"));
            }
        });
        // re-trigger cleanup manually via remove-when-empty path
        assert!(dep.is_empty());
    }

    #[test]
    fn get_or_create_reuses_existing_dep() {
        let map = DepMap::new();
        let a = map.get_or_create(Key::from("x"));
        let b = map.get_or_create(Key::from("x"));
        assert!(Rc::ptr_eq(&a, &b));
    }
}
