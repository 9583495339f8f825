//! `ReactiveCollection<K, V>`: the Map/Set-shaped trap-layer container.
//! Distinguishes `ITERATE_KEY` (fired by anything that walks values, e.g.
//! `values`/`for_each`) from `MAP_KEY_ITERATE_KEY` (fired only by `keys`),
//! per the spec's table - a plain object has no such split because it has
//! no `.keys()` iterator distinct from `for..in`.
//!
//! Grounded on the spec's §4.5 table directly; storage shape
//! (`RefCell<IndexMap<K, V>>`) grounded on the same `runtime.rs` fields as
//! `object.rs`.

use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;
use std::cell::RefCell;

use crate::dep::DepHandle;
use crate::reactive::ReactiveFlags;
use crate::target_map::{DepMap, Key, TrackOpType, TriggerOpType};

struct CollectionInner<K, V> {
    data: RefCell<IndexMap<K, V>>,
    deps: DepMap,
}

pub struct ReactiveCollection<K, V> {
    inner: Rc<CollectionInner<K, V>>,
    flags: ReactiveFlags,
}

impl<K, V> Clone for ReactiveCollection<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            flags: self.flags,
        }
    }
}

impl<K, V> ReactiveCollection<K, V>
where
    K: Clone + Hash + Eq + Into<Key>,
    V: Clone + PartialEq,
{
    pub fn new(initial: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::with_flags(initial, ReactiveFlags::MUTABLE_DEEP)
    }

    pub fn shallow(initial: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::with_flags(initial, ReactiveFlags::MUTABLE_SHALLOW)
    }

    fn with_flags(initial: impl IntoIterator<Item = (K, V)>, flags: ReactiveFlags) -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                data: RefCell::new(initial.into_iter().collect()),
                deps: DepMap::new(),
            }),
            flags,
        }
    }

    pub fn to_readonly(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            flags: self.flags.to_readonly(),
        }
    }

    pub fn is_reactive(&self) -> bool {
        true
    }

    pub fn is_readonly(&self) -> bool {
        self.flags.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.flags.shallow
    }

    pub fn to_raw(&self) -> IndexMap<K, V> {
        self.inner.data.borrow().clone()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        if !self.flags.readonly {
            self.inner.deps.track(key.clone().into(), TrackOpType::Get);
        }
        self.inner.data.borrow().get(key).cloned()
    }

    pub fn has(&self, key: &K) -> bool {
        if !self.flags.readonly {
            self.inner.deps.track(key.clone().into(), TrackOpType::Has);
        }
        self.inner.data.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        if !self.flags.readonly {
            self.inner.deps.track(Key::Iterate, TrackOpType::Iterate);
        }
        self.inner.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracks `MAP_KEY_ITERATE_KEY`, not `ITERATE_KEY` - mutations that add
    /// or remove a key notify an effect reading `.keys()` even if it never
    /// reads any value, but a plain value-level `set` on an existing key
    /// does not.
    pub fn keys(&self) -> Vec<K> {
        if !self.flags.readonly {
            self.inner
                .deps
                .track(Key::MapKeyIterate, TrackOpType::Iterate);
        }
        self.inner.data.borrow().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        if !self.flags.readonly {
            self.inner.deps.track(Key::Iterate, TrackOpType::Iterate);
        }
        self.inner.data.borrow().values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(K, V)> {
        if !self.flags.readonly {
            self.inner.deps.track(Key::Iterate, TrackOpType::Iterate);
        }
        self.inner
            .data
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Rejects on a readonly view. A newly-added key fires the key dep,
    /// `ITERATE_KEY`, and `MAP_KEY_ITERATE_KEY`; updating an existing key's
    /// value (when it actually changes) fires only the key dep and
    /// `ITERATE_KEY`.
    pub fn set(&self, key: K, value: V) -> bool {
        if self.flags.readonly {
            if cfg!(debug_assertions) {
                tracing::warn!("set failed: target is readonly");
            }
            return false;
        }
        let existing = self.inner.data.borrow().get(&key).cloned();
        let had_key = existing.is_some();
        let changed = !had_key || existing.as_ref() != Some(&value);
        self.inner.data.borrow_mut().insert(key.clone(), value);
        let dep_key: Key = key.into();
        if !had_key {
            self.inner.deps.trigger(
                [dep_key, Key::Iterate, Key::MapKeyIterate],
                TriggerOpType::Add,
            );
        } else if changed {
            self.inner
                .deps
                .trigger([dep_key, Key::Iterate], TriggerOpType::Set);
        }
        true
    }

    /// Rejects on a readonly view. Fires the key dep, `ITERATE_KEY`, and
    /// `MAP_KEY_ITERATE_KEY` if the key was actually present.
    pub fn delete(&self, key: &K) -> bool {
        if self.flags.readonly {
            if cfg!(debug_assertions) {
                tracing::warn!("delete failed: target is readonly");
            }
            return false;
        }
        let existed = self.inner.data.borrow_mut().shift_remove(key).is_some();
        if existed {
            let dep_key: Key = key.clone().into();
            self.inner.deps.trigger(
                [dep_key, Key::Iterate, Key::MapKeyIterate],
                TriggerOpType::Delete,
            );
        }
        existed
    }

    /// Rejects on a readonly view. Every dep currently registered fires.
    pub fn clear(&self) {
        if self.flags.readonly {
            if cfg!(debug_assertions) {
                tracing::warn!("clear failed: target is readonly");
            }
            return;
        }
        if self.inner.data.borrow().is_empty() {
            return;
        }
        self.inner.data.borrow_mut().clear();
        self.inner.deps.trigger_clear();
    }

    pub fn dep(&self, key: &Key) -> Option<DepHandle> {
        self.inner.deps.get_existing(key).map(DepHandle)
    }
}
