//! `ReactiveObject<V>`: the object/record-shaped trap-layer container -
//! `get`/`set`/`has`/`delete`/`keys` routed through `target_map::DepMap`.
//!
//! Grounded on the spec's §4.5 table directly (`SET` fires the key dep only
//! when the value actually changed and the key already existed; `ADD`/
//! `DELETE` additionally fire `ITERATE_KEY`). Storage shape
//! (`RefCell<IndexMap<...>>` behind an `Rc`) grounded on the teacher's
//! `runtime.rs` fields (`RefCell<SlotMap<...>>`, `RefCell<FxIndexSet<...>>`).

use std::rc::Rc;

use indexmap::IndexMap;
use std::cell::RefCell;

use crate::dep::DepHandle;
use crate::reactive::ReactiveFlags;
use crate::target_map::{DepMap, Key, TrackOpType, TriggerOpType};

struct ObjectInner<V> {
    data: RefCell<IndexMap<Key, V>>,
    deps: DepMap,
}

/// A tracked key/value record. Cloning shares the underlying storage (it's
/// an `Rc` handle, like the teacher's `Scope`/`RuntimeId` handles) - use
/// `to_readonly`/`to_shallow_readonly` to get a differently-flagged view
/// over the *same* data, the way Vue's `readonly(reactive(x))` wraps the
/// same target twice.
pub struct ReactiveObject<V> {
    inner: Rc<ObjectInner<V>>,
    flags: ReactiveFlags,
}

impl<V> Clone for ReactiveObject<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            flags: self.flags,
        }
    }
}

impl<V: Clone + PartialEq> ReactiveObject<V> {
    pub fn new(initial: impl IntoIterator<Item = (Key, V)>) -> Self {
        Self::with_flags(initial, ReactiveFlags::MUTABLE_DEEP)
    }

    pub fn shallow(initial: impl IntoIterator<Item = (Key, V)>) -> Self {
        Self::with_flags(initial, ReactiveFlags::MUTABLE_SHALLOW)
    }

    fn with_flags(initial: impl IntoIterator<Item = (Key, V)>, flags: ReactiveFlags) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                data: RefCell::new(initial.into_iter().collect()),
                deps: DepMap::new(),
            }),
            flags,
        }
    }

    /// A read-only view over the same underlying storage: `set`/`delete`/
    /// `clear` are rejected and no dependency is ever tracked through it.
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

    /// `RAW`: an owned snapshot of the underlying data, bypassing tracking.
    pub fn to_raw(&self) -> IndexMap<Key, V> {
        self.inner.data.borrow().clone()
    }

    pub fn get(&self, key: &Key) -> Option<V> {
        if !self.flags.readonly {
            self.inner.deps.track(key.clone(), TrackOpType::Get);
        }
        self.inner.data.borrow().get(key).cloned()
    }

    pub fn has(&self, key: &Key) -> bool {
        if !self.flags.readonly {
            self.inner.deps.track(key.clone(), TrackOpType::Has);
        }
        self.inner.data.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<Key> {
        if !self.flags.readonly {
            self.inner.deps.track(Key::Iterate, TrackOpType::Iterate);
        }
        self.inner.data.borrow().keys().cloned().collect()
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

    /// Rejects (returning `false` without mutating) on a readonly view.
    /// `ADD` (key previously absent) fires the key dep and `ITERATE_KEY`;
    /// `SET` (key present, value actually changed) fires only the key dep.
    /// A `set` that leaves the value unchanged fires nothing.
    pub fn set(&self, key: Key, value: V) -> bool {
        if self.flags.readonly {
            if cfg!(debug_assertions) {
                tracing::warn!(?key, "set failed: target is readonly");
            }
            return false;
        }
        let had_key = self.inner.data.borrow().contains_key(&key);
        let changed = !had_key || self.inner.data.borrow().get(&key) != Some(&value);
        self.inner.data.borrow_mut().insert(key.clone(), value);
        if !had_key {
            self.inner
                .deps
                .trigger([key, Key::Iterate], TriggerOpType::Add);
        } else if changed {
            self.inner.deps.trigger([key], TriggerOpType::Set);
        }
        true
    }

    /// Rejects on a readonly view. Fires the key dep and `ITERATE_KEY` if
    /// the key was actually present.
    pub fn delete(&self, key: &Key) -> bool {
        if self.flags.readonly {
            if cfg!(debug_assertions) {
                tracing::warn!(?key, "delete failed: target is readonly");
            }
            return false;
        }
        let existed = self.inner.data.borrow_mut().shift_remove(key).is_some();
        if existed {
            self.inner
                .deps
                .trigger([key.clone(), Key::Iterate], TriggerOpType::Delete);
        }
        existed
    }

    /// Rejects on a readonly view. Every dep currently registered on the
    /// object fires, regardless of which keys they were tracking.
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

    /// Exposes the dep for `key`, if one currently exists, for diagnostics
    /// or manual subscription bookkeeping.
    pub fn dep(&self, key: &Key) -> Option<DepHandle> {
        self.inner.deps.get_existing(key).map(DepHandle)
    }
}
