//! `ReactiveArray<V>`: the array-shaped trap-layer container. Integer
//! indices and `length` are tracked and triggered per the spec's table -
//! shrinking `length` fires every index dep at or beyond the new length,
//! and index-searching methods (`includes`/`index_of`) track every index
//! up front before running the underlying search, so a later push that
//! would change the answer is still observed.
//!
//! Grounded on the spec's §4.5 table directly; mutating methods run under
//! a paired `pause_tracking`/`pause_scheduling` bracket the way the spec's
//! Design Notes describe for array mutators that touch several indices and
//! `length` atomically, the same bracket shape the teacher's
//! `Runtime::untrack` applies around an arbitrary closure.

use std::rc::Rc;

use std::cell::RefCell;

use crate::dep::DepHandle;
use crate::reactive::ReactiveFlags;
use crate::scheduler;
use crate::target_map::{DepMap, Key, TrackOpType, TriggerOpType};
use crate::tracking;

struct ArrayInner<V> {
    data: RefCell<Vec<V>>,
    deps: DepMap,
}

pub struct ReactiveArray<V> {
    inner: Rc<ArrayInner<V>>,
    flags: ReactiveFlags,
}

impl<V> Clone for ReactiveArray<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            flags: self.flags,
        }
    }
}

/// Runs `f` with both tracking and scheduling paused, so a multi-step
/// mutation doesn't let intermediate (inconsistent) states leak out as
/// separate notifications, then restores both unconditionally.
fn atomically<T>(f: impl FnOnce() -> T) -> T {
    tracking::pause_tracking();
    scheduler::pause_scheduling();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    scheduler::reset_scheduling();
    tracking::reset_tracking();
    match result {
        Ok(v) => v,
        Err(e) => std::panic::resume_unwind(e),
    }
}

impl<V: Clone + PartialEq + Default> ReactiveArray<V> {
    pub fn new(initial: impl IntoIterator<Item = V>) -> Self {
        Self::with_flags(initial, ReactiveFlags::MUTABLE_DEEP)
    }

    pub fn shallow(initial: impl IntoIterator<Item = V>) -> Self {
        Self::with_flags(initial, ReactiveFlags::MUTABLE_SHALLOW)
    }

    fn with_flags(initial: impl IntoIterator<Item = V>, flags: ReactiveFlags) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
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

    pub fn to_raw(&self) -> Vec<V> {
        self.inner.data.borrow().clone()
    }

    pub fn get(&self, index: usize) -> Option<V> {
        if !self.flags.readonly {
            self.inner.deps.track(Key::Index(index), TrackOpType::Get);
        }
        self.inner.data.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        if !self.flags.readonly {
            self.inner.deps.track(Key::Length, TrackOpType::Get);
        }
        self.inner.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dep(&self, key: &Key) -> Option<DepHandle> {
        self.inner.deps.get_existing(key).map(DepHandle)
    }

    /// Rejects on a readonly view. In-bounds: fires the index dep (if the
    /// value changed). One past the end: extends by one and fires both the
    /// index dep and `length`, matching `ADD` in the spec's table.
    pub fn set(&self, index: usize, value: V) -> bool {
        if self.flags.readonly {
            if cfg!(debug_assertions) {
                tracing::warn!(index, "set failed: target is readonly");
            }
            return false;
        }
        let len = self.inner.data.borrow().len();
        if index > len {
            tracing::warn!(index, len, "set failed: index out of bounds");
            return false;
        }
        if index == len {
            self.inner.data.borrow_mut().push(value);
            self.inner
                .deps
                .trigger([Key::Index(index), Key::Length], TriggerOpType::Add);
            return true;
        }
        let changed = self.inner.data.borrow()[index] != value;
        self.inner.data.borrow_mut()[index] = value;
        if changed {
            self.inner
                .deps
                .trigger([Key::Index(index)], TriggerOpType::Set);
        }
        true
    }

    /// Rejects on a readonly view. Growing fills with `V::default()`;
    /// shrinking fires the dep for every index at or beyond the new length
    /// in addition to `length` itself, since those indices no longer read
    /// back the same value.
    pub fn set_len(&self, new_len: usize) {
        if self.flags.readonly {
            if cfg!(debug_assertions) {
                tracing::warn!(new_len, "set_len failed: target is readonly");
            }
            return;
        }
        let old_len = atomically(|| {
            let mut data = self.inner.data.borrow_mut();
            let old_len = data.len();
            if new_len < old_len {
                data.truncate(new_len);
            } else {
                data.resize(new_len, V::default());
            }
            old_len
        });
        if old_len == new_len {
            return;
        }
        let mut keys = vec![Key::Length];
        let (lo, hi) = if new_len < old_len {
            (new_len, old_len)
        } else {
            (old_len, new_len)
        };
        keys.extend((lo..hi).map(Key::Index));
        self.inner.deps.trigger(keys, TriggerOpType::Set);
    }

    /// Appends `value`, firing the new index dep and `length` (`ADD`).
    pub fn push(&self, value: V) {
        if self.flags.readonly {
            if cfg!(debug_assertions) {
                tracing::warn!("push failed: target is readonly");
            }
            return;
        }
        let index = atomically(|| {
            let mut data = self.inner.data.borrow_mut();
            data.push(value);
            data.len() - 1
        });
        self.inner
            .deps
            .trigger([Key::Index(index), Key::Length], TriggerOpType::Add);
    }

    /// Removes and returns the last element, firing its index dep and
    /// `length` (`DELETE`). `None` (and no notification) on an empty array.
    pub fn pop(&self) -> Option<V> {
        if self.flags.readonly {
            if cfg!(debug_assertions) {
                tracing::warn!("pop failed: target is readonly");
            }
            return None;
        }
        let (value, index) = atomically(|| {
            let mut data = self.inner.data.borrow_mut();
            let index = data.len().checked_sub(1);
            (index.map(|_| data.pop()).flatten(), index)
        });
        if let Some(index) = index {
            self.inner
                .deps
                .trigger([Key::Index(index), Key::Length], TriggerOpType::Delete);
        }
        value
    }

    /// Tracks every current index (so a later length change is observed by
    /// this effect even though the search itself may have returned early),
    /// then runs the underlying linear search.
    pub fn includes(&self, value: &V) -> bool {
        self.track_every_index();
        self.inner.data.borrow().iter().any(|v| v == value)
    }

    pub fn index_of(&self, value: &V) -> Option<usize> {
        self.track_every_index();
        self.inner.data.borrow().iter().position(|v| v == value)
    }

    fn track_every_index(&self) {
        if self.flags.readonly {
            return;
        }
        let len = self.inner.data.borrow().len();
        for i in 0..len {
            self.inner.deps.track(Key::Index(i), TrackOpType::Get);
        }
        self.inner.deps.track(Key::Length, TrackOpType::Get);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{effect, EffectOptions};
    use std::cell::Cell;

    /// The spec's array length-shrink scenario: wrap `[10, 20, 30]`, have an
    /// effect read index 1 via a scheduler-backed rerun, then shrink the
    /// array to length 1 and confirm both the length dep and the dropped
    /// index's dep fire.
    #[test]
    fn shrinking_length_notifies_dropped_indices() {
        let arr = ReactiveArray::new([10, 20, 30]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let arr2 = arr.clone();
        let seen2 = Rc::clone(&seen);
        let arr3 = arr.clone();
        let seen3 = Rc::clone(&seen);
        let handle = effect(
            move || seen2.borrow_mut().push(arr2.get(1)),
            EffectOptions {
                scheduler: Some(Rc::new(move || seen3.borrow_mut().push(arr3.get(1)))),
                ..EffectOptions::default()
            },
        );
        assert_eq!(*seen.borrow(), vec![Some(20)]);
        arr.set_len(1);
        assert_eq!(*seen.borrow(), vec![Some(20), None]);
        handle.stop();
    }

    #[test]
    fn push_fires_index_and_length_deps() {
        let arr: ReactiveArray<i64> = ReactiveArray::new([]);
        let len_runs = Rc::new(Cell::new(0));
        let arr2 = arr.clone();
        let r2 = Rc::clone(&len_runs);
        let handle = effect(
            move || {
                arr2.len();
                r2.set(r2.get() + 1);
            },
            EffectOptions::default(),
        );
        assert_eq!(len_runs.get(), 1);
        arr.push(1);
        assert!(arr.dep(&Key::Length).is_some());
        assert!(arr.dep(&Key::Index(0)).is_none());
        handle.stop();
    }

    #[test]
    fn readonly_array_rejects_mutation() {
        let arr = ReactiveArray::new([1, 2, 3]);
        let ro = arr.to_readonly();
        assert!(!ro.set(0, 9));
        assert_eq!(arr.get(0), Some(1));
    }
}
