//! A fine-grained reactivity core: effects that track the reactive reads
//! they make and are scheduled to re-run when those reads' sources change.
//!
//! ## Fine-Grained Reactivity
//!
//! Three concrete tracked containers - [`ReactiveObject`], [`ReactiveArray`],
//! and [`ReactiveCollection`] - record, per key, which [`effect`]s read them.
//! Writing through a container walks back over that record and schedules
//! every affected effect to re-run, batched through a microtask-driven job
//! queue rather than run inline on every write (see [`scheduler`]).
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use vue_reactive_core::{effect, EffectOptions, ReactiveObject};
//!
//! let state = ReactiveObject::new([("count".into(), 0i64)]);
//! let doubled = Rc::new(Cell::new(0i64));
//! let (reader, writer) = (state.clone(), doubled.clone());
//! let handle = effect(
//!     move || writer.set(reader.get(&"count".into()).unwrap() * 2),
//!     EffectOptions::default(),
//! );
//! assert_eq!(doubled.get(), 0);
//! state.set("count".into(), 3);
//! assert_eq!(doubled.get(), 6);
//! handle.stop();
//! ```
//!
//! An [`EffectScope`] groups effects so a whole subtree of reactive
//! subscriptions can be torn down with one `stop()` call, and
//! [`pause_tracking`]/[`reset_tracking`]/[`untrack`] let code read reactive
//! state without subscribing to it.

mod array;
mod collection;
mod dep;
pub mod diagnostics;
mod effect;
pub mod error;
mod object;
mod reactive;
mod scheduler;
mod scope;
mod spawn;
mod spawn_microtask;
mod target_map;
mod tracking;

pub use array::ReactiveArray;
pub use collection::ReactiveCollection;
pub use dep::{ComputedRef, DepHandle};
pub use effect::{effect, EffectHandle, EffectId, EffectOptions};
pub use error::{set_error_handler, ErrorCode, ReactiveError};
pub use object::ReactiveObject;
pub use reactive::ReactiveFlags;
pub use scheduler::{
    flush_post_flush_cbs, flush_pre_flush_cbs, next_tick, queue_job, queue_post_flush_cb,
    SchedulerJob,
};
pub use scope::{on_scope_dispose, record_effect_scope, EffectScope};
pub use spawn::spawn_local;
pub use target_map::{Key, TrackOpType, TriggerOpType};
pub use tracking::{enable_tracking, pause_tracking, reset_tracking, untrack};
