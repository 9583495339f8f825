//! Shared trap-layer metadata: [`ReactiveFlags`], the tag that distinguishes
//! the four variants (mutable/deep, mutable/shallow, readonly/deep,
//! readonly/shallow) described in the spec's trap-layer section.
//!
//! A generic mutable-container interception facility (a JS `Proxy`
//! equivalent) has no Rust counterpart, so rather than one universal
//! wrapper this crate implements three concrete tracked containers
//! (`ReactiveObject`, `ReactiveArray`, `ReactiveCollection`) that each embed
//! a `ReactiveFlags` and route their operations through the same
//! `DepMap`/`track`/`trigger` machinery - "a tagged variant with a shared
//! method table, not inheritance," matching `src/node.rs`'s
//! `ReactiveNodeType` enum in the teacher.

/// `(readonly, shallow)` - the two independent axes a wrapper can vary on.
/// `readonly` rejects `set`/`delete`/`clear` and never calls `track`.
/// `shallow` is metadata only (`is_shallow()`); this crate does not
/// implement recursive auto-wrapping of nested values (see `SPEC_FULL.md`
/// §9's "Open question (resolved)"), so shallow and deep containers behave
/// identically except for what `is_shallow()` reports.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReactiveFlags {
    pub readonly: bool,
    pub shallow: bool,
}

impl ReactiveFlags {
    pub const MUTABLE_DEEP: Self = Self {
        readonly: false,
        shallow: false,
    };
    pub const MUTABLE_SHALLOW: Self = Self {
        readonly: false,
        shallow: true,
    };
    pub const READONLY_DEEP: Self = Self {
        readonly: true,
        shallow: false,
    };
    pub const READONLY_SHALLOW: Self = Self {
        readonly: true,
        shallow: true,
    };

    pub(crate) fn to_readonly(self) -> Self {
        Self {
            readonly: true,
            shallow: self.shallow,
        }
    }
}
