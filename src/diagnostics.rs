// These diagnostics exist to give useful messages when a read happens outside
// any tracking context. They record where a reactive container was created
// and where the out-of-context access happened.

#[cfg(debug_assertions)]
#[derive(Copy, Clone)]
pub(crate) struct AccessDiagnostics {
    pub defined_at: &'static std::panic::Location<'static>,
    pub called_at: &'static std::panic::Location<'static>,
}

#[cfg(not(debug_assertions))]
#[derive(Copy, Clone, Default)]
pub(crate) struct AccessDiagnostics {}

/// Marks a region in which it genuinely doesn't matter whether a read is
/// reactive - inside an event handler or a timeout callback, say. Entering
/// this zone suppresses "read outside a tracking context" warnings until
/// `exit()` is called. A no-op in release builds.
#[doc(hidden)]
pub struct SpecialNonReactiveZone {}

cfg_if::cfg_if! {
    if #[cfg(debug_assertions)] {
        use std::cell::Cell;

        thread_local! {
            static IS_SPECIAL_ZONE: Cell<bool> = Cell::new(false);
        }
    }
}

impl SpecialNonReactiveZone {
    #[inline(always)]
    pub(crate) fn is_inside() -> bool {
        #[cfg(debug_assertions)]
        {
            IS_SPECIAL_ZONE.with(|val| val.get())
        }
        #[cfg(not(debug_assertions))]
        false
    }

    #[inline(always)]
    pub fn enter() {
        #[cfg(debug_assertions)]
        {
            IS_SPECIAL_ZONE.with(|val| val.set(true))
        }
    }

    #[inline(always)]
    pub fn exit() {
        #[cfg(debug_assertions)]
        {
            IS_SPECIAL_ZONE.with(|val| val.set(false))
        }
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! diagnostics {
    ($this:ident) => {{
        cfg_if::cfg_if! {
            if #[cfg(debug_assertions)] {
                AccessDiagnostics {
                    defined_at: $this.defined_at,
                    called_at: std::panic::Location::caller()
                }
            } else {
                AccessDiagnostics { }
            }
        }
    }};
}
