//! Process-wide, lazily initialised injector.

use std::sync::OnceLock;

use crate::chance::{Chance, ChanceSource};
use crate::engine::Injector;

/// Holds the one [`Injector`] of a process.
///
/// The first caller builds it; concurrent first callers block until that
/// build finishes and then all observe the same value. Nothing is ever
/// written to it afterwards.
pub struct InjectorCell<C = Chance> {
    inner: OnceLock<Injector<C>>,
}

impl<C> InjectorCell<C> {
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// The injector, if it has been built.
    pub fn get(&self) -> Option<&Injector<C>> {
        self.inner.get()
    }
}

impl<C: ChanceSource> InjectorCell<C> {
    /// Returns the injector, running `init` exactly once per process.
    pub fn get_or_init(&self, init: impl FnOnce() -> Injector<C>) -> &Injector<C> {
        self.inner.get_or_init(init)
    }
}

impl<C> Default for InjectorCell<C> {
    fn default() -> Self {
        Self::new()
    }
}
