#![forbid(unsafe_code)]

//! Directly mutable stores.

use std::fmt;

use crate::observable::{Observable, Subscription};
use crate::store::Store;

/// A reactive value that any holder may set or update directly.
///
/// There is no disposal concept: a `Writable` notifies its observers for as
/// long as it lives, and observers stop only by unsubscribing individually.
///
/// Cloning a `Writable` creates a new handle to the **same** store.
pub struct Writable<T> {
    store: Store<T>,
}

impl<T> Clone for Writable<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Writable<T> {
    /// Create a writable store with the given initial value.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            store: Store::new(initial),
        }
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.store.get()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.store.with(f)
    }

    /// Set a new value. Equality suppression applies: setting a value equal
    /// to the current one notifies nobody.
    pub fn set(&self, value: T) {
        self.store.set_value(value);
    }

    /// Replace the value with `f(current)`.
    ///
    /// `f` is a pure old-to-new mapping; it runs on a clone of the current
    /// value with no internal borrow held. A panicking `f` propagates to the
    /// caller and leaves the value unchanged.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.store.get();
        self.store.set_value(f(&current));
    }

    /// Subscribe to value changes. See [`Observable::subscribe`].
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.store.subscribe(callback)
    }

    /// Current version number. Increments by 1 per value-changing mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.store.version()
    }

    /// Number of currently registered observers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.store.observer_count()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> for Writable<T> {
    fn get(&self) -> T {
        self.store.get()
    }

    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.store.with(f)
    }

    fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.store.subscribe(callback)
    }
}

impl<T: fmt::Debug + Clone + PartialEq + 'static> fmt::Debug for Writable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.store.with(|value| {
            f.debug_struct("Writable")
                .field("value", value)
                .field("version", &self.store.version())
                .field("subscriber_count", &self.store.observer_count())
                .finish()
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
