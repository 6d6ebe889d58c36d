#![forbid(unsafe_code)]

//! Producer-driven stores with a one-shot disposal lifecycle.
//!
//! # Design
//!
//! A [`Readable<T>`] is driven by a `start` function supplied at
//! construction. `start` receives a guarded [`Setter`] and a [`Getter`] bound
//! to the underlying store, runs synchronously, and may return a [`Cleanup`]
//! that is retained until disposal.
//!
//! The setter handle is cheap to clone and `'static`, so producers can stash
//! it in timer or network callbacks that fire long after construction. The
//! disposal flag is the sole safety gate for such late calls: once the store
//! is disposed, every `set` fails with [`DisposedError`] and the last value
//! is retained forever.
//!
//! # State machine
//!
//! `{active} --dispose()--> {disposed}` (terminal). Any `set` in `{disposed}`
//! errors; `dispose()` from `{disposed}` errors.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::DisposedError;
use crate::observable::{Observable, Subscription};
use crate::store::Store;

/// Callback released exactly once on teardown: on disposal for a
/// [`Readable`], and additionally before each recomputation in the derivation
/// combinators.
pub type Cleanup = Box<dyn FnOnce()>;

/// Disposal state shared between a [`Readable`] and its [`Setter`] handles.
struct Lifecycle {
    /// Monotonic: false at construction, true forever after disposal.
    disposed: Cell<bool>,
    cleanup: RefCell<Option<Cleanup>>,
}

/// A reactive value driven by an internal producer function, with a one-shot
/// disposal lifecycle.
///
/// Cloning a `Readable` creates a new handle to the **same** store and
/// lifecycle.
pub struct Readable<T> {
    store: Store<T>,
    lifecycle: Rc<Lifecycle>,
}

impl<T> Clone for Readable<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            lifecycle: Rc::clone(&self.lifecycle),
        }
    }
}

/// Guarded write handle passed to producer functions.
///
/// Cloneable and `'static`; safe to move into asynchronous callbacks. Every
/// `set` checks the disposal flag of the owning [`Readable`] first.
pub struct Setter<T> {
    store: Store<T>,
    lifecycle: Rc<Lifecycle>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            lifecycle: Rc::clone(&self.lifecycle),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Setter<T> {
    /// Set a new value on the owning store.
    ///
    /// Equality suppression applies as usual. Fails with [`DisposedError`]
    /// once the owning [`Readable`] has been disposed, leaving the retained
    /// value unchanged.
    pub fn set(&self, value: T) -> Result<(), DisposedError> {
        if self.lifecycle.disposed.get() {
            return Err(DisposedError);
        }
        self.store.set_value(value);
        Ok(())
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("disposed", &self.lifecycle.disposed.get())
            .finish_non_exhaustive()
    }
}

/// Read handle passed to producer functions. Never fails, before or after
/// disposal.
pub struct Getter<T> {
    store: Store<T>,
}

impl<T> Clone for Getter<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Getter<T> {
    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.store.get()
    }
}

impl<T> fmt::Debug for Getter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getter").finish_non_exhaustive()
    }
}

impl<T: Clone + PartialEq + 'static> Readable<T> {
    /// Create a readable store driven by `start`.
    ///
    /// `start` runs synchronously before `new` returns. Whatever it returns
    /// (a cleanup callback or `None`) is retained and released exactly once
    /// on disposal.
    pub fn new(
        start: impl FnOnce(Setter<T>, Getter<T>) -> Option<Cleanup>,
        initial: T,
    ) -> Self {
        let store = Store::new(initial);
        let lifecycle = Rc::new(Lifecycle {
            disposed: Cell::new(false),
            cleanup: RefCell::new(None),
        });
        let setter = Setter {
            store: store.clone(),
            lifecycle: Rc::clone(&lifecycle),
        };
        let getter = Getter {
            store: store.clone(),
        };
        let cleanup = start(setter, getter);
        *lifecycle.cleanup.borrow_mut() = cleanup;
        Self { store, lifecycle }
    }

    /// Get a clone of the current value. Never fails; after disposal this
    /// returns the final retained value.
    pub fn get(&self) -> T {
        self.store.get()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.store.with(f)
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

    /// Whether the store has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.disposed.get()
    }

    /// Dispose the store, running the retained cleanup exactly once.
    ///
    /// After disposal the last value stays readable but can never change:
    /// every guarded setter fails from this point on. Fails with
    /// [`DisposedError`] if already disposed.
    pub fn dispose(&self) -> Result<(), DisposedError> {
        if self.lifecycle.disposed.get() {
            return Err(DisposedError);
        }
        self.lifecycle.disposed.set(true);
        tracing::debug!("store disposed");
        let cleanup = self.lifecycle.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
        Ok(())
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> for Readable<T> {
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

impl<T: fmt::Debug + Clone + PartialEq + 'static> fmt::Debug for Readable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.store.with(|value| {
            f.debug_struct("Readable")
                .field("value", value)
                .field("version", &self.store.version())
                .field("disposed", &self.lifecycle.disposed.get())
                .finish()
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
