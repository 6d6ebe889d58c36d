#![forbid(unsafe_code)]

//! Shared subscribe/notify engine backing every store type.
//!
//! # Design
//!
//! [`Store<T>`] wraps a value in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). Observers are kept in an insertion-ordered list keyed
//! by a unique per-subscription token. When the value changes (determined by
//! `PartialEq`), every currently-subscribed observer is notified in
//! registration order.
//!
//! This type is crate-internal: the public store types ([`crate::Writable`],
//! [`crate::Readable`]) own a `Store` and layer their mutation or lifecycle
//! API on top of it.
//!
//! # Invariants
//!
//! 1. `subscribe` delivers exactly one synchronous notification with the
//!    current value before returning.
//! 2. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications). This is the sole suppression rule.
//! 3. The stored value is updated before any observer is notified.
//! 4. Observers are notified in registration order; an observer removed
//!    during a fan-out is not notified later in that same fan-out.
//! 5. `version` increments by exactly 1 per value-changing mutation.
//!
//! # Re-entrancy
//!
//! No `RefCell` borrow is held while an observer callback runs, so a callback
//! that mutates the same store recurses through `set_value` and the fan-out
//! within the same call stack instead of panicking. Handlers must not assume
//! isolation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::observable::Subscription;

type Callback<T> = Rc<dyn Fn(&T)>;

struct StoreInner<T> {
    value: T,
    version: u64,
    next_token: u64,
    /// Observers in subscription order. Membership is keyed by token, so
    /// identity never depends on callback address.
    observers: Vec<(u64, Callback<T>)>,
}

pub(crate) struct Store<T> {
    inner: Rc<RefCell<StoreInner<T>>>,
}

// Manual Clone: shares the same inner state.
impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Store<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                value,
                version: 0,
                next_token: 0,
                observers: Vec::new(),
            })),
        }
    }

    pub(crate) fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    pub(crate) fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    /// Register an observer and deliver the current value to it synchronously.
    pub(crate) fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let callback: Callback<T> = Rc::new(callback);
        let token = {
            let mut inner = self.inner.borrow_mut();
            let token = inner.next_token;
            inner.next_token += 1;
            inner.observers.push((token, Rc::clone(&callback)));
            token
        };
        tracing::trace!(token, "observer subscribed");

        // First notification happens before `subscribe` returns.
        let value = self.inner.borrow().value.clone();
        callback(&value);

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().observers.retain(|(t, _)| *t != token);
                tracing::trace!(token, "observer unsubscribed");
            }
        })
    }

    /// Replace the value and fan out to observers, unless the new value
    /// equals the current one.
    pub(crate) fn set_value(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    fn notify(&self) {
        // Walk a token snapshot and re-check membership before each call: an
        // observer unsubscribed by an earlier callback in this pass must not
        // be notified. The value is re-read per observer so a re-entrant
        // `set_value` makes later observers see the newest value.
        let tokens: Vec<u64> = self
            .inner
            .borrow()
            .observers
            .iter()
            .map(|(token, _)| *token)
            .collect();
        for token in tokens {
            let live = {
                let inner = self.inner.borrow();
                inner
                    .observers
                    .iter()
                    .find(|(t, _)| *t == token)
                    .map(|(_, callback)| (Rc::clone(callback), inner.value.clone()))
            };
            if let Some((callback, value)) = live {
                callback(&value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
