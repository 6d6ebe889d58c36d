#![forbid(unsafe_code)]

//! The read-only capability surface of a store, and the subscription handle.

use std::fmt;

/// Read-only capability surface shared by every store type.
///
/// An `Observable` exposes the current value and change subscription, but no
/// mutation. [`Writable`](crate::Writable) and [`Readable`](crate::Readable)
/// both implement it, so the derivation combinators in [`crate::derived`]
/// accept either as a source.
pub trait Observable<T> {
    /// Get a clone of the current value.
    fn get(&self) -> T;

    /// Access the current value by reference without cloning.
    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R;

    /// Subscribe to value changes.
    ///
    /// The callback is invoked synchronously with the current value once
    /// before `subscribe` returns (subscription is never silent), and then
    /// again on every subsequent value change until unsubscribed.
    fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription;
}

/// Handle for an active subscription.
///
/// Calling [`unsubscribe`](Subscription::unsubscribe) removes the observer
/// from its owning store; repeated calls, and calls after the store has been
/// dropped, are no-ops.
///
/// Dropping the handle does **not** unsubscribe: an observer stays attached
/// for the lifetime of its store unless explicitly unsubscribed.
pub struct Subscription {
    cancel: Box<dyn Fn()>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl Fn() + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Remove the observer from its owning store.
    ///
    /// Idempotent: removing an observer that is already gone is harmless.
    pub fn unsubscribe(&self) {
        (self.cancel)();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
