#![forbid(unsafe_code)]

//! Synchronous reactive value stores.
//!
//! A state-propagation primitive for event-driven UIs: a store holds a
//! current value, notifies subscribers synchronously whenever that value
//! changes, and can be derived from one or more other stores.
//!
//! - [`Writable`]: a store any holder may set or update directly.
//! - [`Readable`]: a store driven by a producer function, with a one-shot
//!   disposal lifecycle and an optional cleanup callback.
//! - [`derived`] and friends: stores computed from other stores, recomputing
//!   on every source change.
//! - [`Observable`]: the read-only capability surface shared by all of them.
//!
//! # Architecture
//!
//! Stores use `Rc<RefCell<..>>` for single-threaded shared ownership; none of
//! the types are `Send` or `Sync`. Notification is a synchronous full fan-out:
//! every distinct value change invokes all subscriber callbacks before
//! control returns to the mutator. There is no batching, coalescing, or
//! cycle detection.
//!
//! # Invariants
//!
//! 1. `subscribe` delivers exactly one synchronous notification with the
//!    current value before it returns.
//! 2. Setting a value equal to the current one (by `PartialEq`) notifies
//!    nobody; this is the sole suppression rule.
//! 3. Once a [`Readable`] is disposed its value can never change again;
//!    mutation attempts and repeat disposal fail with [`DisposedError`].
//! 4. Cleanup callbacks run exactly once per disposal, and exactly once
//!    before each recomputation in the derivation combinators.
//!
//! # Example
//!
//! ```
//! use rxstore::{derived, writable};
//!
//! let count = writable(2);
//! let doubled = derived(&count, |n| n * 2);
//! assert_eq!(doubled.get(), 4);
//!
//! count.set(21);
//! assert_eq!(doubled.get(), 42);
//!
//! doubled.dispose().unwrap();
//! count.set(100); // The disposed store no longer follows its source.
//! assert_eq!(doubled.get(), 42);
//! ```

pub mod derived;
pub mod error;
pub mod observable;
pub mod readable;
mod store;
pub mod writable;

pub use derived::{derived, derived2, derived2_with, derived3, derived3_with, derived_with};
pub use error::DisposedError;
pub use observable::{Observable, Subscription};
pub use readable::{Cleanup, Getter, Readable, Setter};
pub use writable::Writable;

/// Create a [`Writable`] store holding `initial`.
///
/// ```
/// let count = rxstore::writable(42);
/// count.update(|x| x + 9);
/// assert_eq!(count.get(), 51);
/// ```
pub fn writable<T: Clone + PartialEq + 'static>(initial: T) -> Writable<T> {
    Writable::new(initial)
}

/// Create a [`Readable`] store driven by `start`.
///
/// `start` runs synchronously with a guarded [`Setter`] and a [`Getter`]; it
/// may return a [`Cleanup`] that runs when the store is disposed.
///
/// ```
/// let ticks = rxstore::readable(
///     |set, get| {
///         set.set(get.get() + 1).unwrap();
///         None
///     },
///     0,
/// );
/// assert_eq!(ticks.get(), 1);
/// ```
pub fn readable<T: Clone + PartialEq + 'static>(
    start: impl FnOnce(Setter<T>, Getter<T>) -> Option<Cleanup>,
    initial: T,
) -> Readable<T> {
    Readable::new(start, initial)
}
