#![forbid(unsafe_code)]

//! Error type for lifecycle violations on disposable stores.

use std::fmt;

/// A disposed store was mutated or disposed a second time.
///
/// Raised by [`Setter::set`](crate::Setter::set) after the owning
/// [`Readable`](crate::Readable) has been disposed, and by
/// [`Readable::dispose`](crate::Readable::dispose) when disposal has already
/// happened. Both cases are caller bugs; the store's retained value is left
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisposedError;

impl fmt::Display for DisposedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store has been disposed")
    }
}

impl std::error::Error for DisposedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_message() {
        assert_eq!(DisposedError.to_string(), "store has been disposed");
    }

    #[test]
    fn is_std_error() {
        fn assert_error<E: std::error::Error>(_e: E) {}
        assert_error(DisposedError);
    }
}
