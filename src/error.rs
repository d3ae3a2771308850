//! Error types for the promissory deferred-value library

use crate::value::Value;
use std::rc::Rc;
use thiserror::Error;

/// Result type used throughout promissory
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the settlement core and the combinator layer.
///
/// Every variant ultimately becomes a rejection reason: promises are the
/// sole error channel, so nothing here is ever surfaced as an unhandled
/// fault by the library itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A promise was resolved with itself, which would wait forever.
    #[error("chaining cycle detected: a promise cannot be resolved with itself")]
    SelfResolution,

    /// `Promise::all` was given something other than an array.
    #[error("expected an array of inputs, got {0}")]
    NotAnArray(&'static str),

    /// An arbitrary value raised by an executor or a `then` handler.
    ///
    /// This is the Rust rendering of a thrown value: handlers return
    /// `Err(Error::thrown(..))` and the payload travels down the rejection
    /// path unchanged.
    #[error("uncaught value: {0}")]
    Thrown(Box<Value>),
}

impl Error {
    /// Raise an arbitrary value from inside a handler or executor.
    pub fn thrown(value: impl Into<Value>) -> Error {
        Error::Thrown(Box::new(value.into()))
    }
}

impl From<Error> for Value {
    /// Convert an error into a rejection reason.
    ///
    /// `Thrown` payloads pass through opaquely; structural errors are
    /// wrapped so handlers can still match on the variant.
    fn from(err: Error) -> Value {
        match err {
            Error::Thrown(value) => *value,
            other => Value::Error(Rc::new(other)),
        }
    }
}
