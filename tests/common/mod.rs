//! Shared test helpers for integration tests

use promissory::{Callback, Handler, Promise, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// The observed terminal outcome of a promise
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Fulfilled(Value),
    Rejected(Value),
}

/// Initialize tracing output for tests (idempotent)
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Record a promise's terminal outcome through `done`
pub fn record(promise: &Promise) -> Rc<RefCell<Option<Observed>>> {
    let seen = Rc::new(RefCell::new(None));
    let on_value = {
        let seen = seen.clone();
        Rc::new(move |v: Value| *seen.borrow_mut() = Some(Observed::Fulfilled(v))) as Callback
    };
    let on_reason = {
        let seen = seen.clone();
        Rc::new(move |r: Value| *seen.borrow_mut() = Some(Observed::Rejected(r))) as Callback
    };
    promise.done(Some(on_value), Some(on_reason));
    seen
}

/// A `then` handler that ignores its input and returns a fixed value
#[allow(dead_code)]
pub fn returning(value: Value) -> Handler {
    Rc::new(move |_| Ok(value.clone()))
}

/// A `then` handler that raises a fixed value
#[allow(dead_code)]
pub fn raising(value: Value) -> Handler {
    Rc::new(move |_| Err(promissory::Error::thrown(value.clone())))
}

/// A `then` handler that passes its input through unchanged
#[allow(dead_code)]
pub fn identity() -> Handler {
    Rc::new(|v: Value| Ok(v))
}
