//! Integration tests for the settlement core
//!
//! These cover the container's state machine, deferred (non-reentrant)
//! handler delivery, and the chaining laws of `then`/`catch`/`done`.
//! Combinators and foreign thenables are covered in separate files:
//!   - combinator_tests.rs (resolved/rejected/race/all/delay/deferred)
//!   - thenable_tests.rs (foreign and misbehaving thenables)

mod common;

use common::{identity, raising, record, returning, Observed};
use pretty_assertions::assert_eq;
use promissory::{Error, EventLoop, Handler, Promise, PromiseState, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn settle_is_idempotent_across_resolve_and_reject() {
    common::init_tracing();
    let mut el = EventLoop::new();
    let deferred = Promise::deferred(&el.scheduler());

    (deferred.resolve)(Value::from(1));
    (deferred.resolve)(Value::from(2));
    (deferred.reject)(Value::from("late"));

    let seen = record(&deferred.promise);
    el.run_to_completion();
    assert_eq!(*seen.borrow(), Some(Observed::Fulfilled(Value::from(1))));
}

#[test]
fn reject_then_resolve_keeps_the_rejection() {
    let mut el = EventLoop::new();
    let deferred = Promise::deferred(&el.scheduler());

    (deferred.reject)(Value::from("first"));
    (deferred.resolve)(Value::from(2));

    let seen = record(&deferred.promise);
    el.run_to_completion();
    assert_eq!(*seen.borrow(), Some(Observed::Rejected(Value::from("first"))));
}

#[test]
fn handlers_never_run_synchronously() {
    let mut el = EventLoop::new();
    let promise = Promise::resolved(&el.scheduler(), Value::from(1));

    // The promise is already settled, yet registration must not deliver
    // before the registering call returns.
    let seen = record(&promise);
    assert!(seen.borrow().is_none());

    el.run_to_completion();
    assert_eq!(*seen.borrow(), Some(Observed::Fulfilled(Value::from(1))));
}

#[test]
fn then_without_handlers_passes_the_value_through() {
    let mut el = EventLoop::new();
    let promise = Promise::resolved(&el.scheduler(), Value::from(7)).then(None, None);

    let seen = record(&promise);
    el.run_to_completion();
    assert_eq!(*seen.borrow(), Some(Observed::Fulfilled(Value::from(7))));
}

#[test]
fn then_without_handlers_propagates_the_reason() {
    let mut el = EventLoop::new();
    let promise = Promise::rejected(&el.scheduler(), Value::from("nope")).then(None, None);

    let seen = record(&promise);
    el.run_to_completion();
    assert_eq!(*seen.borrow(), Some(Observed::Rejected(Value::from("nope"))));
}

#[test]
fn executor_resolve_then_chain_produces_mapped_value() {
    let mut el = EventLoop::new();

    let add_one: Handler = Rc::new(|v: Value| match v {
        Value::Number(n) => Ok(Value::Number(n + 1.0)),
        other => Ok(other),
    });

    let chained = Promise::new(&el.scheduler(), |resolve, _reject| {
        resolve(Value::from(5));
        Ok(())
    })
    .then(Some(add_one), None);

    let seen = record(&chained);
    el.run_to_completion();
    assert_eq!(*seen.borrow(), Some(Observed::Fulfilled(Value::from(6))));
}

#[test]
fn handler_error_rejects_the_derived_promise() {
    let mut el = EventLoop::new();
    let promise = Promise::resolved(&el.scheduler(), Value::from(1))
        .then(Some(raising(Value::from("boom"))), None);

    let seen = record(&promise);
    el.run_to_completion();
    assert_eq!(*seen.borrow(), Some(Observed::Rejected(Value::from("boom"))));
}

#[test]
fn catch_recovers_and_resumes_the_chain() {
    let mut el = EventLoop::new();
    let promise = Promise::rejected(&el.scheduler(), Value::from("oops"))
        .catch(returning(Value::from("recovered")))
        .then(Some(identity()), None);

    let seen = record(&promise);
    el.run_to_completion();
    assert_eq!(
        *seen.borrow(),
        Some(Observed::Fulfilled(Value::from("recovered")))
    );
}

#[test]
fn catch_skips_fulfilled_promises() {
    let mut el = EventLoop::new();
    let promise =
        Promise::resolved(&el.scheduler(), Value::from(4)).catch(returning(Value::from("unused")));

    let seen = record(&promise);
    el.run_to_completion();
    assert_eq!(*seen.borrow(), Some(Observed::Fulfilled(Value::from(4))));
}

#[test]
fn then_returning_a_promise_flattens_into_its_outcome() {
    let mut el = EventLoop::new();
    let sched = el.scheduler();

    let inner = Promise::delay(&sched, 0.01).then(Some(returning(Value::from("inner"))), None);
    let make_inner: Handler = Rc::new(move |_| Ok(Value::Promise(inner.clone())));

    let promise = Promise::resolved(&sched, Value::from(1)).then(Some(make_inner), None);

    let seen = record(&promise);
    el.run_to_completion();
    assert_eq!(*seen.borrow(), Some(Observed::Fulfilled(Value::from("inner"))));
}

#[test]
fn multiple_thens_deliver_in_registration_order() {
    let mut el = EventLoop::new();
    let deferred = Promise::deferred(&el.scheduler());

    let order = Rc::new(RefCell::new(Vec::new()));
    for label in ["first", "second", "third"] {
        let order = order.clone();
        deferred.promise.then(
            Some(Rc::new(move |v: Value| {
                order.borrow_mut().push(label);
                Ok(v)
            }) as Handler),
            None,
        );
    }

    (deferred.resolve)(Value::Undefined);
    el.run_to_completion();
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn self_resolution_rejects_with_cycle_error() {
    let mut el = EventLoop::new();
    let deferred = Promise::deferred(&el.scheduler());
    (deferred.resolve)(Value::Promise(deferred.promise.clone()));

    let seen = record(&deferred.promise);
    el.run_to_completion();
    assert_eq!(
        *seen.borrow(),
        Some(Observed::Rejected(Value::Error(Rc::new(
            Error::SelfResolution
        ))))
    );
}

#[test]
fn executor_error_rejects_with_its_payload() {
    let mut el = EventLoop::new();
    let promise = Promise::new(&el.scheduler(), |_resolve, _reject| {
        Err(Error::thrown("exploded"))
    });

    let seen = record(&promise);
    el.run_to_completion();
    assert_eq!(
        *seen.borrow(),
        Some(Observed::Rejected(Value::from("exploded")))
    );
}

#[test]
fn done_only_invokes_the_matching_branch() {
    let mut el = EventLoop::new();
    let promise = Promise::rejected(&el.scheduler(), Value::from("reason"));

    let fulfilled_ran = Rc::new(RefCell::new(false));
    let flag = fulfilled_ran.clone();
    promise.done(
        Some(Rc::new(move |_| *flag.borrow_mut() = true) as promissory::Callback),
        None,
    );

    el.run_to_completion();
    assert!(!*fulfilled_ran.borrow());
    assert_eq!(promise.state(), PromiseState::Rejected);
}

#[test]
fn state_is_monotonic_after_settlement() {
    let mut el = EventLoop::new();
    let deferred = Promise::deferred(&el.scheduler());

    (deferred.resolve)(Value::from(1));
    assert_eq!(deferred.promise.state(), PromiseState::Fulfilled);
    (deferred.reject)(Value::from("x"));
    assert_eq!(deferred.promise.state(), PromiseState::Fulfilled);

    el.run_to_completion();
    assert_eq!(deferred.promise.state(), PromiseState::Fulfilled);
}
