//! Settlement core
//!
//! A [`Promise`] is a settle-once, observe-many container: it starts
//! `Pending`, transitions exactly once to `Fulfilled` or `Rejected`, and from
//! then on is an immutable record of its outcome. Handlers registered with
//! [`Promise::done`] or [`Promise::then`] are always delivered on a fresh
//! microtask, in registration order, never synchronously within the call
//! that registers them or the call that settles the promise.
//!
//! Resolving a promise runs the resolution procedure: native promises and
//! foreign [`Thenable`](crate::value::Thenable)s are adopted recursively, so
//! chains of nested asynchronous results flatten into one plain outcome.
//! Every adoption attempt goes through a guarded pair of settle paths that
//! is idempotent past the first call, which keeps misbehaving executors and
//! thenables from ever settling a promise twice.

mod combinators;

use crate::error::Error;
use crate::event_loop::Scheduler;
use crate::value::Value;
use crate::Result;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::trace;

/// A bare callback invoked with a settled value or rejection reason.
///
/// Used both for `done` observers and for the settle paths handed to
/// executors and thenables.
pub type Callback = Rc<dyn Fn(Value)>;

/// A chaining handler for `then`/`catch`.
///
/// `Ok` resolves the derived promise with the returned value (which may
/// itself be a promise or thenable); `Err` rejects it.
pub type Handler = Rc<dyn Fn(Value) -> Result<Value>>;

/// Promise state enum
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PromiseState {
    /// Not yet settled
    Pending,
    /// Settled with a value
    Fulfilled,
    /// Settled with a reason
    Rejected,
}

/// A fulfillment/rejection observer pair registered while pending
struct HandlerPair {
    on_fulfilled: Option<Callback>,
    on_rejected: Option<Callback>,
}

struct Inner {
    /// Current state; monotonic, never leaves a terminal state
    state: PromiseState,
    /// The settled value or reason; `None` while pending
    outcome: Option<Value>,
    /// Observers registered while pending, in registration order.
    /// Drained and dropped on settlement.
    waiters: Vec<HandlerPair>,
}

/// The deferred-value container.
///
/// Cloning a `Promise` clones a handle to the same container; identity (as
/// used by the resolution procedure's cycle check) is [`Promise::ptr_eq`].
#[derive(Clone)]
pub struct Promise {
    inner: Rc<RefCell<Inner>>,
    scheduler: Scheduler,
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// A promise paired with externally-callable settle functions, for when the
/// executor-closure pattern is inconvenient.
pub struct Deferred {
    /// The promise under external control
    pub promise: Promise,
    /// Resolves the promise (runs the resolution procedure)
    pub resolve: Callback,
    /// Rejects the promise with an opaque reason
    pub reject: Callback,
}

impl Promise {
    /// Create a promise and run `executor` synchronously with its guarded
    /// settle paths.
    ///
    /// The executor may call either path immediately or stash them for
    /// later; an `Err` return rejects the promise unless a path already
    /// fired.
    pub fn new<F>(scheduler: &Scheduler, executor: F) -> Promise
    where
        F: FnOnce(Callback, Callback) -> Result<()>,
    {
        let promise = Promise::pending(scheduler);
        promise.settle_with(executor);
        promise
    }

    /// Create a pending promise with no executor attached.
    pub(crate) fn pending(scheduler: &Scheduler) -> Promise {
        scheduler.note_promise_created();
        Promise {
            inner: Rc::new(RefCell::new(Inner {
                state: PromiseState::Pending,
                outcome: None,
                waiters: Vec::new(),
            })),
            scheduler: scheduler.clone(),
        }
    }

    /// Current state of the promise.
    pub fn state(&self) -> PromiseState {
        self.inner.borrow().state
    }

    /// The scheduler this promise delivers its callbacks through.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Whether two handles refer to the same container.
    pub fn ptr_eq(a: &Promise, b: &Promise) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Register terminal observers for this promise's outcome.
    ///
    /// If the promise is still pending the pair is queued; otherwise the
    /// matching callback (if any) is scheduled on a fresh microtask. Either
    /// way nothing runs before this call returns.
    pub fn done(&self, on_fulfilled: Option<Callback>, on_rejected: Option<Callback>) {
        let mut inner = self.inner.borrow_mut();
        match inner.state {
            PromiseState::Pending => inner.waiters.push(HandlerPair {
                on_fulfilled,
                on_rejected,
            }),
            PromiseState::Fulfilled => {
                let value = inner.outcome.clone().unwrap_or(Value::Undefined);
                drop(inner);
                if let Some(callback) = on_fulfilled {
                    self.scheduler.defer(move || callback(value));
                }
            }
            PromiseState::Rejected => {
                let reason = inner.outcome.clone().unwrap_or(Value::Undefined);
                drop(inner);
                if let Some(callback) = on_rejected {
                    self.scheduler.defer(move || callback(reason));
                }
            }
        }
    }

    /// Chain onto this promise, producing a new promise for the handler's
    /// result.
    ///
    /// An absent handler passes the outcome through unchanged: a missing
    /// `on_fulfilled` forwards the value, a missing `on_rejected` propagates
    /// the reason.
    pub fn then(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
        let parent = self.clone();
        Promise::new(&self.scheduler, move |resolve, reject| {
            let on_value: Callback = {
                let resolve = resolve.clone();
                let reject = reject.clone();
                Rc::new(move |value| match &on_fulfilled {
                    Some(handler) => match handler(value) {
                        Ok(result) => resolve(result),
                        Err(err) => reject(err.into()),
                    },
                    None => resolve(value),
                })
            };
            let on_reason: Callback = Rc::new(move |reason| match &on_rejected {
                Some(handler) => match handler(reason) {
                    Ok(result) => resolve(result),
                    Err(err) => reject(err.into()),
                },
                None => reject(reason),
            });
            parent.done(Some(on_value), Some(on_reason));
            Ok(())
        })
    }

    /// Chain a rejection handler; shorthand for `then(None, Some(handler))`.
    pub fn catch(&self, on_rejected: Handler) -> Promise {
        self.then(None, Some(on_rejected))
    }

    /// The resolution procedure: unwrap `value` into a final plain outcome.
    ///
    /// Resolving a promise with itself is a cycle and rejects immediately.
    /// Native promises and foreign thenables are adopted through a fresh
    /// guarded attempt; anything else fulfills directly.
    pub(crate) fn resolve(&self, value: Value) {
        match value {
            Value::Promise(ref other) if Promise::ptr_eq(self, other) => {
                self.reject(Error::SelfResolution.into());
            }
            Value::Promise(other) => {
                self.settle_with(move |resolve, reject| {
                    other.done(Some(resolve), Some(reject));
                    Ok(())
                });
            }
            Value::Thenable(thenable) => {
                self.settle_with(move |resolve, reject| thenable.call_then(resolve, reject));
            }
            plain => self.fulfill(plain),
        }
    }

    /// Run one guarded settlement attempt.
    ///
    /// The paths share an attempt-local flag, distinct from the promise's
    /// own state, so a misbehaving attempt can neither settle twice nor
    /// turn a late synchronous error into a second settlement.
    pub(crate) fn settle_with<F>(&self, attempt: F)
    where
        F: FnOnce(Callback, Callback) -> Result<()>,
    {
        let (resolve, reject) = self.settle_paths();
        if let Err(err) = attempt(resolve, reject.clone()) {
            reject(err.into());
        }
    }

    /// Build a guarded resolve/reject pair for one settlement attempt.
    ///
    /// The resolve path re-enters the resolution procedure, so adopted
    /// thenables flatten fully; the reject path settles directly.
    pub(crate) fn settle_paths(&self) -> (Callback, Callback) {
        let settled = Rc::new(Cell::new(false));

        let resolve: Callback = {
            let promise = self.clone();
            let settled = settled.clone();
            Rc::new(move |value| {
                if !settled.replace(true) {
                    promise.resolve(value);
                }
            })
        };
        let reject: Callback = {
            let promise = self.clone();
            Rc::new(move |reason| {
                if !settled.replace(true) {
                    promise.reject(reason);
                }
            })
        };

        (resolve, reject)
    }

    /// Terminal transition to `Fulfilled`. No-op if already settled.
    fn fulfill(&self, value: Value) {
        let mut inner = self.inner.borrow_mut();
        if inner.state != PromiseState::Pending {
            return;
        }
        inner.state = PromiseState::Fulfilled;
        inner.outcome = Some(value.clone());
        let waiters = std::mem::take(&mut inner.waiters);
        drop(inner);

        trace!(waiters = waiters.len(), "promise fulfilled");
        self.scheduler.note_promise_settled();

        for pair in waiters {
            if let Some(callback) = pair.on_fulfilled {
                let value = value.clone();
                self.scheduler.defer(move || callback(value));
            }
        }
    }

    /// Terminal transition to `Rejected`. No-op if already settled.
    pub(crate) fn reject(&self, reason: Value) {
        let mut inner = self.inner.borrow_mut();
        if inner.state != PromiseState::Pending {
            return;
        }
        inner.state = PromiseState::Rejected;
        inner.outcome = Some(reason.clone());
        let waiters = std::mem::take(&mut inner.waiters);
        drop(inner);

        trace!(waiters = waiters.len(), "promise rejected");
        self.scheduler.note_promise_settled();

        for pair in waiters {
            if let Some(callback) = pair.on_rejected {
                let reason = reason.clone();
                self.scheduler.defer(move || callback(reason));
            }
        }
    }
}
