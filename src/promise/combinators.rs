//! Combinator layer: pure compositions over the settlement core.

use super::{Callback, Deferred, Promise};
use crate::error::Error;
use crate::event_loop::Scheduler;
use crate::value::Value;
use crate::Result;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

impl Promise {
    /// A promise resolved with `value`.
    ///
    /// Runs the resolution procedure, so passing a promise or thenable
    /// yields a promise that settles identically to it rather than a
    /// double-wrapped value.
    pub fn resolved(scheduler: &Scheduler, value: Value) -> Promise {
        let promise = Promise::pending(scheduler);
        promise.resolve(value);
        promise
    }

    /// A promise rejected with `reason`. Reasons are opaque: no unwrapping.
    pub fn rejected(scheduler: &Scheduler, reason: Value) -> Promise {
        let promise = Promise::pending(scheduler);
        promise.reject(reason);
        promise
    }

    /// A promise settling with the first member to settle.
    ///
    /// Members are coerced through [`Promise::resolved`] and forwarded
    /// straight into the aggregate's guarded settle paths, so every
    /// settlement after the first is a no-op. An empty slice yields a
    /// promise that never settles.
    pub fn race(scheduler: &Scheduler, entries: &[Value]) -> Promise {
        let entries = entries.to_vec();
        let sched = scheduler.clone();
        Promise::new(scheduler, move |resolve, reject| {
            for entry in entries {
                Promise::resolved(&sched, entry).done(Some(resolve.clone()), Some(reject.clone()));
            }
            Ok(())
        })
    }

    /// A promise fulfilling with every member's value, in input order, once
    /// all members fulfill; rejecting with the first member's reason
    /// otherwise.
    ///
    /// `entries` must be a `Value::Array`; anything else is an
    /// `Error::NotAnArray`. An empty array fulfills immediately with an
    /// empty array.
    pub fn all(scheduler: &Scheduler, entries: Value) -> Result<Promise> {
        let items = match entries {
            Value::Array(items) => items,
            other => return Err(Error::NotAnArray(other.type_name())),
        };
        if items.is_empty() {
            return Ok(Promise::resolved(scheduler, Value::Array(Vec::new())));
        }

        let sched = scheduler.clone();
        Ok(Promise::new(scheduler, move |resolve, reject| {
            let state = Rc::new(AllState {
                scheduler: sched,
                slots: RefCell::new(vec![None; items.len()]),
                remaining: Cell::new(items.len()),
                resolve,
                reject,
            });
            for (index, item) in items.into_iter().enumerate() {
                settle_index(&state, index, item);
            }
            Ok(())
        }))
    }

    /// A promise fulfilling with `Value::Undefined` after `seconds` of
    /// virtual time. Fire-and-forget: there is no cancel path.
    pub fn delay(scheduler: &Scheduler, seconds: f64) -> Promise {
        let sched = scheduler.clone();
        Promise::new(scheduler, move |resolve, _reject| {
            let delay_ms = (seconds * 1000.0).max(0.0) as u64;
            sched.defer_after(delay_ms, move || resolve(Value::Undefined));
            Ok(())
        })
    }

    /// A pending promise whose settle functions are exposed on the returned
    /// handle for out-of-band settlement.
    pub fn deferred(scheduler: &Scheduler) -> Deferred {
        let promise = Promise::pending(scheduler);
        let (resolve, reject) = promise.settle_paths();
        Deferred {
            promise,
            resolve,
            reject,
        }
    }
}

/// Shared progress for one `all` aggregate
struct AllState {
    scheduler: Scheduler,
    /// Per-index slots; a filled slot is this index's terminal result
    slots: RefCell<Vec<Option<Value>>>,
    /// Indices still awaiting their first terminal write
    remaining: Cell<usize>,
    resolve: Callback,
    reject: Callback,
}

/// Record one member's value at its index.
///
/// Thenable members are adopted first, re-entering here with whatever they
/// settle to. The slot acts as a per-index idempotent guard: a
/// non-conforming member that invokes its callback more than once finds the
/// slot already filled and cannot decrement the remaining counter again.
fn settle_index(state: &Rc<AllState>, index: usize, value: Value) {
    if value.is_thenable() {
        let member = Promise::resolved(&state.scheduler, value);
        let on_value: Callback = {
            let state = state.clone();
            Rc::new(move |v| settle_index(&state, index, v))
        };
        member.done(Some(on_value), Some(state.reject.clone()));
        return;
    }

    {
        let mut slots = state.slots.borrow_mut();
        if slots[index].is_some() {
            return;
        }
        slots[index] = Some(value);
    }

    state.remaining.set(state.remaining.get() - 1);
    if state.remaining.get() == 0 {
        let values: Vec<Value> = state
            .slots
            .borrow_mut()
            .iter_mut()
            .map(|slot| slot.take().unwrap_or(Value::Undefined))
            .collect();
        (state.resolve)(Value::Array(values));
    }
}
