//! Promissory: deterministic promises for single-threaded cooperative runtimes
//!
//! Promissory is a standalone deferred-value primitive: a settle-once,
//! observe-many [`Promise`] with non-reentrant callback delivery, recursive
//! flattening of nested asynchronous results (native promises and foreign
//! [`Thenable`]s alike), and a small combinator set (`resolved`, `rejected`,
//! `race`, `all`, `delay`, `deferred`). Everything runs on a deterministic
//! [`EventLoop`] with a FIFO microtask queue and virtual-time timers, so
//! schedules are replayable and testable without wall-clock sleeps.
//!
//! # Quick Start
//!
//! ```
//! use promissory::{EventLoop, Handler, Promise, Value};
//! use std::rc::Rc;
//!
//! let mut el = EventLoop::new();
//!
//! let add_one: Handler = Rc::new(|v: Value| match v {
//!     Value::Number(n) => Ok(Value::Number(n + 1.0)),
//!     other => Ok(other),
//! });
//!
//! let chained = Promise::new(&el.scheduler(), |resolve, _reject| {
//!     resolve(Value::from(5));
//!     Ok(())
//! })
//! .then(Some(add_one), None);
//!
//! el.run_to_completion();
//! assert_eq!(chained.state(), promissory::PromiseState::Fulfilled);
//! ```
//!
//! # Module Overview
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Core** | [`promise`] (state machine, resolution procedure, chaining, combinators) |
//! | **Scheduling** | [`event_loop`] (microtask queue, virtual-time timers, run loop) |
//! | **Data** | [`value`] (dynamic outcome model, `Thenable` seam), [`Error`] |

pub mod event_loop;
pub mod promise;
pub mod value;

mod error;

pub use error::{Error, Result};
pub use event_loop::{EventLoop, EventLoopStats, RunResult, Scheduler};
pub use promise::{Callback, Deferred, Handler, Promise, PromiseState};
pub use value::{Thenable, Value};

/// Promissory version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
