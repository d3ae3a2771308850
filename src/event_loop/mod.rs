//! Deterministic event loop
//!
//! This module provides the host scheduling layer the settlement core sits
//! on: a FIFO microtask queue plus a virtual-time timer queue. Promises only
//! ever talk to a cloneable [`Scheduler`] handle, so the core is portable to
//! any host that can run a closure on a later turn; the [`EventLoop`] is the
//! reference driver used by embedders and by the test suite.
//!
//! Time is virtual: timers fire when [`EventLoop::run_to_completion`]
//! advances the clock to their due time, which makes every schedule fully
//! deterministic and replayable.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::trace;

/// A unit of deferred work: runs exactly once, on its own turn.
pub type Task = Box<dyn FnOnce()>;

/// A scheduled timer (macrotask)
struct Timer {
    /// Unique timer ID
    id: u64,
    /// When the timer should fire (virtual time in ms)
    fire_at: u64,
    /// Is this timer cancelled?
    cancelled: bool,
    /// The work to run when the timer fires
    task: Task,
}

/// Queues and counters shared between the loop and its scheduler handles
struct QueueState {
    /// Microtask queue (high priority, drained between timers)
    microtasks: VecDeque<Task>,
    /// Pending timers
    timers: Vec<Timer>,
    /// Current virtual time in milliseconds
    virtual_time: u64,
    /// Next timer ID
    next_timer_id: u64,
    /// Maximum microtasks to drain per tick (starvation protection)
    max_microtasks_per_tick: usize,
    /// Runtime statistics
    stats: EventLoopStats,
}

impl QueueState {
    fn new() -> Self {
        Self {
            microtasks: VecDeque::new(),
            timers: Vec::new(),
            virtual_time: 0,
            next_timer_id: 1,
            max_microtasks_per_tick: 10_000,
            stats: EventLoopStats::default(),
        }
    }
}

/// Runtime statistics for the event loop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLoopStats {
    /// Total microtasks processed across all ticks
    pub total_microtasks: u64,
    /// Total timers fired across all ticks
    pub total_timers: u64,
    /// Total number of event loop ticks
    pub total_ticks: u64,
    /// Maximum microtasks drained in a single tick
    pub max_microtasks_per_tick: u64,
    /// Total promises created against this loop's scheduler
    pub promises_created: u64,
    /// Total promises settled (fulfilled or rejected)
    pub promises_settled: u64,
}

/// Result of running the event loop to completion via `run_to_completion()`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// Total number of microtasks that were dequeued and processed
    pub microtasks_processed: usize,
    /// Total number of timers that fired
    pub timers_fired: usize,
    /// Number of event loop iterations (each iteration = drain microtasks + one timer)
    pub iterations: usize,
    /// The virtual time when the event loop finished
    pub final_time: u64,
}

/// Cloneable handle for enqueueing deferred work.
///
/// This is the single scheduling interface the promise layer depends on.
/// Handles are cheap to clone and all feed the same loop.
#[derive(Clone)]
pub struct Scheduler {
    state: Rc<RefCell<QueueState>>,
}

impl Scheduler {
    /// Enqueue a microtask to run on the next drain.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.state.borrow_mut().microtasks.push_back(Box::new(task));
    }

    /// Schedule a task to run after `delay_ms` of virtual time. Returns a
    /// timer ID usable with [`Scheduler::cancel_timer`].
    pub fn defer_after(&self, delay_ms: u64, task: impl FnOnce() + 'static) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_timer_id;
        state.next_timer_id += 1;

        let fire_at = state.virtual_time + delay_ms;
        state.timers.push(Timer {
            id,
            fire_at,
            cancelled: false,
            task: Box::new(task),
        });
        trace!(id, fire_at, "timer scheduled");

        id
    }

    /// Schedule a task with 0 ms delay (equivalent to `setImmediate`).
    pub fn defer_immediate(&self, task: impl FnOnce() + 'static) -> u64 {
        self.defer_after(0, task)
    }

    /// Cancel a timer by ID. Cancelling an already-fired timer is a no-op.
    pub fn cancel_timer(&self, id: u64) {
        let mut state = self.state.borrow_mut();
        for timer in &mut state.timers {
            if timer.id == id {
                timer.cancelled = true;
                break;
            }
        }
    }

    /// Current virtual time in milliseconds.
    pub fn current_time(&self) -> u64 {
        self.state.borrow().virtual_time
    }

    pub(crate) fn note_promise_created(&self) {
        self.state.borrow_mut().stats.promises_created += 1;
    }

    pub(crate) fn note_promise_settled(&self) {
        self.state.borrow_mut().stats.promises_settled += 1;
    }
}

/// The event loop owns the task queues and drives execution order
pub struct EventLoop {
    state: Rc<RefCell<QueueState>>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Create a new event loop with empty queues at virtual time zero.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(QueueState::new())),
        }
    }

    /// Get a scheduler handle feeding this loop.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler {
            state: self.state.clone(),
        }
    }

    /// Get current virtual time
    pub fn current_time(&self) -> u64 {
        self.state.borrow().virtual_time
    }

    /// Advance virtual time without running anything
    pub fn advance_time(&mut self, ms: u64) {
        self.state.borrow_mut().virtual_time += ms;
    }

    /// Check if there are pending microtasks
    pub fn has_pending_microtasks(&self) -> bool {
        !self.state.borrow().microtasks.is_empty()
    }

    /// Check if there are pending (non-cancelled) timers
    pub fn has_pending_timers(&self) -> bool {
        self.state.borrow().timers.iter().any(|t| !t.cancelled)
    }

    /// Check if the event loop has any pending work
    pub fn has_pending_work(&self) -> bool {
        self.has_pending_microtasks() || self.has_pending_timers()
    }

    /// Get the virtual time of the next scheduled timer
    pub fn next_timer_time(&self) -> Option<u64> {
        self.state
            .borrow()
            .timers
            .iter()
            .filter(|t| !t.cancelled)
            .map(|t| t.fire_at)
            .min()
    }

    /// Set the maximum number of microtasks to drain per tick.
    pub fn set_microtask_budget(&mut self, limit: usize) {
        self.state.borrow_mut().max_microtasks_per_tick = limit;
    }

    /// Get the current microtask budget limit.
    pub fn microtask_budget(&self) -> usize {
        self.state.borrow().max_microtasks_per_tick
    }

    /// Get a snapshot of the current event loop statistics.
    pub fn stats(&self) -> EventLoopStats {
        self.state.borrow().stats.clone()
    }

    /// Reset all event loop statistics to zero.
    pub fn reset_stats(&mut self) {
        self.state.borrow_mut().stats = EventLoopStats::default();
    }

    /// Drop all pending work (for cleanup)
    pub fn clear(&mut self) {
        let mut state = self.state.borrow_mut();
        state.microtasks.clear();
        state.timers.clear();
    }

    /// Run the event loop to completion following the standard algorithm:
    ///   1. Drain microtasks (budget-limited)
    ///   2. If a timer is due, fire it (advancing virtual time if needed)
    ///   3. Repeat from step 1
    ///   4. Stop when no microtasks and no timers remain
    ///
    /// Returns a `RunResult` with statistics about what was processed.
    pub fn run_to_completion(&mut self) -> RunResult {
        let mut result = RunResult::default();

        loop {
            // Step 1: drain microtasks up to the per-tick budget
            result.microtasks_processed += self.drain_microtasks();

            // Step 2: fire one due timer, advancing the clock if nothing is
            // due at the current time
            let timer = if self.has_pending_timers() {
                match self.take_due_timer() {
                    Some(task) => Some(task),
                    None => self.advance_to_next_timer(),
                }
            } else {
                None
            };

            self.state.borrow_mut().stats.total_ticks += 1;

            if let Some(task) = timer {
                task();
                result.timers_fired += 1;
                result.iterations += 1;
                self.state.borrow_mut().stats.total_timers += 1;
                continue;
            }

            // No timer fired; if the microtask queue is also empty we're done
            if !self.has_pending_microtasks() {
                break;
            }

            result.iterations += 1;
        }

        result.final_time = self.current_time();
        trace!(
            microtasks = result.microtasks_processed,
            timers = result.timers_fired,
            final_time = result.final_time,
            "event loop drained"
        );
        result
    }

    /// Run queued microtasks up to the per-tick budget, returning the count.
    ///
    /// The queue borrow is released before each task runs so tasks can
    /// enqueue more work through their captured `Scheduler` handles.
    fn drain_microtasks(&mut self) -> usize {
        let budget = self.state.borrow().max_microtasks_per_tick;
        let mut count = 0usize;

        while count < budget {
            let task = self.state.borrow_mut().microtasks.pop_front();
            let Some(task) = task else { break };
            task();
            count += 1;
        }

        let mut state = self.state.borrow_mut();
        state.stats.total_microtasks += count as u64;
        if count as u64 > state.stats.max_microtasks_per_tick {
            state.stats.max_microtasks_per_tick = count as u64;
        }
        count
    }

    /// Remove and return the earliest timer due at the current virtual time.
    fn take_due_timer(&mut self) -> Option<Task> {
        let mut state = self.state.borrow_mut();
        state.timers.retain(|t| !t.cancelled);

        let now = state.virtual_time;
        let due = state
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.fire_at <= now)
            .min_by_key(|(_, t)| t.fire_at)
            .map(|(i, _)| i);

        due.map(|i| state.timers.remove(i).task)
    }

    /// Advance virtual time to the next scheduled timer and take it.
    fn advance_to_next_timer(&mut self) -> Option<Task> {
        let fire_at = self.next_timer_time()?;
        self.state.borrow_mut().virtual_time = fire_at;
        self.take_due_timer()
    }
}
