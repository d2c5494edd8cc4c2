//! Virtual-time event queue
//!
//! The RRC layer never blocks: every wait is a named timer armed through a
//! [`Scheduler`]. [`VirtualScheduler`] is the deterministic implementation
//! used by simulations and tests. Events due at the same virtual time fire in
//! the order they were scheduled, and cancelling a handle that already fired
//! or was already cancelled is a no-op.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A point in virtual time, in milliseconds since the start of the run.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimTime(u64);

impl SimTime {
    /// The start of the run.
    pub const ZERO: SimTime = SimTime(0);

    /// Creates a time from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Returns the time in milliseconds.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns this time advanced by `delay`, saturating at the maximum.
    pub fn saturating_add(self, delay: Duration) -> Self {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(ms))
    }

    /// Returns the time elapsed since `earlier`, or zero if `earlier` is later.
    pub fn duration_since(self, earlier: SimTime) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Opaque handle identifying one scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Returns the raw handle value, useful only for logging.
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling collaborator.
///
/// Implementations must fire events scheduled for the same time in
/// scheduling order and must treat repeated or late cancellation as a no-op.
pub trait Scheduler<E> {
    /// Schedules `event` to fire `delay` after the current time.
    fn schedule_after(&mut self, delay: Duration, event: E) -> TimerHandle;

    /// Cancels a pending event. Unknown or already fired handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);

    /// Returns the current virtual time.
    fn now(&self) -> SimTime;
}

/// An event popped from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredEvent<E> {
    /// Time the event was due
    pub time: SimTime,
    /// Handle returned when the event was scheduled
    pub handle: TimerHandle,
    /// The event payload
    pub event: E,
}

/// Deterministic discrete-event queue keyed by `(time, sequence)`.
#[derive(Debug)]
pub struct VirtualScheduler<E> {
    now: SimTime,
    next_seq: u64,
    queue: BTreeMap<(SimTime, u64), E>,
    pending: HashMap<TimerHandle, SimTime>,
}

impl<E> Default for VirtualScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> VirtualScheduler<E> {
    /// Creates an empty queue at time zero.
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            next_seq: 0,
            queue: BTreeMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Returns the due time of the earliest pending event.
    pub fn next_deadline(&self) -> Option<SimTime> {
        self.queue.keys().next().map(|(time, _)| *time)
    }

    /// Returns the number of pending events.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if `handle` is still waiting to fire.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    /// Pops the earliest event due at or before `until`, advancing the clock
    /// to its due time.
    pub fn pop_due(&mut self, until: SimTime) -> Option<FiredEvent<E>> {
        let (&(time, seq), _) = self.queue.iter().next()?;
        if time > until {
            return None;
        }
        let event = self.queue.remove(&(time, seq))?;
        let handle = TimerHandle(seq);
        self.pending.remove(&handle);
        if time > self.now {
            self.now = time;
        }
        Some(FiredEvent {
            time,
            handle,
            event,
        })
    }

    /// Moves the clock forward to `time`. The clock never moves backwards.
    ///
    /// Callers drain [`pop_due`](Self::pop_due) first; events left before
    /// `time` stay queued and fire on the next pop.
    pub fn advance_to(&mut self, time: SimTime) {
        if time > self.now {
            self.now = time;
        }
    }
}

impl<E> Scheduler<E> for VirtualScheduler<E> {
    fn schedule_after(&mut self, delay: Duration, event: E) -> TimerHandle {
        let time = self.now.saturating_add(delay);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert((time, seq), event);
        let handle = TimerHandle(seq);
        self.pending.insert(handle, time);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(time) = self.pending.remove(&handle) {
            self.queue.remove(&(time, handle.0));
        }
    }

    fn now(&self) -> SimTime {
        self.now
    }
}
