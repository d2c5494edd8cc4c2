//! Named RRC procedure timers
//!
//! Every UE context holds at most one live handle per [`TimerKind`]. Arming
//! a kind that is already armed cancels the old handle first, so a firing
//! whose handle no longer matches is stale and gets dropped.

use std::fmt;
use std::time::Duration;

use nextgsim_common::{RrcTimerConfig, Rnti, Scheduler, TimerHandle};
use tracing::debug;

/// RRC procedure timer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// No connection request after random access
    ConnectionRequest,
    /// No setup complete after RRC Setup
    ConnectionSetup,
    /// Lifetime of a rejected context
    ConnectionRejected,
    /// UE did not arrive at the handover target
    HandoverJoining,
    /// Source side of a handover was never released
    HandoverLeaving,
    /// No user data for a while
    DataInactivity,
}

impl TimerKind {
    /// Every kind, in slot order.
    pub const ALL: [TimerKind; 6] = [
        TimerKind::ConnectionRequest,
        TimerKind::ConnectionSetup,
        TimerKind::ConnectionRejected,
        TimerKind::HandoverJoining,
        TimerKind::HandoverLeaving,
        TimerKind::DataInactivity,
    ];

    fn slot(self) -> usize {
        match self {
            TimerKind::ConnectionRequest => 0,
            TimerKind::ConnectionSetup => 1,
            TimerKind::ConnectionRejected => 2,
            TimerKind::HandoverJoining => 3,
            TimerKind::HandoverLeaving => 4,
            TimerKind::DataInactivity => 5,
        }
    }

    /// Configured duration of this timer.
    pub fn duration(self, config: &RrcTimerConfig) -> Duration {
        match self {
            TimerKind::ConnectionRequest => config.connection_request(),
            TimerKind::ConnectionSetup => config.connection_setup(),
            TimerKind::ConnectionRejected => config.connection_rejected(),
            TimerKind::HandoverJoining => config.handover_joining(),
            TimerKind::HandoverLeaving => config.handover_leaving(),
            TimerKind::DataInactivity => config.data_inactivity(),
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::ConnectionRequest => write!(f, "connection-request"),
            TimerKind::ConnectionSetup => write!(f, "connection-setup"),
            TimerKind::ConnectionRejected => write!(f, "connection-rejected"),
            TimerKind::HandoverJoining => write!(f, "handover-joining"),
            TimerKind::HandoverLeaving => write!(f, "handover-leaving"),
            TimerKind::DataInactivity => write!(f, "data-inactivity"),
        }
    }
}

/// Event delivered by the scheduler to the RRC registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrcTimer {
    /// A per-UE procedure timer
    Ue { rnti: Rnti, kind: TimerKind },
    /// Periodic MIB/SIB broadcast
    SystemInformation,
}

/// The timers of one UE context.
#[derive(Debug, Default)]
pub struct TimerSet {
    handles: [Option<TimerHandle>; 6],
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `kind`, cancelling any handle it already had.
    pub fn arm(
        &mut self,
        scheduler: &mut dyn Scheduler<RrcTimer>,
        rnti: Rnti,
        kind: TimerKind,
        delay: Duration,
    ) -> TimerHandle {
        self.cancel(scheduler, kind);
        let handle = scheduler.schedule_after(delay, RrcTimer::Ue { rnti, kind });
        debug!("UE[{}] {} timer armed for {:?} ({})", rnti, kind, delay, handle);
        self.handles[kind.slot()] = Some(handle);
        handle
    }

    /// Cancels `kind` if armed.
    pub fn cancel(&mut self, scheduler: &mut dyn Scheduler<RrcTimer>, kind: TimerKind) {
        if let Some(handle) = self.handles[kind.slot()].take() {
            debug!("{} timer cancelled ({})", kind, handle);
            scheduler.cancel(handle);
        }
    }

    /// Cancels every armed timer.
    pub fn cancel_all(&mut self, scheduler: &mut dyn Scheduler<RrcTimer>) {
        for kind in TimerKind::ALL {
            self.cancel(scheduler, kind);
        }
    }

    /// Consumes a firing: returns true and clears the slot if `handle` is
    /// the current handle of `kind`, false for a stale firing.
    pub fn take_fired(&mut self, kind: TimerKind, handle: TimerHandle) -> bool {
        let slot = &mut self.handles[kind.slot()];
        if *slot == Some(handle) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.handles[kind.slot()].is_some()
    }

    pub fn handle(&self, kind: TimerKind) -> Option<TimerHandle> {
        self.handles[kind.slot()]
    }

    /// Kinds currently armed.
    pub fn armed(&self) -> impl Iterator<Item = TimerKind> + '_ {
        TimerKind::ALL.into_iter().filter(|k| self.is_armed(*k))
    }
}
