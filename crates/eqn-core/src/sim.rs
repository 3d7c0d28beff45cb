//! Simulation state, activation and suspension types, and the agenda.
//!
//! The agenda orders pending work by simulated time, breaking ties by the
//! order in which it was scheduled. That tie-break is what makes runs
//! reproducible: two events at the same instant always fire in the order
//! they were created.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::fixed::SimTime;
use crate::id::ComponentId;
use crate::message::Envelope;

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable clock state tracked by the simulation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Current simulated time.
    pub now: SimTime,

    /// Number of agenda entries dispatched so far (stale wake-ups included).
    pub dispatched: u64,
}

impl SimState {
    /// Create a new simulation state at time zero.
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            dispatched: 0,
        }
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Activations and suspensions
// ---------------------------------------------------------------------------

/// Why a component is being run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// First activation after registration.
    Start,
    /// The next message, delivered while the component awaited one.
    Message(Envelope),
    /// A hold ran for its full duration.
    HoldCompleted,
    /// An interruptible hold ended early because this message arrived.
    Interrupted(Envelope),
}

impl Activation {
    pub fn label(&self) -> &'static str {
        match self {
            Activation::Start => "Start",
            Activation::Message(_) => "Message",
            Activation::HoldCompleted => "HoldCompleted",
            Activation::Interrupted(_) => "Interrupted",
        }
    }
}

/// Where a component is parked between activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// Registered, start not yet dispatched.
    NotStarted,
    /// Waiting for the next message.
    AwaitingMessage,
    /// Plain hold: messages queue in the mailbox until `until`.
    Holding { until: SimTime, token: u64 },
    /// Interruptible hold: the first message ends it early.
    HoldingUnlessMessage { until: SimTime, token: u64 },
}

impl Suspension {
    /// Token of the wake-up this suspension is waiting for, if any.
    pub(crate) fn hold_token(&self) -> Option<u64> {
        match self {
            Suspension::Holding { token, .. } | Suspension::HoldingUnlessMessage { token, .. } => {
                Some(*token)
            }
            Suspension::NotStarted | Suspension::AwaitingMessage => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Agenda
// ---------------------------------------------------------------------------

/// Work scheduled for a component.
#[derive(Debug, Clone)]
pub(crate) enum Pending {
    Start,
    Deliver(Envelope),
    /// End of a hold. Ignored unless `token` matches the target's current hold.
    Wake { token: u64 },
}

#[derive(Debug, Clone)]
pub(crate) struct Scheduled {
    pub time: SimTime,
    pub seq: u64,
    pub target: ComponentId,
    pub pending: Pending,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Time first, then scheduling order (FIFO for equal times).
        self.time
            .cmp(&other.time)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of scheduled work keyed by `(time, seq)`.
#[derive(Debug, Default)]
pub(crate) struct Agenda {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl Agenda {
    pub fn push(&mut self, time: SimTime, target: ComponentId, pending: Pending) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled {
            time,
            seq,
            target,
            pending,
        }));
    }

    pub fn pop(&mut self) -> Option<Scheduled> {
        self.heap.pop().map(|Reverse(s)| s)
    }

    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|Reverse(s)| s.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
