//! Typed observation events.
//!
//! Components emit an [`Event`] on every transition that a statistics
//! collector may care about. The [`EventBus`] buffers them in emission order
//! until the caller drains them, typically after each `run_until` call.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`]. Suppressed
//! events are dropped at emission and cost nothing to keep.

use crate::fixed::SimTime;
use crate::id::{ComponentId, JobId};
use crate::waiting::WaitingState;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// An observation. All events carry the emitting component and the
/// simulated time at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Waiting system --
    JobArrived {
        component: ComponentId,
        job: JobId,
        time: SimTime,
    },
    JobRequeued {
        component: ComponentId,
        job: JobId,
        time: SimTime,
    },
    QueueLengthChanged {
        component: ComponentId,
        length: usize,
        time: SimTime,
    },
    /// A job left the waiting system after waiting `waited` (zero when it
    /// bypassed the queue).
    JobWithdrawn {
        component: ComponentId,
        job: JobId,
        waited: SimTime,
        time: SimTime,
    },
    JobBypassed {
        component: ComponentId,
        job: JobId,
        time: SimTime,
    },
    JobDiscarded {
        component: ComponentId,
        job: JobId,
        time: SimTime,
    },
    JobDiverted {
        component: ComponentId,
        job: JobId,
        time: SimTime,
    },
    WaitingStateChanged {
        component: ComponentId,
        state: WaitingState,
        time: SimTime,
    },

    // -- Service discipline --
    ServiceStarted {
        component: ComponentId,
        job: JobId,
        time: SimTime,
    },
    ServiceCompleted {
        component: ComponentId,
        job: JobId,
        /// Total service the job received over all its segments.
        service: SimTime,
        time: SimTime,
    },
    JobPreempted {
        component: ComponentId,
        job: JobId,
        remaining: SimTime,
        time: SimTime,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JobArrived,
    JobRequeued,
    QueueLengthChanged,
    JobWithdrawn,
    JobBypassed,
    JobDiscarded,
    JobDiverted,
    WaitingStateChanged,
    ServiceStarted,
    ServiceCompleted,
    JobPreempted,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 11;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::JobArrived { .. } => EventKind::JobArrived,
            Event::JobRequeued { .. } => EventKind::JobRequeued,
            Event::QueueLengthChanged { .. } => EventKind::QueueLengthChanged,
            Event::JobWithdrawn { .. } => EventKind::JobWithdrawn,
            Event::JobBypassed { .. } => EventKind::JobBypassed,
            Event::JobDiscarded { .. } => EventKind::JobDiscarded,
            Event::JobDiverted { .. } => EventKind::JobDiverted,
            Event::WaitingStateChanged { .. } => EventKind::WaitingStateChanged,
            Event::ServiceStarted { .. } => EventKind::ServiceStarted,
            Event::ServiceCompleted { .. } => EventKind::ServiceCompleted,
            Event::JobPreempted { .. } => EventKind::JobPreempted,
        }
    }

    pub fn component(&self) -> ComponentId {
        match self {
            Event::JobArrived { component, .. }
            | Event::JobRequeued { component, .. }
            | Event::QueueLengthChanged { component, .. }
            | Event::JobWithdrawn { component, .. }
            | Event::JobBypassed { component, .. }
            | Event::JobDiscarded { component, .. }
            | Event::JobDiverted { component, .. }
            | Event::WaitingStateChanged { component, .. }
            | Event::ServiceStarted { component, .. }
            | Event::ServiceCompleted { component, .. }
            | Event::JobPreempted { component, .. } => *component,
        }
    }

    pub fn time(&self) -> SimTime {
        match self {
            Event::JobArrived { time, .. }
            | Event::JobRequeued { time, .. }
            | Event::QueueLengthChanged { time, .. }
            | Event::JobWithdrawn { time, .. }
            | Event::JobBypassed { time, .. }
            | Event::JobDiscarded { time, .. }
            | Event::JobDiverted { time, .. }
            | Event::WaitingStateChanged { time, .. }
            | Event::ServiceStarted { time, .. }
            | Event::ServiceCompleted { time, .. }
            | Event::JobPreempted { time, .. } => *time,
        }
    }
}

impl EventKind {
    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Buffers emitted events in emission order.
#[derive(Debug, Default)]
pub struct EventBus {
    pending: Vec<Event>,
    /// Suppressed event kinds. Suppressed events are never buffered.
    suppressed: [bool; EVENT_KIND_COUNT],
    /// Total events accepted since creation (excluding suppressed ones).
    total_emitted: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress an event kind and drop any buffered events of that kind.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.pending.retain(|e| e.kind() != kind);
    }

    /// Re-enable a suppressed event kind.
    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Buffer an event. No-ops if the event kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        if self.suppressed[event.kind().index()] {
            return;
        }
        self.total_emitted += 1;
        self.pending.push(event);
    }

    /// Buffered events, oldest first.
    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    /// Take all buffered events, oldest first.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn total_emitted(&self) -> u64 {
        self.total_emitted
    }
}

// ===========================================================================
// Tests
// ===========================================================================
