//! Messages exchanged between components.

use crate::fixed::SimTime;
use crate::id::ComponentId;
use crate::job::Job;

/// A message delivered to a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A job enters the receiving facility.
    Arrival(Job),
    /// The downstream facility asks for its next job.
    PullRequest,
    /// A previously served, interrupted job returns to its waiting system
    /// with its remaining duration already updated.
    Requeue(Job),
    /// Out-of-band wake-up carrying no job (token pools and similar
    /// collaborators use it).
    Signal,
}

/// Discriminant tag for messages, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    Arrival,
    PullRequest,
    Requeue,
    Signal,
}

impl Message {
    pub fn tag(&self) -> MessageTag {
        match self {
            Message::Arrival(_) => MessageTag::Arrival,
            Message::PullRequest => MessageTag::PullRequest,
            Message::Requeue(_) => MessageTag::Requeue,
            Message::Signal => MessageTag::Signal,
        }
    }

    /// The job carried by this message, if any.
    pub fn job(&self) -> Option<&Job> {
        match self {
            Message::Arrival(job) | Message::Requeue(job) => Some(job),
            Message::PullRequest | Message::Signal => None,
        }
    }
}

/// A message in transit, stamped with its sender and send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sending component. `None` for messages injected from outside the
    /// simulation.
    pub from: Option<ComponentId>,
    pub sent_at: SimTime,
    pub message: Message,
}
