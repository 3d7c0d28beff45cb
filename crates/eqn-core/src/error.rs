//! Error types shared across the engine.
//!
//! Capacity errors ([`Overflow`]) are recoverable and handled at the waiting
//! system. Everything in [`SimError`] is fatal to a run.

use crate::fixed::{Fixed64, SimTime};
use crate::id::{ComponentId, Port};
use crate::job::Job;
use crate::message::MessageTag;

/// A finite queue rejected a job. The job is handed back, never lost.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("queue full: job {:?} rejected", .0.id())]
pub struct Overflow(pub Job);

impl Overflow {
    /// Recover the rejected job.
    pub fn into_job(self) -> Job {
        self.0
    }
}

/// Fatal simulation errors.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("negative delay {delay} (causality violation)")]
    NegativeDelay { delay: SimTime },

    #[error("negative hold duration {duration}")]
    NegativeHold { duration: SimTime },

    #[error("simulated clock overflow at {at} + {delta}")]
    ClockOverflow { at: SimTime, delta: SimTime },

    #[error("port {port:?} is not connected")]
    Unconnected { port: Port },

    #[error("component not found: {0:?}")]
    UnknownComponent(ComponentId),

    #[error("unexpected {tag:?} message in state {state}")]
    Protocol { tag: MessageTag, state: &'static str },

    #[error("unexpected activation {activation} in state {state}")]
    UnexpectedActivation {
        activation: &'static str,
        state: &'static str,
    },

    #[error("{component} at t={time}: {source}")]
    Component {
        component: String,
        time: SimTime,
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    /// The innermost error, skipping component wrappers.
    pub fn root(&self) -> &SimError {
        match self {
            SimError::Component { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("negative {field}: {value}")]
    NegativeTime { field: &'static str, value: SimTime },

    #[error("a multi-queue needs at least one sub-queue")]
    NoSubQueues,

    #[error("{policy} expects {expected} entries, got {got}")]
    PolicyArity {
        policy: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("category maps to sub-queue {index}, but only {count} exist")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("weight {index} is negative: {value}")]
    NegativeWeight { index: usize, value: Fixed64 },

    #[error("weights must not all be zero")]
    ZeroWeights,

    #[error("confidence level must be in (0, 1), got {0}")]
    ConfidenceLevel(f64),
}
