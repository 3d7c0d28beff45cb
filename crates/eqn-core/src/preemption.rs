//! Preemption policies: whether an arriving job displaces the one in service.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::job::Job;

pub trait PreemptionPolicy: Debug {
    /// `serving` is `None` when the server is idle. Policies other than
    /// [`NeverPreempt`] answer `true` for an idle server.
    fn should_preempt(&self, serving: Option<&Job>, arriving: &Job) -> bool;
}

impl<P: PreemptionPolicy + ?Sized> PreemptionPolicy for Box<P> {
    fn should_preempt(&self, serving: Option<&Job>, arriving: &Job) -> bool {
        (**self).should_preempt(serving, arriving)
    }
}

/// Preempt when the arriving job strictly precedes the serving one in the
/// job order (priority value, then arrival time, then id).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrictPriority;

impl PreemptionPolicy for StrictPriority {
    fn should_preempt(&self, serving: Option<&Job>, arriving: &Job) -> bool {
        serving.is_none_or(|s| arriving.precedes(s))
    }
}

/// Preempt when the arriving job is at least as urgent. Equal priorities
/// take turns, so long jobs of one class are sliced by newcomers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityOrEqual;

impl PreemptionPolicy for PriorityOrEqual {
    fn should_preempt(&self, serving: Option<&Job>, arriving: &Job) -> bool {
        serving.is_none_or(|s| arriving.priority() <= s.priority())
    }
}

/// Preempt when the arriving job needs less work than the serving job has
/// left (shortest remaining processing time).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShorterRemaining;

impl PreemptionPolicy for ShorterRemaining {
    fn should_preempt(&self, serving: Option<&Job>, arriving: &Job) -> bool {
        serving.is_none_or(|s| arriving.remaining() < s.remaining())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeverPreempt;

impl PreemptionPolicy for NeverPreempt {
    fn should_preempt(&self, _serving: Option<&Job>, _arriving: &Job) -> bool {
        false
    }
}

/// Serializable selector for the built-in preemption policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreemptionKind {
    #[default]
    StrictPriority,
    PriorityOrEqual,
    ShorterRemaining,
    Never,
}

impl PreemptionKind {
    pub fn build(self) -> Box<dyn PreemptionPolicy> {
        match self {
            PreemptionKind::StrictPriority => Box::new(StrictPriority),
            PreemptionKind::PriorityOrEqual => Box::new(PriorityOrEqual),
            PreemptionKind::ShorterRemaining => Box::new(ShorterRemaining),
            PreemptionKind::Never => Box::new(NeverPreempt),
        }
    }
}
