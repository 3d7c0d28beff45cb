//! Helpers for driving facilities in tests: a scripted job source, a
//! recording sink, and job builders.
//!
//! Enabled for this crate's own tests and, for other crates, through the
//! `test-utils` feature.

use std::any::Any;

use crate::engine::{Component, Context};
use crate::error::SimError;
use crate::fixed::{SimTime, time};
use crate::id::{ComponentId, JobId, Port};
use crate::job::Job;
use crate::message::{Message, MessageTag};
use crate::sim::Activation;

/// A job requesting `work` whole time units.
pub fn job(id: u64, work: i32) -> Job {
    Job::new(JobId(id), time(work))
}

/// A job with an explicit priority (smaller is more urgent).
pub fn prioritized(id: u64, work: i32, priority: u32) -> Job {
    job(id, work).with_priority(priority)
}

// ---------------------------------------------------------------------------
// Scripted source
// ---------------------------------------------------------------------------

/// Sends each scripted job on `Port::Downstream` at its release time,
/// stamping it with that creation time.
#[derive(Debug)]
pub struct ScriptedSource {
    name: String,
    /// Sorted by release time, latest first.
    script: Vec<(SimTime, Job)>,
    pub released: u64,
}

impl ScriptedSource {
    pub fn new(name: impl Into<String>, script: impl IntoIterator<Item = (SimTime, Job)>) -> Self {
        let mut script: Vec<_> = script.into_iter().collect();
        // Stable sort, then reverse: equal release times keep the given order
        // when popped.
        script.sort_by_key(|(at, _)| *at);
        script.reverse();
        Self {
            name: name.into(),
            script,
            released: 0,
        }
    }

    /// Jobs not yet released.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    fn release_due(&mut self, ctx: &mut Context<'_>) -> Result<(), SimError> {
        let now = ctx.now();
        while self.script.last().is_some_and(|(at, _)| *at <= now) {
            let Some((at, job)) = self.script.pop() else {
                break;
            };
            self.released += 1;
            ctx.send(Port::Downstream, SimTime::ZERO, Message::Arrival(job.created_at(at)))?;
        }
        match self.script.last() {
            Some((next, _)) => ctx.hold(*next - now),
            None => Ok(()),
        }
    }
}

impl Component for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self, ctx: &mut Context<'_>, activation: Activation) -> Result<(), SimError> {
        match activation {
            Activation::Start | Activation::HoldCompleted => self.release_due(ctx),
            other => Err(SimError::UnexpectedActivation {
                activation: other.label(),
                state: "Releasing",
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// One job delivered to a [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub job: Job,
    pub tag: MessageTag,
    pub from: Option<ComponentId>,
    pub sent_at: SimTime,
    /// Delivery time.
    pub time: SimTime,
}

/// Terminal component that keeps every job it receives.
#[derive(Debug)]
pub struct Recorder {
    name: String,
    pub received: Vec<Received>,
    /// Messages that carried no job.
    pub signals: u64,
}

impl Recorder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: Vec::new(),
            signals: 0,
        }
    }

    pub fn ids(&self) -> Vec<JobId> {
        self.received.iter().map(|r| r.job.id()).collect()
    }

    /// Delivery time of `id`, if it arrived.
    pub fn delivered_at(&self, id: JobId) -> Option<SimTime> {
        self.received.iter().find(|r| r.job.id() == id).map(|r| r.time)
    }
}

impl Component for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self, ctx: &mut Context<'_>, activation: Activation) -> Result<(), SimError> {
        let Activation::Message(envelope) = activation else {
            return Ok(());
        };
        let tag = envelope.message.tag();
        match envelope.message {
            Message::Arrival(job) | Message::Requeue(job) => self.received.push(Received {
                job,
                tag,
                from: envelope.from,
                sent_at: envelope.sent_at,
                time: ctx.now(),
            }),
            Message::PullRequest | Message::Signal => self.signals += 1,
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
