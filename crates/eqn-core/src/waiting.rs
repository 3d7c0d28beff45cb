//! The waiting system: reconciles arrivals with downstream pull requests.
//!
//! # States
//!
//! - `AwaitingPull` (initial): arrivals are buffered; a pull request takes
//!   the head of the buffer, or moves to `Starved` when it is empty.
//! - `Starved`: a pull request is outstanding against an empty buffer. The
//!   next arrival bypasses the buffer and goes downstream with zero delay.
//!
//! A second pull request while `Starved` means the downstream facility
//! asked twice, which is a wiring mistake and aborts the run.
//!
//! The preemptive variant also accepts `Requeue` messages: interrupted jobs
//! coming back from their discipline. They are buffered like arrivals, but
//! keep their original arrival time.

use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{Component, Context};
use crate::error::SimError;
use crate::event::Event;
use crate::fixed::SimTime;
use crate::id::Port;
use crate::job::Job;
use crate::message::Message;
use crate::queue::{Buffer, Queue};
use crate::sim::Activation;

/// Synchronization state of a waiting system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaitingState {
    #[default]
    AwaitingPull,
    Starved,
}

impl WaitingState {
    pub fn label(self) -> &'static str {
        match self {
            WaitingState::AwaitingPull => "AwaitingPull",
            WaitingState::Starved => "Starved",
        }
    }
}

/// What happens to a job the buffer has no room for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Count it as discarded; the job leaves the network.
    #[default]
    Drop,
    /// Count it as discarded and forward it to the `Overflow` port.
    Divert,
}

/// Running totals kept by a waiting system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitingCounters {
    pub arrivals: u64,
    pub requeues: u64,
    /// Jobs handed downstream without being buffered.
    pub bypassed: u64,
    /// Jobs extracted from the buffer on a pull request.
    pub withdrawn: u64,
    pub dropped: u64,
    pub diverted: u64,
    pub max_length: usize,
}

#[derive(Debug)]
pub struct WaitingSystem<B: Buffer = Queue> {
    name: String,
    buffer: B,
    state: WaitingState,
    overflow: OverflowPolicy,
    accepts_requeue: bool,
    counters: WaitingCounters,
}

impl<B: Buffer> WaitingSystem<B> {
    pub fn new(name: impl Into<String>, buffer: B) -> Self {
        Self {
            name: name.into(),
            buffer,
            state: WaitingState::AwaitingPull,
            overflow: OverflowPolicy::Drop,
            accepts_requeue: false,
            counters: WaitingCounters::default(),
        }
    }

    /// A waiting system that also accepts `Requeue` from a preemptive
    /// discipline.
    pub fn preemptive(name: impl Into<String>, buffer: B) -> Self {
        Self {
            accepts_requeue: true,
            ..Self::new(name, buffer)
        }
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn state(&self) -> WaitingState {
        self.state
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn counters(&self) -> &WaitingCounters {
        &self.counters
    }

    pub fn accepts_requeue(&self) -> bool {
        self.accepts_requeue
    }

    fn set_state(&mut self, ctx: &mut Context<'_>, state: WaitingState) {
        if self.state == state {
            return;
        }
        debug!(
            component = %self.name,
            time = %ctx.now(),
            from = self.state.label(),
            to = state.label(),
            "waiting system transition"
        );
        self.state = state;
        ctx.emit(Event::WaitingStateChanged {
            component: ctx.id(),
            state,
            time: ctx.now(),
        });
    }

    fn on_job(&mut self, ctx: &mut Context<'_>, mut job: Job, requeued: bool) -> Result<(), SimError> {
        let now = ctx.now();
        let component = ctx.id();
        if requeued {
            job.mark_requeued();
            self.counters.requeues += 1;
            ctx.emit(Event::JobRequeued {
                component,
                job: job.id(),
                time: now,
            });
        } else {
            job.mark_arrived(now);
            self.counters.arrivals += 1;
            ctx.emit(Event::JobArrived {
                component,
                job: job.id(),
                time: now,
            });
        }

        if self.state == WaitingState::Starved {
            // Downstream is idle and already asked: hand the job straight over.
            self.counters.bypassed += 1;
            ctx.emit(Event::JobBypassed {
                component,
                job: job.id(),
                time: now,
            });
            ctx.emit(Event::JobWithdrawn {
                component,
                job: job.id(),
                waited: SimTime::ZERO,
                time: now,
            });
            self.set_state(ctx, WaitingState::AwaitingPull);
            return ctx.send(Port::Downstream, SimTime::ZERO, Message::Arrival(job));
        }

        job.mark_enqueued(now);
        match self.buffer.insert(job) {
            Ok(()) => {
                let length = self.buffer.enqueued_count();
                self.counters.max_length = self.counters.max_length.max(length);
                ctx.emit(Event::QueueLengthChanged {
                    component,
                    length,
                    time: now,
                });
                Ok(())
            }
            Err(overflow) => self.on_overflow(ctx, overflow.into_job()),
        }
    }

    fn on_overflow(&mut self, ctx: &mut Context<'_>, job: Job) -> Result<(), SimError> {
        let now = ctx.now();
        let component = ctx.id();
        debug!(component = %self.name, time = %now, job = ?job.id(), policy = ?self.overflow, "buffer full");
        match self.overflow {
            OverflowPolicy::Drop => {
                self.counters.dropped += 1;
                ctx.emit(Event::JobDiscarded {
                    component,
                    job: job.id(),
                    time: now,
                });
                Ok(())
            }
            OverflowPolicy::Divert => {
                self.counters.diverted += 1;
                ctx.emit(Event::JobDiverted {
                    component,
                    job: job.id(),
                    time: now,
                });
                ctx.send(Port::Overflow, SimTime::ZERO, Message::Arrival(job))
            }
        }
    }

    fn on_pull(&mut self, ctx: &mut Context<'_>) -> Result<(), SimError> {
        if self.state == WaitingState::Starved {
            return Err(SimError::Protocol {
                tag: Message::PullRequest.tag(),
                state: self.state.label(),
            });
        }
        if self.buffer.is_empty() {
            self.set_state(ctx, WaitingState::Starved);
            return Ok(());
        }

        let now = ctx.now();
        let component = ctx.id();
        let delay = self.buffer.next_extraction_delay();
        let mut job = self.buffer.extract();
        let waited = job.take_wait(now);
        self.counters.withdrawn += 1;
        ctx.emit(Event::JobWithdrawn {
            component,
            job: job.id(),
            waited,
            time: now,
        });
        ctx.emit(Event::QueueLengthChanged {
            component,
            length: self.buffer.enqueued_count(),
            time: now,
        });
        ctx.send(Port::Downstream, delay, Message::Arrival(job))
    }
}

impl<B: Buffer + 'static> Component for WaitingSystem<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self, ctx: &mut Context<'_>, activation: Activation) -> Result<(), SimError> {
        let envelope = match activation {
            Activation::Start => return Ok(()),
            Activation::Message(envelope) => envelope,
            other => {
                return Err(SimError::UnexpectedActivation {
                    activation: other.label(),
                    state: self.state.label(),
                });
            }
        };
        match envelope.message {
            Message::Arrival(job) => self.on_job(ctx, job, false),
            Message::Requeue(job) if self.accepts_requeue => self.on_job(ctx, job, true),
            Message::PullRequest => self.on_pull(ctx),
            other => Err(SimError::Protocol {
                tag: other.tag(),
                state: self.state.label(),
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

// ===========================================================================
// Tests
// ===========================================================================
