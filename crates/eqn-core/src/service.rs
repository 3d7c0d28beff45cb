//! Service disciplines: the servers that pull jobs from a waiting system.
//!
//! Both disciplines reach their waiting system on [`Port::Queue`] and
//! forward finished jobs on [`Port::Downstream`].
//!
//! [`Server`] is non-preemptive: pull, hold for the job's remaining work,
//! forward, pull again.
//!
//! [`PreemptiveServer`] is the facility's entry point. Upstream arrivals
//! reach it directly and interrupt the current hold; the preemption policy
//! decides whether the newcomer displaces the job in service. A displaced
//! job goes back to the waiting system as `Requeue` with its exact
//! remainder; a newcomer that does not preempt is deferred to the waiting
//! system as a plain arrival.

use std::any::Any;

use tracing::debug;

use crate::engine::{Component, Context};
use crate::error::SimError;
use crate::event::Event;
use crate::fixed::SimTime;
use crate::id::Port;
use crate::job::Job;
use crate::message::{Envelope, Message};
use crate::preemption::PreemptionPolicy;
use crate::sim::Activation;

/// Running totals kept by a service discipline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCounters {
    /// Jobs fully processed and forwarded.
    pub completed: u64,
    pub preemptions: u64,
    /// Arrivals that interrupted service without preempting and were handed
    /// to the waiting system.
    pub deferred: u64,
    /// Upstream arrivals taken straight into service, never passing the
    /// waiting system.
    pub admitted: u64,
    /// Total time spent holding jobs.
    pub busy: SimTime,
}

fn finish(ctx: &mut Context<'_>, counters: &mut ServiceCounters, job: Job) -> Result<(), SimError> {
    counters.completed += 1;
    ctx.emit(Event::ServiceCompleted {
        component: ctx.id(),
        job: job.id(),
        service: job.service_received(),
        time: ctx.now(),
    });
    ctx.send(Port::Downstream, SimTime::ZERO, Message::Arrival(job))
}

/// Report a job adopted straight from upstream the way a waiting system
/// reports a bypass: an arrival withdrawn after zero wait.
fn admit(ctx: &mut Context<'_>, counters: &mut ServiceCounters, job: &Job) {
    counters.admitted += 1;
    let component = ctx.id();
    let time = ctx.now();
    ctx.emit(Event::JobArrived {
        component,
        job: job.id(),
        time,
    });
    ctx.emit(Event::JobBypassed {
        component,
        job: job.id(),
        time,
    });
    ctx.emit(Event::JobWithdrawn {
        component,
        job: job.id(),
        waited: SimTime::ZERO,
        time,
    });
}

fn started(ctx: &mut Context<'_>, job: &Job) {
    ctx.emit(Event::ServiceStarted {
        component: ctx.id(),
        job: job.id(),
        time: ctx.now(),
    });
}

// ---------------------------------------------------------------------------
// Non-preemptive server
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Server {
    name: String,
    current: Option<Job>,
    counters: ServiceCounters,
}

impl Server {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current: None,
            counters: ServiceCounters::default(),
        }
    }

    pub fn current(&self) -> Option<&Job> {
        self.current.as_ref()
    }

    pub fn counters(&self) -> &ServiceCounters {
        &self.counters
    }

    fn state_label(&self) -> &'static str {
        if self.current.is_some() { "Busy" } else { "Idle" }
    }
}

impl Component for Server {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self, ctx: &mut Context<'_>, activation: Activation) -> Result<(), SimError> {
        match activation {
            Activation::Start => ctx.send(Port::Queue, SimTime::ZERO, Message::PullRequest),
            Activation::Message(Envelope {
                message: Message::Arrival(job),
                ..
            }) if self.current.is_none() => {
                let work = job.remaining();
                debug!(component = %self.name, time = %ctx.now(), job = ?job.id(), %work, "service started");
                started(ctx, &job);
                self.current = Some(job);
                ctx.hold(work)
            }
            Activation::HoldCompleted => {
                let Some(mut job) = self.current.take() else {
                    return Err(SimError::UnexpectedActivation {
                        activation: "HoldCompleted",
                        state: "Idle",
                    });
                };
                let work = job.remaining();
                job.record_service(work);
                job.set_remaining(SimTime::ZERO);
                self.counters.busy += work;
                finish(ctx, &mut self.counters, job)?;
                ctx.send(Port::Queue, SimTime::ZERO, Message::PullRequest)
            }
            Activation::Message(envelope) => Err(SimError::Protocol {
                tag: envelope.message.tag(),
                state: self.state_label(),
            }),
            Activation::Interrupted(_) => Err(SimError::UnexpectedActivation {
                activation: "Interrupted",
                state: self.state_label(),
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
// Preemptive server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// A pull request is outstanding at the waiting system.
    Pulling,
    Serving,
}

impl ServerState {
    pub fn label(self) -> &'static str {
        match self {
            ServerState::Pulling => "Pulling",
            ServerState::Serving => "Serving",
        }
    }
}

#[derive(Debug)]
pub struct PreemptiveServer<P: PreemptionPolicy = Box<dyn PreemptionPolicy>> {
    name: String,
    policy: P,
    state: ServerState,
    current: Option<Job>,
    /// Completion time of the current job if nothing interrupts it.
    planned: SimTime,
    /// When the current hold segment began.
    last_resume: SimTime,
    counters: ServiceCounters,
}

impl<P: PreemptionPolicy> PreemptiveServer<P> {
    pub fn new(name: impl Into<String>, policy: P) -> Self {
        Self {
            name: name.into(),
            policy,
            state: ServerState::Pulling,
            current: None,
            planned: SimTime::ZERO,
            last_resume: SimTime::ZERO,
            counters: ServiceCounters::default(),
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn current(&self) -> Option<&Job> {
        self.current.as_ref()
    }

    /// Planned completion of the job in service.
    pub fn planned(&self) -> Option<SimTime> {
        self.current.as_ref().map(|_| self.planned)
    }

    pub fn counters(&self) -> &ServiceCounters {
        &self.counters
    }

    fn is_from_queue(ctx: &Context<'_>, envelope: &Envelope) -> bool {
        envelope.from.is_some() && envelope.from == ctx.peer(Port::Queue)
    }

    fn pull(&mut self, ctx: &mut Context<'_>) -> Result<(), SimError> {
        self.state = ServerState::Pulling;
        ctx.send(Port::Queue, SimTime::ZERO, Message::PullRequest)
    }

    fn defer(&mut self, ctx: &mut Context<'_>, job: Job) -> Result<(), SimError> {
        ctx.send(Port::Queue, SimTime::ZERO, Message::Arrival(job))
    }

    fn adopt(&mut self, ctx: &mut Context<'_>, job: Job) -> Result<(), SimError> {
        let now = ctx.now();
        let work = job.remaining();
        self.planned = now.checked_add(work).ok_or(SimError::ClockOverflow {
            at: now,
            delta: work,
        })?;
        self.last_resume = now;
        debug!(component = %self.name, time = %now, job = ?job.id(), %work, "service started");
        started(ctx, &job);
        self.current = Some(job);
        self.state = ServerState::Serving;
        ctx.hold_unless_message(work)
    }

    /// Resume the current job after an interruption that did not displace it.
    fn resume(&mut self, ctx: &mut Context<'_>, job: Job) -> Result<(), SimError> {
        let now = ctx.now();
        let left = job.remaining();
        self.last_resume = now;
        self.current = Some(job);
        ctx.hold_unless_message(left)
    }

    /// Credit the time held since the last resume and set the exact
    /// remainder. Returns `true` when the job has no work left.
    fn account(&mut self, now: SimTime, job: &mut Job) -> bool {
        let held = now - self.last_resume;
        job.record_service(held);
        self.counters.busy += held;
        let left = if self.planned > now {
            self.planned - now
        } else {
            SimTime::ZERO
        };
        job.set_remaining(left);
        left == SimTime::ZERO
    }

    fn on_pulling(&mut self, ctx: &mut Context<'_>, envelope: Envelope) -> Result<(), SimError> {
        let from_queue = Self::is_from_queue(ctx, &envelope);
        match envelope.message {
            Message::Arrival(job) if from_queue => self.adopt(ctx, job),
            // The waiting system owns ordering while a pull is outstanding.
            Message::Arrival(job) => self.defer(ctx, job),
            Message::Signal => Ok(()),
            other => Err(SimError::Protocol {
                tag: other.tag(),
                state: self.state.label(),
            }),
        }
    }

    fn on_interrupted(&mut self, ctx: &mut Context<'_>, envelope: Envelope) -> Result<(), SimError> {
        let now = ctx.now();
        let Some(mut current) = self.current.take() else {
            return Err(SimError::UnexpectedActivation {
                activation: "Interrupted",
                state: self.state.label(),
            });
        };
        let from_queue = Self::is_from_queue(ctx, &envelope);
        let done = self.account(now, &mut current);

        match envelope.message {
            Message::Arrival(mut arriving) if !from_queue => {
                // Compared against the job in service on this facility's clock.
                arriving.mark_arrived(now);
                if done {
                    // Natural completion at this very instant wins.
                    finish(ctx, &mut self.counters, current)?;
                    admit(ctx, &mut self.counters, &arriving);
                    return self.adopt(ctx, arriving);
                }
                if self.policy.should_preempt(Some(&current), &arriving) {
                    let remaining = current.remaining();
                    debug!(
                        component = %self.name,
                        time = %now,
                        preempted = ?current.id(),
                        by = ?arriving.id(),
                        %remaining,
                        "preempted"
                    );
                    current.mark_interrupted();
                    self.counters.preemptions += 1;
                    ctx.emit(Event::JobPreempted {
                        component: ctx.id(),
                        job: current.id(),
                        remaining,
                        time: now,
                    });
                    ctx.send(Port::Queue, SimTime::ZERO, Message::Requeue(current))?;
                    admit(ctx, &mut self.counters, &arriving);
                    return self.adopt(ctx, arriving);
                }
                self.counters.deferred += 1;
                self.defer(ctx, arriving)?;
                self.resume(ctx, current)
            }
            Message::Signal => {
                if done {
                    finish(ctx, &mut self.counters, current)?;
                    return self.pull(ctx);
                }
                self.resume(ctx, current)
            }
            other => Err(SimError::Protocol {
                tag: other.tag(),
                state: self.state.label(),
            }),
        }
    }
}

impl<P: PreemptionPolicy + 'static> Component for PreemptiveServer<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self, ctx: &mut Context<'_>, activation: Activation) -> Result<(), SimError> {
        match (self.state, activation) {
            (_, Activation::Start) => self.pull(ctx),
            (ServerState::Pulling, Activation::Message(envelope)) => self.on_pulling(ctx, envelope),
            (ServerState::Serving, Activation::Interrupted(envelope)) => {
                self.on_interrupted(ctx, envelope)
            }
            (ServerState::Serving, Activation::HoldCompleted) => {
                let Some(mut job) = self.current.take() else {
                    return Err(SimError::UnexpectedActivation {
                        activation: "HoldCompleted",
                        state: self.state.label(),
                    });
                };
                self.account(ctx.now(), &mut job);
                finish(ctx, &mut self.counters, job)?;
                self.pull(ctx)
            }
            (state, other) => Err(SimError::UnexpectedActivation {
                activation: other.label(),
                state: state.label(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Simulation;
    use crate::event::EventKind;
    use crate::fixed::time;
    use crate::id::{ComponentId, JobId};
    use crate::preemption::{NeverPreempt, StrictPriority};
    use crate::queue::{OrderKind, Queue};
    use crate::test_utils::Recorder;
    use crate::waiting::WaitingSystem;

    struct Rig {
        sim: Simulation,
        entry: ComponentId,
        server: ComponentId,
        sink: ComponentId,
    }

    fn preemptive<P: PreemptionPolicy + 'static>(policy: P, queue: Queue) -> Rig {
        let mut sim = Simulation::new();
        let ws = sim.add(WaitingSystem::preemptive("ws", queue));
        let server = sim.add(PreemptiveServer::new("server", policy));
        let sink = sim.add(Recorder::new("sink"));
        sim.connect(ws, Port::Downstream, server).unwrap();
        sim.connect(server, Port::Queue, ws).unwrap();
        sim.connect(server, Port::Downstream, sink).unwrap();
        Rig {
            sim,
            entry: server,
            server,
            sink,
        }
    }

    fn plain() -> Rig {
        let mut sim = Simulation::new();
        let ws = sim.add(WaitingSystem::new("ws", Queue::fifo()));
        let server = sim.add(Server::new("server"));
        let sink = sim.add(Recorder::new("sink"));
        sim.connect(ws, Port::Downstream, server).unwrap();
        sim.connect(server, Port::Queue, ws).unwrap();
        sim.connect(server, Port::Downstream, sink).unwrap();
        Rig {
            sim,
            entry: ws,
            server,
            sink,
        }
    }

    fn job(id: u64, work: i32, priority: u32) -> Job {
        Job::new(JobId(id), time(work)).with_priority(priority)
    }

    impl Rig {
        fn arrive(&mut self, at: i32, job: Job) {
            self.sim.inject(self.entry, time(at), Message::Arrival(job)).unwrap();
        }

        fn done(&self) -> Vec<(u64, SimTime)> {
            self.sim
                .component::<Recorder>(self.sink)
                .unwrap()
                .received
                .iter()
                .map(|r| (r.job.id().0, r.time))
                .collect()
        }

        fn finished(&self, id: u64) -> &Job {
            &self
                .sim
                .component::<Recorder>(self.sink)
                .unwrap()
                .received
                .iter()
                .find(|r| r.job.id() == JobId(id))
                .unwrap()
                .job
        }

        fn counters(&self) -> ServiceCounters {
            match self.sim.component::<PreemptiveServer<StrictPriority>>(self.server) {
                Some(s) => s.counters().clone(),
                None => self
                    .sim
                    .component::<Server>(self.server)
                    .unwrap()
                    .counters()
                    .clone(),
            }
        }
    }

    #[test]
    fn non_preemptive_serves_in_arrival_order() {
        let mut rig = plain();
        rig.arrive(0, job(1, 5, 9));
        rig.arrive(1, job(2, 2, 0));
        rig.arrive(2, job(3, 1, 0));
        rig.sim.run().unwrap();
        assert_eq!(
            rig.done(),
            vec![(1, time(5)), (2, time(7)), (3, time(8))]
        );
        let counters = rig.counters();
        assert_eq!(counters.completed, 3);
        assert_eq!(counters.busy, time(8));
    }

    #[test]
    fn preemption_requeues_exact_remainder() {
        let mut rig = preemptive(StrictPriority, Queue::fifo());
        rig.arrive(0, job(1, 10, 5));
        rig.arrive(3, job(2, 4, 1));
        rig.sim.run().unwrap();

        assert_eq!(rig.done(), vec![(2, time(7)), (1, time(14))]);
        let a = rig.finished(1);
        assert_eq!(a.service_received(), time(10));
        assert_eq!(a.interruptions(), 1);
        assert_eq!(a.requeues(), 1);
        assert_eq!(a.remaining(), SimTime::ZERO);
        assert_eq!(rig.finished(2).service_received(), time(4));

        let counters = rig.counters();
        assert_eq!(counters.preemptions, 1);
        assert_eq!(counters.completed, 2);
        assert_eq!(counters.busy, time(14));

        let preempted: Vec<_> = rig
            .sim
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                Event::JobPreempted {
                    job,
                    remaining,
                    time,
                    ..
                } => Some((job, remaining, time)),
                _ => None,
            })
            .collect();
        assert_eq!(preempted, vec![(JobId(1), time(7), time(3))]);
    }

    #[test]
    fn completion_tie_completes_before_adopting() {
        let mut rig = preemptive(StrictPriority, Queue::fifo());
        rig.arrive(0, job(1, 10, 5));
        rig.arrive(10, job(2, 4, 1));
        rig.sim.run().unwrap();
        assert_eq!(rig.done(), vec![(1, time(10)), (2, time(14))]);
        assert_eq!(rig.counters().preemptions, 0);
        assert_eq!(rig.counters().admitted, 1);
        assert_eq!(rig.finished(1).interruptions(), 0);
    }

    #[test]
    fn equal_priority_later_arrival_does_not_preempt() {
        let mut rig = preemptive(StrictPriority, Queue::fifo());
        rig.arrive(2, job(1, 10, 0));
        // Built without an arrival stamp; the server stamps it at t=5.
        rig.arrive(5, job(2, 4, 0));
        rig.sim.run().unwrap();
        assert_eq!(rig.done(), vec![(1, time(12)), (2, time(16))]);
        let counters = rig.counters();
        assert_eq!(counters.preemptions, 0);
        assert_eq!(counters.deferred, 1);
        assert_eq!(counters.admitted, 0);
        assert_eq!(rig.finished(2).arrival_time(), time(5));
    }

    #[test]
    fn admitted_arrivals_are_reported_as_bypasses() {
        let mut rig = preemptive(StrictPriority, Queue::fifo());
        rig.arrive(0, job(1, 10, 5));
        rig.arrive(3, job(2, 4, 1));
        rig.sim.run().unwrap();
        assert_eq!(rig.counters().admitted, 1);

        let server = rig.server;
        let events = rig.sim.drain_events();
        let arrived: Vec<_> = events
            .iter()
            .filter(|e| e.kind() == EventKind::JobArrived)
            .map(|e| (e.component() == server, e.time()))
            .collect();
        // Job 1 enters through the waiting system, job 2 straight into service.
        assert_eq!(arrived, vec![(false, time(0)), (true, time(3))]);
        assert!(events.contains(&Event::JobWithdrawn {
            component: server,
            job: JobId(2),
            waited: SimTime::ZERO,
            time: time(3),
        }));
    }

    #[test]
    fn non_admitted_arrival_is_deferred() {
        let mut rig = preemptive(StrictPriority, Queue::fifo());
        rig.arrive(0, job(1, 10, 0));
        rig.arrive(2, job(2, 4, 5));
        rig.sim.run().unwrap();
        assert_eq!(rig.done(), vec![(1, time(10)), (2, time(14))]);
        let counters = rig.counters();
        assert_eq!(counters.deferred, 1);
        assert_eq!(counters.preemptions, 0);

        let waits: Vec<_> = rig
            .sim
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                Event::JobWithdrawn { job, waited, .. } => Some((job, waited)),
                _ => None,
            })
            .collect();
        assert!(waits.contains(&(JobId(2), time(8))));
    }

    #[test]
    fn signal_resumes_without_counting() {
        let mut rig = preemptive(StrictPriority, Queue::fifo());
        rig.arrive(0, job(1, 10, 0));
        rig.sim.inject(rig.server, time(4), Message::Signal).unwrap();
        rig.sim.run().unwrap();
        assert_eq!(rig.done(), vec![(1, time(10))]);
        assert_eq!(rig.finished(1).service_received(), time(10));
        let counters = rig.counters();
        assert_eq!(counters.preemptions, 0);
        assert_eq!(counters.deferred, 0);
    }

    #[test]
    fn never_preempt_serves_like_fifo() {
        let mut rig = preemptive(NeverPreempt, Queue::fifo());
        rig.arrive(0, job(1, 10, 9));
        rig.arrive(1, job(2, 1, 0));
        rig.sim.run().unwrap();
        assert_eq!(rig.done(), vec![(1, time(10)), (2, time(11))]);
        let server = rig
            .sim
            .component::<PreemptiveServer<NeverPreempt>>(rig.server)
            .unwrap();
        assert_eq!(server.counters().preemptions, 0);
        assert_eq!(server.state(), ServerState::Pulling);
    }

    #[test]
    fn nested_preemptions_conserve_work() {
        let mut rig = preemptive(StrictPriority, Queue::new(OrderKind::Priority.build()));
        rig.arrive(0, job(1, 10, 5));
        rig.arrive(2, job(2, 6, 3));
        rig.arrive(4, job(3, 1, 1));
        rig.sim.run().unwrap();
        // 3 runs 4..5, then 2 resumes (4 left) 5..9, then 1 (8 left) 9..17.
        // Requeued jobs come back in priority order.
        assert_eq!(
            rig.done(),
            vec![(3, time(5)), (2, time(9)), (1, time(17))]
        );
        for id in 1..=3 {
            let job = rig.finished(id);
            assert_eq!(job.service_received(), job.requested());
        }
        assert_eq!(rig.counters().preemptions, 2);
    }

    #[test]
    fn plain_server_rejects_unsolicited_arrival() {
        let mut rig = plain();
        rig.arrive(0, job(1, 5, 0));
        rig.sim
            .inject(rig.server, time(1), Message::Arrival(job(2, 1, 0)))
            .unwrap();
        // Buffered during the plain hold and served at t=5. The extra job
        // shifts the pull cycle until the server asks a starved waiting
        // system a second time.
        rig.arrive(2, job(3, 1, 0));
        let err = rig.sim.run().unwrap_err();
        assert!(matches!(err.root(), SimError::Protocol { .. }));
    }

    #[test]
    fn service_events_pair_up() {
        let mut rig = preemptive(StrictPriority, Queue::fifo());
        rig.arrive(0, job(1, 3, 0));
        rig.arrive(1, job(2, 3, 0));
        rig.sim.run().unwrap();
        let events = rig.sim.drain_events();
        let count = |kind| events.iter().filter(|e| e.kind() == kind).count();
        assert_eq!(count(EventKind::ServiceStarted), 2);
        assert_eq!(count(EventKind::ServiceCompleted), 2);
    }
}
