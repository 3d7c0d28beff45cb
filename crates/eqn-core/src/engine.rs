//! The discrete-event executor.
//!
//! # Architecture
//!
//! The [`Simulation`] owns:
//! - Every registered [`Component`], each with a mailbox and a [`Suspension`]
//! - Port links (`(component, port) -> component`)
//! - The agenda of pending starts, deliveries and hold wake-ups
//! - An [`EventBus`] of observation events
//!
//! Components are explicit state machines. Each activation runs to
//! completion and ends by choosing a suspension through its [`Context`]:
//! await the next message (the default), [`Context::hold`], or
//! [`Context::hold_unless_message`]. The executor runs on a single thread;
//! all concurrency is interleaving in virtual time.
//!
//! # Delivery rules
//!
//! - A component awaiting a message receives it immediately.
//! - A component in an interruptible hold is woken early with
//!   [`Activation::Interrupted`]; its pending wake-up is invalidated.
//! - A component in a plain hold (or not yet started) keeps the message in
//!   its mailbox. After the hold, the mailbox is served in arrival order
//!   before the component parks again.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;

use slotmap::SlotMap;
use tracing::trace;

use crate::error::SimError;
use crate::event::{Event, EventBus, EventKind};
use crate::fixed::SimTime;
use crate::id::{ComponentId, Port};
use crate::message::{Envelope, Message};
use crate::sim::{Activation, Agenda, Pending, SimState, Suspension};

// ---------------------------------------------------------------------------
// Component trait
// ---------------------------------------------------------------------------

/// A cooperative simulation task.
pub trait Component: fmt::Debug {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Run one activation. Errors abort the simulation run.
    fn activate(&mut self, ctx: &mut Context<'_>, activation: Activation) -> Result<(), SimError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suspend {
    Hold(SimTime),
    HoldUnlessMessage(SimTime),
}

/// The substrate primitives available to a component during an activation.
pub struct Context<'a> {
    me: ComponentId,
    now: SimTime,
    links: &'a HashMap<(ComponentId, Port), ComponentId>,
    agenda: &'a mut Agenda,
    events: &'a mut EventBus,
    suspend: Option<Suspend>,
}

impl Context<'_> {
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// The activated component's own id.
    pub fn id(&self) -> ComponentId {
        self.me
    }

    /// The component linked to `port`, if any.
    pub fn peer(&self, port: Port) -> Option<ComponentId> {
        self.links.get(&(self.me, port)).copied()
    }

    /// Schedule delivery of `message` to the component on `port` at
    /// `now + delay`.
    pub fn send(&mut self, port: Port, delay: SimTime, message: Message) -> Result<(), SimError> {
        if delay < SimTime::ZERO {
            return Err(SimError::NegativeDelay { delay });
        }
        let target = self.peer(port).ok_or(SimError::Unconnected { port })?;
        let at = self.now.checked_add(delay).ok_or(SimError::ClockOverflow {
            at: self.now,
            delta: delay,
        })?;
        trace!(from = ?self.me, to = ?target, tag = ?message.tag(), at = %at, "send");
        self.agenda.push(
            at,
            target,
            Pending::Deliver(Envelope {
                from: Some(self.me),
                sent_at: self.now,
                message,
            }),
        );
        Ok(())
    }

    /// Suspend for exactly `duration`; messages arriving meanwhile wait in
    /// the mailbox.
    pub fn hold(&mut self, duration: SimTime) -> Result<(), SimError> {
        if duration < SimTime::ZERO {
            return Err(SimError::NegativeHold { duration });
        }
        self.suspend = Some(Suspend::Hold(duration));
        Ok(())
    }

    /// Suspend for `duration`, but wake early with
    /// [`Activation::Interrupted`] when a message arrives.
    pub fn hold_unless_message(&mut self, duration: SimTime) -> Result<(), SimError> {
        if duration < SimTime::ZERO {
            return Err(SimError::NegativeHold { duration });
        }
        self.suspend = Some(Suspend::HoldUnlessMessage(duration));
        Ok(())
    }

    /// Record an observation event.
    pub fn emit(&mut self, event: Event) {
        self.events.emit(event);
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Slot {
    component: Box<dyn Component>,
    mailbox: VecDeque<Envelope>,
    suspension: Suspension,
    /// Incremented for every hold; stale wake-ups carry an older token.
    hold_token: u64,
}

/// Deterministic virtual-clock executor.
#[derive(Debug, Default)]
pub struct Simulation {
    pub state: SimState,
    agenda: Agenda,
    slots: SlotMap<ComponentId, Slot>,
    links: HashMap<(ComponentId, Port), ComponentId>,
    /// Observation events emitted by components.
    pub event_bus: EventBus,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> SimTime {
        self.state.now
    }

    /// Register a component. Its start activation is scheduled at the
    /// current time, after everything already scheduled for that time.
    pub fn add<C: Component + 'static>(&mut self, component: C) -> ComponentId {
        let id = self.slots.insert(Slot {
            component: Box::new(component),
            mailbox: VecDeque::new(),
            suspension: Suspension::NotStarted,
            hold_token: 0,
        });
        self.agenda.push(self.state.now, id, Pending::Start);
        id
    }

    /// Link `from`'s `port` to `to`, replacing any previous link.
    pub fn connect(&mut self, from: ComponentId, port: Port, to: ComponentId) -> Result<(), SimError> {
        for id in [from, to] {
            if !self.slots.contains_key(id) {
                return Err(SimError::UnknownComponent(id));
            }
        }
        self.links.insert((from, port), to);
        Ok(())
    }

    /// Deliver `message` to `target` at `now + delay` from outside the model.
    pub fn inject(&mut self, target: ComponentId, delay: SimTime, message: Message) -> Result<(), SimError> {
        if delay < SimTime::ZERO {
            return Err(SimError::NegativeDelay { delay });
        }
        if !self.slots.contains_key(target) {
            return Err(SimError::UnknownComponent(target));
        }
        let at = self.state.now.checked_add(delay).ok_or(SimError::ClockOverflow {
            at: self.state.now,
            delta: delay,
        })?;
        self.agenda.push(
            at,
            target,
            Pending::Deliver(Envelope {
                from: None,
                sent_at: self.state.now,
                message,
            }),
        );
        Ok(())
    }

    /// Borrow a component as its concrete type.
    pub fn component<T: 'static>(&self, id: ComponentId) -> Option<&T> {
        self.slots.get(id)?.component.as_any().downcast_ref::<T>()
    }

    pub fn component_mut<T: 'static>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.slots.get_mut(id)?.component.as_any_mut().downcast_mut::<T>()
    }

    pub fn name(&self, id: ComponentId) -> Option<&str> {
        self.slots.get(id).map(|s| s.component.name())
    }

    pub fn suspension(&self, id: ComponentId) -> Option<Suspension> {
        self.slots.get(id).map(|s| s.suspension)
    }

    /// Messages delivered to `id` but not yet consumed.
    pub fn mailbox_len(&self, id: ComponentId) -> usize {
        self.slots.get(id).map_or(0, |s| s.mailbox.len())
    }

    /// Agenda entries still to dispatch, including stale wake-ups.
    pub fn pending_count(&self) -> usize {
        self.agenda.len()
    }

    /// Time of the next agenda entry.
    pub fn next_time(&self) -> Option<SimTime> {
        self.agenda.peek_time()
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.event_bus.drain()
    }

    /// Dispatch the next agenda entry. Returns `false` when the agenda is
    /// empty.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let Some(entry) = self.agenda.pop() else {
            return Ok(false);
        };
        debug_assert!(entry.time >= self.state.now, "agenda went back in time");
        self.state.now = entry.time;
        self.state.dispatched += 1;

        let target = entry.target;
        let slot = self
            .slots
            .get_mut(target)
            .ok_or(SimError::UnknownComponent(target))?;

        let suspension = slot.suspension;
        match entry.pending {
            Pending::Start => {
                trace!(time = %entry.time, component = slot.component.name(), "start");
                self.activate(target, Activation::Start)?;
            }
            Pending::Deliver(envelope) => match suspension {
                Suspension::AwaitingMessage => {
                    self.activate(target, Activation::Message(envelope))?;
                }
                Suspension::HoldingUnlessMessage { .. } => {
                    // Invalidate the pending wake-up.
                    slot.hold_token += 1;
                    trace!(time = %entry.time, component = slot.component.name(), "interrupted");
                    self.activate(target, Activation::Interrupted(envelope))?;
                }
                Suspension::Holding { .. } | Suspension::NotStarted => {
                    slot.mailbox.push_back(envelope);
                }
            },
            Pending::Wake { token } => {
                if suspension.hold_token() == Some(token) {
                    self.activate(target, Activation::HoldCompleted)?;
                } else {
                    trace!(time = %entry.time, token, "stale wake-up");
                }
            }
        }
        Ok(true)
    }

    /// Dispatch everything scheduled at or before `limit`, then move the
    /// clock to `limit`.
    pub fn run_until(&mut self, limit: SimTime) -> Result<(), SimError> {
        while self.agenda.peek_time().is_some_and(|t| t <= limit) {
            self.step()?;
        }
        if limit > self.state.now {
            self.state.now = limit;
        }
        Ok(())
    }

    /// Dispatch until the agenda is empty.
    pub fn run(&mut self) -> Result<(), SimError> {
        while self.step()? {}
        Ok(())
    }

    /// Run a component, then keep feeding it mailbox messages until it
    /// parks in a state that has to wait for the future.
    fn activate(&mut self, id: ComponentId, first: Activation) -> Result<(), SimError> {
        let now = self.state.now;
        let mut activation = first;
        loop {
            let slot = self
                .slots
                .get_mut(id)
                .ok_or(SimError::UnknownComponent(id))?;
            let mut ctx = Context {
                me: id,
                now,
                links: &self.links,
                agenda: &mut self.agenda,
                events: &mut self.event_bus,
                suspend: None,
            };
            if let Err(source) = slot.component.activate(&mut ctx, activation) {
                return Err(SimError::Component {
                    component: slot.component.name().to_string(),
                    time: now,
                    source: Box::new(source),
                });
            }
            let suspend = ctx.suspend;

            let (duration, interruptible) = match suspend {
                None => match slot.mailbox.pop_front() {
                    Some(envelope) => {
                        activation = Activation::Message(envelope);
                        continue;
                    }
                    None => {
                        slot.suspension = Suspension::AwaitingMessage;
                        return Ok(());
                    }
                },
                Some(Suspend::HoldUnlessMessage(duration)) => match slot.mailbox.pop_front() {
                    // A message is already waiting: the hold ends at once.
                    Some(envelope) => {
                        activation = Activation::Interrupted(envelope);
                        continue;
                    }
                    None => (duration, true),
                },
                Some(Suspend::Hold(duration)) => (duration, false),
            };

            let until = now.checked_add(duration).ok_or_else(|| SimError::Component {
                component: slot.component.name().to_string(),
                time: now,
                source: Box::new(SimError::ClockOverflow { at: now, delta: duration }),
            })?;
            slot.hold_token += 1;
            let token = slot.hold_token;
            slot.suspension = if interruptible {
                Suspension::HoldingUnlessMessage { until, token }
            } else {
                Suspension::Holding { until, token }
            };
            self.agenda.push(until, id, Pending::Wake { token });
            return Ok(());
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
