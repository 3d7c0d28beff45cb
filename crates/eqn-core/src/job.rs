//! Jobs: the units of work that flow through facilities.
//!
//! A job carries an immutable identity (id, category, priority, creation
//! time, requested service) and a handful of mutable fields that facilities
//! update as the job moves. Jobs are always moved between components, never
//! shared: whichever component holds the value owns the job.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::fixed::SimTime;
use crate::id::{CategoryId, JobId};

/// A unit of flow through the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    category: CategoryId,
    /// Smaller values are more urgent. 0 is the most urgent.
    priority: u32,
    created_at: SimTime,
    requested: SimTime,

    remaining: SimTime,
    arrived_at: SimTime,
    enqueued_at: Option<SimTime>,
    interruptions: u32,
    requeues: u32,
    service_received: SimTime,
}

impl Job {
    /// Create a job requesting `requested` units of service.
    pub fn new(id: JobId, requested: SimTime) -> Self {
        Self {
            id,
            category: CategoryId::default(),
            priority: 0,
            created_at: SimTime::ZERO,
            requested,
            remaining: requested,
            arrived_at: SimTime::ZERO,
            enqueued_at: None,
            interruptions: 0,
            requeues: 0,
            service_received: SimTime::ZERO,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = category;
        self
    }

    /// Stamp the creation time; also used as the initial arrival time.
    pub fn created_at(mut self, at: SimTime) -> Self {
        self.created_at = at;
        self.arrived_at = at;
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn category(&self) -> CategoryId {
        self.category
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn creation_time(&self) -> SimTime {
        self.created_at
    }

    /// Service originally requested.
    pub fn requested(&self) -> SimTime {
        self.requested
    }

    /// Service still owed to this job at its current facility.
    pub fn remaining(&self) -> SimTime {
        self.remaining
    }

    /// When the job last arrived at a facility (requeues do not reset it).
    pub fn arrival_time(&self) -> SimTime {
        self.arrived_at
    }

    /// When the job entered the queue it currently sits in, if any.
    pub fn enqueued_at(&self) -> Option<SimTime> {
        self.enqueued_at
    }

    /// How many times the job was preempted.
    pub fn interruptions(&self) -> u32 {
        self.interruptions
    }

    /// How many times the job was sent back into a waiting system.
    pub fn requeues(&self) -> u32 {
        self.requeues
    }

    /// Time the job has actually been held in service at its current
    /// facility.
    pub fn service_received(&self) -> SimTime {
        self.service_received
    }

    /// Total order used by priority queues and preemption: priority value,
    /// then arrival time, then id.
    pub fn precedence(&self, other: &Job) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.arrived_at.cmp(&other.arrived_at))
            .then(self.id.cmp(&other.id))
    }

    /// Whether `self` strictly precedes `other` in the job order.
    pub fn precedes(&self, other: &Job) -> bool {
        self.precedence(other) == Ordering::Less
    }

    // -- Facility-side mutation --

    /// A fresh arrival at a facility: the job owes its full request to this
    /// facility and has received none of it yet. Requeues never come here.
    pub(crate) fn mark_arrived(&mut self, now: SimTime) {
        self.arrived_at = now;
        self.remaining = self.requested;
        self.service_received = SimTime::ZERO;
    }

    pub(crate) fn mark_enqueued(&mut self, now: SimTime) {
        self.enqueued_at = Some(now);
    }

    /// Clear the enqueue stamp and return how long the job waited.
    pub(crate) fn take_wait(&mut self, now: SimTime) -> SimTime {
        match self.enqueued_at.take() {
            Some(at) => now - at,
            None => SimTime::ZERO,
        }
    }

    pub(crate) fn mark_requeued(&mut self) {
        self.requeues += 1;
    }

    pub(crate) fn mark_interrupted(&mut self) {
        self.interruptions += 1;
    }

    /// Overwrite the remaining service with the exact remainder computed at
    /// an interruption.
    ///
    /// # Panics
    ///
    /// Panics if the remainder would grow the job's outstanding work.
    pub(crate) fn set_remaining(&mut self, remaining: SimTime) {
        assert!(
            remaining <= self.remaining,
            "remaining service for {:?} cannot grow ({} -> {})",
            self.id,
            self.remaining,
            remaining
        );
        self.remaining = remaining;
    }

    /// Credit `held` units of service actually delivered.
    pub(crate) fn record_service(&mut self, held: SimTime) {
        self.service_received += held;
    }
}
