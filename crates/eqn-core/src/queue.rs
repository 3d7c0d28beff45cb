//! Queues of waiting jobs.
//!
//! A [`Queue`] keeps its jobs ordered by an injected [`InsertionOrder`] and
//! always extracts from the head. Finite queues reject jobs once full and
//! count the rejections. The [`Buffer`] trait is the interface a waiting
//! system drives; it is implemented by both [`Queue`] and
//! [`MultiQueue`](crate::multi_queue::MultiQueue).

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Overflow;
use crate::fixed::SimTime;
use crate::job::Job;

// ---------------------------------------------------------------------------
// Buffer trait
// ---------------------------------------------------------------------------

/// A container a waiting system buffers jobs in.
pub trait Buffer: fmt::Debug {
    /// Insert a job, or hand it back inside [`Overflow`] when there is no
    /// room for it.
    fn insert(&mut self, job: Job) -> Result<(), Overflow>;

    /// Remove and return the next job to serve.
    ///
    /// # Panics
    ///
    /// Panics when the buffer is empty. Callers check [`is_empty`](Self::is_empty) first.
    fn extract(&mut self) -> Job;

    /// Time charged before the next extracted job is released.
    ///
    /// Call it immediately before [`extract`](Self::extract): a buffer may
    /// pick the job to extract here. A selection made this way is dropped
    /// by the next `insert`.
    fn next_extraction_delay(&mut self) -> SimTime;

    fn enqueued_count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.enqueued_count() == 0
    }

    /// Whether the next insert would overflow. For a multi-queue this is
    /// only true when every sub-queue is full.
    fn is_full(&self) -> bool;

    /// Jobs rejected for lack of room since creation.
    fn discarded_count(&self) -> u64;
}

impl<B: Buffer + ?Sized> Buffer for Box<B> {
    fn insert(&mut self, job: Job) -> Result<(), Overflow> {
        (**self).insert(job)
    }

    fn extract(&mut self) -> Job {
        (**self).extract()
    }

    fn next_extraction_delay(&mut self) -> SimTime {
        (**self).next_extraction_delay()
    }

    fn enqueued_count(&self) -> usize {
        (**self).enqueued_count()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn is_full(&self) -> bool {
        (**self).is_full()
    }

    fn discarded_count(&self) -> u64 {
        (**self).discarded_count()
    }
}

// ---------------------------------------------------------------------------
// Insertion orders
// ---------------------------------------------------------------------------

/// Decides where a new job lands: it is inserted before the first queued
/// job for which [`goes_before`](Self::goes_before) returns true, or at the
/// tail if there is none.
pub trait InsertionOrder: fmt::Debug {
    fn goes_before(&self, new: &Job, queued: &Job) -> bool;
}

/// Append at the tail.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl InsertionOrder for Fifo {
    fn goes_before(&self, _new: &Job, _queued: &Job) -> bool {
        false
    }
}

/// Insert at the head.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifo;

impl InsertionOrder for Lifo {
    fn goes_before(&self, _new: &Job, _queued: &Job) -> bool {
        true
    }
}

/// Ascending priority value: the new job goes before the first queued job
/// whose priority value is greater than or equal to its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityOrder;

impl InsertionOrder for PriorityOrder {
    fn goes_before(&self, new: &Job, queued: &Job) -> bool {
        queued.priority() >= new.priority()
    }
}

/// Shortest remaining work first; equal remainders keep arrival order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestRemaining;

impl InsertionOrder for ShortestRemaining {
    fn goes_before(&self, new: &Job, queued: &Job) -> bool {
        queued.remaining() > new.remaining()
    }
}

/// Serializable selector for the built-in insertion orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    #[default]
    Fifo,
    Lifo,
    Priority,
    ShortestRemaining,
}

impl OrderKind {
    pub fn build(self) -> Box<dyn InsertionOrder> {
        match self {
            OrderKind::Fifo => Box::new(Fifo),
            OrderKind::Lifo => Box::new(Lifo),
            OrderKind::Priority => Box::new(PriorityOrder),
            OrderKind::ShortestRemaining => Box::new(ShortestRemaining),
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// An ordered, optionally bounded queue of waiting jobs.
#[derive(Debug)]
pub struct Queue {
    jobs: VecDeque<Job>,
    order: Box<dyn InsertionOrder>,
    /// `None` = unbounded.
    capacity: Option<usize>,
    discarded: u64,
    extraction_delay: SimTime,
}

impl Default for Queue {
    fn default() -> Self {
        Self::fifo()
    }
}

impl Queue {
    /// Unbounded queue with the given order.
    pub fn new(order: Box<dyn InsertionOrder>) -> Self {
        Self {
            jobs: VecDeque::new(),
            order,
            capacity: None,
            discarded: 0,
            extraction_delay: SimTime::ZERO,
        }
    }

    /// Unbounded FIFO queue.
    pub fn fifo() -> Self {
        Self::new(Box::new(Fifo))
    }

    /// Bounded queue holding at most `capacity` jobs.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn bounded(order: Box<dyn InsertionOrder>, capacity: usize) -> Self {
        assert!(capacity > 0, "Queue capacity must be > 0");
        Self {
            capacity: Some(capacity),
            ..Self::new(order)
        }
    }

    /// Charge `delay` before every extracted job is released.
    pub fn with_extraction_delay(mut self, delay: SimTime) -> Self {
        self.extraction_delay = delay;
        self
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// The job the next extraction returns.
    pub fn peek(&self) -> Option<&Job> {
        self.jobs.front()
    }

    /// Waiting jobs, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    fn insertion_index(&self, job: &Job) -> usize {
        self.jobs
            .iter()
            .position(|queued| self.order.goes_before(job, queued))
            .unwrap_or(self.jobs.len())
    }
}

impl Buffer for Queue {
    fn insert(&mut self, job: Job) -> Result<(), Overflow> {
        if self.is_full() {
            self.discarded += 1;
            return Err(Overflow(job));
        }
        let at = self.insertion_index(&job);
        self.jobs.insert(at, job);
        Ok(())
    }

    fn extract(&mut self) -> Job {
        match self.jobs.pop_front() {
            Some(job) => job,
            None => panic!("extract called on an empty queue"),
        }
    }

    fn next_extraction_delay(&mut self) -> SimTime {
        self.extraction_delay
    }

    fn enqueued_count(&self) -> usize {
        self.jobs.len()
    }

    fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.jobs.len() >= cap)
    }

    fn discarded_count(&self) -> u64 {
        self.discarded
    }
}

// ===========================================================================
// Tests
// ===========================================================================
