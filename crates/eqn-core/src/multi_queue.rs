//! A set of parallel sub-queues behind one waiting system.
//!
//! Arrivals are sharded by a [`DispatchPolicy`]; extractions are taken from
//! the sub-queue a [`WithdrawalPolicy`] selects. Capacity is per sub-queue.

use crate::dispatch::DispatchPolicy;
use crate::error::Overflow;
use crate::fixed::SimTime;
use crate::job::Job;
use crate::queue::{Buffer, Queue};
use crate::withdrawal::WithdrawalPolicy;
use tracing::trace;

#[derive(Debug)]
pub struct MultiQueue {
    queues: Vec<Queue>,
    dispatch: Box<dyn DispatchPolicy>,
    withdrawal: Box<dyn WithdrawalPolicy>,
    /// Extra delay charged when extraction moves to a different sub-queue.
    switch_delay: SimTime,
    /// Sub-queue chosen by `next_extraction_delay` for the coming extract.
    selected: Option<usize>,
    last_served: Option<usize>,
}

impl MultiQueue {
    /// # Panics
    ///
    /// Panics if `queues` is empty.
    pub fn new(
        queues: Vec<Queue>,
        dispatch: Box<dyn DispatchPolicy>,
        withdrawal: Box<dyn WithdrawalPolicy>,
    ) -> Self {
        assert!(!queues.is_empty(), "MultiQueue needs at least one sub-queue");
        Self {
            queues,
            dispatch,
            withdrawal,
            switch_delay: SimTime::ZERO,
            selected: None,
            last_served: None,
        }
    }

    pub fn with_switch_delay(mut self, delay: SimTime) -> Self {
        self.switch_delay = delay;
        self
    }

    pub fn sub_queues(&self) -> &[Queue] {
        &self.queues
    }

    pub fn sub_queue(&self, index: usize) -> Option<&Queue> {
        self.queues.get(index)
    }

    /// Sub-queue served by the most recent extraction.
    pub fn last_served(&self) -> Option<usize> {
        self.last_served
    }

    fn select(&mut self) -> usize {
        if let Some(i) = self.selected.take() {
            return i;
        }
        match self.withdrawal.select(&self.queues) {
            Some(i) => i,
            None => panic!("withdrawal policy found no sub-queue to serve"),
        }
    }
}

impl Buffer for MultiQueue {
    /// # Panics
    ///
    /// Panics if the dispatch policy returns an out-of-range index.
    fn insert(&mut self, job: Job) -> Result<(), Overflow> {
        // The arrival may change which sub-queue withdrawal would pick.
        self.selected = None;
        let index = self.dispatch.dispatch(&job, &self.queues);
        let count = self.queues.len();
        match self.queues.get_mut(index) {
            Some(queue) => queue.insert(job),
            None => panic!("dispatch chose sub-queue {index}, but only {count} exist"),
        }
    }

    fn extract(&mut self) -> Job {
        let index = self.select();
        let queue = &mut self.queues[index];
        assert!(
            !queue.is_empty(),
            "withdrawal policy selected empty sub-queue {index}"
        );
        self.last_served = Some(index);
        queue.extract()
    }

    fn next_extraction_delay(&mut self) -> SimTime {
        if self.is_empty() {
            return SimTime::ZERO;
        }
        let index = self.select();
        self.selected = Some(index);
        let base = self.queues[index].next_extraction_delay();
        match self.last_served {
            Some(last) if last != index => {
                trace!(from = last, to = index, delay = %self.switch_delay, "sub-queue switch");
                base + self.switch_delay
            }
            _ => base,
        }
    }

    fn enqueued_count(&self) -> usize {
        self.queues.iter().map(Queue::enqueued_count).sum()
    }

    fn is_full(&self) -> bool {
        self.queues.iter().all(Queue::is_full)
    }

    fn discarded_count(&self) -> u64 {
        self.queues.iter().map(Queue::discarded_count).sum()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
