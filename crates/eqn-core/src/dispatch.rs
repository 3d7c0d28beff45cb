//! Dispatch policies: which sub-queue an arriving job joins.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fixed::Fixed64;
use crate::id::CategoryId;
use crate::job::Job;
use crate::queue::{Buffer, Queue};
use crate::rng::SimRng;

/// Maps an arriving job to a sub-queue index.
pub trait DispatchPolicy: fmt::Debug {
    /// Index into `queues` for `job`. Must be in range.
    fn dispatch(&mut self, job: &Job, queues: &[Queue]) -> usize;
}

impl<D: DispatchPolicy + ?Sized> DispatchPolicy for Box<D> {
    fn dispatch(&mut self, job: &Job, queues: &[Queue]) -> usize {
        (**self).dispatch(job, queues)
    }
}

/// Fixed category -> sub-queue mapping; unmapped categories use `default`.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    routes: HashMap<CategoryId, usize>,
    default: usize,
}

impl CategoryMap {
    pub fn new(default: usize) -> Self {
        Self {
            routes: HashMap::new(),
            default,
        }
    }

    pub fn route(mut self, category: CategoryId, index: usize) -> Self {
        self.routes.insert(category, index);
        self
    }

    /// Largest index this map can produce.
    pub fn max_index(&self) -> usize {
        self.routes
            .values()
            .copied()
            .max()
            .unwrap_or(0)
            .max(self.default)
    }
}

impl DispatchPolicy for CategoryMap {
    fn dispatch(&mut self, job: &Job, _queues: &[Queue]) -> usize {
        self.routes
            .get(&job.category())
            .copied()
            .unwrap_or(self.default)
    }
}

/// Picks a sub-queue with probability proportional to its weight.
#[derive(Debug, Clone)]
pub struct WeightedRandom {
    weights: Vec<Fixed64>,
    rng: SimRng,
}

impl WeightedRandom {
    pub fn new(weights: Vec<Fixed64>, seed: u64) -> Self {
        Self {
            weights,
            rng: SimRng::new(seed),
        }
    }

    pub fn weights(&self) -> &[Fixed64] {
        &self.weights
    }
}

impl DispatchPolicy for WeightedRandom {
    fn dispatch(&mut self, _job: &Job, _queues: &[Queue]) -> usize {
        // With no positive weight every pick is equally bad; use the first.
        self.rng.pick_weighted(&self.weights).unwrap_or(0)
    }
}

/// Joins the sub-queue with the fewest jobs at arrival time; ties go to the
/// lowest index. Full sub-queues are avoided while a sub-queue with room
/// exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestQueue;

impl DispatchPolicy for ShortestQueue {
    fn dispatch(&mut self, _job: &Job, queues: &[Queue]) -> usize {
        queues
            .iter()
            .enumerate()
            .min_by_key(|(i, q)| (q.is_full(), q.enqueued_count(), *i))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// Serializable selector for the built-in dispatch policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum DispatchKind {
    /// `routes[i] = (category, sub-queue)`.
    CategoryMap {
        routes: Vec<(CategoryId, usize)>,
        default: usize,
    },
    WeightedRandom { weights: Vec<Fixed64> },
    #[default]
    ShortestQueue,
}

impl DispatchKind {
    pub fn build(&self, seed: u64) -> Box<dyn DispatchPolicy> {
        match self {
            DispatchKind::CategoryMap { routes, default } => {
                let map = routes
                    .iter()
                    .fold(CategoryMap::new(*default), |map, (c, i)| map.route(*c, *i));
                Box::new(map)
            }
            DispatchKind::WeightedRandom { weights } => {
                Box::new(WeightedRandom::new(weights.clone(), seed))
            }
            DispatchKind::ShortestQueue => Box::new(ShortestQueue),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
