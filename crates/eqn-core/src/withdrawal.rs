//! Withdrawal policies: which sub-queue of a multi-queue is served next.
//!
//! Every policy must return a non-empty sub-queue whenever one exists and
//! `None` only when all sub-queues are empty.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::queue::{Buffer, Queue};

/// Chooses the sub-queue the next extraction is taken from.
pub trait WithdrawalPolicy: fmt::Debug {
    fn select(&mut self, queues: &[Queue]) -> Option<usize>;
}

impl<W: WithdrawalPolicy + ?Sized> WithdrawalPolicy for Box<W> {
    fn select(&mut self, queues: &[Queue]) -> Option<usize> {
        (**self).select(queues)
    }
}

// ---------------------------------------------------------------------------
// Round robin
// ---------------------------------------------------------------------------

/// Cyclic sweep: the cursor advances modulo the number of sub-queues,
/// skipping empty ones.
#[derive(Debug, Clone, Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn starting_at(cursor: usize) -> Self {
        Self { cursor }
    }
}

impl WithdrawalPolicy for RoundRobin {
    fn select(&mut self, queues: &[Queue]) -> Option<usize> {
        let n = queues.len();
        if n == 0 {
            return None;
        }
        for step in 0..n {
            let i = (self.cursor + step) % n;
            if !queues[i].is_empty() {
                self.cursor = (i + 1) % n;
                return Some(i);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// SCAN
// ---------------------------------------------------------------------------

/// Sweep direction of a [`Scan`] cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

/// Elevator sweep: the cursor moves up until the last index, flips to
/// down, and flips again at index 0. Empty sub-queues are skipped by
/// continuing to move.
#[derive(Debug, Clone)]
pub struct Scan {
    cursor: usize,
    direction: Direction,
}

impl Default for Scan {
    fn default() -> Self {
        Self::new(0, Direction::Up)
    }
}

impl Scan {
    pub fn new(cursor: usize, direction: Direction) -> Self {
        Self { cursor, direction }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Move one position, flipping direction at either end.
    fn advance(&mut self, n: usize) {
        if n <= 1 {
            self.cursor = 0;
            return;
        }
        match self.direction {
            Direction::Up if self.cursor + 1 >= n => {
                self.direction = Direction::Down;
                self.cursor = n - 2;
            }
            Direction::Up => self.cursor += 1,
            Direction::Down if self.cursor == 0 => {
                self.direction = Direction::Up;
                self.cursor = 1;
            }
            Direction::Down => self.cursor -= 1,
        }
    }
}

impl WithdrawalPolicy for Scan {
    fn select(&mut self, queues: &[Queue]) -> Option<usize> {
        let n = queues.len();
        if n == 0 {
            return None;
        }
        self.cursor = self.cursor.min(n - 1);
        // A full back-and-forth sweep visits every index at least once.
        for _ in 0..2 * n {
            let i = self.cursor;
            self.advance(n);
            if !queues[i].is_empty() {
                return Some(i);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Shortest non-empty
// ---------------------------------------------------------------------------

/// The non-empty sub-queue with the fewest jobs; ties go to the lowest index.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestNonEmpty;

impl WithdrawalPolicy for ShortestNonEmpty {
    fn select(&mut self, queues: &[Queue]) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (i, q) in queues.iter().enumerate() {
            let len = q.enqueued_count();
            if len == 0 {
                continue;
            }
            if best.is_none_or(|(_, best_len)| len < best_len) {
                best = Some((i, len));
            }
        }
        best.map(|(i, _)| i)
    }
}

// ---------------------------------------------------------------------------
// First non-empty
// ---------------------------------------------------------------------------

/// Static priority by index: the lowest-index non-empty sub-queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstNonEmpty;

impl WithdrawalPolicy for FirstNonEmpty {
    fn select(&mut self, queues: &[Queue]) -> Option<usize> {
        queues.iter().position(|q| !q.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Sticky until empty
// ---------------------------------------------------------------------------

/// Keeps serving the same sub-queue until it runs dry, then lets the
/// fallback policy pick the next one.
#[derive(Debug)]
pub struct StickyUntilEmpty {
    current: Option<usize>,
    fallback: Box<dyn WithdrawalPolicy>,
}

impl StickyUntilEmpty {
    pub fn new(fallback: Box<dyn WithdrawalPolicy>) -> Self {
        Self {
            current: None,
            fallback,
        }
    }

    /// The sub-queue currently being drained, if any.
    pub fn current(&self) -> Option<usize> {
        self.current
    }
}

impl WithdrawalPolicy for StickyUntilEmpty {
    fn select(&mut self, queues: &[Queue]) -> Option<usize> {
        if let Some(i) = self.current
            && queues.get(i).is_some_and(|q| !q.is_empty())
        {
            return Some(i);
        }
        self.current = self.fallback.select(queues);
        self.current
    }
}

// ---------------------------------------------------------------------------
// Serializable selector
// ---------------------------------------------------------------------------

/// Serializable selector for the built-in withdrawal policies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalKind {
    #[default]
    RoundRobin,
    Scan,
    ShortestNonEmpty,
    FirstNonEmpty,
    StickyUntilEmpty { fallback: Box<WithdrawalKind> },
}

impl WithdrawalKind {
    pub fn build(&self) -> Box<dyn WithdrawalPolicy> {
        match self {
            WithdrawalKind::RoundRobin => Box::new(RoundRobin::default()),
            WithdrawalKind::Scan => Box::new(Scan::default()),
            WithdrawalKind::ShortestNonEmpty => Box::new(ShortestNonEmpty),
            WithdrawalKind::FirstNonEmpty => Box::new(FirstNonEmpty),
            WithdrawalKind::StickyUntilEmpty { fallback } => {
                Box::new(StickyUntilEmpty::new(fallback.build()))
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
