//! Serializable facility configuration.
//!
//! Every config struct has a sensible `Default`, a `validate()` that reports
//! the first invalid value as a [`ConfigError`], and a `build()` that
//! validates before constructing the runtime object. Building never panics
//! on a config that passed validation.

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchKind;
use crate::error::ConfigError;
use crate::fixed::{Fixed64, SimTime};
use crate::multi_queue::MultiQueue;
use crate::preemption::PreemptionKind;
use crate::queue::{Buffer, OrderKind, Queue};
use crate::waiting::OverflowPolicy;
use crate::withdrawal::WithdrawalKind;

fn non_negative(field: &'static str, value: SimTime) -> Result<(), ConfigError> {
    if value < SimTime::ZERO {
        return Err(ConfigError::NegativeTime { field, value });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Queues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// `None` = unbounded.
    pub capacity: Option<usize>,
    pub order: OrderKind,
    pub extraction_delay: SimTime,
}

impl QueueConfig {
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity);
        }
        non_negative("extraction_delay", self.extraction_delay)
    }

    pub fn build(&self) -> Result<Queue, ConfigError> {
        self.validate()?;
        let queue = match self.capacity {
            Some(capacity) => Queue::bounded(self.order.build(), capacity),
            None => Queue::new(self.order.build()),
        };
        Ok(queue.with_extraction_delay(self.extraction_delay))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiQueueConfig {
    pub queues: Vec<QueueConfig>,
    pub dispatch: DispatchKind,
    pub withdrawal: WithdrawalKind,
    /// Charged when extraction moves to a different sub-queue.
    pub switch_delay: SimTime,
    /// Seed for randomized dispatch.
    pub seed: u64,
}

impl Default for MultiQueueConfig {
    fn default() -> Self {
        Self {
            queues: vec![QueueConfig::default(), QueueConfig::default()],
            dispatch: DispatchKind::default(),
            withdrawal: WithdrawalKind::default(),
            switch_delay: SimTime::ZERO,
            seed: 0,
        }
    }
}

impl MultiQueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let count = self.queues.len();
        if count == 0 {
            return Err(ConfigError::NoSubQueues);
        }
        for queue in &self.queues {
            queue.validate()?;
        }
        non_negative("switch_delay", self.switch_delay)?;

        match &self.dispatch {
            DispatchKind::CategoryMap { routes, default } => {
                let indices = routes.iter().map(|(_, i)| *i).chain(std::iter::once(*default));
                for index in indices {
                    if index >= count {
                        return Err(ConfigError::IndexOutOfRange { index, count });
                    }
                }
            }
            DispatchKind::WeightedRandom { weights } => {
                if weights.len() != count {
                    return Err(ConfigError::PolicyArity {
                        policy: "WeightedRandom",
                        expected: count,
                        got: weights.len(),
                    });
                }
                if let Some((index, &value)) =
                    weights.iter().enumerate().find(|(_, w)| **w < Fixed64::ZERO)
                {
                    return Err(ConfigError::NegativeWeight { index, value });
                }
                if weights.iter().all(|w| *w == Fixed64::ZERO) {
                    return Err(ConfigError::ZeroWeights);
                }
            }
            DispatchKind::ShortestQueue => {}
        }
        Ok(())
    }

    pub fn build(&self) -> Result<MultiQueue, ConfigError> {
        self.validate()?;
        let queues = self
            .queues
            .iter()
            .map(QueueConfig::build)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MultiQueue::new(
            queues,
            self.dispatch.build(self.seed),
            self.withdrawal.build(),
        )
        .with_switch_delay(self.switch_delay))
    }
}

/// The buffer behind a waiting system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BufferConfig {
    Single(QueueConfig),
    Multi(MultiQueueConfig),
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig::Single(QueueConfig::default())
    }
}

impl BufferConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            BufferConfig::Single(q) => q.validate(),
            BufferConfig::Multi(m) => m.validate(),
        }
    }

    pub fn build(&self) -> Result<Box<dyn Buffer>, ConfigError> {
        match self {
            BufferConfig::Single(q) => Ok(Box::new(q.build()?)),
            BufferConfig::Multi(m) => Ok(Box::new(m.build()?)),
        }
    }
}

// ---------------------------------------------------------------------------
// Facility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisciplineKind {
    #[default]
    NonPreemptive,
    Preemptive { policy: PreemptionKind },
}

/// A waiting system plus the discipline that serves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityConfig {
    pub buffer: BufferConfig,
    pub overflow: OverflowPolicy,
    pub discipline: DisciplineKind,
}

impl FacilityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.buffer.validate()
    }

    pub fn is_preemptive(&self) -> bool {
        matches!(self.discipline, DisciplineKind::Preemptive { .. })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
