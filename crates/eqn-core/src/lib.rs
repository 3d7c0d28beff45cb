//! EQN Core -- event-driven queueing networks on a deterministic virtual clock.
//!
//! Jobs flow between facilities. A facility is a waiting system (one queue
//! or a set of parallel sub-queues) paired with a service discipline that
//! pulls jobs out of it. Every component is an explicit state machine run by
//! a single-threaded executor that dispatches pending work in
//! `(time, scheduling order)` order, so two runs with the same inputs produce
//! the same trajectory.
//!
//! # Pull Protocol
//!
//! 1. The discipline sends `PullRequest` to its waiting system.
//! 2. A non-empty waiting system extracts its head and forwards it after the
//!    buffer's extraction delay. An empty one becomes *starved* and hands the
//!    next arrival straight through with zero delay.
//! 3. The discipline holds for the job's remaining work, forwards it
//!    downstream and pulls again.
//!
//! A preemptive discipline receives upstream arrivals itself. An arrival the
//! preemption policy admits sends the job in service back to the waiting
//! system with its exact remaining work.
//!
//! # Key Types
//!
//! - [`engine::Simulation`] -- executor, component registry and port links.
//! - [`engine::Component`] -- the state-machine trait every task implements.
//! - [`queue::Queue`] -- ordered, optionally bounded queue.
//! - [`multi_queue::MultiQueue`] -- sub-queues behind dispatch and
//!   withdrawal policies.
//! - [`waiting::WaitingSystem`] -- reconciles arrivals with pull requests.
//! - [`service::Server`], [`service::PreemptiveServer`] -- disciplines.
//! - [`facility::install`] -- assembles a facility from a
//!   [`config::FacilityConfig`].
//! - [`event::EventBus`] -- typed observation events for statistics.
//! - [`fixed::SimTime`] -- Q32.32 fixed-point simulated time.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod facility;
pub mod fixed;
pub mod id;
pub mod job;
pub mod message;
pub mod multi_queue;
pub mod preemption;
pub mod queue;
pub mod rng;
pub mod service;
pub mod sim;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod waiting;
pub mod withdrawal;
