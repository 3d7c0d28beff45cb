//! Queueing statistics for the EQN engine.
//!
//! Consumes core events (`JobArrived`, `QueueLengthChanged`, `JobWithdrawn`,
//! `ServiceStarted`, `ServiceCompleted`, ...) and aggregates them per
//! facility: time-weighted mean queue length, sample mean waiting time with
//! a confidence interval, interarrival and service time statistics, discard
//! counts and server utilization.
//!
//! # Usage
//!
//! ```ignore
//! let mut stats = NetworkStats::new(StatsConfig::default())?;
//! stats.track_facility("checkout", &handle);
//! sim.run_until(horizon)?;
//! for event in sim.drain_events() {
//!     stats.process_event(&event);
//! }
//! let reports = stats.report(sim.now());
//! ```
//!
//! Estimates use `f64`: they are outputs, never fed back into the
//! simulation, so they do not affect determinism.

use std::collections::{BTreeMap, HashMap};

use eqn_core::error::ConfigError;
use eqn_core::event::Event;
use eqn_core::facility::FacilityHandle;
use eqn_core::fixed::{SimTime, time_to_f64};
use eqn_core::id::ComponentId;
use eqn_core::waiting::WaitingState;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Two-sided confidence level for interval estimates, in (0, 1).
    pub confidence_level: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
        }
    }
}

impl StatsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(ConfigError::ConfidenceLevel(level));
        }
        Ok(())
    }

    /// Standard normal quantile for the configured two-sided level.
    pub fn z(&self) -> f64 {
        normal_quantile(0.5 + self.confidence_level / 2.0)
    }
}

// ---------------------------------------------------------------------------
// Normal quantile
// ---------------------------------------------------------------------------

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9). Returns infinities at 0 and 1.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const LOW: f64 = 0.024_25;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };
    if p < LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    }
}

// ---------------------------------------------------------------------------
// SampleStats -- discrete samples
// ---------------------------------------------------------------------------

/// Running mean and variance of discrete samples (Welford's algorithm).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleStats {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the running mean.
    m2: f64,
    min: f64,
    max: f64,
}

impl SampleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, x: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Unbiased sample variance; needs at least two samples.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Normal-approximation interval `mean +- z * s / sqrt(n)`.
    pub fn confidence_interval(&self, z: f64) -> Option<(f64, f64)> {
        let sd = self.std_dev()?;
        let half = z * sd / (self.count as f64).sqrt();
        Some((self.mean - half, self.mean + half))
    }

    pub fn summary(&self, z: f64) -> SampleSummary {
        SampleSummary {
            count: self.count,
            mean: self.mean(),
            variance: self.variance(),
            min: self.min(),
            max: self.max(),
            confidence_interval: self.confidence_interval(z),
        }
    }
}

/// Serializable snapshot of a [`SampleStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub count: u64,
    pub mean: Option<f64>,
    pub variance: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub confidence_interval: Option<(f64, f64)>,
}

// ---------------------------------------------------------------------------
// TimeWeighted -- step functions of simulated time
// ---------------------------------------------------------------------------

/// Area under a piecewise-constant curve, for time averages such as the
/// mean queue length.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWeighted {
    start: SimTime,
    last_time: SimTime,
    value: f64,
    area: f64,
    max: f64,
}

impl TimeWeighted {
    pub fn new(start: SimTime, initial: f64) -> Self {
        Self {
            start,
            last_time: start,
            value: initial,
            area: 0.0,
            max: initial,
        }
    }

    /// The curve steps to `value` at `at`. Updates must not go back in time.
    pub fn update(&mut self, at: SimTime, value: f64) {
        debug_assert!(at >= self.last_time, "time-weighted update went back in time");
        self.area += self.value * time_to_f64(at - self.last_time);
        self.last_time = at;
        self.value = value;
        self.max = self.max.max(value);
    }

    pub fn current(&self) -> f64 {
        self.value
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Time average over `[start, now]`. `None` for an empty interval.
    pub fn mean(&self, now: SimTime) -> Option<f64> {
        let span = time_to_f64(now - self.start);
        if span <= 0.0 {
            return None;
        }
        let tail = self.value * time_to_f64(now - self.last_time).max(0.0);
        Some((self.area + tail) / span)
    }
}

// ---------------------------------------------------------------------------
// FacilityStats
// ---------------------------------------------------------------------------

/// Everything observed for one facility.
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityStats {
    pub arrivals: u64,
    pub requeues: u64,
    pub bypassed: u64,
    pub dropped: u64,
    pub diverted: u64,
    pub completed: u64,
    pub preemptions: u64,
    queue_length: TimeWeighted,
    max_queue_length: usize,
    starved: TimeWeighted,
    busy: TimeWeighted,
    wait: SampleStats,
    interarrival: SampleStats,
    service: SampleStats,
    last_arrival: Option<SimTime>,
}

impl FacilityStats {
    pub fn new(start: SimTime) -> Self {
        Self {
            arrivals: 0,
            requeues: 0,
            bypassed: 0,
            dropped: 0,
            diverted: 0,
            completed: 0,
            preemptions: 0,
            queue_length: TimeWeighted::new(start, 0.0),
            max_queue_length: 0,
            starved: TimeWeighted::new(start, 0.0),
            busy: TimeWeighted::new(start, 0.0),
            wait: SampleStats::new(),
            interarrival: SampleStats::new(),
            service: SampleStats::new(),
            last_arrival: None,
        }
    }

    /// Waiting times, bypassed jobs included as zero waits.
    pub fn wait(&self) -> &SampleStats {
        &self.wait
    }

    pub fn interarrival(&self) -> &SampleStats {
        &self.interarrival
    }

    /// Total service per completed job.
    pub fn service(&self) -> &SampleStats {
        &self.service
    }

    pub fn max_queue_length(&self) -> usize {
        self.max_queue_length
    }

    pub fn mean_queue_length(&self, now: SimTime) -> Option<f64> {
        self.queue_length.mean(now)
    }

    /// Fraction of time the server held a job.
    pub fn utilization(&self, now: SimTime) -> Option<f64> {
        self.busy.mean(now)
    }

    /// Fraction of time the waiting system sat starved.
    pub fn starved_fraction(&self, now: SimTime) -> Option<f64> {
        self.starved.mean(now)
    }

    fn record(&mut self, event: &Event) {
        match *event {
            Event::JobArrived { time, .. } => {
                self.arrivals += 1;
                if let Some(last) = self.last_arrival {
                    self.interarrival.add(time_to_f64(time - last));
                }
                self.last_arrival = Some(time);
            }
            Event::JobRequeued { .. } => self.requeues += 1,
            Event::QueueLengthChanged { length, time, .. } => {
                self.queue_length.update(time, length as f64);
                self.max_queue_length = self.max_queue_length.max(length);
            }
            Event::JobWithdrawn { waited, .. } => self.wait.add(time_to_f64(waited)),
            Event::JobBypassed { .. } => self.bypassed += 1,
            Event::JobDiscarded { .. } => self.dropped += 1,
            Event::JobDiverted { .. } => self.diverted += 1,
            Event::WaitingStateChanged { state, time, .. } => {
                let starved = if state == WaitingState::Starved { 1.0 } else { 0.0 };
                self.starved.update(time, starved);
            }
            Event::ServiceStarted { time, .. } => self.busy.update(time, 1.0),
            Event::ServiceCompleted { service, time, .. } => {
                self.completed += 1;
                self.service.add(time_to_f64(service));
                self.busy.update(time, 0.0);
            }
            Event::JobPreempted { .. } => self.preemptions += 1,
        }
    }

    pub fn report(&self, name: &str, now: SimTime, z: f64) -> FacilityReport {
        FacilityReport {
            name: name.to_string(),
            arrivals: self.arrivals,
            requeues: self.requeues,
            bypassed: self.bypassed,
            dropped: self.dropped,
            diverted: self.diverted,
            completed: self.completed,
            preemptions: self.preemptions,
            mean_queue_length: self.mean_queue_length(now),
            max_queue_length: self.max_queue_length,
            utilization: self.utilization(now),
            starved_fraction: self.starved_fraction(now),
            wait: self.wait.summary(z),
            interarrival: self.interarrival.summary(z),
            service: self.service.summary(z),
        }
    }
}

/// Serializable per-facility output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityReport {
    pub name: String,
    pub arrivals: u64,
    pub requeues: u64,
    pub bypassed: u64,
    pub dropped: u64,
    pub diverted: u64,
    pub completed: u64,
    pub preemptions: u64,
    pub mean_queue_length: Option<f64>,
    pub max_queue_length: usize,
    pub utilization: Option<f64>,
    pub starved_fraction: Option<f64>,
    pub wait: SampleSummary,
    pub interarrival: SampleSummary,
    pub service: SampleSummary,
}

// ---------------------------------------------------------------------------
// NetworkStats -- the aggregator
// ---------------------------------------------------------------------------

/// Routes events from tracked components to per-facility statistics.
///
/// Events from components that were never tracked are ignored.
#[derive(Debug)]
pub struct NetworkStats {
    config: StatsConfig,
    facilities: BTreeMap<String, FacilityStats>,
    owners: HashMap<ComponentId, String>,
    processed: u64,
}

impl NetworkStats {
    pub fn new(config: StatsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            facilities: BTreeMap::new(),
            owners: HashMap::new(),
            processed: 0,
        })
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Attribute events from `components` to facility `name`, observed from
    /// time zero.
    pub fn track(&mut self, name: &str, components: &[ComponentId]) {
        self.track_from(name, components, SimTime::ZERO);
    }

    /// Like [`track`](Self::track), with time averages starting at `start`.
    pub fn track_from(&mut self, name: &str, components: &[ComponentId], start: SimTime) {
        self.facilities
            .entry(name.to_string())
            .or_insert_with(|| FacilityStats::new(start));
        for &id in components {
            self.owners.insert(id, name.to_string());
        }
    }

    /// Track both halves of an installed facility.
    pub fn track_facility(&mut self, name: &str, handle: &FacilityHandle) {
        self.track(name, &[handle.waiting, handle.server]);
    }

    /// Process a single event, updating the owning facility's statistics.
    pub fn process_event(&mut self, event: &Event) {
        let Some(name) = self.owners.get(&event.component()) else {
            return;
        };
        if let Some(stats) = self.facilities.get_mut(name) {
            stats.record(event);
            self.processed += 1;
        }
    }

    pub fn process_all<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) {
        for event in events {
            self.process_event(event);
        }
    }

    /// Events attributed to a tracked facility so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn facility(&self, name: &str) -> Option<&FacilityStats> {
        self.facilities.get(name)
    }

    /// Reports for every tracked facility, ordered by name.
    pub fn report(&self, now: SimTime) -> Vec<FacilityReport> {
        let z = self.config.z();
        self.facilities
            .iter()
            .map(|(name, stats)| stats.report(name, now, z))
            .collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
