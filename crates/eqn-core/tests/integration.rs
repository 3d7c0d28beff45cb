//! End-to-end scenarios for the EQN engine.
//!
//! Each test wires scripted sources, facilities built from configs, and
//! recording sinks, then checks what comes out the other end.

use eqn_core::config::{BufferConfig, DisciplineKind, FacilityConfig, MultiQueueConfig, QueueConfig};
use eqn_core::dispatch::DispatchKind;
use eqn_core::engine::Simulation;
use eqn_core::event::{Event, EventKind};
use eqn_core::facility::{FacilityHandle, install};
use eqn_core::fixed::{SimTime, time};
use eqn_core::id::{CategoryId, ComponentId, JobId, Port};
use eqn_core::job::Job;
use eqn_core::preemption::PreemptionKind;
use eqn_core::queue::{Buffer, OrderKind};
use eqn_core::test_utils::*;
use eqn_core::waiting::{OverflowPolicy, WaitingState};
use eqn_core::withdrawal::WithdrawalKind;

// ===========================================================================
// Helpers
// ===========================================================================

struct Line {
    sim: Simulation,
    facility: FacilityHandle,
    sink: ComponentId,
}

/// source -> facility -> sink
fn line(config: &FacilityConfig, script: Vec<(SimTime, Job)>) -> Line {
    let mut sim = Simulation::new();
    let facility = install(&mut sim, "f", config).unwrap();
    let source = sim.add(ScriptedSource::new("source", script));
    let sink = sim.add(Recorder::new("sink"));
    sim.connect(source, Port::Downstream, facility.entry).unwrap();
    facility.connect_downstream(&mut sim, sink).unwrap();
    Line {
        sim,
        facility,
        sink,
    }
}

fn preemptive(policy: PreemptionKind, order: OrderKind) -> FacilityConfig {
    FacilityConfig {
        buffer: BufferConfig::Single(QueueConfig {
            order,
            ..QueueConfig::default()
        }),
        discipline: DisciplineKind::Preemptive { policy },
        ..FacilityConfig::default()
    }
}

fn sink(sim: &Simulation, id: ComponentId) -> &Recorder {
    sim.component::<Recorder>(id).unwrap()
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn fifo_facility_delivers_everything_in_order() {
    let script = (0..20).map(|i| (time(i as i32), job(i, 3))).collect();
    let mut l = line(&FacilityConfig::default(), script);
    l.sim.run().unwrap();

    let ids: Vec<u64> = sink(&l.sim, l.sink).ids().iter().map(|j| j.0).collect();
    assert_eq!(ids, (0..20).collect::<Vec<_>>());
    // Saturated server: job i completes at 3(i + 1).
    assert_eq!(sink(&l.sim, l.sink).delivered_at(JobId(19)), Some(time(60)));
    assert_eq!(l.facility.service_counters(&l.sim).unwrap().completed, 20);
}

#[test]
fn preemption_scenario() {
    let script = vec![(time(0), prioritized(1, 10, 5)), (time(3), prioritized(2, 4, 1))];
    let mut l = line(&preemptive(PreemptionKind::StrictPriority, OrderKind::Priority), script);
    l.sim.run().unwrap();

    let rec = sink(&l.sim, l.sink);
    assert_eq!(rec.ids(), vec![JobId(2), JobId(1)]);
    assert_eq!(rec.delivered_at(JobId(2)), Some(time(7)));
    assert_eq!(rec.delivered_at(JobId(1)), Some(time(14)));
    let a = &rec.received[1].job;
    assert_eq!(a.service_received(), time(10));
    assert_eq!(a.interruptions(), 1);
    assert_eq!(a.arrival_time(), time(0));

    let counters = l.facility.service_counters(&l.sim).unwrap();
    assert_eq!(counters.preemptions, 1);
    assert_eq!(counters.completed, 2);

    let ws = l.facility.waiting_system(&l.sim).unwrap();
    assert_eq!(ws.counters().requeues, 1);
    assert_eq!(ws.state(), WaitingState::Starved);
}

#[test]
fn tandem_facilities() {
    let mut sim = Simulation::new();
    let first = install(&mut sim, "first", &FacilityConfig::default()).unwrap();
    let second = install(&mut sim, "second", &FacilityConfig::default()).unwrap();
    let source = sim.add(ScriptedSource::new(
        "source",
        (0..5).map(|i| (time(0), job(i, 2))),
    ));
    let out = sim.add(Recorder::new("out"));
    sim.connect(source, Port::Downstream, first.entry).unwrap();
    first.connect_downstream(&mut sim, second.entry).unwrap();
    second.connect_downstream(&mut sim, out).unwrap();
    sim.run().unwrap();

    // Both stages take 2 per job; the second stage trails the first by 2.
    let times: Vec<SimTime> = sink(&sim, out).received.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![time(4), time(6), time(8), time(10), time(12)]);
}

#[test]
fn preemptive_stage_behind_fifo_stage() {
    let mut sim = Simulation::new();
    let first = install(&mut sim, "first", &FacilityConfig::default()).unwrap();
    let second = install(
        &mut sim,
        "second",
        &preemptive(PreemptionKind::StrictPriority, OrderKind::Priority),
    )
    .unwrap();
    let source = sim.add(ScriptedSource::new(
        "source",
        vec![(time(0), prioritized(1, 4, 5)), (time(0), prioritized(2, 1, 1))],
    ));
    let out = sim.add(Recorder::new("out"));
    sim.connect(source, Port::Downstream, first.entry).unwrap();
    first.connect_downstream(&mut sim, second.entry).unwrap();
    second.connect_downstream(&mut sim, out).unwrap();
    sim.run().unwrap();

    // First stage: 1 on 0..4, 2 on 4..5. Second stage: 1 from 4, displaced
    // by 2 at 5 with 3 left, 2 on 5..6, 1 resumes 6..9.
    let rec = sink(&sim, out);
    assert_eq!(rec.ids(), vec![JobId(2), JobId(1)]);
    assert_eq!(rec.delivered_at(JobId(2)), Some(time(6)));
    assert_eq!(rec.delivered_at(JobId(1)), Some(time(9)));
    let a = &rec.received[1].job;
    assert_eq!(a.service_received(), time(4));
    assert_eq!(a.remaining(), SimTime::ZERO);
    assert_eq!(a.interruptions(), 1);

    assert_eq!(first.service_counters(&sim).unwrap().busy, time(5));
    let counters = second.service_counters(&sim).unwrap();
    assert_eq!(counters.busy, time(5));
    assert_eq!(counters.preemptions, 1);
    assert_eq!(counters.admitted, 1);
}

#[test]
fn multi_queue_facility_serves_by_category() {
    let config = FacilityConfig {
        buffer: BufferConfig::Multi(MultiQueueConfig {
            queues: vec![QueueConfig::default(), QueueConfig::default()],
            dispatch: DispatchKind::CategoryMap {
                routes: vec![(CategoryId(1), 1)],
                default: 0,
            },
            withdrawal: WithdrawalKind::RoundRobin,
            switch_delay: SimTime::ZERO,
            seed: 0,
        }),
        ..FacilityConfig::default()
    };
    // Job 0 goes straight to service; the rest queue up by category.
    let script = vec![
        (time(0), job(0, 10)),
        (time(1), job(1, 1)),
        (time(1), job(2, 1)),
        (time(1), job(3, 1).with_category(CategoryId(1))),
        (time(1), job(4, 1).with_category(CategoryId(1))),
    ];
    let mut l = line(&config, script);
    l.sim.run().unwrap();

    let ids: Vec<u64> = sink(&l.sim, l.sink).ids().iter().map(|j| j.0).collect();
    assert_eq!(ids, vec![0, 1, 3, 2, 4]);
    let ws = l.facility.waiting_system(&l.sim).unwrap();
    assert!(ws.buffer().is_empty());
    assert_eq!(ws.counters().max_length, 4);
}

#[test]
fn overflow_diverts_to_second_facility() {
    let mut sim = Simulation::new();
    let bounded = FacilityConfig {
        buffer: BufferConfig::Single(QueueConfig::bounded(2)),
        overflow: OverflowPolicy::Divert,
        ..FacilityConfig::default()
    };
    let main = install(&mut sim, "main", &bounded).unwrap();
    let spare = install(&mut sim, "spare", &FacilityConfig::default()).unwrap();
    let source = sim.add(ScriptedSource::new(
        "source",
        (0..6).map(|i| (time(0), job(i, 5))),
    ));
    let out = sim.add(Recorder::new("out"));
    sim.connect(source, Port::Downstream, main.entry).unwrap();
    main.connect_overflow(&mut sim, spare.entry).unwrap();
    main.connect_downstream(&mut sim, out).unwrap();
    spare.connect_downstream(&mut sim, out).unwrap();
    sim.run().unwrap();

    // One in service, two queued, three diverted.
    assert_eq!(sink(&sim, out).received.len(), 6);
    let ws = main.waiting_system(&sim).unwrap();
    assert_eq!(ws.counters().diverted, 3);
    assert_eq!(ws.buffer().discarded_count(), 3);
    assert_eq!(main.service_counters(&sim).unwrap().completed, 3);
    assert_eq!(spare.service_counters(&sim).unwrap().completed, 3);
}

#[test]
fn dropped_jobs_leave_the_network() {
    let config = FacilityConfig {
        buffer: BufferConfig::Single(QueueConfig::bounded(1)),
        ..FacilityConfig::default()
    };
    let script = (0..4).map(|i| (time(0), job(i, 5))).collect();
    let mut l = line(&config, script);
    l.sim.run().unwrap();

    assert_eq!(sink(&l.sim, l.sink).received.len(), 2);
    let ws = l.facility.waiting_system(&l.sim).unwrap();
    assert_eq!(ws.counters().dropped, 2);
    let discarded = l
        .sim
        .drain_events()
        .iter()
        .filter(|e| e.kind() == EventKind::JobDiscarded)
        .count();
    assert_eq!(discarded, 2);
}

#[test]
fn identical_runs_produce_identical_events() {
    let run = || {
        let config = FacilityConfig {
            buffer: BufferConfig::Multi(MultiQueueConfig {
                queues: vec![QueueConfig::default(); 3],
                dispatch: DispatchKind::WeightedRandom {
                    weights: vec![time(1), time(2), time(3)],
                },
                withdrawal: WithdrawalKind::Scan,
                switch_delay: time(1),
                seed: 7,
            }),
            discipline: DisciplineKind::Preemptive {
                policy: PreemptionKind::PriorityOrEqual,
            },
            ..FacilityConfig::default()
        };
        let script = (0..30)
            .map(|i| (time(i as i32 / 2), prioritized(i, 1 + (i % 4) as i32, (i % 3) as u32)))
            .collect();
        let mut l = line(&config, script);
        l.sim.run().unwrap();
        l.sim.drain_events()
    };
    let a: Vec<Event> = run();
    let b: Vec<Event> = run();
    assert!(!a.is_empty());
    assert_eq!(a, b);
}

#[test]
fn extraction_delay_postpones_service() {
    let config = FacilityConfig {
        buffer: BufferConfig::Single(QueueConfig {
            extraction_delay: time(1),
            ..QueueConfig::default()
        }),
        ..FacilityConfig::default()
    };
    let script = vec![(time(0), job(1, 2)), (time(0), job(2, 2))];
    let mut l = line(&config, script);
    l.sim.run().unwrap();
    // Job 1 bypasses (no delay); job 2 waits for the pull at t=2 plus 1.
    let rec = sink(&l.sim, l.sink);
    assert_eq!(rec.delivered_at(JobId(1)), Some(time(2)));
    assert_eq!(rec.delivered_at(JobId(2)), Some(time(5)));
}

#[test]
fn run_until_stops_mid_service() {
    let mut l = line(&FacilityConfig::default(), vec![(time(0), job(1, 10))]);
    l.sim.run_until(time(4)).unwrap();
    assert!(sink(&l.sim, l.sink).received.is_empty());
    assert_eq!(l.sim.now(), time(4));
    l.sim.run().unwrap();
    assert_eq!(sink(&l.sim, l.sink).delivered_at(JobId(1)), Some(time(10)));
}

#[test]
fn suppressed_events_are_not_buffered() {
    let mut l = line(&FacilityConfig::default(), vec![(time(0), job(1, 1))]);
    l.sim.suppress_event(EventKind::JobArrived);
    l.sim.run().unwrap();
    let events = l.sim.drain_events();
    assert!(events.iter().all(|e| e.kind() != EventKind::JobArrived));
    assert!(events.iter().any(|e| e.kind() == EventKind::ServiceCompleted));
}

#[test]
fn unconnected_downstream_names_the_component() {
    let mut sim = Simulation::new();
    let facility = install(&mut sim, "lonely", &FacilityConfig::default()).unwrap();
    sim.inject(facility.entry, time(1), eqn_core::message::Message::Arrival(job(1, 1)))
        .unwrap();
    let err = sim.run().unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("lonely.server at t=2"), "{text}");
}
