//! Criterion benchmarks for the EQN engine.
//!
//! Benchmark groups:
//! - `queue`: insert/extract churn on a single queue per insertion order
//! - `multi_queue`: sharded insert/extract with round-robin withdrawal
//! - `facility`: 10k jobs through a preemptive facility, end to end

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use eqn_core::config::{BufferConfig, DisciplineKind, FacilityConfig, QueueConfig};
use eqn_core::dispatch::ShortestQueue;
use eqn_core::engine::Simulation;
use eqn_core::facility::install;
use eqn_core::fixed::time;
use eqn_core::id::Port;
use eqn_core::multi_queue::MultiQueue;
use eqn_core::preemption::PreemptionKind;
use eqn_core::queue::{Buffer, OrderKind, Queue};
use eqn_core::test_utils::*;
use eqn_core::withdrawal::RoundRobin;

const CHURN: u64 = 1_000;

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");
    group.sample_size(50);

    for order in [OrderKind::Fifo, OrderKind::Priority, OrderKind::ShortestRemaining] {
        group.bench_function(format!("{order:?}_churn_{CHURN}"), |b| {
            b.iter(|| {
                let mut queue = Queue::new(order.build());
                for i in 0..CHURN {
                    let _ = queue.insert(prioritized(i, (i % 17) as i32, (i % 5) as u32));
                    if i % 3 == 0 {
                        queue.extract();
                    }
                }
                queue.enqueued_count()
            });
        });
    }
    group.finish();
}

fn bench_multi_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_queue");
    group.sample_size(50);

    group.bench_function("8_sub_queues_churn", |b| {
        b.iter(|| {
            let mut mq = MultiQueue::new(
                (0..8).map(|_| Queue::fifo()).collect(),
                Box::new(ShortestQueue),
                Box::new(RoundRobin::default()),
            );
            for i in 0..CHURN {
                let _ = mq.insert(job(i, 1));
                if i % 2 == 0 {
                    mq.next_extraction_delay();
                    mq.extract();
                }
            }
            mq.enqueued_count()
        });
    });
    group.finish();
}

fn bench_facility(c: &mut Criterion) {
    let mut group = c.benchmark_group("facility");
    group.sample_size(20);

    let config = FacilityConfig {
        buffer: BufferConfig::Single(QueueConfig {
            order: OrderKind::Priority,
            ..QueueConfig::default()
        }),
        discipline: DisciplineKind::Preemptive {
            policy: PreemptionKind::StrictPriority,
        },
        ..FacilityConfig::default()
    };

    group.bench_function("preemptive_10k_jobs", |b| {
        b.iter_batched(
            || {
                let mut sim = Simulation::new();
                let facility = install(&mut sim, "f", &config).unwrap();
                let script = (0..10_000u64)
                    .map(|i| (time((i / 2) as i32), prioritized(i, 1 + (i % 3) as i32, (i % 4) as u32)));
                let source = sim.add(ScriptedSource::new("source", script));
                let sink = sim.add(Recorder::new("sink"));
                sim.connect(source, Port::Downstream, facility.entry).unwrap();
                facility.connect_downstream(&mut sim, sink).unwrap();
                sim
            },
            |mut sim| {
                sim.run().unwrap();
                sim.now()
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_queue, bench_multi_queue, bench_facility);
criterion_main!(benches);
