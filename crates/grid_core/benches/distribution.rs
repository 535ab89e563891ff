//! Distribution benchmarks for grid_core.
//!
//! Run with: `cargo bench -p grid_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use grid_core::amount::EnergyAmount;
use grid_core::config::GridConfig;
use grid_core::container::BasicContainer;
use grid_core::registry::{NetworkRegistry, PartitionId};
use grid_core::space::Position;
use grid_core::tier::Tier;
use grid_core::world::StaticWorld;

const PART: PartitionId = PartitionId(0);

/// A line of `len` nodes with a sink every fourth node.
fn build_line(len: i32) -> (NetworkRegistry, StaticWorld) {
    let mut registry = NetworkRegistry::new(GridConfig::default());
    registry.load_partition(PART);
    let mut world = StaticWorld::new();
    for x in 0..len {
        registry
            .place_node(PART, Position::new(x, 0, 0), Tier::Basic)
            .unwrap();
        if x % 4 == 0 {
            world.add_acceptor(
                Position::new(x, 1, 0),
                Rc::new(RefCell::new(BasicContainer::new(
                    EnergyAmount::pow10(30),
                ))),
            );
        }
    }
    (registry, world)
}

pub fn step_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    for len in [16, 128, 1024] {
        group.bench_function(format!("line_{len}"), |b| {
            let (mut registry, world) = build_line(len);
            let per_step = EnergyAmount::pow10(20);
            b.iter(|| {
                registry.emit_at(PART, Position::new(0, 0, 0), &per_step);
                black_box(registry.step_all(&world))
            });
        });
    }
    group.finish();
}

pub fn topology_benchmark(c: &mut Criterion) {
    c.bench_function("place_remove_bridge", |b| {
        let (mut registry, _world) = build_line(64);
        let bridge = Position::new(32, 0, 0);
        registry.remove_node(PART, bridge);
        b.iter(|| {
            registry.place_node(PART, bridge, Tier::Basic).unwrap();
            registry.remove_node(PART, bridge);
        });
    });
}

criterion_group!(benches, step_benchmark, topology_benchmark);
criterion_main!(benches);
