//! Scenario execution.
//!
//! Builds a registry and world from a [`Scenario`], then advances the
//! simulation step by step, reporting per-step statistics as JSON lines.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use grid_core::amount::EnergyAmount;
use grid_core::container::{BasicContainer, RateLimitedContainer, SharedContainer};
use grid_core::error::GridError;
use grid_core::registry::{NetworkRegistry, PartitionId};
use grid_core::space::Position;
use grid_core::world::StaticWorld;

use crate::scenario::{Scenario, ScenarioError, SinkSetup};

/// The single partition headless scenarios run in.
pub const RUN_PARTITION: PartitionId = PartitionId(0);

/// Error type for scenario execution.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Scenario could not be loaded.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The grid rejected part of the scenario.
    #[error(transparent)]
    Grid(#[from] GridError),
    /// Statistics could not be serialized.
    #[error("Failed to encode stats: {0}")]
    Stats(#[from] serde_json::Error),
}

/// Per-step statistics, emitted as one JSON line per step.
#[derive(Debug, Clone, Serialize)]
pub struct StepStats {
    /// Step index, starting at 1.
    pub step: u64,
    /// Amount emitted by sources this step.
    pub emitted: EnergyAmount,
    /// Amount delivered to sinks this step.
    pub distributed: EnergyAmount,
    /// Amount removed by distance loss this step.
    pub lost: EnergyAmount,
    /// Total buffered energy after the step.
    pub buffered: EnergyAmount,
    /// Number of sinks that received energy.
    pub acceptors_served: usize,
}

/// Final run summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Steps executed.
    pub steps: u64,
    /// Total emitted by sources.
    pub total_emitted: EnergyAmount,
    /// Total delivered to sinks.
    pub total_distributed: EnergyAmount,
    /// Total removed by distance loss.
    pub total_lost: EnergyAmount,
    /// Energy left buffered in the grid.
    pub buffered: EnergyAmount,
    /// Energy held by each sink, keyed by position.
    pub sink_levels: Vec<(Position, EnergyAmount)>,
}

/// A scenario instantiated and ready to step.
pub struct Runner {
    name: String,
    registry: NetworkRegistry,
    world: StaticWorld,
    sources: Vec<(Position, EnergyAmount)>,
    sinks: Vec<(Position, SharedContainer)>,
    steps_done: u64,
    total_emitted: EnergyAmount,
    total_distributed: EnergyAmount,
    total_lost: EnergyAmount,
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("name", &self.name)
            .field("steps_done", &self.steps_done)
            .field("sources", &self.sources.len())
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Build the grid, sources, and sinks a scenario describes.
    ///
    /// # Errors
    ///
    /// Fails when the config is invalid, a node placement collides, or a
    /// source/sink amount does not parse.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, RunnerError> {
        scenario.config.validate()?;

        let mut registry = NetworkRegistry::new(scenario.config.clone());
        registry.load_partition(RUN_PARTITION);
        for node in &scenario.nodes {
            registry.place_node(RUN_PARTITION, node.position, node.tier)?;
        }

        let mut sources = Vec::with_capacity(scenario.sources.len());
        for source in &scenario.sources {
            sources.push((source.position, EnergyAmount::from_str(&source.per_step)?));
        }

        let mut world = StaticWorld::new();
        let mut sinks = Vec::with_capacity(scenario.sinks.len());
        for sink in &scenario.sinks {
            let container = build_sink(sink)?;
            world.add_acceptor(sink.position, Rc::clone(&container));
            sinks.push((sink.position, container));
        }

        info!(
            scenario = %scenario.name,
            nodes = scenario.nodes.len(),
            sources = sources.len(),
            sinks = sinks.len(),
            "scenario instantiated"
        );

        Ok(Self {
            name: scenario.name.clone(),
            registry,
            world,
            sources,
            sinks,
            steps_done: 0,
            total_emitted: EnergyAmount::zero(),
            total_distributed: EnergyAmount::zero(),
            total_lost: EnergyAmount::zero(),
        })
    }

    /// Run the sources, then advance every network by one step.
    pub fn step(&mut self) -> StepStats {
        let mut emitted = EnergyAmount::zero();
        for (position, per_step) in &self.sources {
            let accepted = self.registry.emit_at(RUN_PARTITION, *position, per_step);
            emitted = emitted.add(&accepted);
        }

        let report = self.registry.step_all(&self.world);
        self.steps_done += 1;
        self.total_emitted = self.total_emitted.add(&emitted);
        self.total_distributed = self.total_distributed.add(&report.distributed);
        self.total_lost = self.total_lost.add(&report.lost);

        StepStats {
            step: self.steps_done,
            emitted,
            distributed: report.distributed,
            lost: report.lost,
            buffered: self.registry.summary().total_buffer,
            acceptors_served: report.acceptors_served,
        }
    }

    /// The final summary for this run so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            scenario: self.name.clone(),
            steps: self.steps_done,
            total_emitted: self.total_emitted.clone(),
            total_distributed: self.total_distributed.clone(),
            total_lost: self.total_lost.clone(),
            buffered: self.registry.summary().total_buffer,
            sink_levels: self
                .sinks
                .iter()
                .map(|(position, container)| (*position, container.borrow().energy()))
                .collect(),
        }
    }

    /// A hash over topology, buffers, and sink levels. Identical runs of
    /// the same scenario must fingerprint identically.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for partition in self.registry.partition_ids() {
            partition.0.hash(&mut hasher);
            for network in self.registry.networks_in(partition) {
                network.id().0.hash(&mut hasher);
                for member in network.members() {
                    member.hash(&mut hasher);
                }
                network.buffer().canonical_string().hash(&mut hasher);
            }
        }
        for (position, container) in &self.sinks {
            position.hash(&mut hasher);
            container.borrow().energy().canonical_string().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Access the underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }
}

fn build_sink(sink: &SinkSetup) -> Result<SharedContainer, GridError> {
    let max = EnergyAmount::from_str(&sink.max)?;
    Ok(match &sink.rate {
        Some(rate) => {
            let rate = EnergyAmount::from_str(rate)?;
            Rc::new(RefCell::new(RateLimitedContainer::new(
                BasicContainer::new(max),
                rate,
            )))
        }
        None => Rc::new(RefCell::new(BasicContainer::new(max))),
    })
}

/// Run a scenario `runs` times for `steps` steps each and compare final
/// fingerprints.
///
/// # Errors
///
/// Propagates scenario instantiation failures.
pub fn verify_determinism(
    scenario: &Scenario,
    steps: u64,
    runs: u32,
) -> Result<bool, RunnerError> {
    let mut fingerprints = Vec::with_capacity(runs as usize);
    for _ in 0..runs {
        let mut runner = Runner::from_scenario(scenario)?;
        for _ in 0..steps {
            runner.step();
        }
        fingerprints.push(runner.fingerprint());
    }
    Ok(fingerprints.windows(2).all(|w| w[0] == w[1]))
}
