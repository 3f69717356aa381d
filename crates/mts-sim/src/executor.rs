//! Phased step execution.
//!
//! # Tick pipeline
//!
//! ```text
//! spawned vehicles:      ① accelerate  ② will_change_lane  ③ change_lane
//!                        ④ brake       ⑤ move              ⑥ did_move
//! not-spawned vehicles:  ⑦ spawn
//! nodes:                 ⑧ update_nodes
//! ```
//!
//! Every phase is a full barrier: [`StepExecutor::vehicles`] returns only
//! after the phase ran for every vehicle.  State transitions reported by
//! `move` and `spawn` are applied to the scenario's id sets after the tick,
//! on the calling thread.
//!
//! A [`CancelToken`] is checked before every phase and, in the
//! multi-threaded executor, before every chunk.  A cancelled tick stops at
//! that boundary with [`SimError::Interrupted`]; every vehicle either ran
//! the interrupted phase completely or not at all.  Since the collected
//! transitions of an aborted tick are lost, the id sets are then rebuilt
//! from the vehicles' own states.

use std::time::Instant;

use mts_core::{MultiThreadingConfig, NodeId, VehicleId};
use mts_network::Graph;
use mts_vehicle::{Phase, VehicleState};
use tracing::{debug, trace};

use crate::{CancelToken, Scenario, SimError, SimResult, VehicleContainer};

/// One phase applied to one vehicle.  Returns the vehicle's new state if it
/// changed.
pub type VehicleOp<'a> = dyn Fn(VehicleId) -> SimResult<Option<VehicleState>> + Sync + 'a;

/// One node update.
pub type NodeOp<'a> = dyn Fn(NodeId) -> SimResult<()> + Sync + 'a;

// ── StepExecutor ──────────────────────────────────────────────────────────────

/// Runs a phase over many vehicles or nodes and waits for all of them.
pub trait StepExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Apply `op` to every id in `ids` and collect the reported state
    /// changes in `ids` order.
    fn vehicles(
        &self,
        phase: Phase,
        ids:   &[VehicleId],
        op:    &VehicleOp<'_>,
    ) -> SimResult<Vec<(VehicleId, VehicleState)>>;

    /// Apply `op` to every node.
    fn nodes(&self, ids: &[NodeId], op: &NodeOp<'_>) -> SimResult<()>;
}

/// Run one tick of `scenario` on `executor`.
pub fn do_one_step(executor: &dyn StepExecutor, scenario: &mut Scenario) -> SimResult<()> {
    let node_ids = scenario.node_ids().to_vec();
    let (graph, fleet) = scenario.parts_mut();

    match run_phases(executor, graph, fleet, &node_ids) {
        Ok(mut changes) => {
            changes.sort_unstable_by_key(|&(id, _)| id);
            fleet.apply(&changes);
            Ok(())
        }
        Err(e) => {
            fleet.resync();
            Err(e)
        }
    }
}

fn run_phases(
    executor: &dyn StepExecutor,
    graph:    &Graph,
    fleet:    &VehicleContainer,
    node_ids: &[NodeId],
) -> SimResult<Vec<(VehicleId, VehicleState)>> {
    let spawned = fleet.spawned_ids();
    let waiting = fleet.not_spawned_ids();

    executor.vehicles(Phase::Accelerate, &spawned, &|id| {
        fleet.lock(id)?.accelerate(graph)?;
        Ok(None)
    })?;

    // Neighbours are observed without holding the own lock.
    executor.vehicles(Phase::WillChangeLane, &spawned, &|id| {
        let around = fleet.lock(id)?.surroundings(graph)?;
        let around = around.map(|other| fleet.observe(other));
        fleet.lock(id)?.will_change_lane(graph, &around)?;
        Ok(None)
    })?;

    executor.vehicles(Phase::ChangeLane, &spawned, &|id| {
        fleet.lock(id)?.change_lane(graph)?;
        Ok(None)
    })?;

    executor.vehicles(Phase::Brake, &spawned, &|id| {
        fleet.lock(id)?.brake(graph)?;
        Ok(None)
    })?;

    let mut changes = executor.vehicles(Phase::Move, &spawned, &|id| {
        Ok(fleet.lock(id)?.move_forward(graph)?)
    })?;

    executor.vehicles(Phase::DidMove, &spawned, &|id| {
        fleet.lock(id)?.did_move(graph)?;
        Ok(None)
    })?;

    changes.extend(executor.vehicles(Phase::Spawn, &waiting, &|id| {
        Ok(fleet.lock(id)?.spawn(graph)?)
    })?);

    executor.nodes(node_ids, &|id| Ok(graph.update_node(id)?))?;
    Ok(changes)
}

/// Bring every arbiter up to date without moving any vehicle.
pub fn update_all_nodes(executor: &dyn StepExecutor, scenario: &Scenario) -> SimResult<()> {
    let graph = scenario.graph();
    executor.nodes(scenario.node_ids(), &|id| Ok(graph.update_node(id)?))
}

/// The executor `config` asks for.  Falls back to single-threaded for one
/// thread, or when built without the `parallel` feature.
pub fn for_config(config: &MultiThreadingConfig, cancel: CancelToken) -> SimResult<Box<dyn StepExecutor>> {
    #[cfg(feature = "parallel")]
    {
        if config.n_threads > 1 {
            let executor = MultiThreaded::new(config, cancel)?;
            debug!(threads = executor.threads(), "using multi-threaded step executor");
            return Ok(Box::new(executor));
        }
    }
    debug!(threads = config.n_threads, "using single-threaded step executor");
    Ok(Box::new(SingleThreaded::new(cancel)))
}

// ── SingleThreaded ────────────────────────────────────────────────────────────

/// Runs every phase on the calling thread.
#[derive(Clone, Debug, Default)]
pub struct SingleThreaded {
    cancel: CancelToken,
}

impl SingleThreaded {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }
}

impl StepExecutor for SingleThreaded {
    fn name(&self) -> &'static str {
        "single-threaded"
    }

    fn vehicles(
        &self,
        phase: Phase,
        ids:   &[VehicleId],
        op:    &VehicleOp<'_>,
    ) -> SimResult<Vec<(VehicleId, VehicleState)>> {
        check(&self.cancel)?;
        let start = Instant::now();
        let changes = run_chunk(ids, op)?;
        trace!(%phase, vehicles = ids.len(), elapsed_us = start.elapsed().as_micros() as u64, "phase done");
        Ok(changes)
    }

    fn nodes(&self, ids: &[NodeId], op: &NodeOp<'_>) -> SimResult<()> {
        check(&self.cancel)?;
        let start = Instant::now();
        ids.iter().try_for_each(|&id| op(id))?;
        trace!(phase = %Phase::UpdateNodes, nodes = ids.len(),
            elapsed_us = start.elapsed().as_micros() as u64, "phase done");
        Ok(())
    }
}

// ── MultiThreaded ─────────────────────────────────────────────────────────────

/// Splits each phase into contiguous chunks and runs them on a private
/// Rayon pool.
///
/// | Setting                 | Chunk                               |
/// |-------------------------|-------------------------------------|
/// | `vehicles_per_runnable` | vehicles per task                   |
/// | `nodes_per_thread`      | nodes per task in `update_nodes`    |
#[cfg(feature = "parallel")]
pub struct MultiThreaded {
    pool:                  rayon::ThreadPool,
    vehicles_per_runnable: usize,
    nodes_per_thread:      usize,
    cancel:                CancelToken,
}

#[cfg(feature = "parallel")]
impl MultiThreaded {
    pub fn new(config: &MultiThreadingConfig, cancel: CancelToken) -> SimResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.n_threads.max(1))
            .thread_name(|i| format!("mts-step-{i}"))
            .build()
            .map_err(|e| SimError::ThreadPool(e.to_string()))?;
        Ok(Self {
            pool,
            vehicles_per_runnable: config.vehicles_per_runnable.max(1),
            nodes_per_thread:      config.nodes_per_thread.max(1),
            cancel,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[cfg(feature = "parallel")]
impl StepExecutor for MultiThreaded {
    fn name(&self) -> &'static str {
        "multi-threaded"
    }

    fn vehicles(
        &self,
        phase: Phase,
        ids:   &[VehicleId],
        op:    &VehicleOp<'_>,
    ) -> SimResult<Vec<(VehicleId, VehicleState)>> {
        use rayon::prelude::*;

        check(&self.cancel)?;
        let start = Instant::now();
        let chunks: Vec<Vec<(VehicleId, VehicleState)>> = self.pool.install(|| {
            ids.par_chunks(self.vehicles_per_runnable)
                .map(|chunk| {
                    check(&self.cancel)?;
                    run_chunk(chunk, op)
                })
                .collect::<SimResult<_>>()
        })?;
        trace!(%phase, vehicles = ids.len(), chunks = chunks.len(),
            elapsed_us = start.elapsed().as_micros() as u64, "phase done");
        Ok(chunks.into_iter().flatten().collect())
    }

    fn nodes(&self, ids: &[NodeId], op: &NodeOp<'_>) -> SimResult<()> {
        use rayon::prelude::*;

        check(&self.cancel)?;
        let start = Instant::now();
        self.pool.install(|| {
            ids.par_chunks(self.nodes_per_thread).try_for_each(|chunk| {
                check(&self.cancel)?;
                chunk.iter().try_for_each(|&id| op(id))
            })
        })?;
        trace!(phase = %Phase::UpdateNodes, nodes = ids.len(),
            elapsed_us = start.elapsed().as_micros() as u64, "phase done");
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

#[inline]
fn check(cancel: &CancelToken) -> SimResult<()> {
    if cancel.is_cancelled() {
        return Err(SimError::Interrupted);
    }
    Ok(())
}

fn run_chunk(ids: &[VehicleId], op: &VehicleOp<'_>) -> SimResult<Vec<(VehicleId, VehicleState)>> {
    let mut changes = Vec::new();
    for &id in ids {
        if let Some(state) = op(id)? {
            changes.push((id, state));
        }
    }
    Ok(changes)
}
