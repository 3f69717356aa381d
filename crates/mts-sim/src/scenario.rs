//! A prepared run: the graph, its vehicles, and the bookkeeping that keeps
//! the spawned / not-spawned id sets in sync with vehicle state.

use std::collections::BTreeSet;

use mts_core::{EdgeId, NodeId, SimulationConfig, VehicleId};
use mts_network::Graph;
use mts_vehicle::{Observed, Route, Vehicle, VehicleState};
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::{SimError, SimResult};

// ── VehicleView ───────────────────────────────────────────────────────────────

/// Read-only snapshot of one vehicle, for renderers and telemetry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleView {
    pub id:          VehicleId,
    pub state:       VehicleState,
    pub edge:        Option<EdgeId>,
    pub lane:        Option<u8>,
    pub cell:        Option<u32>,
    pub velocity:    u32,
    pub age:         u64,
    pub anger:       u32,
    pub total_anger: u64,
}

impl VehicleView {
    fn of(vehicle: &Vehicle) -> Self {
        let pos = vehicle.position();
        Self {
            id:          vehicle.id(),
            state:       vehicle.state(),
            edge:        pos.map(|p| p.edge),
            lane:        pos.map(|p| p.lane),
            cell:        pos.map(|p| p.cell),
            velocity:    vehicle.velocity(),
            age:         vehicle.driver().age(),
            anger:       vehicle.driver().anger(),
            total_anger: vehicle.driver().total_anger(),
        }
    }
}

// ── VehicleContainer ──────────────────────────────────────────────────────────

/// Dense vehicle arena indexed by [`VehicleId`].
///
/// Each vehicle sits behind its own lock so a phase can run over disjoint
/// vehicles on many threads.  The id sets only change between phases, on
/// the coordinating thread.
#[derive(Default)]
pub struct VehicleContainer {
    vehicles:    Vec<Mutex<Vehicle>>,
    spawned:     BTreeSet<VehicleId>,
    not_spawned: BTreeSet<VehicleId>,
    despawned:   u64,
}

impl VehicleContainer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { vehicles: Vec::with_capacity(capacity), ..Self::default() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Spawned vehicles in ascending id order.
    pub fn spawned_ids(&self) -> Vec<VehicleId> {
        self.spawned.iter().copied().collect()
    }

    /// Vehicles still waiting at their start node, in ascending id order.
    pub fn not_spawned_ids(&self) -> Vec<VehicleId> {
        self.not_spawned.iter().copied().collect()
    }

    pub fn lock(&self, id: VehicleId) -> SimResult<MutexGuard<'_, Vehicle>> {
        self.vehicles
            .get(id.index())
            .map(|v| v.lock())
            .ok_or(SimError::UnknownVehicle(id))
    }

    /// What a neighbour can see of `id`, or `None` for vehicles the
    /// container does not hold or that are off the graph.
    pub fn observe(&self, id: VehicleId) -> Option<Observed> {
        self.vehicles.get(id.index()).and_then(|v| v.lock().observed())
    }

    fn push(&mut self, vehicle: Vehicle) {
        let id = vehicle.id();
        match vehicle.state() {
            VehicleState::NotSpawned => {
                self.not_spawned.insert(id);
            }
            VehicleState::Spawned => {
                self.spawned.insert(id);
            }
            VehicleState::Despawned => self.despawned += 1,
        }
        self.vehicles.push(Mutex::new(vehicle));
    }

    /// Move ids between the sets after a phase reported state changes.
    pub(crate) fn apply(&mut self, changes: &[(VehicleId, VehicleState)]) {
        for &(id, state) in changes {
            match state {
                VehicleState::Spawned => {
                    self.not_spawned.remove(&id);
                    self.spawned.insert(id);
                }
                VehicleState::Despawned => {
                    if self.spawned.remove(&id) || self.not_spawned.remove(&id) {
                        self.despawned += 1;
                    }
                }
                VehicleState::NotSpawned => {
                    self.spawned.remove(&id);
                    self.not_spawned.insert(id);
                }
            }
        }
    }

    /// Re-derive the id sets from the vehicles' own states.
    ///
    /// Used after an aborted tick whose collected changes never reached
    /// [`apply`](Self::apply).
    pub(crate) fn resync(&mut self) {
        let tracked: Vec<VehicleId> = self.spawned.union(&self.not_spawned).copied().collect();
        let changes: Vec<_> = tracked
            .into_iter()
            .filter_map(|id| {
                let state = self.vehicles.get_mut(id.index())?.get_mut().state();
                Some((id, state))
            })
            .collect();
        self.apply(&changes);
    }

    fn reset(&mut self, graph: &Graph) -> SimResult<()> {
        self.spawned.clear();
        self.not_spawned.clear();
        self.despawned = 0;
        for cell in &mut self.vehicles {
            let vehicle = cell.get_mut();
            vehicle.reset();
            vehicle.register_in_graph(graph)?;
            self.not_spawned.insert(vehicle.id());
        }
        Ok(())
    }
}

// ── Scenario ──────────────────────────────────────────────────────────────────

/// A graph plus the vehicles that drive on it.
///
/// Build the graph with [`GraphBuilder`](mts_network::GraphBuilder), add
/// vehicles with [`add_vehicle`](Self::add_vehicle) or
/// [`add_trip`](Self::add_trip), then hand the scenario to the
/// [`Simulation`](crate::Simulation) driver.
pub struct Scenario {
    config:   SimulationConfig,
    graph:    Graph,
    fleet:    VehicleContainer,
    node_ids: Vec<NodeId>,
}

impl Scenario {
    pub fn new(graph: Graph, config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        let node_ids = graph.nodes().iter().map(|n| n.id()).collect();
        let fleet = VehicleContainer::with_capacity(config.max_vehicle_count);
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "scenario created"
        );
        Ok(Self { config, graph, fleet, node_ids })
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[inline]
    pub fn fleet(&self) -> &VehicleContainer {
        &self.fleet
    }

    #[inline]
    pub(crate) fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub(crate) fn parts_mut(&mut self) -> (&Graph, &mut VehicleContainer) {
        (&self.graph, &mut self.fleet)
    }

    // ── Spawn requests ────────────────────────────────────────────────────

    /// Queue a vehicle that drives `route` after waiting `spawn_delay`
    /// ticks.  The vehicle registers at the route's start node right away.
    pub fn add_vehicle(&mut self, route: Route, spawn_delay: u64) -> SimResult<VehicleId> {
        let id = VehicleId::try_from(self.fleet.len())
            .map_err(|_| mts_core::CoreError::IdOverflow(self.fleet.len()))?;
        let vehicle = Vehicle::new(id, route, spawn_delay, &self.config.vehicles, self.config.seed);
        vehicle.register_in_graph(&self.graph)?;
        self.fleet.push(vehicle);
        Ok(id)
    }

    /// Queue a vehicle on the fastest free-flow route from `from` to `to`.
    pub fn add_trip(&mut self, from: NodeId, to: NodeId, spawn_delay: u64) -> SimResult<VehicleId> {
        let edges = self
            .graph
            .shortest_route(from, to)
            .ok_or(SimError::Unreachable { from, to })?;
        let route = if edges.is_empty() {
            Route::empty(from)
        } else {
            Route::new(&self.graph, edges)?
        };
        self.add_vehicle(route, spawn_delay)
    }

    /// Rewind every vehicle to its initial state and clear all lanes and
    /// arbiters, ready for a fresh run.
    pub fn reset(&mut self) -> SimResult<()> {
        self.graph.reset();
        self.fleet.reset(&self.graph)
    }

    // ── Telemetry ─────────────────────────────────────────────────────────

    #[inline]
    pub fn vehicle_count(&self) -> usize {
        self.fleet.len()
    }

    #[inline]
    pub fn spawned_count(&self) -> usize {
        self.fleet.spawned.len()
    }

    #[inline]
    pub fn not_spawned_count(&self) -> usize {
        self.fleet.not_spawned.len()
    }

    /// Vehicles that finished their trip.
    #[inline]
    pub fn despawned_count(&self) -> u64 {
        self.fleet.despawned
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<VehicleView> {
        self.fleet.vehicles.get(id.index()).map(|v| VehicleView::of(&v.lock()))
    }

    /// Snapshot of every vehicle in id order.
    pub fn vehicles(&self) -> Vec<VehicleView> {
        self.fleet.vehicles.iter().map(|v| VehicleView::of(&v.lock())).collect()
    }

    /// `true` once every vehicle has despawned.
    pub fn is_finished(&self) -> bool {
        self.fleet.spawned.is_empty() && self.fleet.not_spawned.is_empty()
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("vehicles", &self.fleet.len())
            .field("spawned", &self.fleet.spawned.len())
            .field("not_spawned", &self.fleet.not_spawned.len())
            .finish()
    }
}
