//! The Nagel–Schreckenberg vehicle state machine.
//!
//! Each method below is one phase of a tick.  A method only mutates the
//! vehicle itself, the lanes it occupies or enters, and the nodes it
//! registers at; everything it reads about *other* vehicles comes either from
//! lane occupancy or, for lane changes, from a [`Surroundings`] snapshot the
//! caller gathers without holding this vehicle's lock.
//!
//! # Collision freedom
//!
//! - `brake` caps the target cell strictly behind the front vehicle's
//!   current cell, and a node crossing at the next lane's free room.
//! - A lane change is only planned into a free cell whose mirror cell two
//!   lanes further in is free too, so two vehicles never merge into one cell.
//! - Two vehicles never both hold permission into the same edge.
//!
//! So the order in which vehicles run `move_forward` within a tick does not
//! matter.

use mts_core::{EdgeId, VehicleConfig, VehicleId};
use mts_network::{CrossingRequest, DirectedEdge, Graph, Lane};
use tracing::trace;

use crate::{Driver, Phase, Route, VehicleError, VehicleResult};

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleState {
    /// Waiting at the start node of its route.
    NotSpawned,
    /// Driving on a lane.
    Spawned,
    /// Trip finished; the vehicle no longer occupies anything.
    Despawned,
}

/// A cell on the graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub edge: EdgeId,
    pub lane: u8,
    pub cell: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LaneChange {
    #[default]
    None,
    /// Towards lane 0.
    Outer,
    /// Away from lane 0.
    Inner,
}

// ── Surroundings ──────────────────────────────────────────────────────────────

/// What one vehicle can see of another.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Observed {
    pub cell:        u32,
    pub velocity:    u32,
    pub stood_still: bool,
}

/// The neighbours a lane-change decision depends on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Surroundings<T> {
    /// Nearest vehicle ahead on the own lane.
    pub front:       Option<T>,
    /// Nearest vehicle ahead on the next outer lane.
    pub outer_front: Option<T>,
}

impl<T> Default for Surroundings<T> {
    fn default() -> Self {
        Self { front: None, outer_front: None }
    }
}

impl<T> Surroundings<T> {
    pub fn map<U>(self, f: impl Fn(T) -> Option<U>) -> Surroundings<U> {
        Surroundings {
            front:       self.front.and_then(&f),
            outer_front: self.outer_front.and_then(&f),
        }
    }
}

// ── Vehicle ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Vehicle {
    id:          VehicleId,
    state:       VehicleState,
    planned:     Route,
    route:       Route,
    spawn_delay: u64,
    driver:      Driver,

    position:    Option<Position>,
    velocity:    u32,
    /// Velocity was zero at the end of the previous tick.
    stood_still: bool,
    dashed:      bool,
    lane_change: LaneChange,
}

impl Vehicle {
    pub fn new(
        id:          VehicleId,
        route:       Route,
        spawn_delay: u64,
        config:      &VehicleConfig,
        seed:        u64,
    ) -> Self {
        Self {
            id,
            state: VehicleState::NotSpawned,
            planned: route.clone(),
            route,
            spawn_delay,
            driver: Driver::new(config, seed, id),
            position: None,
            velocity: 0,
            stood_still: false,
            dashed: false,
            lane_change: LaneChange::None,
        }
    }

    // ── Read-outs ─────────────────────────────────────────────────────────

    #[inline]
    pub fn id(&self) -> VehicleId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> VehicleState {
        self.state
    }

    #[inline]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    #[inline]
    pub fn velocity(&self) -> u32 {
        self.velocity
    }

    #[inline]
    pub fn stood_still(&self) -> bool {
        self.stood_still
    }

    #[inline]
    pub fn route(&self) -> &Route {
        &self.route
    }

    #[inline]
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    #[inline]
    pub fn spawn_delay(&self) -> u64 {
        self.spawn_delay
    }

    #[inline]
    pub fn planned_lane_change(&self) -> LaneChange {
        self.lane_change
    }

    pub fn observed(&self) -> Option<Observed> {
        self.position.map(|p| Observed {
            cell:        p.cell,
            velocity:    self.velocity,
            stood_still: self.stood_still,
        })
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    fn located<'g>(&self, graph: &'g Graph) -> VehicleResult<(Position, &'g DirectedEdge, &'g Lane)> {
        let pos = self.position.ok_or(VehicleError::NotOnGraph(self.id))?;
        let edge = graph.edge(pos.edge)?;
        let lane = edge
            .lane(pos.lane)
            .ok_or(mts_network::NetworkError::LaneNotFound { edge: pos.edge, lane: pos.lane })?;
        Ok((pos, edge, lane))
    }

    /// Effective top speed: the lower of the vehicle's and the edge's.
    fn max_velocity_on(&self, edge: &DirectedEdge) -> u32 {
        self.driver.max_velocity().min(edge.max_velocity())
    }

    fn checked(&self, phase: Phase, velocity: i64) -> VehicleResult<u32> {
        u32::try_from(velocity)
            .map_err(|_| VehicleError::NegativeVelocity { vehicle: self.id, phase, velocity })
    }

    /// Within reach of the node ahead with somewhere left to go.
    fn approaching_node(&self, edge: &DirectedEdge, pos: Position) -> bool {
        let to_end = edge.cell_count() - pos.cell;
        !self.route.is_empty() && self.max_velocity_on(edge) >= to_end
    }

    // ── Registration ──────────────────────────────────────────────────────

    /// Queue a not-yet-spawned vehicle at its start node.
    pub fn register_in_graph(&self, graph: &Graph) -> VehicleResult<()> {
        if self.state != VehicleState::NotSpawned {
            return Ok(());
        }
        if let Some(first) = self.route.peek() {
            graph.node(self.route.start())?.register_vehicle(CrossingRequest {
                vehicle:     self.id,
                origin:      None,
                destination: first,
            })?;
        }
        Ok(())
    }

    // ── Phases ────────────────────────────────────────────────────────────

    /// `v = min(v + 1, vmax)`, then maybe dash once more.
    pub fn accelerate(&mut self, graph: &Graph) -> VehicleResult<()> {
        let (_, edge, _) = self.located(graph)?;
        let vmax = self.max_velocity_on(edge);
        self.dashed = false;
        let mut v = (self.velocity + 1).min(vmax);
        if self.driver.dashes() {
            v = (v + 1).min(vmax);
            self.dashed = true;
        }
        self.velocity = v;
        Ok(())
    }

    /// Which vehicles [`will_change_lane`](Self::will_change_lane) needs to
    /// observe.  Read from lane occupancy only.
    pub fn surroundings(&self, graph: &Graph) -> VehicleResult<Surroundings<VehicleId>> {
        let (pos, edge, lane) = self.located(graph)?;
        if edge.lane_count() < 2 {
            return Ok(Surroundings::default());
        }
        let outer_front = match pos.lane.checked_sub(1).and_then(|i| edge.lane(i)) {
            Some(outer) => outer.vehicle_in_front(pos.cell).map(|(_, v)| v),
            None => None,
        };
        Ok(Surroundings {
            front: lane.vehicle_in_front(pos.cell).map(|(_, v)| v),
            outer_front,
        })
    }

    /// Plan a lane change for this tick.
    ///
    /// Close to the node with somewhere to go, the vehicle heads for lane 0.
    /// Otherwise it overtakes a blocking front vehicle on the next inner lane,
    /// or drifts back outwards when nothing there would make it overtake.
    pub fn will_change_lane(
        &mut self,
        graph:  &Graph,
        around: &Surroundings<Observed>,
    ) -> VehicleResult<()> {
        self.lane_change = LaneChange::None;
        let (pos, edge, _) = self.located(graph)?;
        if edge.lane_count() < 2 || !self.driver.tends_to_change_lane() {
            return Ok(());
        }

        self.lane_change = if self.approaching_node(edge, pos) {
            self.tend_to_outermost_lane(edge, pos, around)
        } else if self.wants_to_overtake(edge, pos, around.front) {
            Self::check_inner_lane(edge, pos)
        } else {
            self.tend_to_outermost_lane(edge, pos, around)
        };
        Ok(())
    }

    fn wants_to_overtake(&self, edge: &DirectedEdge, pos: Position, other: Option<Observed>) -> bool {
        match other {
            None => false,
            Some(other) => {
                let distance = other.cell.saturating_sub(pos.cell);
                other.stood_still
                    || (distance < self.max_velocity_on(edge) && self.velocity > other.velocity)
            }
        }
    }

    fn tend_to_outermost_lane(
        &self,
        edge:   &DirectedEdge,
        pos:    Position,
        around: &Surroundings<Observed>,
    ) -> LaneChange {
        if pos.lane == 0 || self.wants_to_overtake(edge, pos, around.outer_front) {
            return LaneChange::None;
        }
        match edge.lane(pos.lane - 1) {
            Some(outer) if outer.vehicle_at(pos.cell).is_none() => LaneChange::Outer,
            _ => LaneChange::None,
        }
    }

    fn check_inner_lane(edge: &DirectedEdge, pos: Position) -> LaneChange {
        let Some(inner) = edge.lane(pos.lane + 1) else {
            return LaneChange::None;
        };
        // A vehicle two lanes further in could move outwards into the same cell.
        if let Some(second) = edge.lane(pos.lane + 2) {
            if second.vehicle_at(pos.cell).is_some() {
                return LaneChange::None;
            }
        }
        if inner.vehicle_at(pos.cell).is_some() {
            return LaneChange::None;
        }
        LaneChange::Inner
    }

    /// Carry out the planned lane change and leave the node queue; the
    /// vehicle re-registers from its new lane in `did_move`.
    pub fn change_lane(&mut self, graph: &Graph) -> VehicleResult<()> {
        if self.lane_change == LaneChange::None {
            return Ok(());
        }
        let (pos, edge, lane) = self.located(graph)?;
        let new_index = match self.lane_change {
            LaneChange::Outer => pos.lane.checked_sub(1),
            _ => pos.lane.checked_add(1),
        }
        .ok_or(mts_network::NetworkError::LaneNotFound { edge: pos.edge, lane: pos.lane })?;
        let new_lane = edge
            .lane(new_index)
            .ok_or(mts_network::NetworkError::LaneNotFound { edge: pos.edge, lane: new_index })?;

        lane.remove_vehicle(self.id, pos.cell)?;
        new_lane.insert_vehicle(self.id, pos.cell)?;
        self.position = Some(Position { lane: new_index, ..pos });
        self.lane_change = LaneChange::None;

        graph.node(edge.destination())?.deregister_vehicle(self.id);
        Ok(())
    }

    /// Brake for the front vehicle or the node ahead, cap at the edge's
    /// speed limit, then dawdle.
    pub fn brake(&mut self, graph: &Graph) -> VehicleResult<()> {
        let (pos, edge, lane) = self.located(graph)?;
        let mut v = self.velocity as i64;

        match lane.vehicle_in_front(pos.cell) {
            Some((front, _)) => v = v.min(front as i64 - pos.cell as i64 - 1),
            None => {
                let to_end = edge.cell_count() as i64 - pos.cell as i64;
                if v >= to_end {
                    // Stop on the last cell unless allowed across.
                    let mut reach = to_end - 1;
                    if let Some(next) = self.route.peek() {
                        if pos.lane == 0 && graph.node(edge.destination())?.permission_to_cross(self.id) {
                            let next_lane = graph.edge(next)?.outermost_lane();
                            let mut room = next_lane.max_insertion_index();
                            // Keep clear of the exit cell of an empty lane.
                            if room == next_lane.length() as i64 - 1 && room > 0 {
                                room -= 1;
                            }
                            reach = to_end + room;
                        }
                    }
                    v = v.min(reach);
                }
            }
        }
        v = v.min(edge.max_velocity() as i64);
        self.velocity = self.checked(Phase::Brake, v)?;

        if !self.dashed && self.velocity > 0 && self.driver.dawdles() {
            self.velocity -= 1;
        }
        Ok(())
    }

    /// Drive `v` cells, crossing into the next route edge or despawning at
    /// the end of the trip.  Returns the new state if it changed.
    pub fn move_forward(&mut self, graph: &Graph) -> VehicleResult<Option<VehicleState>> {
        let (pos, edge, lane) = self.located(graph)?;
        let to_end = edge.cell_count() - pos.cell;

        if self.velocity >= to_end {
            graph.node(edge.destination())?.deregister_vehicle(self.id);
            lane.remove_vehicle(self.id, pos.cell)?;
            let overshoot = pos.cell + self.velocity - edge.cell_count();
            return match self.route.pop() {
                None => Ok(Some(self.despawn())),
                Some(next) => {
                    graph.edge(next)?.outermost_lane().insert_vehicle(self.id, overshoot)?;
                    self.position = Some(Position { edge: next, lane: 0, cell: overshoot });
                    Ok(None)
                }
            };
        }

        if self.velocity == 0 && to_end == 1 && self.route.is_empty() {
            graph.node(edge.destination())?.deregister_vehicle(self.id);
            lane.remove_vehicle(self.id, pos.cell)?;
            return Ok(Some(self.despawn()));
        }

        let cell = lane.move_vehicle(self.id, pos.cell, self.velocity)?;
        self.position = Some(Position { cell, ..pos });
        Ok(None)
    }

    fn despawn(&mut self) -> VehicleState {
        self.position = None;
        self.velocity = 0;
        self.state = VehicleState::Despawned;
        trace!(vehicle = %self.id, age = self.driver.age(), "despawned");
        self.state
    }

    /// Update mood and age, then (de)register at the node ahead: a vehicle
    /// queues for the crossing when it is first in lane 0 and could reach
    /// the node within one tick.
    pub fn did_move(&mut self, graph: &Graph) -> VehicleResult<()> {
        if self.state != VehicleState::Spawned {
            return Ok(());
        }
        self.driver.did_one_step(self.velocity == 0, self.stood_still);
        self.stood_still = self.velocity == 0;

        let (pos, edge, lane) = self.located(graph)?;
        let node = graph.node(edge.destination())?;
        match self.route.peek() {
            Some(next)
                if pos.lane == 0
                    && self.approaching_node(edge, pos)
                    && lane.vehicle_in_front(pos.cell).is_none() =>
            {
                node.register_vehicle(CrossingRequest {
                    vehicle:     self.id,
                    origin:      Some(pos.edge),
                    destination: next,
                })?;
            }
            _ => {
                node.deregister_vehicle(self.id);
            }
        }
        Ok(())
    }

    /// Try to enter the first route edge.  A vehicle whose route is empty
    /// despawns at once; one without permission or room waits another tick.
    /// Returns the new state if it changed.
    pub fn spawn(&mut self, graph: &Graph) -> VehicleResult<Option<VehicleState>> {
        if self.state != VehicleState::NotSpawned {
            return Ok(None);
        }
        let mut changed = None;
        if self.driver.age() >= self.spawn_delay {
            let Some(first) = self.route.peek() else {
                return Ok(Some(self.despawn()));
            };
            let node = graph.node(self.route.start())?;
            let lane = graph.edge(first)?.outermost_lane();
            if node.permission_to_cross(self.id) && lane.max_insertion_index() >= 0 {
                node.deregister_vehicle(self.id);
                lane.insert_vehicle(self.id, 0)?;
                self.route.pop();
                self.position = Some(Position { edge: first, lane: 0, cell: 0 });
                self.velocity = 1;
                self.state = VehicleState::Spawned;
                changed = Some(self.state);
                trace!(vehicle = %self.id, edge = %first, "spawned");
            } else {
                self.velocity = 0;
            }
        }
        self.driver.did_one_step(self.velocity == 0, self.stood_still);
        self.stood_still = self.velocity == 0;
        Ok(changed)
    }

    /// Rewind to the state right after construction.  The caller clears
    /// lanes and nodes.
    pub fn reset(&mut self) {
        self.state = VehicleState::NotSpawned;
        self.route = self.planned.clone();
        self.driver.reset();
        self.position = None;
        self.velocity = 0;
        self.stood_still = false;
        self.dashed = false;
        self.lane_change = LaneChange::None;
    }
}
