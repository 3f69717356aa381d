//! Intersections and their crossing-priority arbiter.
//!
//! # Lifecycle
//!
//! 1. **Construction** (single-threaded, inside the graph builder): edges are
//!    attached with [`Node::add_leaving_edge`] / [`Node::add_incoming_edge`],
//!    then [`Node::calculate_edge_indices`] numbers them once.
//! 2. **Simulation**: vehicles call [`Node::register_vehicle`] /
//!    [`Node::deregister_vehicle`] from any worker thread; the step executor
//!    calls [`Node::update`] once per tick after all vehicle phases; vehicles
//!    then query [`Node::permission_to_cross`] during the next tick.
//!
//! # Priority counters
//!
//! Every assessed vehicle carries a signed counter.  When a vehicle is
//! assessed it is compared with every vehicle already assessed: the winner
//! gains one, the loser drops one, and a non-conflicting pair both gain one.
//! Each vehicle also remembers whom it beat (or tied with), so deregistering
//! undoes exactly its own contributions.  A vehicle may cross if it holds the
//! maximal counter, and that maximum equals `assessed − 1` (it beat or tied
//! with everybody).  Anything less is a precedence cycle and is broken by a
//! random pick.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use mts_core::{CrossingLogicConfig, EdgeId, EntityRng, GeoPoint, NodeId, Vec2d, VehicleId, sort_by_bearing};

use crate::crossing::{Approach, Leg, Precedence, decide};
use crate::{DirectedEdge, NetworkError, NetworkResult};

// ── Registration input ────────────────────────────────────────────────────────

/// What a vehicle tells a node when it registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CrossingRequest {
    pub vehicle:     VehicleId,
    /// Incoming edge the vehicle is driving on; `None` while not spawned.
    pub origin:      Option<EdgeId>,
    /// Leaving edge the vehicle wants to turn into.
    pub destination: EdgeId,
}

// ── Arbiter state ─────────────────────────────────────────────────────────────

struct Assessed {
    approach: Approach,
    counter:  i32,
    /// Vehicles this one beat or did not conflict with.
    defeated: BTreeSet<VehicleId>,
}

struct Arbiter {
    rng:       EntityRng,
    /// Registered since the last update, assessed in id order.
    pending:   BTreeMap<VehicleId, Approach>,
    assessed:  BTreeMap<VehicleId, Assessed>,
    permitted: BTreeSet<VehicleId>,
    changed:   bool,
}

impl Arbiter {
    fn new(rng: EntityRng) -> Self {
        Self {
            rng,
            pending:   BTreeMap::new(),
            assessed:  BTreeMap::new(),
            permitted: BTreeSet::new(),
            changed:   false,
        }
    }

    fn is_registered(&self, vehicle: VehicleId) -> bool {
        self.assessed.contains_key(&vehicle) || self.pending.contains_key(&vehicle)
    }
}

// ── Node ──────────────────────────────────────────────────────────────────────

/// An intersection (or dead end) of the street graph.
pub struct Node {
    id:       NodeId,
    position: GeoPoint,
    rules:    CrossingLogicConfig,
    leaving:  FxHashMap<EdgeId, Leg>,
    incoming: FxHashMap<EdgeId, Leg>,
    /// Insertion order of `leaving` then `incoming`; fixes the reference
    /// bearing and the order inside a bearing bucket.
    attach_order: Vec<(EdgeId, bool)>,
    indices_calculated: bool,
    arbiter:  Mutex<Arbiter>,
}

impl Node {
    pub fn new(id: NodeId, position: GeoPoint, rules: CrossingLogicConfig, seed: u64) -> Self {
        Self {
            id,
            position,
            rules,
            leaving:  FxHashMap::default(),
            incoming: FxHashMap::default(),
            attach_order: Vec::new(),
            indices_calculated: false,
            arbiter:  Mutex::new(Arbiter::new(EntityRng::for_node(seed, id))),
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn position(&self) -> GeoPoint {
        self.position
    }

    // ── Edge attachment ───────────────────────────────────────────────────

    /// Attach an edge starting here.  Its crossing index is assigned later.
    pub fn add_leaving_edge(&mut self, edge: &DirectedEdge) {
        let leg = Leg { edge: edge.id(), index: u8::MAX, priority: edge.priority_level() };
        if self.leaving.insert(edge.id(), leg).is_none() {
            self.attach_order.push((edge.id(), true));
        }
    }

    /// Attach an edge ending here.
    pub fn add_incoming_edge(&mut self, edge: &DirectedEdge) {
        let leg = Leg { edge: edge.id(), index: u8::MAX, priority: edge.priority_level() };
        if self.incoming.insert(edge.id(), leg).is_none() {
            self.attach_order.push((edge.id(), false));
        }
    }

    /// Number all attached edges by bearing.
    ///
    /// Every edge is represented by its heading *into* the node: a leaving
    /// edge's reversed origin direction, an incoming edge's destination
    /// direction.  Headings are sorted clockwise from the first one (or
    /// counter-clockwise when driving on the right), and equal headings form
    /// one bucket in which leaving edges are numbered before incoming ones.
    /// A two-way street therefore gets two consecutive indices.
    ///
    /// `edges` is the graph's edge arena.  Must run exactly once, after all
    /// edges are attached.
    pub fn calculate_edge_indices(&mut self, edges: &[DirectedEdge]) -> NetworkResult<()> {
        if self.indices_calculated {
            return Err(NetworkError::IndicesAlreadyCalculated(self.id));
        }
        let count = self.attach_order.len();
        if count > u8::MAX as usize {
            return Err(NetworkError::TooManyEdges { node: self.id, count });
        }

        // Leaving edges first so the reference bearing is a leaving edge's
        // whenever there is one.
        let mut ordered: Vec<(EdgeId, bool)> = self.attach_order.iter().copied().filter(|e| e.1).collect();
        ordered.extend(self.attach_order.iter().copied().filter(|e| !e.1));

        // Group by heading.
        let mut buckets: Vec<(Vec2d, Vec<(EdgeId, bool)>)> = Vec::new();
        for &(edge_id, is_leaving) in &ordered {
            let edge = edges
                .get(edge_id.index())
                .ok_or(NetworkError::EdgeNotFound(edge_id))?;
            let heading = if is_leaving {
                -edge.origin_direction()
            } else {
                edge.destination_direction()
            };
            match buckets.iter_mut().find(|(v, _)| v.same_bearing(heading)) {
                Some((_, members)) => members.push((edge_id, is_leaving)),
                None => buckets.push((heading, vec![(edge_id, is_leaving)])),
            }
        }

        if let Some(&(zero, _)) = buckets.first() {
            let headings: Vec<Vec2d> = buckets.iter().map(|(v, _)| *v).collect();
            let clockwise = !self.rules.driving_on_the_right;
            let mut next: u8 = 0;
            for b in sort_by_bearing(zero, &headings, clockwise) {
                let members = &buckets[b].1;
                for &(edge_id, _) in members.iter().filter(|e| e.1) {
                    if let Some(leg) = self.leaving.get_mut(&edge_id) {
                        leg.index = next;
                        next += 1;
                    }
                }
                for &(edge_id, _) in members.iter().filter(|e| !e.1) {
                    if let Some(leg) = self.incoming.get_mut(&edge_id) {
                        leg.index = next;
                        next += 1;
                    }
                }
            }
        }

        self.indices_calculated = true;
        trace!(node = %self.id, indices = count, "crossing indices calculated");
        Ok(())
    }

    /// Total number of crossing indices (incoming + leaving edges).
    #[inline]
    pub fn index_count(&self) -> u8 {
        (self.leaving.len() + self.incoming.len()) as u8
    }

    /// Crossing index of an attached edge.  An edge that both starts and ends
    /// here reports its leaving index.
    pub fn crossing_index_of(&self, edge: EdgeId) -> Option<u8> {
        self.leaving
            .get(&edge)
            .or_else(|| self.incoming.get(&edge))
            .map(|leg| leg.index)
    }

    pub fn leaving_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.attach_order.iter().filter(|e| e.1).map(|e| e.0)
    }

    pub fn incoming_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.attach_order.iter().filter(|e| !e.1).map(|e| e.0)
    }

    // ── Arbitration ───────────────────────────────────────────────────────

    fn approach_for(&self, request: &CrossingRequest) -> NetworkResult<Approach> {
        let destination = *self.leaving.get(&request.destination).ok_or(
            NetworkError::EdgeNotIncident { node: self.id, edge: request.destination },
        )?;
        Ok(match request.origin {
            None => Approach::Waiting { vehicle: request.vehicle, destination },
            Some(origin) => {
                let origin = *self
                    .incoming
                    .get(&origin)
                    .ok_or(NetworkError::EdgeNotIncident { node: self.id, edge: origin })?;
                Approach::Arriving { vehicle: request.vehicle, origin, destination }
            }
        })
    }

    /// Queue a vehicle for assessment at the next [`update`](Self::update).
    ///
    /// Returns `false` if it was already registered.
    pub fn register_vehicle(&self, request: CrossingRequest) -> NetworkResult<bool> {
        let approach = self.approach_for(&request)?;
        let mut arbiter = self.arbiter.lock();
        if arbiter.is_registered(request.vehicle) {
            return Ok(false);
        }
        arbiter.pending.insert(request.vehicle, approach);
        arbiter.changed = true;
        Ok(true)
    }

    /// Remove a vehicle and undo its effect on every other counter.
    ///
    /// Returns `false` if it had not been assessed yet (a pending
    /// registration is silently dropped).
    pub fn deregister_vehicle(&self, vehicle: VehicleId) -> bool {
        let mut arbiter = self.arbiter.lock();
        if arbiter.assessed.remove(&vehicle).is_none() {
            arbiter.pending.remove(&vehicle);
            return false;
        }
        arbiter.permitted.remove(&vehicle);
        for other in arbiter.assessed.values_mut() {
            if other.defeated.remove(&vehicle) {
                other.counter -= 1;
            } else {
                other.counter += 1;
            }
        }
        arbiter.changed = true;
        true
    }

    /// Assess new registrations and recompute who may cross.
    ///
    /// `max_insertion_index(edge)` reports the free room on lane 0 of a
    /// leaving edge; it is only consulted for friendly standing in jam.
    ///
    /// On error the node is left as it was before the failing registration
    /// was assessed; that registration stays pending.
    pub fn update(&self, max_insertion_index: impl Fn(EdgeId) -> i64) -> NetworkResult<()> {
        let total = self.index_count();
        self.update_with(max_insertion_index, |a, b, rng| {
            decide(self.id, a, b, total, &self.rules, || rng.coin())
        })
    }

    /// [`update`](Self::update) with the pairwise decision supplied by the
    /// caller.
    pub(crate) fn update_with(
        &self,
        max_insertion_index: impl Fn(EdgeId) -> i64,
        mut judge: impl FnMut(&Approach, &Approach, &mut EntityRng) -> NetworkResult<Precedence>,
    ) -> NetworkResult<()> {
        let mut guard = self.arbiter.lock();
        let arbiter = &mut *guard;

        // ── Assess new registrations in id order ──────────────────────────
        while let Some((vehicle, approach)) = arbiter.pending.pop_first() {
            // Judge against every assessed vehicle before touching a counter.
            let mut verdicts = Vec::with_capacity(arbiter.assessed.len());
            for (&other_id, other) in &arbiter.assessed {
                match judge(&approach, &other.approach, &mut arbiter.rng) {
                    Ok(precedence) => verdicts.push((other_id, precedence)),
                    Err(e) => {
                        arbiter.pending.insert(vehicle, approach);
                        return Err(e);
                    }
                }
            }

            let mut counter = 0;
            let mut defeated = BTreeSet::new();
            for (other_id, precedence) in verdicts {
                let Some(other) = arbiter.assessed.get_mut(&other_id) else {
                    continue;
                };
                match precedence {
                    Precedence::Wins => {
                        counter += 1;
                        defeated.insert(other_id);
                        other.counter -= 1;
                    }
                    Precedence::Loses => {
                        counter -= 1;
                        other.counter += 1;
                        other.defeated.insert(vehicle);
                    }
                    Precedence::Tie => {
                        counter += 1;
                        defeated.insert(other_id);
                        other.counter += 1;
                        other.defeated.insert(vehicle);
                    }
                }
            }
            arbiter.assessed.insert(vehicle, Assessed { approach, counter, defeated });
        }

        // ── Collect the eligible vehicles with maximal counter ────────────
        arbiter.permitted.clear();
        if !arbiter.assessed.is_empty() {
            let skip_jammed = !arbiter.changed && self.rules.friendly_standing_in_jam;
            let mut max = i32::MIN;
            for (&id, assessed) in &arbiter.assessed {
                if assessed.counter < max {
                    continue;
                }
                if skip_jammed && max_insertion_index(assessed.approach.destination().edge) < 0 {
                    continue;
                }
                if assessed.counter > max {
                    arbiter.permitted.clear();
                    max = assessed.counter;
                }
                arbiter.permitted.insert(id);
            }

            if !arbiter.permitted.is_empty() {
                let all_others_beaten = max as i64 == arbiter.assessed.len() as i64 - 1;
                let too_many = self.rules.only_one_vehicle && arbiter.permitted.len() > 1;
                if !all_others_beaten || too_many {
                    let pick = arbiter.rng.gen_range(0..arbiter.permitted.len());
                    if let Some(&chosen) = arbiter.permitted.iter().nth(pick) {
                        if !all_others_beaten {
                            debug!(node = %self.id, %chosen, max, assessed = arbiter.assessed.len(),
                                "precedence cycle broken at random");
                        }
                        arbiter.permitted.clear();
                        arbiter.permitted.insert(chosen);
                    }
                }
            }
        }

        arbiter.changed = false;
        Ok(())
    }

    /// Whether `vehicle` was granted the crossing by the last update.
    pub fn permission_to_cross(&self, vehicle: VehicleId) -> bool {
        self.arbiter.lock().permitted.contains(&vehicle)
    }

    pub fn is_registered(&self, vehicle: VehicleId) -> bool {
        self.arbiter.lock().is_registered(vehicle)
    }

    /// Counter of an assessed vehicle.
    pub fn priority_counter(&self, vehicle: VehicleId) -> Option<i32> {
        self.arbiter.lock().assessed.get(&vehicle).map(|a| a.counter)
    }

    /// Vehicles assessed so far (pending registrations excluded).
    pub fn assessed_count(&self) -> usize {
        self.arbiter.lock().assessed.len()
    }

    /// Vehicles currently holding permission.
    pub fn permitted_vehicles(&self) -> Vec<VehicleId> {
        self.arbiter.lock().permitted.iter().copied().collect()
    }

    /// Forget all registrations and rewind the tie-break RNG.
    pub fn reset(&self) {
        let mut arbiter = self.arbiter.lock();
        arbiter.rng.reset();
        arbiter.pending.clear();
        arbiter.assessed.clear();
        arbiter.permitted.clear();
        arbiter.changed = false;
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("leaving", &self.leaving.len())
            .field("incoming", &self.incoming.len())
            .finish()
    }
}
