//! The street graph arena and its builder.
//!
//! # Data layout
//!
//! Nodes and directed edges live in two dense `Vec`s indexed by
//! [`NodeId`] / [`EdgeId`].  Nodes hold the ids of their incident edges,
//! edges hold the ids of their endpoints; there are no pointers between
//! them, so the whole graph is `Sync` and worker threads can share a
//! `&Graph` while lanes and node arbiters guard their own mutable state.
//!
//! # Lifecycle
//!
//! [`GraphBuilder`] collects nodes and edge specifications in any order.
//! [`GraphBuilder::build`] derives the cellular constants of every edge,
//! attaches edges to their endpoints and numbers the crossing indices of
//! every node exactly once.  The resulting [`Graph`] never changes shape.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::{debug, warn};

use mts_core::{
    EdgeId, GeoPoint, NodeId, RoadClass, SimulationConfig, StreetPriority, Vec2d,
};

use crate::{DirectedEdge, NetworkError, NetworkResult, Node};

// ── EdgeSpec ──────────────────────────────────────────────────────────────────

/// Physical description of one directed street segment.
///
/// Only the speed limit is required; everything else has a sensible default
/// or is derived from the endpoint coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeSpec {
    /// Speed limit in km/h.
    pub max_velocity_kmh: f64,
    /// Length in metres; `None` uses the great-circle distance of the
    /// endpoints.
    pub length_m:         Option<f64>,
    pub lane_count:       u8,
    pub priority_level:   u8,
    /// Heading when leaving the origin; `None` derives it from coordinates.
    pub origin_direction:      Option<Vec2d>,
    /// Heading when arriving at the destination; `None` derives it from
    /// coordinates.
    pub destination_direction: Option<Vec2d>,
}

impl EdgeSpec {
    pub fn new(max_velocity_kmh: f64) -> Self {
        Self {
            max_velocity_kmh,
            length_m:              None,
            lane_count:            1,
            priority_level:        StreetPriority::new(RoadClass::Residential).level(),
            origin_direction:      None,
            destination_direction: None,
        }
    }

    pub fn length(mut self, length_m: f64) -> Self {
        self.length_m = Some(length_m);
        self
    }

    pub fn lanes(mut self, lane_count: u8) -> Self {
        self.lane_count = lane_count;
        self
    }

    pub fn priority(mut self, priority: StreetPriority) -> Self {
        self.priority_level = priority.level();
        self
    }

    pub fn priority_level(mut self, level: u8) -> Self {
        self.priority_level = level;
        self
    }

    /// Override both endpoint headings (curved streets).
    pub fn directions(mut self, origin: Vec2d, destination: Vec2d) -> Self {
        self.origin_direction = Some(origin);
        self.destination_direction = Some(destination);
        self
    }
}

impl Default for EdgeSpec {
    fn default() -> Self {
        Self::new(50.0)
    }
}

// ── GraphBuilder ──────────────────────────────────────────────────────────────

/// Construct a [`Graph`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use mts_core::{GeoPoint, SimulationConfig};
/// use mts_network::{EdgeSpec, GraphBuilder};
///
/// let mut b = GraphBuilder::new();
/// let a = b.add_node(GeoPoint::new(48.000, 9.000));
/// let c = b.add_node(GeoPoint::new(48.001, 9.000));
/// b.add_road(a, c, EdgeSpec::new(50.0).length(150.0));
/// let graph = b.build(&SimulationConfig::default()).unwrap();
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_count(), 2); // both directions
/// assert_eq!(graph.edge(mts_core::EdgeId(0)).unwrap().cell_count(), 20);
/// ```
pub struct GraphBuilder {
    nodes: Vec<GeoPoint>,
    edges: Vec<(NodeId, NodeId, EdgeSpec)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), edges: Vec::new() }
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            edges: Vec::with_capacity(edges),
        }
    }

    /// Add an intersection and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, position: GeoPoint) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(position);
        id
    }

    /// Add a **directed** edge and return its `EdgeId` (sequential from 0).
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, spec: EdgeSpec) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push((from, to, spec));
        id
    }

    /// Add both directions of a two-way street.  Explicit headings are
    /// reversed and swapped for the way back.
    pub fn add_road(&mut self, a: NodeId, b: NodeId, spec: EdgeSpec) -> (EdgeId, EdgeId) {
        let mut back = spec.clone();
        back.origin_direction = spec.destination_direction.map(|v| -v);
        back.destination_direction = spec.origin_direction.map(|v| -v);
        (self.add_edge(a, b, spec), self.add_edge(b, a, back))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Consume the builder and produce a [`Graph`].
    ///
    /// Fails on unknown endpoints, self-loops, and edges whose heading
    /// cannot be determined.  Degenerate lengths and speed limits are
    /// clamped to one cell and one cell per tick.
    pub fn build(self, config: &SimulationConfig) -> NetworkResult<Graph> {
        config.validate()?;

        let mut nodes: Vec<Node> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, &pos)| {
                Node::new(NodeId(i as u32), pos, config.crossing_logic.clone(), config.seed)
            })
            .collect();

        let mut edges = Vec::with_capacity(self.edges.len());
        for (i, (from, to, spec)) in self.edges.into_iter().enumerate() {
            let id = EdgeId(i as u32);
            let from_pos = *self.nodes.get(from.index()).ok_or(NetworkError::NodeNotFound(from))?;
            let to_pos = *self.nodes.get(to.index()).ok_or(NetworkError::NodeNotFound(to))?;
            if from == to {
                return Err(NetworkError::InvalidEdge(format!("{id} is a self-loop at {from}")));
            }

            let heading = from_pos.direction_to(to_pos);
            let origin_direction = spec.origin_direction.unwrap_or(heading);
            let destination_direction = spec.destination_direction.unwrap_or(heading);
            if origin_direction.is_zero() || destination_direction.is_zero() {
                return Err(NetworkError::InvalidEdge(format!(
                    "{id} from {from} to {to} has no heading"
                )));
            }

            let length_m = spec.length_m.unwrap_or_else(|| from_pos.distance_m(to_pos));
            if !(length_m.is_finite() && length_m > 0.0) {
                warn!(edge = %id, length_m, "degenerate edge length, clamped to one cell");
            }
            if !(spec.max_velocity_kmh.is_finite() && spec.max_velocity_kmh > 0.0) {
                warn!(edge = %id, kmh = spec.max_velocity_kmh,
                    "degenerate speed limit, clamped to one cell per tick");
            }
            if spec.lane_count == 0 {
                warn!(edge = %id, "edge without lanes, clamped to one lane");
            }

            edges.push(DirectedEdge::new(
                id,
                from,
                to,
                length_m,
                config.cell_count(length_m),
                config.cells_per_tick(spec.max_velocity_kmh),
                spec.priority_level,
                spec.lane_count,
                origin_direction,
                destination_direction,
            ));
        }

        for edge in &edges {
            nodes[edge.origin().index()].add_leaving_edge(edge);
            nodes[edge.destination().index()].add_incoming_edge(edge);
        }
        for node in &mut nodes {
            node.calculate_edge_indices(&edges)?;
        }

        debug!(nodes = nodes.len(), edges = edges.len(), "graph built, crossing indices final");
        Ok(Graph { nodes, edges })
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Graph ─────────────────────────────────────────────────────────────────────

/// Immutable street topology with interior-mutable lanes and arbiters.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<DirectedEdge>,
}

impl Graph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> NetworkResult<&Node> {
        self.nodes.get(id.index()).ok_or(NetworkError::NodeNotFound(id))
    }

    pub fn edge(&self, id: EdgeId) -> NetworkResult<&DirectedEdge> {
        self.edges.get(id.index()).ok_or(NetworkError::EdgeNotFound(id))
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn edges(&self) -> &[DirectedEdge] {
        &self.edges
    }

    pub fn leaving_edges(&self, node: NodeId) -> NetworkResult<impl Iterator<Item = EdgeId> + '_> {
        Ok(self.node(node)?.leaving_edges())
    }

    pub fn incoming_edges(&self, node: NodeId) -> NetworkResult<impl Iterator<Item = EdgeId> + '_> {
        Ok(self.node(node)?.incoming_edges())
    }

    /// Run one arbiter update at `id`, reading the free room on lane 0 of
    /// its leaving edges.
    pub fn update_node(&self, id: NodeId) -> NetworkResult<()> {
        let edges = &self.edges;
        self.node(id)?.update(|e| {
            edges
                .get(e.index())
                .map_or(-1, |edge| edge.outermost_lane().max_insertion_index())
        })
    }

    pub fn update_all_nodes(&self) -> NetworkResult<()> {
        for node in &self.nodes {
            self.update_node(node.id())?;
        }
        Ok(())
    }

    /// Clear every lane and every arbiter.
    pub fn reset(&self) {
        for edge in &self.edges {
            edge.reset();
        }
        for node in &self.nodes {
            node.reset();
        }
    }

    /// Fastest free-flow route as a sequence of edges, by
    /// [`DirectedEdge::time_cost_millis`].
    ///
    /// `Some(vec![])` if `from == to`; `None` if `to` is unreachable.
    pub fn shortest_route(&self, from: NodeId, to: NodeId) -> Option<Vec<EdgeId>> {
        if from.index() >= self.nodes.len() || to.index() >= self.nodes.len() {
            return None;
        }
        if from == to {
            return Some(Vec::new());
        }

        let n = self.nodes.len();
        let mut dist = vec![u64::MAX; n];
        let mut prev_edge = vec![EdgeId::INVALID; n];
        dist[from.index()] = 0;

        // Secondary key NodeId keeps tie-breaking deterministic.
        let mut heap: BinaryHeap<Reverse<(u64, NodeId)>> = BinaryHeap::new();
        heap.push(Reverse((0, from)));

        while let Some(Reverse((cost, node))) = heap.pop() {
            if node == to {
                return Some(self.reconstruct(&prev_edge, to));
            }
            if cost > dist[node.index()] {
                continue;
            }
            for edge_id in self.nodes[node.index()].leaving_edges() {
                let edge = &self.edges[edge_id.index()];
                let neighbor = edge.destination();
                let new_cost = cost.saturating_add(edge.time_cost_millis().round() as u64);
                if new_cost < dist[neighbor.index()] {
                    dist[neighbor.index()] = new_cost;
                    prev_edge[neighbor.index()] = edge_id;
                    heap.push(Reverse((new_cost, neighbor)));
                }
            }
        }
        None
    }

    fn reconstruct(&self, prev_edge: &[EdgeId], to: NodeId) -> Vec<EdgeId> {
        let mut route = Vec::new();
        let mut cur = to;
        loop {
            let e = prev_edge[cur.index()];
            if e == EdgeId::INVALID {
                break;
            }
            route.push(e);
            cur = self.edges[e.index()].origin();
        }
        route.reverse();
        route
    }
}
