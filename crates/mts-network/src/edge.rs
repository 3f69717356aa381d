//! Directed street segments.

use mts_core::{EdgeId, NodeId, Vec2d};

use crate::Lane;

/// One direction of a street between two nodes.
///
/// Topology and the derived cellular constants are fixed at build time; only
/// lane occupancy changes afterwards.
#[derive(Debug)]
pub struct DirectedEdge {
    id:          EdgeId,
    origin:      NodeId,
    destination: NodeId,
    length_m:    f64,
    /// `max(1, ceil(length_m / meters_per_cell))`
    cell_count:   u32,
    /// `max(1, round(kmh / 3.6 / meters_per_cell))`
    max_velocity: u32,
    /// Smaller levels win at intersections.
    priority_level: u8,
    /// Heading when leaving `origin`.
    origin_direction:      Vec2d,
    /// Heading when arriving at `destination`.
    destination_direction: Vec2d,
    lanes: Vec<Lane>,
}

impl DirectedEdge {
    /// Assemble an edge from already-derived constants.  The graph builder is
    /// the usual caller; it clamps degenerate inputs before getting here.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id:                    EdgeId,
        origin:                NodeId,
        destination:           NodeId,
        length_m:              f64,
        cell_count:            u32,
        max_velocity:          u32,
        priority_level:        u8,
        lane_count:            u8,
        origin_direction:      Vec2d,
        destination_direction: Vec2d,
    ) -> Self {
        let cell_count = cell_count.max(1);
        let lanes = (0..lane_count.max(1))
            .map(|i| Lane::new(id, i, cell_count))
            .collect();
        Self {
            id,
            origin,
            destination,
            length_m,
            cell_count,
            max_velocity: max_velocity.max(1),
            priority_level,
            origin_direction,
            destination_direction,
            lanes,
        }
    }

    #[inline]
    pub fn id(&self) -> EdgeId {
        self.id
    }

    #[inline]
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    #[inline]
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    #[inline]
    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    /// Length in cells (at least 1).
    #[inline]
    pub fn cell_count(&self) -> u32 {
        self.cell_count
    }

    /// Speed limit in cells per tick (at least 1).
    #[inline]
    pub fn max_velocity(&self) -> u32 {
        self.max_velocity
    }

    #[inline]
    pub fn priority_level(&self) -> u8 {
        self.priority_level
    }

    #[inline]
    pub fn origin_direction(&self) -> Vec2d {
        self.origin_direction
    }

    #[inline]
    pub fn destination_direction(&self) -> Vec2d {
        self.destination_direction
    }

    #[inline]
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    #[inline]
    pub fn lane(&self, index: u8) -> Option<&Lane> {
        self.lanes.get(index as usize)
    }

    /// Lane 0, which every crossing vehicle enters.
    #[inline]
    pub fn outermost_lane(&self) -> &Lane {
        &self.lanes[0]
    }

    #[inline]
    pub fn lane_count(&self) -> u8 {
        self.lanes.len() as u8
    }

    /// Free-flow travel time in milliseconds at one tick per second; the
    /// routing weight.
    pub fn time_cost_millis(&self) -> f64 {
        1000.0 * self.cell_count as f64 / self.max_velocity as f64
    }

    /// Total occupants over all lanes.
    pub fn vehicle_count(&self) -> usize {
        self.lanes.iter().map(Lane::vehicle_count).sum()
    }

    /// Clear all lanes.
    pub fn reset(&self) {
        for lane in &self.lanes {
            lane.reset();
        }
    }
}
