//! Precomputed edge sequences.

use std::collections::VecDeque;

use mts_core::{EdgeId, NodeId};
use mts_network::Graph;

use crate::{VehicleError, VehicleResult};

/// The remaining edges of a trip, consumed front to back.
///
/// A vehicle pops the first edge when it spawns and one more at every node
/// it crosses; the route is empty on the last edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    start: NodeId,
    edges: VecDeque<EdgeId>,
}

impl Route {
    /// A connected route over `graph`.  Use [`Route::empty`] for a trip
    /// without edges.
    pub fn new(graph: &Graph, edges: Vec<EdgeId>) -> VehicleResult<Self> {
        let first = *edges.first().ok_or(VehicleError::EmptyRoute)?;
        let start = graph.edge(first)?.origin();
        for pair in edges.windows(2) {
            if graph.edge(pair[0])?.destination() != graph.edge(pair[1])?.origin() {
                return Err(VehicleError::DisconnectedRoute { from: pair[0], to: pair[1] });
            }
        }
        Ok(Self { start, edges: edges.into() })
    }

    /// A trip that ends where it starts.  Vehicles with an empty route
    /// despawn on their first spawn attempt.
    pub fn empty(start: NodeId) -> Self {
        Self { start, edges: VecDeque::new() }
    }

    /// The node the trip starts at.
    #[inline]
    pub fn start(&self) -> NodeId {
        self.start
    }

    #[inline]
    pub fn peek(&self) -> Option<EdgeId> {
        self.edges.front().copied()
    }

    #[inline]
    pub fn pop(&mut self) -> Option<EdgeId> {
        self.edges.pop_front()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }
}
