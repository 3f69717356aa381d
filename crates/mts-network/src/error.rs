//! Network-subsystem error type.

use thiserror::Error;

use mts_core::{CoreError, EdgeId, NodeId, VehicleId};

/// Errors produced by `mts-network`.
///
/// `CellOccupancyViolation` and `GeometryInvariantViolation` are invariant
/// breaches: the caller handed in an inconsistent vehicle position or the
/// node geometry is broken.  They abort the current tick.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error(
        "cell {cell} of lane {lane} on {edge}: expected {expected:?}, found {found:?}"
    )]
    CellOccupancyViolation {
        edge:     EdgeId,
        lane:     u8,
        cell:     u32,
        expected: Option<VehicleId>,
        found:    Option<VehicleId>,
    },

    #[error("cell {cell} is outside lane {lane} of {edge} ({length} cells)")]
    CellOutOfRange {
        edge:   EdgeId,
        lane:   u8,
        cell:   u64,
        length: u32,
    },

    #[error(
        "crossing paths {origin_a}->{destination_a} and {origin_b}->{destination_b} at {node} \
         have no defined precedence"
    )]
    GeometryInvariantViolation {
        node:          NodeId,
        origin_a:      u8,
        destination_a: u8,
        origin_b:      u8,
        destination_b: u8,
    },

    #[error("{edge} does not touch {node} in the requested direction")]
    EdgeNotIncident { node: NodeId, edge: EdgeId },

    #[error("node {0} not found in graph")]
    NodeNotFound(NodeId),

    #[error("edge {0} not found in graph")]
    EdgeNotFound(EdgeId),

    #[error("lane {lane} not found on {edge}")]
    LaneNotFound { edge: EdgeId, lane: u8 },

    #[error("invalid edge: {0}")]
    InvalidEdge(String),

    #[error("{node} has {count} incident edges, at most 255 are supported")]
    TooManyEdges { node: NodeId, count: usize },

    #[error("crossing indices of {0} were already calculated")]
    IndicesAlreadyCalculated(NodeId),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
