use thiserror::Error;

use mts_core::{EdgeId, VehicleId};
use mts_network::NetworkError;

use crate::Phase;

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("{vehicle} computed velocity {velocity} during {phase}")]
    NegativeVelocity {
        vehicle:  VehicleId,
        phase:    Phase,
        velocity: i64,
    },

    #[error("route breaks between {from} and {to}")]
    DisconnectedRoute { from: EdgeId, to: EdgeId },

    #[error("a route needs at least one edge")]
    EmptyRoute,

    #[error("{0} is spawned but has no position on the graph")]
    NotOnGraph(VehicleId),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

pub type VehicleResult<T> = Result<T, VehicleError>;
