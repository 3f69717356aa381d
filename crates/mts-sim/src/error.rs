use mts_core::{CoreError, NodeId, VehicleId};
use mts_network::NetworkError;
use mts_vehicle::VehicleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// A cancellation request was observed mid-tick.  The tick stopped at a
    /// phase boundary and the driver is paused; running again is safe.
    #[error("tick interrupted")]
    Interrupted,

    #[error("no scenario has been prepared")]
    NotPrepared,

    #[error("the simulation must be paused to {0}")]
    NotPaused(&'static str),

    #[error("{0} is not part of the scenario")]
    UnknownVehicle(VehicleId),

    #[error("no route from {from} to {to}")]
    Unreachable { from: NodeId, to: NodeId },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Vehicle(#[from] VehicleError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SimResult<T> = Result<T, SimError>;
