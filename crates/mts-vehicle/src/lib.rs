//! `mts-vehicle` — vehicles of the cellular traffic model.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                     |
//! |-------------|--------------------------------------------------------------|
//! | [`vehicle`] | `Vehicle` state machine, `VehicleState`, `Surroundings`      |
//! | [`driver`]  | `Driver`: dash/dawdle/lane-change draws, anger, age          |
//! | [`route`]   | `Route`: remaining edges of a trip                           |
//! | [`phase`]   | `Phase`: the fixed order of one tick                         |
//! | [`error`]   | `VehicleError`, `VehicleResult<T>`                           |
//!
//! Vehicles never reference each other.  They act on the shared
//! [`Graph`](mts_network::Graph) through lane occupancy and node
//! registration, which is what lets the step executor run one phase over
//! many vehicles in parallel.

pub mod driver;
pub mod error;
pub mod phase;
pub mod route;
pub mod vehicle;

#[cfg(test)]
mod tests;

pub use driver::Driver;
pub use error::{VehicleError, VehicleResult};
pub use phase::Phase;
pub use route::Route;
pub use vehicle::{LaneChange, Observed, Position, Surroundings, Vehicle, VehicleState};
