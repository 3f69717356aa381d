//! `mts-core` — foundational types for the cellular traffic simulator.
//!
//! This crate is a dependency of every other `mts-*` crate.  It has no
//! `mts-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`ids`]      | `NodeId`, `EdgeId`, `VehicleId`                            |
//! | [`geo`]      | `Vec2d`, `GeoPoint`, bearing sort                          |
//! | [`time`]     | `Tick`, speedup → tick period                              |
//! | [`rng`]      | `EntityRng` (per node / per vehicle), `SimRng` (global)    |
//! | [`config`]   | `SimulationConfig` and its sub-configs, `StreetPriority`   |
//! | [`error`]    | `CoreError`, `CoreResult`                                  |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to ids, geometry and config. |

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod time;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{
    CrossingLogicConfig, MultiThreadingConfig, RoadClass, SimulationConfig, StreetPriority,
    VehicleConfig,
};
pub use error::{CoreError, CoreResult};
pub use geo::{GeoPoint, Vec2d, sort_by_bearing};
pub use ids::{EdgeId, NodeId, VehicleId};
pub use rng::{EntityRng, SimRng};
pub use time::Tick;
