//! `mts-sim` — tick orchestration for the mts cellular traffic simulator.
//!
//! # One tick
//!
//! ```text
//! spawned vehicles:  accelerate → will_change_lane → change_lane
//!                    → brake → move → did_move
//! waiting vehicles:  spawn
//! nodes:             update_nodes
//! ```
//!
//! Each arrow is a barrier across all vehicles.  Nodes are updated last so
//! the next tick's crossing permissions reflect post-move positions.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                      |
//! |----------------|---------------------------------------------------------------|
//! | [`scenario`]   | `Scenario`, `VehicleContainer`, `VehicleView`                 |
//! | [`executor`]   | `StepExecutor`, `SingleThreaded`, `MultiThreaded`, `do_one_step` |
//! | [`scheduler`]  | `Scheduler`, `Pacing`, `CancelToken`                          |
//! | [`simulation`] | `Simulation` driver: prepared / paused / running              |
//! | [`listener`]   | `StepListener`, `NoopListener`                                |
//! | [`error`]      | `SimError`, `SimResult<T>`                                    |
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | `parallel` | (default) Rayon-backed `MultiThreaded` executor.        |
//! | `serde`    | Serialize/Deserialize on `VehicleView` and config types. |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use mts_core::{GeoPoint, SimulationConfig};
//! use mts_network::{EdgeSpec, GraphBuilder};
//! use mts_sim::{Scenario, Simulation};
//!
//! let config = SimulationConfig::default();
//! let mut b = GraphBuilder::new();
//! let a = b.add_node(GeoPoint::new(0.0, 0.0));
//! let c = b.add_node(GeoPoint::new(0.0, 0.01));
//! b.add_road(a, c, EdgeSpec::new(50.0));
//!
//! let mut scenario = Scenario::new(b.build(&config)?, config.clone())?;
//! scenario.add_trip(a, c, 0)?;
//!
//! let mut sim = Simulation::new(config)?;
//! sim.set_and_init_prepared_scenario(scenario)?;
//! sim.run_ticks(100)?;
//! ```

pub mod error;
pub mod executor;
pub mod listener;
pub mod scenario;
pub mod scheduler;
pub mod simulation;


pub use error::{SimError, SimResult};
#[cfg(feature = "parallel")]
pub use executor::MultiThreaded;
pub use executor::{SingleThreaded, StepExecutor, do_one_step};
pub use listener::{NoopListener, StepListener};
pub use mts_vehicle::Phase;
pub use scenario::{Scenario, VehicleContainer, VehicleView};
pub use scheduler::{CancelToken, Pacing, Scheduler};
pub use simulation::Simulation;
