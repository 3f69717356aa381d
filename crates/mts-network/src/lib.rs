//! `mts-network` — the cellular street network.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                    |
//! |--------------|-------------------------------------------------------------|
//! | [`lane`]     | `Lane`: cell occupancy behind a per-lane lock              |
//! | [`edge`]     | `DirectedEdge`: lanes plus derived cellular constants      |
//! | [`crossing`] | crossing-index geometry, `Approach`, `Precedence`, `decide` |
//! | [`node`]     | `Node`: crossing indices and the priority-counter arbiter  |
//! | [`graph`]    | `Graph` arena, `GraphBuilder`, `EdgeSpec`, route search    |
//! | [`error`]    | `NetworkError`, `NetworkResult<T>`                         |
//!
//! # Concurrency
//!
//! A built [`Graph`] is shared as `&Graph` by all worker threads.  Its shape
//! never changes; the only mutable state is lane occupancy (one mutex per
//! lane) and node arbitration (one mutex per node).
//!
//! # Feature flags
//!
//! | Flag    | Effect                                      |
//! |---------|---------------------------------------------|
//! | `serde` | Forwards to `mts-core/serde`.               |

pub mod crossing;
pub mod edge;
pub mod error;
pub mod graph;
pub mod lane;
pub mod node;


pub use crossing::{
    Approach, Leg, Precedence, are_indices_crossing, decide, leftmost_index_in_matching,
};
pub use edge::DirectedEdge;
pub use error::{NetworkError, NetworkResult};
pub use graph::{EdgeSpec, Graph, GraphBuilder};
pub use lane::Lane;
pub use node::{CrossingRequest, Node};
