//! The demo road network: a plus-shaped crossroad.
//!
//! ```text
//!              north
//!                │
//!      west ── centre ── east
//!                │
//!              south
//! ```
//!
//! Every arm is a two-way road with two lanes per direction.  The
//! east-west road is the main street, so a vehicle on it has priority over
//! one coming out of the north or south arm.

use mts_core::{GeoPoint, NodeId, RoadClass, SimulationConfig, StreetPriority};
use mts_network::{EdgeSpec, Graph, GraphBuilder};

/// Arm length in metres.
pub const ARM_LENGTH_M: f64 = 150.0;

/// Build the crossroad.  Returns `(graph, [east, north, west, south])`.
pub fn build_network(config: &SimulationConfig) -> anyhow::Result<(Graph, [NodeId; 4])> {
    let mut b = GraphBuilder::with_capacity(5, 8);

    let centre = b.add_node(GeoPoint::new(30.6950, -88.0500));
    let east   = b.add_node(GeoPoint::new(30.6950, -88.0484));
    let north  = b.add_node(GeoPoint::new(30.6964, -88.0500));
    let west   = b.add_node(GeoPoint::new(30.6950, -88.0516));
    let south  = b.add_node(GeoPoint::new(30.6936, -88.0500));

    let main_street = EdgeSpec::new(50.0)
        .length(ARM_LENGTH_M)
        .lanes(2)
        .priority(StreetPriority::new(RoadClass::Primary));
    let side_street = EdgeSpec::new(50.0)
        .length(ARM_LENGTH_M)
        .lanes(2)
        .priority(StreetPriority::new(RoadClass::Residential));

    b.add_road(centre, east,  main_street.clone());
    b.add_road(centre, west,  main_street);
    b.add_road(centre, north, side_street.clone());
    b.add_road(centre, south, side_street);

    Ok((b.build(config)?, [east, north, west, south]))
}
