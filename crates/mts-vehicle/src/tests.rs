//! Unit tests for mts-vehicle.
//!
//! Vehicles are driven by a minimal single-threaded tick loop so each phase
//! rule can be observed in isolation.

#[cfg(test)]
mod harness {
    use std::collections::HashMap;

    use mts_core::{EdgeId, GeoPoint, SimulationConfig, VehicleConfig, VehicleId};
    use mts_network::{EdgeSpec, Graph, GraphBuilder};

    use crate::{Observed, Route, Vehicle, VehicleState};

    pub const AB: EdgeId = EdgeId(0);
    pub const BC: EdgeId = EdgeId(1);

    /// A → B → C, both edges `length_m` long.
    pub fn chain(length_m: f64, kmh: f64, lanes: u8) -> Graph {
        let mut b = GraphBuilder::new();
        let a = b.add_node(GeoPoint::new(0.0, 0.0));
        let m = b.add_node(GeoPoint::new(0.0, 0.01));
        let c = b.add_node(GeoPoint::new(0.0, 0.02));
        let spec = EdgeSpec::new(kmh).length(length_m).lanes(lanes);
        b.add_edge(a, m, spec.clone());
        b.add_edge(m, c, spec);
        b.build(&SimulationConfig::default()).unwrap()
    }

    pub fn steady() -> VehicleConfig {
        VehicleConfig { dawdle_factor: 0.0, ..VehicleConfig::default() }
    }

    /// Vehicle `id` on `edges`, registered at its start node.
    pub fn vehicle(g: &Graph, id: u32, edges: Vec<EdgeId>, delay: u64, config: &VehicleConfig) -> Vehicle {
        let v = Vehicle::new(VehicleId(id), Route::new(g, edges).unwrap(), delay, config, 42);
        v.register_in_graph(g).unwrap();
        v
    }

    fn spawned(v: &Vehicle) -> bool {
        v.state() == VehicleState::Spawned
    }

    /// One full tick over `vs`, where `vs[i]` has id `i`.
    pub fn tick(g: &Graph, vs: &mut [Vehicle]) {
        for v in vs.iter_mut().filter(|v| spawned(v)) {
            v.accelerate(g).unwrap();
        }
        let observed: HashMap<VehicleId, Observed> =
            vs.iter().filter_map(|v| v.observed().map(|o| (v.id(), o))).collect();
        for v in vs.iter_mut().filter(|v| spawned(v)) {
            let around = v.surroundings(g).unwrap().map(|id| observed.get(&id).copied());
            v.will_change_lane(g, &around).unwrap();
        }
        for v in vs.iter_mut().filter(|v| spawned(v)) {
            v.change_lane(g).unwrap();
        }
        for v in vs.iter_mut().filter(|v| spawned(v)) {
            v.brake(g).unwrap();
        }
        let movers: Vec<usize> = (0..vs.len()).filter(|&i| spawned(&vs[i])).collect();
        for &i in &movers {
            vs[i].move_forward(g).unwrap();
        }
        for &i in &movers {
            vs[i].did_move(g).unwrap();
        }
        for v in vs.iter_mut().filter(|v| v.state() == VehicleState::NotSpawned) {
            v.spawn(g).unwrap();
        }
        g.update_all_nodes().unwrap();
    }
}

// ── Routes ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod route {
    use mts_core::{EdgeId, NodeId};

    use super::harness::*;
    use crate::{Route, VehicleError};

    #[test]
    fn connected_route() {
        let g = chain(75.0, 50.0, 1);
        let mut r = Route::new(&g, vec![AB, BC]).unwrap();
        assert_eq!(r.start(), NodeId(0));
        assert_eq!(r.len(), 2);
        assert_eq!(r.pop(), Some(AB));
        assert_eq!(r.peek(), Some(BC));
    }

    #[test]
    fn broken_routes_are_rejected() {
        let g = chain(75.0, 50.0, 1);
        assert!(matches!(
            Route::new(&g, vec![BC, AB]),
            Err(VehicleError::DisconnectedRoute { from: BC, to: AB })
        ));
        assert!(matches!(Route::new(&g, vec![]), Err(VehicleError::EmptyRoute)));
        assert!(matches!(Route::new(&g, vec![EdgeId(9)]), Err(VehicleError::Network(_))));
        assert!(Route::empty(NodeId(2)).is_empty());
    }
}

// ── Driving ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod driving {
    use mts_core::{NodeId, VehicleConfig, VehicleId};

    use super::harness::*;
    use crate::{Phase, Position, Route, Vehicle, VehicleError, VehicleState};

    #[test]
    fn free_flow_acceleration() {
        // 1 km at 130 km/h: 134 cells, 5 cells per tick.
        let g = chain(1000.0, 130.0, 1);
        let mut vs = vec![vehicle(&g, 0, vec![AB], 0, &steady())];
        g.update_all_nodes().unwrap();

        tick(&g, &mut vs);
        assert_eq!(vs[0].state(), VehicleState::Spawned);
        assert_eq!(vs[0].position(), Some(Position { edge: AB, lane: 0, cell: 0 }));
        assert_eq!(vs[0].velocity(), 1);

        let mut cells = Vec::new();
        for _ in 0..5 {
            tick(&g, &mut vs);
            cells.push(vs[0].position().unwrap().cell);
        }
        assert_eq!(cells, vec![2, 5, 9, 14, 19]);
        assert_eq!(vs[0].velocity(), 5);
    }

    #[test]
    fn vehicle_speed_caps_edge_speed() {
        let g = chain(1000.0, 130.0, 1);
        let config = VehicleConfig { max_velocity: 3, ..steady() };
        let mut vs = vec![vehicle(&g, 0, vec![AB], 0, &config)];
        g.update_all_nodes().unwrap();
        for _ in 0..6 {
            tick(&g, &mut vs);
        }
        assert_eq!(vs[0].velocity(), 3);
    }

    #[test]
    fn stops_on_the_last_cell_then_despawns() {
        // 75 m at 50 km/h: 10 cells, 2 cells per tick.
        let g = chain(75.0, 50.0, 1);
        let mut vs = vec![vehicle(&g, 0, vec![AB], 0, &steady())];
        g.update_all_nodes().unwrap();

        let mut trail = Vec::new();
        for _ in 0..7 {
            tick(&g, &mut vs);
            trail.push(vs[0].position().map(|p| (p.cell, vs[0].velocity())));
        }
        assert_eq!(
            trail,
            vec![
                Some((0, 1)),
                Some((2, 2)),
                Some((4, 2)),
                Some((6, 2)),
                Some((8, 2)),
                Some((9, 1)),
                None,
            ]
        );
        assert_eq!(vs[0].state(), VehicleState::Despawned);
        assert!(g.edge(AB).unwrap().outermost_lane().is_empty());
    }

    #[test]
    fn crosses_into_the_next_edge() {
        let g = chain(75.0, 50.0, 1);
        let mut vs = vec![vehicle(&g, 0, vec![AB, BC], 0, &steady())];
        g.update_all_nodes().unwrap();

        for _ in 0..5 {
            tick(&g, &mut vs);
        }
        // On cell 8 with the node in reach: queued and granted.
        assert_eq!(vs[0].position().map(|p| p.cell), Some(8));
        let b = g.node(NodeId(1)).unwrap();
        assert!(b.permission_to_cross(VehicleId(0)));

        tick(&g, &mut vs);
        assert_eq!(vs[0].position(), Some(Position { edge: BC, lane: 0, cell: 0 }));
        assert!(!b.is_registered(VehicleId(0)));
        assert!(vs[0].route().is_empty());

        for _ in 0..10 {
            tick(&g, &mut vs);
        }
        assert_eq!(vs[0].state(), VehicleState::Despawned);
    }

    #[test]
    fn follower_keeps_its_distance() {
        let g = chain(150.0, 130.0, 1);
        let config = VehicleConfig::default();
        let mut vs: Vec<Vehicle> = (0..6).map(|i| vehicle(&g, i, vec![AB, BC], i as u64, &config)).collect();
        g.update_all_nodes().unwrap();

        for _ in 0..200 {
            tick(&g, &mut vs);
            let mut on_ab: Vec<(u32, u32)> = vs
                .iter()
                .filter_map(|v| v.position().filter(|p| p.edge == AB).map(|p| (p.cell, v.velocity())))
                .collect();
            on_ab.sort_unstable();
            for pair in on_ab.windows(2) {
                assert!(pair[0].0 < pair[1].0);
            }
        }
        assert!(vs.iter().all(|v| v.state() == VehicleState::Despawned));
    }

    #[test]
    fn empty_route_despawns_on_spawn() {
        let g = chain(75.0, 50.0, 1);
        let mut v = Vehicle::new(VehicleId(0), Route::empty(NodeId(0)), 0, &steady(), 1);
        v.register_in_graph(&g).unwrap();
        assert!(!g.node(NodeId(0)).unwrap().is_registered(VehicleId(0)));
        assert_eq!(v.spawn(&g).unwrap(), Some(VehicleState::Despawned));
    }

    #[test]
    fn spawn_delay_is_respected() {
        let g = chain(75.0, 50.0, 1);
        let mut vs = vec![vehicle(&g, 0, vec![AB], 3, &steady())];
        g.update_all_nodes().unwrap();
        for _ in 0..3 {
            tick(&g, &mut vs);
            assert_eq!(vs[0].state(), VehicleState::NotSpawned);
        }
        tick(&g, &mut vs);
        assert_eq!(vs[0].state(), VehicleState::Spawned);
        assert_eq!(vs[0].driver().age(), 4);
    }

    #[test]
    fn waiting_vehicles_spawn_one_at_a_time() {
        let g = chain(75.0, 50.0, 1);
        let mut vs = vec![
            vehicle(&g, 0, vec![AB], 0, &steady()),
            vehicle(&g, 1, vec![AB], 0, &steady()),
        ];
        g.update_all_nodes().unwrap();

        tick(&g, &mut vs);
        // Between two waiting vehicles the greater id goes first.
        assert_eq!(vs[1].state(), VehicleState::Spawned);
        assert_eq!(vs[0].state(), VehicleState::NotSpawned);
        assert_eq!(vs[0].velocity(), 0);

        tick(&g, &mut vs);
        assert_eq!(vs[0].state(), VehicleState::Spawned);
        assert_eq!(vs[0].position().map(|p| p.cell), Some(0));
        assert_eq!(vs[1].position().map(|p| p.cell), Some(2));
    }

    #[test]
    fn reset_rewinds_everything() {
        let g = chain(75.0, 50.0, 1);
        let mut vs = vec![vehicle(&g, 0, vec![AB, BC], 0, &VehicleConfig::default())];
        g.update_all_nodes().unwrap();
        for _ in 0..4 {
            tick(&g, &mut vs);
        }
        let first_run = vs[0].position();

        g.reset();
        vs[0].reset();
        assert_eq!(vs[0].state(), VehicleState::NotSpawned);
        assert_eq!(vs[0].route().len(), 2);
        assert_eq!(vs[0].driver().age(), 0);

        vs[0].register_in_graph(&g).unwrap();
        g.update_all_nodes().unwrap();
        for _ in 0..4 {
            tick(&g, &mut vs);
        }
        assert_eq!(vs[0].position(), first_run);
    }

    #[test]
    fn negative_velocity_message_names_vehicle_and_phase() {
        let err = VehicleError::NegativeVelocity {
            vehicle:  VehicleId(3),
            phase:    Phase::Brake,
            velocity: -1,
        };
        assert_eq!(err.to_string(), "VehicleId(3) computed velocity -1 during brake");
    }
}

// ── Lane changes ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod lane_change {
    use mts_core::VehicleId;

    use super::harness::*;
    use crate::{LaneChange, Observed, Surroundings, Vehicle};

    const BLOCKER: VehicleId = VehicleId(99);

    /// A spawned vehicle on cell 0 of lane 0 of a two-lane edge, with a
    /// standing blocker right ahead.
    fn blocked() -> (mts_network::Graph, Vehicle) {
        let g = chain(1000.0, 130.0, 2);
        let mut v = vehicle(&g, 0, vec![AB], 0, &steady());
        g.update_all_nodes().unwrap();
        v.spawn(&g).unwrap();
        g.edge(AB).unwrap().lane(0).unwrap().insert_vehicle(BLOCKER, 1).unwrap();
        (g, v)
    }

    fn standing(cell: u32) -> Observed {
        Observed { cell, velocity: 0, stood_still: true }
    }

    #[test]
    fn overtakes_a_standing_vehicle() {
        let (g, mut v) = blocked();
        let ids = v.surroundings(&g).unwrap();
        assert_eq!(ids, Surroundings { front: Some(BLOCKER), outer_front: None });

        let around = ids.map(|_| Some(standing(1)));
        v.will_change_lane(&g, &around).unwrap();
        assert_eq!(v.planned_lane_change(), LaneChange::Inner);

        v.change_lane(&g).unwrap();
        assert_eq!(v.position().map(|p| p.lane), Some(1));
        assert_eq!(g.edge(AB).unwrap().lane(1).unwrap().vehicle_at(0), Some(VehicleId(0)));
        assert_eq!(v.planned_lane_change(), LaneChange::None);
    }

    #[test]
    fn occupied_inner_cell_blocks_overtaking() {
        let (g, mut v) = blocked();
        g.edge(AB).unwrap().lane(1).unwrap().insert_vehicle(VehicleId(98), 0).unwrap();
        let around = v.surroundings(&g).unwrap().map(|_| Some(standing(1)));
        v.will_change_lane(&g, &around).unwrap();
        assert_eq!(v.planned_lane_change(), LaneChange::None);
    }

    #[test]
    fn returns_outwards_once_passed() {
        let (g, mut v) = blocked();
        let around = v.surroundings(&g).unwrap().map(|_| Some(standing(1)));
        v.will_change_lane(&g, &around).unwrap();
        v.change_lane(&g).unwrap();

        // Still standing ahead on the outer lane: stay inside.
        let ids = v.surroundings(&g).unwrap();
        assert_eq!(ids, Surroundings { front: None, outer_front: Some(BLOCKER) });
        v.will_change_lane(&g, &ids.map(|_| Some(standing(1)))).unwrap();
        assert_eq!(v.planned_lane_change(), LaneChange::None);

        // Outer vehicle drives off fast: drift back.
        let fast = Observed { cell: 1, velocity: 5, stood_still: false };
        v.will_change_lane(&g, &ids.map(|_| Some(fast))).unwrap();
        assert_eq!(v.planned_lane_change(), LaneChange::Outer);
        v.change_lane(&g).unwrap();
        assert_eq!(v.position().map(|p| p.lane), Some(0));
    }

    #[test]
    fn single_lane_edges_never_change() {
        let g = chain(1000.0, 130.0, 1);
        let mut v = vehicle(&g, 0, vec![AB], 0, &steady());
        g.update_all_nodes().unwrap();
        v.spawn(&g).unwrap();
        g.edge(AB).unwrap().lane(0).unwrap().insert_vehicle(BLOCKER, 1).unwrap();
        let ids = v.surroundings(&g).unwrap();
        assert_eq!(ids, Surroundings::default());
        v.will_change_lane(&g, &Surroundings { front: Some(standing(1)), outer_front: None }).unwrap();
        assert_eq!(v.planned_lane_change(), LaneChange::None);
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod driver {
    use mts_core::{VehicleConfig, VehicleId};

    use crate::Driver;

    #[test]
    fn anger_builds_while_standing() {
        let mut d = Driver::new(&VehicleConfig::default(), 0, VehicleId(0));
        d.did_one_step(true, false);
        assert_eq!(d.anger(), 0);
        d.did_one_step(true, true);
        d.did_one_step(true, true);
        assert_eq!(d.anger(), 2);
        assert_eq!(d.total_anger(), 2);

        d.did_one_step(false, true);
        assert_eq!(d.anger(), 2);
        d.did_one_step(false, false);
        assert_eq!(d.anger(), 1);
        assert_eq!(d.total_anger(), 2);
        assert_eq!(d.age(), 5);
    }

    #[test]
    fn draws_follow_factors() {
        let never = VehicleConfig {
            dawdle_factor: 0.0,
            dash_factor: 0.0,
            lane_change_factor: 0.0,
            ..VehicleConfig::default()
        };
        let mut d = Driver::new(&never, 5, VehicleId(1));
        assert!((0..100).all(|_| !d.dashes() && !d.dawdles() && !d.tends_to_change_lane()));

        let always = VehicleConfig { dash_factor: 1.0, lane_change_factor: 1.0, ..never };
        let mut d = Driver::new(&always, 5, VehicleId(1));
        assert!((0..100).all(|_| d.dashes() && d.tends_to_change_lane()));
        // Dawdling is conditioned on not dashing, which never happens here.
        assert!((0..100).all(|_| !d.dawdles()));
    }

    #[test]
    fn same_seed_same_draws() {
        let config = VehicleConfig { dash_factor: 0.3, ..VehicleConfig::default() };
        let mut a = Driver::new(&config, 9, VehicleId(4));
        let mut b = Driver::new(&config, 9, VehicleId(4));
        let xs: Vec<bool> = (0..64).map(|_| a.dawdles()).collect();
        let ys: Vec<bool> = (0..64).map(|_| b.dawdles()).collect();
        assert_eq!(xs, ys);

        a.reset();
        let zs: Vec<bool> = (0..64).map(|_| a.dawdles()).collect();
        assert_eq!(xs, zs);
    }
}
